//! Pagination request and result types.

use serde::{Deserialize, Serialize};

/// A page request: skip `offset` results and return at most `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub offset: usize,
    pub limit: usize,
}

impl Pageable {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Zero-based page `page` of `size` results.
    pub fn of(page: usize, size: usize) -> Self {
        Self {
            offset: page.saturating_mul(size),
            limit: size,
        }
    }

    /// The request for the following page.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

/// One page of results and the total across all pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Results matching the query regardless of paging
    pub total: u64,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }

    pub fn is_last(&self) -> bool {
        (self.offset as u64).saturating_add(self.limit as u64) >= self.total
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn pageable(&self) -> Pageable {
        Pageable::new(self.offset, self.limit)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}
