//! Result rows and the column cursor projections read from.

use crate::error::{Error, Result};
use crate::query::Selectable;
use crate::value::{FromValue, Value};
use serde::Serialize;

/// One result row: labelled values in select-list order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    labels: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(labels: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(labels.len(), values.len());
        Self { labels, values }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of the column labelled `label`.
    pub fn value(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| &self.values[i])
    }

    /// Typed value of a selected field or expression; `None` for null.
    ///
    /// Fails with a shape mismatch when the item was not selected or its value
    /// does not decode as the item's type.
    pub fn get<S: Selectable>(&self, item: &S) -> Result<Option<S::Output>>
    where
        S::Output: FromValue,
    {
        let label = item.select_item().label();
        match self.value(&label) {
            Some(Value::Null) => Ok(None),
            Some(value) => S::Output::from_value(value.clone()).map(Some),
            None => Err(Error::ShapeMismatch(format!(
                "`{}` is not part of the result",
                label
            ))),
        }
    }

    /// Typed value at a column position; `None` for null.
    pub fn get_at<T: FromValue>(&self, index: usize) -> Result<Option<T>> {
        match self.values.get(index) {
            Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value.clone()).map(Some),
            None => Err(Error::ShapeMismatch(format!(
                "column {} out of range for a row of {}",
                index,
                self.values.len()
            ))),
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.labels, self.values)
    }

    /// Cursor over the columns in order.
    pub fn into_columns(self) -> Columns {
        Columns {
            columns: self.labels.into_iter().zip(self.values).collect::<Vec<_>>().into_iter(),
        }
    }
}

/// Sequential reader over the columns of a row
#[derive(Debug)]
pub struct Columns {
    columns: std::vec::IntoIter<(String, Value)>,
}

impl Columns {
    /// Next column with its label.
    pub fn next_column(&mut self) -> Result<(String, Value)> {
        self.columns
            .next()
            .ok_or_else(|| Error::ShapeMismatch("fewer columns selected than expected".to_string()))
    }

    /// Next column decoded as `T`; `None` for null.
    pub fn next_value<T: FromValue>(&mut self) -> Result<Option<T>> {
        match self.next_column()? {
            (_, Value::Null) => Ok(None),
            (_, value) => T::from_value(value).map(Some),
        }
    }

    /// Next column decoded as `T`; null is a shape mismatch.
    pub fn required<T: FromValue>(&mut self) -> Result<T> {
        match self.next_column()? {
            (label, Value::Null) => Err(Error::ShapeMismatch(format!(
                "`{}` is null but the target requires a value",
                label
            ))),
            (_, value) => T::from_value(value),
        }
    }

    pub fn remaining(&self) -> usize {
        self.columns.len()
    }

    /// Moves the next `n` columns into a cursor of their own.
    pub fn split_off(&mut self, n: usize) -> Result<Columns> {
        if self.remaining() < n {
            return Err(Error::ShapeMismatch(format!(
                "expected {} more columns, found {}",
                n,
                self.remaining()
            )));
        }
        let taken: Vec<(String, Value)> = self.columns.by_ref().take(n).collect();
        Ok(Columns {
            columns: taken.into_iter(),
        })
    }

    /// Whether every remaining column is null.
    pub fn all_null(&self) -> bool {
        self.columns.as_slice().iter().all(|(_, value)| value.is_null())
    }
}
