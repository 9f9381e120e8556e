//! Native-side row buffer for drivers that materialise a whole result on execute.

use std::sync::Arc;

use crate::cursor::Orientation;
use crate::row::{Row, Value};

/// Rows of one execution plus the native position.
///
/// `position` follows the usual driver convention: `-1` before the first
/// row, `len` after the last one.
#[derive(Debug, Clone)]
pub(crate) struct RowBuffer {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
    position: isize,
}

impl RowBuffer {
    pub(crate) fn new(columns: Arc<[String]>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: -1,
        }
    }

    pub(crate) fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Row {
        Row::new(Arc::clone(&self.columns), self.rows[index].clone())
    }

    /// Move according to `orientation` and return the row landed on.
    pub(crate) fn fetch(&mut self, orientation: Orientation) -> Option<Row> {
        let len = self.rows.len() as isize;
        let target = match orientation {
            Orientation::Next => self.position + 1,
            Orientation::Prior => self.position - 1,
            Orientation::First => 0,
            Orientation::Last => len - 1,
            Orientation::Absolute(index) => isize::try_from(index).unwrap_or(isize::MAX),
            Orientation::Relative(offset) => self.position.saturating_add(offset),
        };

        if (0..len).contains(&target) {
            self.position = target;
            Some(self.row(target as usize))
        } else {
            self.position = if target < 0 { -1 } else { len };
            None
        }
    }

    /// Every row after the native position.
    pub(crate) fn fetch_rest(&mut self) -> Vec<Row> {
        let start = usize::try_from(self.position + 1).unwrap_or(0);
        let rest = (start..self.rows.len()).map(|i| self.row(i)).collect();
        self.position = self.rows.len() as isize;
        rest
    }

    /// One column of the next row.
    pub(crate) fn fetch_column(&mut self, index: usize) -> Option<Value> {
        self.fetch(Orientation::Next)
            .and_then(|row| row.get(index).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::columns;

    fn buffer(n: i64) -> RowBuffer {
        RowBuffer::new(columns(["n"]), (0..n).map(|i| vec![Value::Int(i)]).collect())
    }

    fn n(row: Option<Row>) -> Option<Value> {
        row.and_then(|r| r.get(0).cloned())
    }

    #[test]
    fn orientations() {
        let mut b = buffer(3);
        assert_eq!(n(b.fetch(Orientation::Prior)), None);
        assert_eq!(n(b.fetch(Orientation::Next)), Some(Value::Int(0)));
        assert_eq!(n(b.fetch(Orientation::Last)), Some(Value::Int(2)));
        assert_eq!(n(b.fetch(Orientation::Prior)), Some(Value::Int(1)));
        assert_eq!(n(b.fetch(Orientation::Relative(-1))), Some(Value::Int(0)));
        assert_eq!(n(b.fetch(Orientation::Absolute(5))), None);
        assert_eq!(n(b.fetch(Orientation::Next)), None);
        assert_eq!(n(b.fetch(Orientation::First)), Some(Value::Int(0)));
    }

    #[test]
    fn rest_starts_after_position() {
        let mut b = buffer(4);
        b.fetch(Orientation::Absolute(1));
        let rest: Vec<_> = b.fetch_rest().into_iter().map(|r| n(Some(r))).collect();
        assert_eq!(rest, vec![Some(Value::Int(2)), Some(Value::Int(3))]);
        assert!(b.fetch_rest().is_empty());
    }
}
