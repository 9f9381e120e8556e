//! Random-access result cursor.
//!
//! [`ResultCursor`] wraps one native statement handle and keeps every row it
//! has seen in a sparse, position-keyed cache. Rows already cached are never
//! fetched again, so first/last/next/prior and bulk fetches can be mixed in
//! any order on both scrollable and forward-only handles.
//!
//! On a scrollable handle each missing row costs one targeted native fetch
//! (Next, Prior, First, Last, Relative or Absolute, whichever reaches it). A
//! forward-only handle only ever receives Next: reaching row `n` drains and
//! caches every row before it.
//!
//! # Example
//! ```
//! use dalq::memory::MemoryConnection;
//! use dalq::{Dal, Value};
//!
//! let conn = MemoryConnection::new().with_result(
//!     "SELECT n FROM t",
//!     ["n"],
//!     (1..=3).map(|n| vec![Value::Int(n)]),
//! );
//! let mut dal = Dal::new("main", conn);
//! let mut cursor = dal.query("SELECT n FROM t")?;
//!
//! let last = cursor.fetch_last()?.unwrap();
//! assert_eq!(last.get("n"), Some(serde_json::json!(3)));
//! assert_eq!(cursor.fetch_all()?.len(), 3);
//! # Ok::<(), dalq::DalError>(())
//! ```

mod buffer;
mod style;

pub(crate) use buffer::RowBuffer;
pub use style::{Direction, FetchMode, FetchStyle, Record, StartOffset};

use std::collections::BTreeMap;

use crate::dal::{ErrorInfo, Param, ParamType, StatementHandle};
use crate::error::{DalError, DalResult};
use crate::row::{FromRow, Row, Value};

/// Movement requested from the native handle for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Next,
    Prior,
    First,
    Last,
    Absolute(usize),
    Relative(isize),
}

/// What a native handle can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorKind {
    /// Only [`Orientation::Next`] is supported.
    #[default]
    ForwardOnly,
    /// Every [`Orientation`] is supported.
    Scrollable,
}

/// Rows within this distance of the native position are reached with
/// [`Orientation::Relative`] rather than [`Orientation::Absolute`].
const RELATIVE_REACH: usize = 16;

/// Iteration position, in driver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Unstarted,
    /// Stepped back past row 0.
    BeforeStart,
    At(usize),
    /// Stepped past the last row.
    AfterEnd,
}

/// A sparse, random-access cache over a native statement handle.
#[derive(Debug)]
pub struct ResultCursor<S> {
    handle: S,
    kind: CursorKind,
    closed: bool,
    cache: BTreeMap<usize, Row>,
    count: Option<u64>,
    /// Position a native Next would return; `None` when unknown.
    native_next: Option<usize>,
    /// No row exists at or after this position.
    end: Option<usize>,
    position: Position,
    style: FetchStyle,
}

impl<S: StatementHandle> ResultCursor<S> {
    /// Wrap a prepared, not yet executed handle.
    pub fn new(handle: S, kind: CursorKind) -> Self {
        Self {
            handle,
            kind,
            closed: false,
            cache: BTreeMap::new(),
            count: None,
            native_next: Some(0),
            end: None,
            position: Position::Unstarted,
            style: FetchStyle::default(),
        }
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn handle(&self) -> &S {
        &self.handle
    }

    pub fn into_handle(self) -> S {
        self.handle
    }

    pub fn fetching_style(&self) -> &FetchStyle {
        &self.style
    }

    /// Configure how later fetches walk and shape rows. Nothing is fetched.
    pub fn set_fetching_style(&mut self, style: FetchStyle) -> &mut Self {
        self.style = style;
        self
    }

    // ==================== Execution ====================

    /// Execute the handle, discarding every cached row and the memoized count.
    pub fn execute(&mut self, params: &[Value]) -> DalResult<bool> {
        let executed = self.handle.execute(params)?;
        self.closed = false;
        self.reset();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "dalq.cursor",
            kind = ?self.kind,
            params = params.len(),
            "statement executed"
        );

        Ok(executed)
    }

    pub fn bind_parameter(
        &mut self,
        param: Param,
        value: Value,
        kind: Option<ParamType>,
        length: Option<usize>,
    ) -> DalResult<bool> {
        self.handle.bind_parameter(param, value, kind, length)
    }

    /// Release the native result. The cursor can be executed again.
    pub fn close_cursor(&mut self) -> DalResult<bool> {
        let closed = self.handle.close_cursor()?;
        self.closed = true;
        self.reset();

        #[cfg(feature = "tracing")]
        tracing::debug!(target: "dalq.cursor", "cursor closed");

        Ok(closed)
    }

    /// Affected or returned row count of the current execution, memoized.
    pub fn count(&mut self) -> DalResult<u64> {
        self.ensure_open()?;
        if let Some(count) = self.count {
            return Ok(count);
        }
        let count = self.handle.row_count()?;
        self.count = Some(count);
        Ok(count)
    }

    pub fn error_code(&self) -> Option<String> {
        self.handle.error_code()
    }

    pub fn error_info(&self) -> ErrorInfo {
        self.handle.error_info()
    }

    // ==================== Iteration ====================

    /// Move to the first row of the walk: row 0, or the last row with
    /// [`StartOffset::FromEnd`].
    pub fn rewind(&mut self) -> DalResult<()> {
        self.ensure_open()?;
        let start = match self.style.start_offset() {
            StartOffset::FromStart => self.load(0)?.then_some(0),
            StartOffset::FromEnd => self.load_last()?,
        };
        self.position = start.map_or(Position::AfterEnd, Position::At);
        Ok(())
    }

    /// Step once in the configured [`Direction`], fetching the row if needed.
    ///
    /// Past either end the cursor stays put until a step in the opposite
    /// direction brings it back onto the boundary row.
    pub fn next(&mut self) -> DalResult<()> {
        self.ensure_open()?;
        match (self.position, self.style.current_direction()) {
            (Position::Unstarted, _) => self.rewind(),
            (_, Direction::Forward) => self.step_forward(),
            (_, Direction::Backward) => self.step_back(),
        }
    }

    pub fn valid(&self) -> bool {
        matches!(self.position, Position::At(p) if self.cache.contains_key(&p))
    }

    pub fn key(&self) -> Option<usize> {
        match self.position {
            Position::At(p) => Some(p),
            _ => None,
        }
    }

    /// The row under the cursor, shaped by the current fetch mode.
    pub fn current(&self) -> Option<Record> {
        self.current_row().map(|row| self.style.decode(row))
    }

    /// The raw row under the cursor.
    pub fn current_row(&self) -> Option<&Row> {
        match self.position {
            Position::At(p) => self.cache.get(&p),
            _ => None,
        }
    }

    /// Iterate the walk from the start, as `rewind` then `next` until invalid.
    pub fn rows(&mut self) -> Rows<'_, S> {
        Rows {
            cursor: self,
            started: false,
            failed: false,
        }
    }

    // ==================== Random access ====================

    pub fn fetch_first(&mut self) -> DalResult<Option<Record>> {
        self.ensure_open()?;
        let found = match self.kind {
            CursorKind::Scrollable if !self.cache.contains_key(&0) => {
                match self.native_fetch(Orientation::First, 0)? {
                    Some(row) => {
                        self.cache.insert(0, row);
                        self.native_next = Some(1);
                        true
                    }
                    None => {
                        self.mark_end(0);
                        self.native_next = None;
                        false
                    }
                }
            }
            _ => self.load(0)?,
        };
        self.position = if found { Position::At(0) } else { Position::AfterEnd };
        Ok(self.current())
    }

    pub fn fetch_last(&mut self) -> DalResult<Option<Record>> {
        self.ensure_open()?;
        let last = self.load_last()?;
        self.position = last.map_or(Position::AfterEnd, Position::At);
        Ok(self.current())
    }

    /// Step forward (in the configured direction) and return the row.
    pub fn fetch_next(&mut self) -> DalResult<Option<Record>> {
        self.next()?;
        Ok(self.current())
    }

    /// Step back (against the configured direction) and return the row.
    pub fn fetch_prior(&mut self) -> DalResult<Option<Record>> {
        self.ensure_open()?;
        match (self.position, self.style.current_direction()) {
            (Position::Unstarted, _) => {}
            (_, Direction::Forward) => self.step_back()?,
            (_, Direction::Backward) => self.step_forward()?,
        }
        Ok(self.current())
    }

    /// Every row of the result, in driver order.
    ///
    /// Only positions missing from the cache are fetched. The walk is then
    /// reset to its start.
    pub fn fetch_all(&mut self) -> DalResult<Vec<Record>> {
        self.fill()?;
        Ok(self
            .cache
            .values()
            .map(|row| self.style.decode(row))
            .collect())
    }

    /// Every row of the result mapped through [`FromRow`].
    pub fn fetch_all_as<T: FromRow>(&mut self) -> DalResult<Vec<T>> {
        self.fill()?;
        self.cache.values().map(T::from_row).collect()
    }

    /// One column of the next native row. The row is not cached.
    pub fn fetch_column(&mut self, index: usize) -> DalResult<Option<Value>> {
        self.ensure_open()?;
        let value = self.handle.fetch_column(index)?;
        match (value.is_some(), self.native_next) {
            (true, Some(next)) => self.native_next = Some(next + 1),
            (false, Some(next)) => {
                self.mark_end(next);
                // A scrollable handle now sits after the end, not on the last row.
                if self.kind == CursorKind::Scrollable {
                    self.native_next = None;
                }
            }
            (_, None) => {}
        }
        Ok(value)
    }

    // ==================== Cache ====================

    fn ensure_open(&self) -> DalResult<()> {
        if self.closed {
            return Err(DalError::Closed);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.cache.clear();
        self.count = None;
        self.native_next = Some(0);
        self.end = None;
        self.position = Position::Unstarted;
    }

    fn mark_end(&mut self, bound: usize) {
        self.end = Some(self.end.map_or(bound, |end| end.min(bound)));
    }

    /// Move one row toward the end of the result.
    fn step_forward(&mut self) -> DalResult<()> {
        let target = match self.position {
            Position::Unstarted | Position::BeforeStart => 0,
            Position::At(current) => current + 1,
            Position::AfterEnd => return Ok(()),
        };
        self.position = if self.load(target)? {
            Position::At(target)
        } else {
            Position::AfterEnd
        };
        Ok(())
    }

    /// Move one row toward the start of the result.
    fn step_back(&mut self) -> DalResult<()> {
        self.position = match self.position {
            Position::Unstarted | Position::BeforeStart => Position::BeforeStart,
            Position::At(0) => Position::BeforeStart,
            Position::At(current) => {
                let target = current - 1;
                if self.load(target)? {
                    Position::At(target)
                } else {
                    Position::BeforeStart
                }
            }
            Position::AfterEnd => self.load_last()?.map_or(Position::BeforeStart, Position::At),
        };
        Ok(())
    }

    /// Cheapest scroll orientation reaching `pos` from the native position.
    fn scroll_orientation(&self, pos: usize) -> Orientation {
        let Some(next) = self.native_next else {
            return Orientation::Absolute(pos);
        };
        if next == pos {
            return Orientation::Next;
        }
        if pos + 2 == next {
            return Orientation::Prior;
        }
        if pos.abs_diff(next) > RELATIVE_REACH {
            return Orientation::Absolute(pos);
        }
        match (isize::try_from(pos), isize::try_from(next)) {
            (Ok(target), Ok(next)) => Orientation::Relative(target - (next - 1)),
            _ => Orientation::Absolute(pos),
        }
    }

    fn native_fetch(&mut self, orientation: Orientation, position: usize) -> DalResult<Option<Row>> {
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "dalq.cursor", ?orientation, position, "native fetch");
        #[cfg(not(feature = "tracing"))]
        let _ = position;

        self.handle.fetch(orientation)
    }

    /// Make sure row `pos` is cached. `false` when the result has no such row.
    fn load(&mut self, pos: usize) -> DalResult<bool> {
        if self.cache.contains_key(&pos) {
            return Ok(true);
        }
        if self.end.is_some_and(|end| pos >= end) {
            return Ok(false);
        }

        match self.kind {
            CursorKind::Scrollable => {
                let orientation = self.scroll_orientation(pos);
                match self.native_fetch(orientation, pos)? {
                    Some(row) => {
                        self.cache.insert(pos, row);
                        self.native_next = Some(pos + 1);
                        Ok(true)
                    }
                    None => {
                        self.mark_end(pos);
                        self.native_next = None;
                        Ok(false)
                    }
                }
            }
            CursorKind::ForwardOnly => {
                let mut next = self.native_next.unwrap_or(0);
                if pos < next {
                    return Err(DalError::RowUnavailable(pos));
                }
                while next <= pos {
                    match self.native_fetch(Orientation::Next, next)? {
                        Some(row) => {
                            self.cache.insert(next, row);
                            next += 1;
                            self.native_next = Some(next);
                        }
                        None => {
                            self.mark_end(next);
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
        }
    }

    /// Cache the last row and return its position.
    ///
    /// Scrollable handles locate the last row through
    /// [`StatementHandle::row_count`]. A count of 0 is not trusted, since some
    /// drivers report 0 for every SELECT: the end is then found by draining.
    fn load_last(&mut self) -> DalResult<Option<usize>> {
        match self.kind {
            CursorKind::Scrollable => {
                let total = usize::try_from(self.count()?).unwrap_or(usize::MAX);
                if total == 0 {
                    return self.drain_to_last();
                }
                let Some(last) = total.checked_sub(1) else {
                    self.mark_end(0);
                    return Ok(None);
                };
                if self.cache.contains_key(&last) {
                    return Ok(Some(last));
                }
                match self.native_fetch(Orientation::Last, last)? {
                    Some(row) => {
                        self.cache.insert(last, row);
                        self.native_next = Some(total);
                        self.mark_end(total);
                        Ok(Some(last))
                    }
                    None => {
                        self.native_next = None;
                        Ok(None)
                    }
                }
            }
            CursorKind::ForwardOnly => {
                while self.load(self.native_next.unwrap_or(0))? {}
                let Some(last) = self.end.and_then(|end| end.checked_sub(1)) else {
                    return Ok(None);
                };
                if !self.cache.contains_key(&last) {
                    return Err(DalError::RowUnavailable(last));
                }
                Ok(Some(last))
            }
        }
    }

    /// Bulk-fetch past the highest cached row and cache the last row.
    fn drain_to_last(&mut self) -> DalResult<Option<usize>> {
        let tail = self.cache.keys().next_back().map_or(0, |highest| highest + 1);
        self.fetch_tail(tail)?;
        let Some(last) = self.end.and_then(|end| end.checked_sub(1)) else {
            return Ok(None);
        };
        Ok(self.load(last)?.then_some(last))
    }

    /// Cache every remaining row, merging by position, then reset the walk.
    fn fill(&mut self) -> DalResult<()> {
        self.ensure_open()?;

        let tail = match self.kind {
            CursorKind::Scrollable => match self.cache.keys().next_back().copied() {
                Some(highest) => {
                    for pos in 0..highest {
                        if !self.load(pos)? {
                            break;
                        }
                    }
                    highest + 1
                }
                None => 0,
            },
            CursorKind::ForwardOnly => {
                let next = self.native_next.unwrap_or(0);
                if let Some(hole) = (0..next).find(|pos| !self.cache.contains_key(pos)) {
                    return Err(DalError::RowUnavailable(hole));
                }
                next
            }
        };

        self.fetch_tail(tail)?;

        self.position = match self.style.start_offset() {
            StartOffset::FromStart if self.cache.contains_key(&0) => Position::At(0),
            StartOffset::FromEnd => self
                .cache
                .keys()
                .next_back()
                .copied()
                .map_or(Position::AfterEnd, Position::At),
            _ => Position::AfterEnd,
        };
        Ok(())
    }

    /// Bulk-fetch every row from `start` on.
    fn fetch_tail(&mut self, mut start: usize) -> DalResult<()> {
        if self.end.is_some_and(|end| start >= end) {
            return Ok(());
        }
        if self.native_next != Some(start) {
            if !self.load(start)? {
                return Ok(());
            }
            start += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "dalq.cursor", start, "native fetch all");

        let rows = self.handle.fetch_all()?;
        let end = start + rows.len();
        for (offset, row) in rows.into_iter().enumerate() {
            self.cache.entry(start + offset).or_insert(row);
        }
        // A scrollable handle is left after the end; only Next keeps counting there.
        self.native_next = match self.kind {
            CursorKind::Scrollable => None,
            CursorKind::ForwardOnly => Some(end),
        };
        self.mark_end(end);
        Ok(())
    }
}

/// Iterator over the standard walk of a [`ResultCursor`].
pub struct Rows<'a, S> {
    cursor: &'a mut ResultCursor<S>,
    started: bool,
    failed: bool,
}

impl<S: StatementHandle> Iterator for Rows<'_, S> {
    type Item = DalResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let step = if self.started {
            self.cursor.next()
        } else {
            self.started = true;
            self.cursor.rewind()
        };

        if let Err(err) = step {
            self.failed = true;
            return Some(Err(err));
        }
        self.cursor.current().map(Ok)
    }
}

#[cfg(test)]
mod tests;
