//! Sequential read cursor with a single pushback slot.

/// Tracks the last item handed out so it can be pushed back once.
///
/// ```
/// use vfk_core::Cursor;
///
/// let items = [1, 2, 3];
/// let mut position = 0;
/// let mut cursor = Cursor::default();
/// let mut fetch = |pos: &mut usize| {
///     let item = items.get(*pos).copied();
///     *pos += 1;
///     Ok::<_, ()>(item)
/// };
///
/// assert_eq!(cursor.advance(|| fetch(&mut position)), Ok(Some(1)));
/// assert_eq!(cursor.step_back(), Some(1));
/// assert_eq!(cursor.step_back(), None);
/// assert_eq!(cursor.advance(|| fetch(&mut position)), Ok(Some(1)));
/// assert_eq!(cursor.advance(|| fetch(&mut position)), Ok(Some(2)));
/// ```
#[derive(Debug, Clone)]
pub struct Cursor<T> {
    pushed_back: Option<T>,
    last: Option<T>,
}

impl<T> Default for Cursor<T> {
    fn default() -> Self {
        Self {
            pushed_back: None,
            last: None,
        }
    }
}

impl<T: Clone> Cursor<T> {
    /// Return the pushed-back item, or fetch the next one.
    pub fn advance<E, F>(&mut self, fetch: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<Option<T>, E>,
    {
        let next = match self.pushed_back.take() {
            Some(item) => Some(item),
            None => fetch()?,
        };
        self.last.clone_from(&next);
        Ok(next)
    }

    /// Push the most recently returned item back and return it.
    ///
    /// A second consecutive call finds nothing to push back.
    pub fn step_back(&mut self) -> Option<T> {
        let item = self.last.take()?;
        self.pushed_back = Some(item.clone());
        Some(item)
    }

    /// Forget pushed-back and last items.
    pub fn reset(&mut self) {
        self.pushed_back = None;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn reset_discards_pushback() {
        let mut cursor = Cursor::default();
        let fetched: Result<_, ()> = cursor.advance(|| Ok(Some("a")));
        assert_eq!(fetched, Ok(Some("a")));
        assert_eq!(cursor.step_back(), Some("a"));
        cursor.reset();
        let after: Result<_, ()> = cursor.advance(|| Ok(Some("b")));
        assert_eq!(after, Ok(Some("b")));
    }

    #[rstest]
    fn step_back_before_any_read_is_empty() {
        let mut cursor: Cursor<u8> = Cursor::default();
        assert_eq!(cursor.step_back(), None);
    }

    #[rstest]
    fn exhausted_cursor_cannot_step_back() {
        let mut cursor: Cursor<u8> = Cursor::default();
        let end: Result<_, ()> = cursor.advance(|| Ok(None));
        assert_eq!(end, Ok(None));
        assert_eq!(cursor.step_back(), None);
    }
}
