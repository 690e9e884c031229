use crate::invariants::{
    debug_assert_forward, debug_assert_reader_not_ahead, debug_assert_write_in_bounds,
};
use crate::ReaderId;

// =============================================================================
// CURSOR ALGEBRA
// =============================================================================
//
// A cursor is a `(cycles, pos)` pair. Against a ring of `capacity` slots it
// denotes the absolute sequence `cycles * capacity + pos`:
//
// - The writer's sequence `W` is the number of values written so far. The
//   writer wraps eagerly: the moment `pos` reaches `capacity` it becomes 0 and
//   `cycles` is incremented.
// - A reader's sequence `R` is the next value it will consume.
//
// Value `s` lives in slot `s % capacity` until the writer reaches `s + capacity`,
// so the buffer retains exactly the window `[W - capacity, W)`.
//
// Read cases:
//
// 1. `R < W` and `W - R ≤ capacity`: the value is still retained. Deliver it
//    and advance (this covers readers one lap behind whose slot has not been
//    reused yet).
// 2. `R ≥ W`: nothing new, the reader must starve.
// 3. `W - R > capacity`: lapped. The reader is moved to `W - capacity`, the
//    oldest retained value, and reads from there. Everything skipped is lost.
//
// Everything in this file runs inside the coordinator task, the only owner of
// the slots.
//
// =============================================================================

/// A position in a ring, shared by the writer and every reader.
///
/// Cursors order lexicographically by `(cycles, pos)`, which for cursors on the
/// same ring is the same as ordering by sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    cycles: u64,
    pos: usize,
}

impl Cursor {
    /// Builds a cursor from its parts.
    pub const fn new(cycles: u64, pos: usize) -> Self {
        Self { cycles, pos }
    }

    /// Builds the cursor for an absolute sequence.
    pub fn from_sequence(sequence: u64, capacity: usize) -> Self {
        let capacity = capacity as u64;
        Self {
            cycles: sequence / capacity,
            pos: (sequence % capacity) as usize,
        }
    }

    /// Number of complete laps behind this cursor.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Slot index within the current lap.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Absolute sequence of this cursor in a ring of `capacity` slots.
    #[inline]
    pub fn sequence(&self, capacity: usize) -> u64 {
        self.cycles * capacity as u64 + self.pos as u64
    }

    /// The cursor one slot further on, wrapping at `capacity`.
    #[inline]
    pub fn advance(self, capacity: usize) -> Self {
        if self.pos + 1 >= capacity {
            Self {
                cycles: self.cycles + 1,
                pos: 0,
            }
        } else {
            Self {
                cycles: self.cycles,
                pos: self.pos + 1,
            }
        }
    }
}

/// Picks the reader furthest behind, by `(cycles, pos)`.
///
/// Ties go to the first reader listed. Returns `None` for an empty set.
pub fn slowest<I>(readers: I) -> Option<ReaderId>
where
    I: IntoIterator<Item = (ReaderId, Cursor)>,
{
    readers
        .into_iter()
        .min_by_key(|(_, cursor)| *cursor)
        .map(|(id, _)| id)
}

/// Result of a single read attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome<T> {
    /// A value was delivered; `skipped` values were lost to a lap first.
    Value { value: T, skipped: u64 },
    /// The reader has caught up with the writer.
    Empty,
}

/// The fixed-size circular buffer and its write cursor.
pub(crate) struct Slots<T> {
    data: Box<[Option<T>]>,
    head: Cursor,
}

impl<T: Clone> Slots<T> {
    /// Allocates `capacity` empty slots. The caller guarantees `capacity > 0`.
    pub(crate) fn new(capacity: usize) -> Self {
        let mut data = Vec::with_capacity(capacity);
        data.resize_with(capacity, || None);
        Self {
            data: data.into_boxed_slice(),
            head: Cursor::default(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The writer's cursor.
    #[inline]
    pub(crate) fn head(&self) -> Cursor {
        self.head
    }

    /// Number of written values `cursor` has not consumed yet, including any
    /// that were already overwritten.
    #[inline]
    pub(crate) fn lag(&self, cursor: Cursor) -> u64 {
        let capacity = self.capacity();
        self.head
            .sequence(capacity)
            .saturating_sub(cursor.sequence(capacity))
    }

    /// Whether the next write would reuse the slot `watched` reads next.
    ///
    /// A reader that is already lapped counts as sitting on the oldest
    /// retained value, so it blocks the writer too.
    #[inline]
    pub(crate) fn would_overrun(&self, watched: Cursor) -> bool {
        self.lag(watched) >= self.capacity() as u64
    }

    /// Stores `value` at the write cursor and advances it. O(1), in place.
    pub(crate) fn write(&mut self, value: T) {
        let capacity = self.capacity();
        debug_assert_write_in_bounds!(self.head.pos, capacity);
        self.data[self.head.pos] = Some(value);
        self.head = self.head.advance(capacity);
    }

    /// Reads the next value for `cursor`, moving it forward on success.
    pub(crate) fn read(&self, cursor: &mut Cursor) -> ReadOutcome<T> {
        let capacity = self.capacity();
        let writer = self.head.sequence(capacity);
        let mut reader = cursor.sequence(capacity);
        debug_assert_reader_not_ahead!(reader, writer);

        if reader >= writer {
            return ReadOutcome::Empty;
        }

        let mut skipped = 0;
        if writer - reader > capacity as u64 {
            let oldest = writer - capacity as u64;
            debug_assert_forward!("resynchronized reader", reader, oldest);
            skipped = oldest - reader;
            reader = oldest;
        }

        let Some(value) = self.data[(reader % capacity as u64) as usize].clone() else {
            return ReadOutcome::Empty;
        };
        *cursor = Cursor::from_sequence(reader + 1, capacity);
        ReadOutcome::Value { value, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(slots: &Slots<&'static str>, cursor: &mut Cursor) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let ReadOutcome::Value { value, .. } = slots.read(cursor) {
            out.push(value);
        }
        out
    }

    #[test]
    fn test_cursor_wraps_eagerly() {
        let mut cursor = Cursor::default();
        cursor = cursor.advance(2);
        assert_eq!(cursor, Cursor::new(0, 1));
        cursor = cursor.advance(2);
        assert_eq!(cursor, Cursor::new(1, 0));
        assert_eq!(cursor.sequence(2), 2);
        assert_eq!(Cursor::from_sequence(7, 3), Cursor::new(2, 1));
    }

    #[test]
    fn test_simple_write_read() {
        let mut slots = Slots::new(3);
        let mut cursor = Cursor::default();

        slots.write("test0");
        slots.write("test1");
        assert_eq!(drain(&slots, &mut cursor), vec!["test0", "test1"]);
        assert_eq!(slots.read(&mut cursor), ReadOutcome::Empty);

        slots.write("test2");
        assert_eq!(drain(&slots, &mut cursor), vec!["test2"]);

        slots.write("test3");
        slots.write("test4");
        assert_eq!(drain(&slots, &mut cursor), vec!["test3", "test4"]);

        // Exactly one lap behind loses nothing.
        slots.write("test5");
        slots.write("test6");
        slots.write("test7");
        assert_eq!(drain(&slots, &mut cursor), vec!["test5", "test6", "test7"]);
    }

    #[test]
    fn test_lapped_reader_lands_on_oldest_retained() {
        let mut slots = Slots::new(3);
        let mut cursor = Cursor::default();
        for value in ["a", "b", "c", "d"] {
            slots.write(value);
        }

        assert_eq!(
            slots.read(&mut cursor),
            ReadOutcome::Value {
                value: "b",
                skipped: 1
            }
        );
        assert_eq!(drain(&slots, &mut cursor), vec!["c", "d"]);
    }

    #[test]
    fn test_single_slot_ring() {
        let mut slots = Slots::new(1);
        let mut cursor = Cursor::default();
        slots.write("test0");
        slots.write("test1");

        assert_eq!(
            slots.read(&mut cursor),
            ReadOutcome::Value {
                value: "test1",
                skipped: 1
            }
        );
        assert_eq!(slots.read(&mut cursor), ReadOutcome::Empty);
    }

    #[test]
    fn test_many_laps_behind() {
        let mut slots = Slots::new(4);
        let mut cursor = Cursor::default();
        for i in 0..30u32 {
            slots.write(i);
        }

        let mut seen = Vec::new();
        while let ReadOutcome::Value { value, .. } = slots.read(&mut cursor) {
            seen.push(value);
        }
        assert_eq!(seen, vec![26, 27, 28, 29]);
        assert_eq!(cursor, slots.head());
    }

    #[test]
    fn test_would_overrun() {
        let mut slots = Slots::new(3);
        let mut cursor = Cursor::default();

        for value in ["test0", "test1", "test2"] {
            assert!(!slots.would_overrun(cursor));
            slots.write(value);
        }
        assert!(slots.would_overrun(cursor));

        assert!(matches!(
            slots.read(&mut cursor),
            ReadOutcome::Value { value: "test0", .. }
        ));
        assert!(!slots.would_overrun(cursor));
    }

    #[test]
    fn test_slowest() {
        let a = ReaderId::from_raw(1);
        let b = ReaderId::from_raw(2);
        let c = ReaderId::from_raw(3);

        assert_eq!(slowest(std::iter::empty()), None);
        assert_eq!(
            slowest([
                (a, Cursor::new(1, 0)),
                (b, Cursor::new(0, 2)),
                (c, Cursor::new(0, 5)),
            ]),
            Some(b)
        );
        assert_eq!(
            slowest([(c, Cursor::new(2, 1)), (a, Cursor::new(2, 1))]),
            Some(c)
        );
    }
}
