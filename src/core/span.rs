//! Purpose: Plan byte ranges on a fixed-size circular arena without performing any I/O.
//! Exports: `CircularSpace`, `Extent`, `Segment`, `Direction`, `Checkpoint`, `validate_space`.
//! Role: Pure planning layer used by the engine before every read or write of the data file.
//! Invariants: A request that cannot be satisfied returns `None` and leaves state untouched.
//! Invariants: `start`/`end` stay in `[0, capacity]`; a cursor at `capacity` behaves as `0`.
use crate::core::error::{Error, ErrorKind};

/// Largest arena the offset arithmetic supports without overflow.
pub const MAX_CAPACITY: u64 = i64::MAX as u64;

/// One half-open `[from, to)` byte interval inside the arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Segment {
    pub from: u64,
    pub to: u64,
}

impl Segment {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// Where a piece lives: either one segment, or two when it crosses the arena end.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Extent {
    Contiguous(Segment),
    Wrapped(Segment, Segment),
}

impl Extent {
    pub fn contiguous(from: u64, to: u64) -> Self {
        Extent::Contiguous(Segment::new(from, to))
    }

    pub fn wrapped(first: (u64, u64), second: (u64, u64)) -> Self {
        Extent::Wrapped(
            Segment::new(first.0, first.1),
            Segment::new(second.0, second.1),
        )
    }

    pub fn len(&self) -> u64 {
        match self {
            Extent::Contiguous(segment) => segment.len(),
            Extent::Wrapped(first, second) => first.len() + second.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Segment {
        match self {
            Extent::Contiguous(segment) | Extent::Wrapped(segment, _) => *segment,
        }
    }

    pub fn second(&self) -> Option<Segment> {
        match self {
            Extent::Contiguous(_) => None,
            Extent::Wrapped(_, segment) => Some(*segment),
        }
    }

    fn lower_edge(&self) -> u64 {
        self.first().from
    }

    fn upper_edge(&self) -> u64 {
        match self {
            Extent::Contiguous(segment) | Extent::Wrapped(_, segment) => segment.to,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Saved allocator state; restoring it undoes every change made since it was taken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Checkpoint(CircularSpace);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CircularSpace {
    capacity: u64,
    start: u64,
    end: u64,
    length: u64,
    size: u64,
}

impl CircularSpace {
    pub fn new(capacity: u64) -> Result<Self, Error> {
        check_capacity(capacity)?;
        Ok(Self {
            capacity,
            start: 0,
            end: 0,
            length: 0,
            size: 0,
        })
    }

    /// Rebuilds the allocator from persisted cursors, deriving `length`.
    pub fn restore(capacity: u64, start: u64, end: u64, size: u64) -> Result<Self, Error> {
        check_capacity(capacity)?;
        let length = derived_length(capacity, start, end, size)?;
        Ok(Self {
            capacity,
            start,
            end,
            length,
            size,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size > 0 && self.length == self.capacity
    }

    pub fn available(&self) -> u64 {
        if self.size == 0 {
            self.capacity
        } else {
            self.capacity - self.length
        }
    }

    pub fn can_allocate(&self, space: u64) -> bool {
        !self.is_full() && self.available() >= space
    }

    /// Grows the occupied region past `end`.
    pub fn allocate_back(&mut self, space: u64) -> Option<Extent> {
        if self.is_full() {
            return None;
        }
        let extent = carve(
            self.capacity,
            self.end,
            self.available(),
            space,
            Direction::Forward,
        )?;
        if self.size == 0 && !self.same_point(self.start, self.end) {
            self.start = self.end;
        }
        self.end = extent.upper_edge();
        self.grow(space);
        Some(extent)
    }

    /// Grows the occupied region before `start`.
    pub fn allocate_front(&mut self, space: u64) -> Option<Extent> {
        if self.is_full() {
            return None;
        }
        let anchor = if self.size == 0 && !self.same_point(self.start, self.end) {
            self.end
        } else {
            self.start
        };
        let extent = carve(
            self.capacity,
            anchor,
            self.available(),
            space,
            Direction::Backward,
        )?;
        self.start = extent.lower_edge();
        self.grow(space);
        Some(extent)
    }

    /// Shrinks the occupied region at `end`, returning the bytes given up.
    pub fn release_back(&mut self, space: u64) -> Option<Extent> {
        if !self.can_release(space) {
            return None;
        }
        let extent = carve(
            self.capacity,
            self.end,
            self.length,
            space,
            Direction::Backward,
        )?;
        self.end = extent.lower_edge();
        self.shrink(space);
        Some(extent)
    }

    /// Shrinks the occupied region at `start`, returning the bytes given up.
    pub fn release_front(&mut self, space: u64) -> Option<Extent> {
        if !self.can_release(space) {
            return None;
        }
        let extent = carve(
            self.capacity,
            self.start,
            self.length,
            space,
            Direction::Forward,
        )?;
        self.start = extent.upper_edge();
        self.shrink(space);
        Some(extent)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(*self)
    }

    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        *self = checkpoint.0;
    }

    fn can_release(&self, space: u64) -> bool {
        self.size > 0 && self.length >= space
    }

    fn same_point(&self, a: u64, b: u64) -> bool {
        a % self.capacity == b % self.capacity
    }

    fn grow(&mut self, space: u64) {
        self.length += space;
        self.size += 1;
    }

    fn shrink(&mut self, space: u64) {
        self.length -= space;
        self.size -= 1;
    }
}

/// Takes `space` bytes out of a circular interval that begins at `cursor` and
/// holds `available` bytes in `direction`. Shared by all four allocator moves.
fn carve(
    capacity: u64,
    cursor: u64,
    available: u64,
    space: u64,
    direction: Direction,
) -> Option<Extent> {
    if space > available || space > capacity {
        return None;
    }
    match direction {
        Direction::Forward => {
            let from = if cursor == capacity { 0 } else { cursor };
            let to = from + space;
            if to <= capacity {
                Some(Extent::contiguous(from, to))
            } else {
                Some(Extent::wrapped((from, capacity), (0, to - capacity)))
            }
        }
        Direction::Backward => {
            let to = if cursor == 0 { capacity } else { cursor };
            if space <= to {
                Some(Extent::contiguous(to - space, to))
            } else {
                Some(Extent::wrapped((capacity - (space - to), capacity), (0, to)))
            }
        }
    }
}

fn check_capacity(capacity: u64) -> Result<(), Error> {
    if capacity == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("capacity must be positive"));
    }
    if capacity > MAX_CAPACITY {
        return Err(Error::new(ErrorKind::Usage).with_message("capacity exceeds supported maximum"));
    }
    Ok(())
}

fn derived_length(capacity: u64, start: u64, end: u64, size: u64) -> Result<u64, Error> {
    if start > capacity || end > capacity {
        return Err(Error::new(ErrorKind::Corrupt).with_message("cursor beyond capacity"));
    }
    if size == 0 {
        if start == 0 && end == capacity {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("empty space cannot cover the whole arena"));
        }
        return Ok(0);
    }
    if start > end {
        if start == capacity && end == 0 {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("non-empty space with zero length"));
        }
        Ok((capacity - start) + end)
    } else if start == end {
        Ok(capacity)
    } else {
        Ok(end - start)
    }
}

/// Checks that the cached length agrees with the cursors.
pub fn validate_space(space: &CircularSpace) -> Result<(), Error> {
    let expected = derived_length(space.capacity, space.start, space.end, space.size)?;
    if expected != space.length {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "length {} disagrees with cursors (expected {expected})",
            space.length
        )));
    }
    Ok(())
}

pub fn debug_assert_space(space: &CircularSpace) {
    if !cfg!(debug_assertions) {
        return;
    }
    if let Err(err) = validate_space(space) {
        panic!("circular space invariant failed: {err} ({space:?})");
    }
}
