/// Fixed-capacity FIFO history of the most recent records.
///
/// Once `capacity` records have been pushed, every further push evicts exactly
/// the oldest record. Iteration order is always oldest to newest.
///
/// Not synchronized: the owning supervisor serializes all access.
#[derive(Debug)]
pub struct RingHistory<T> {
    slots: Vec<Option<T>>,
    /// Slot the next push writes to
    head: usize,
    /// Slot holding the oldest retained record
    tail: usize,
    full: bool,
}

impl<T> RingHistory<T> {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            head: 0,
            tail: 0,
            full: false,
        }
    }

    /// Append a record, evicting the oldest one if the history is full.
    pub fn push(&mut self, record: T) {
        let capacity = self.slots.len();

        if self.full {
            // The slot at head is the oldest record; it is about to be overwritten
            self.tail = (self.tail + 1) % capacity;
        }

        self.slots[self.head] = Some(record);
        self.head = (self.head + 1) % capacity;

        if self.head == self.tail {
            self.full = true;
        }
    }

    /// Iterate over all retained records, oldest first.
    ///
    /// The returned iterator is cheap to clone, so a snapshot can be walked
    /// more than once.
    pub fn snapshot(&self) -> Snapshot<'_, T> {
        Snapshot {
            history: self,
            position: self.tail,
            remaining: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        let capacity = self.slots.len();
        if self.full {
            capacity
        } else {
            (self.head + capacity - self.tail) % capacity
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Oldest-to-newest view over a [`RingHistory`].
#[derive(Debug)]
pub struct Snapshot<'a, T> {
    history: &'a RingHistory<T>,
    position: usize,
    remaining: usize,
}

impl<T> Clone for Snapshot<'_, T> {
    fn clone(&self) -> Self {
        Self {
            history: self.history,
            position: self.position,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Snapshot<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let capacity = self.history.slots.len();

        while self.remaining > 0 {
            let slot = &self.history.slots[self.position];
            self.position = (self.position + 1) % capacity;
            self.remaining -= 1;

            // Uninitialized slots are skipped rather than yielded
            if let Some(record) = slot {
                return Some(record);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
