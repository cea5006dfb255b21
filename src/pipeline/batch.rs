use crate::types::TripRecord;

/// Fixed-capacity row buffer. `accept` hands back a full batch for the
/// caller to write before any further row goes in, so at most one batch
/// is ever held; `flush` consumes the accumulator, which ends it.
#[derive(Debug)]
pub struct BatchAccumulator {
    rows: Vec<TripRecord>,
    capacity: usize,
}

impl BatchAccumulator {
    /// `capacity` is the batch size and must be positive (validated at
    /// config load).
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffer one row. Returns the drained batch once `capacity` rows are
    /// held.
    pub fn accept(&mut self, row: TripRecord) -> Option<Vec<TripRecord>> {
        self.rows.push(row);
        if self.rows.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.rows,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Take whatever is left. `None` when the row count divided evenly
    /// into full batches.
    pub fn flush(self) -> Option<Vec<TripRecord>> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rows)
        }
    }
}
