//! Window state and merge rules
//!
//! Invariants held after every operation:
//! - `len() <= capacity()`
//! - no value appears twice
//! - values are in insertion order, oldest first
//!
//! Duplicates are suppressed both against the existing window and within the
//! incoming batch, because membership is checked against the live window as
//! each value is appended.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{Error, Result};

/// Result of a merge, serialized as the `/numbers/{typeCode}` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowUpdate {
    #[serde(rename = "windowPrevState")]
    pub prev_state: Vec<i64>,
    #[serde(rename = "windowCurrState")]
    pub curr_state: Vec<i64>,
    /// The raw numbers offered to the merge, duplicates included
    pub numbers: Vec<i64>,
    pub avg: f64,
}

/// Bounded FIFO window of distinct numbers.
#[derive(Debug, Clone)]
pub struct Window {
    values: VecDeque<i64>,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: i64) -> bool {
        self.values.contains(&value)
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<i64> {
        self.values.iter().copied().collect()
    }

    /// Append `value` unless already present. Returns the evicted value, if
    /// the append pushed the window over capacity.
    fn insert(&mut self, value: i64) -> Option<i64> {
        if self.contains(value) {
            return None;
        }
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front()
        } else {
            None
        }
    }

    /// Merge `numbers` in order and report the before/after state.
    ///
    /// Never fails; the window is unchanged when every value is already
    /// present.
    pub fn merge(&mut self, numbers: Vec<i64>) -> WindowUpdate {
        let prev_state = self.snapshot();
        for &value in &numbers {
            self.insert(value);
        }
        WindowUpdate {
            prev_state,
            curr_state: self.snapshot(),
            numbers,
            avg: self.average(),
        }
    }

    pub fn average(&self) -> f64 {
        average(self.values.iter().copied())
    }
}

/// Mean rounded to two decimals (ties to even), `0.0` for no values.
pub fn average(values: impl IntoIterator<Item = i64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0i128, 0usize), |(sum, count), v| (sum + v as i128, count + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = sum as f64 / count as f64;
    (mean * 100.0).round_ties_even() / 100.0
}
