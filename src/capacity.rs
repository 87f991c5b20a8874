//! Document buffer sizing under a hard allocation ceiling.

use tracing::debug;

use crate::document::DocumentError;
use crate::error::{StoreError, StoreResult};
use crate::limits;
use crate::section::ConfigSection;

/// Decides how large a document buffer should be and how to grow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlanner {
    min_capacity: usize,
    safety_margin: usize,
    ceiling: usize,
    increment: usize,
}

impl Default for CapacityPlanner {
    fn default() -> Self {
        Self::new(
            limits::MIN_DOCUMENT_CAPACITY,
            limits::DOCUMENT_SAFETY_MARGIN,
            limits::MAX_DOCUMENT_CAPACITY,
            limits::DOCUMENT_GROW_INCREMENT,
        )
    }
}

impl CapacityPlanner {
    /// Planner with the given bounds. `min_capacity` is capped at `ceiling`.
    pub fn new(min_capacity: usize, safety_margin: usize, ceiling: usize, increment: usize) -> Self {
        Self {
            min_capacity: min_capacity.min(ceiling),
            safety_margin,
            ceiling,
            increment: increment.max(1),
        }
    }

    /// Largest capacity ever attempted.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Initial capacity for a payload of `payload_size` bytes.
    pub fn capacity_for(&self, payload_size: usize) -> usize {
        let mut capacity = self.min_capacity;
        if payload_size > 0 {
            let margin = (payload_size / 4).max(self.safety_margin);
            capacity = capacity.max(payload_size.saturating_add(margin));
        }
        capacity.min(self.ceiling)
    }

    /// Next capacity after an overflow at `current`.
    ///
    /// Returns `current` once the ceiling has been reached.
    pub fn grow(&self, current: usize) -> usize {
        if current >= self.ceiling {
            return current;
        }
        let next = current
            .saturating_add(current / 2)
            .max(current.saturating_add(self.increment));
        next.min(self.ceiling)
    }

    /// Run a capacity-bounded document operation, growing on overflow.
    ///
    /// `op` is called with the current capacity. A `NoMemory` result grows the
    /// buffer and retries; once growth stops the operation fails with
    /// `CapacityExceeded`. Syntax errors are reported as a decode failure
    /// scoped to `scope`.
    pub fn run_with_growth<T, F>(
        &self,
        initial: usize,
        label: &str,
        scope: ConfigSection,
        mut op: F,
    ) -> StoreResult<T>
    where
        F: FnMut(usize) -> Result<T, DocumentError>,
    {
        let mut capacity = initial.clamp(1, self.ceiling.max(1));
        loop {
            match op(capacity) {
                Ok(value) => return Ok(value),
                Err(DocumentError::Syntax(detail)) => {
                    return Err(StoreError::decode(scope, detail));
                }
                Err(DocumentError::NoMemory { needed, .. }) => {
                    let next = self.grow(capacity);
                    if next == capacity {
                        return Err(StoreError::CapacityExceeded {
                            label: label.to_string(),
                            ceiling: self.ceiling,
                        });
                    }
                    debug!(
                        "{} document overflowed {} bytes (needs {}), retrying with {}",
                        label, capacity, needed, next
                    );
                    capacity = next;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_for_floor_and_margin() {
        let planner = CapacityPlanner::default();
        assert_eq!(planner.capacity_for(0), 1024);
        assert_eq!(planner.capacity_for(100), 1024);
        assert_eq!(planner.capacity_for(1000), 1512);
        assert_eq!(planner.capacity_for(8000), 10000);
        assert_eq!(planner.capacity_for(1_000_000), 28672);
    }

    #[test]
    fn test_capacity_for_is_monotonic() {
        let planner = CapacityPlanner::default();
        let mut previous = 0;
        for size in (0..40_000).step_by(37) {
            let capacity = planner.capacity_for(size);
            assert!(capacity >= previous, "capacity dropped at {}", size);
            assert!(capacity <= planner.ceiling());
            previous = capacity;
        }
    }

    #[test]
    fn test_grow_steps_and_stops() {
        let planner = CapacityPlanner::default();
        assert_eq!(planner.grow(1024), 2048);
        assert_eq!(planner.grow(4096), 6144);
        assert_eq!(planner.grow(28000), 28672);
        assert_eq!(planner.grow(28672), 28672);
    }

    #[test]
    fn test_run_with_growth_retries_until_fit() {
        let planner = CapacityPlanner::default();
        let mut attempts = Vec::new();
        let result = planner.run_with_growth(1024, "IO", ConfigSection::IO, |cap| {
            attempts.push(cap);
            if cap < 3000 {
                Err(DocumentError::NoMemory {
                    needed: 3000,
                    capacity: cap,
                })
            } else {
                Ok(cap)
            }
        });
        assert_eq!(result.unwrap(), 3072);
        assert_eq!(attempts, vec![1024, 2048, 3072]);
    }

    #[test]
    fn test_run_with_growth_hits_ceiling() {
        let planner = CapacityPlanner::new(1024, 512, 4096, 1024);
        let result: StoreResult<()> =
            planner.run_with_growth(1024, "virtual", ConfigSection::VIRTUAL, |cap| {
                Err(DocumentError::NoMemory {
                    needed: 10_000,
                    capacity: cap,
                })
            });
        match result {
            Err(StoreError::CapacityExceeded { label, ceiling }) => {
                assert_eq!(label, "virtual");
                assert_eq!(ceiling, 4096);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_run_with_growth_maps_syntax_errors() {
        let planner = CapacityPlanner::default();
        let result: StoreResult<()> = planner.run_with_growth(1024, "IO", ConfigSection::IO, |_| {
            Err(DocumentError::Syntax("EOF while parsing".into()))
        });
        assert_eq!(result.unwrap_err().kind(), "invalid_json");
    }
}
