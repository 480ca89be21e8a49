use thiserror::Error;

/// Contract violations raised by the simulation core.
///
/// None of these should occur under correct driving logic: callers check
/// population counts and total propensity before sampling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("random set is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("random set is empty")]
    EmptyCollection,

    #[error("total propensity is zero, no event can be sampled")]
    DegenerateState,
}
