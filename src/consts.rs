use std::num::NonZeroUsize;

/// Number of workers draining the key queue.  An empirically chosen constant;
/// not adapted to the batch size.
pub(crate) const WORKERS: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default number of keys requested per listing call.  Kept a power of two,
/// as the lister may halve it repeatedly.
pub(crate) const DEFAULT_MAX_KEYS: usize = 1024;

/// Hard cap on the serialized size of a list result, from the limit on task
/// input/output in the invoking workflow service.
pub(crate) const MAX_RESULT_SIZE: usize = 32000;

/// Percentage of [`MAX_RESULT_SIZE`] held back as a safety margin.
pub(crate) const SAFETY_MARGIN: usize = 10;

/// Largest serialized list result the lister will return.
pub(crate) const MAX_RESULT_LENGTH: usize = MAX_RESULT_SIZE - MAX_RESULT_SIZE * SAFETY_MARGIN / 100;
