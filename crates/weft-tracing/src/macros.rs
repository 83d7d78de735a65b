//! Shorthand for timing primitives

/// Start a [`crate::performance::PrimitiveSpan`] for one device primitive.
///
/// ```rust
/// use weft_tracing::perf_span;
///
/// let values = vec![3, 1, 2];
/// let _span = perf_span!("sort", device = "serial", len = values.len());
/// ```
#[macro_export]
macro_rules! perf_span {
    ($operation:expr, device = $device:expr, len = $len:expr $(,)?) => {
        $crate::performance::PrimitiveSpan::start($operation, $device, $len)
    };
}
