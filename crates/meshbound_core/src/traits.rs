use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be stored in the boundary buffers.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Capability a scalar needs so boundary values can take part in a
/// differentiated solve.
///
/// The store only marks values as independent inputs and reads back the
/// accumulated derivative; recording and the reverse sweep belong to whichever
/// engine backs the type.
pub trait AdScalar: Scalar {
    /// Marks this value as an independent input of the differentiation engine.
    fn mark_as_input(&mut self);

    /// Returns the derivative accumulated for this value by the last reverse sweep.
    fn derivative(&self) -> f64;
}

/// Plain `f64` is passive: nothing is recorded and every derivative is zero.
impl AdScalar for f64 {
    fn mark_as_input(&mut self) {}

    fn derivative(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::AdScalar;

    #[test]
    fn passive_f64_has_zero_derivative() {
        let mut value = 4.5_f64;
        value.mark_as_input();
        assert_eq!(value, 4.5);
        assert_eq!(value.derivative(), 0.0);
    }
}
