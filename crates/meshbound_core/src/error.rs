use thiserror::Error;

/// Recoverable failures of the boundary store.
///
/// Unknown or interior points are not errors: accessors degrade to zero or
/// no-op for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("Mesh deformation supports 2 or 3 dimensions, got {0}.")]
    InvalidDimension(usize),
    #[error("Number of boundary vertices ({count}) is too large for the slot index type.")]
    TooManyVertices { count: usize },
}
