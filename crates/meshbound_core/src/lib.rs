pub mod autodiff;
pub mod bound_variable;
pub mod checkpoint;
pub mod config;
pub mod error;
/// The `meshbound_core` crate stores mesh-deformation quantities only at the
/// points of moving boundaries, while letting callers address them with
/// global point indices.
/// It is generic over the scalar type, supporting plain `f64` as well as the
/// reverse-mode `AReal` for adjoint runs.
///
/// Key components:
/// - **Vertex Map**: global point ↔ compact boundary slot translation.
/// - **Boundary Variables**: displacement, velocity, mode shapes and blade ids behind guarded accessors.
/// - **Autodiff**: `AReal` and its thread-local tape, used to recover boundary displacement adjoints.
/// - **Checkpoint**: passive snapshots of the boundary buffers for restarts.
pub mod traits;
pub mod vertex_map;

pub use bound_variable::MeshBoundVariable;
pub use config::DeformConfig;
pub use error::BoundaryError;
