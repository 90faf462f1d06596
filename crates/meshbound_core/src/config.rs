use serde::{Deserialize, Serialize};

/// Settings the mesh-deformation setup hands to the boundary store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformConfig {
    /// Structural modes known at allocation time. Zero defers the mode-shape
    /// matrices until `initialize_mode_shape_matrix` is called.
    pub n_modes: usize,
    /// Blades in the row for flutter analyses. Zero disables blade id checks.
    pub n_blades: usize,
}
