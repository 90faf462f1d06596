//! Passive copies of the boundary buffers for checkpoint/restart.
//!
//! A [`BoundarySnapshot`] holds plain `f64` values regardless of the store's
//! scalar type, so a primal run can restart a differentiated one and vice
//! versa. Writing it to disk is left to the solver's restart machinery.

use crate::bound_variable::MeshBoundVariable;
use crate::traits::Scalar;
use crate::vertex_map::VertexMap;
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySnapshot {
    pub n_point: usize,
    pub n_dim: usize,
    pub n_mode: usize,
    /// Boundary points in slot order (ascending).
    pub boundary_points: Vec<usize>,
    pub displacement: Vec<f64>,
    pub velocity: Vec<f64>,
    pub mode_shape: Vec<f64>,
    pub mode_shape_twm: Vec<f64>,
    pub blade_id: Vec<u16>,
}

impl BoundarySnapshot {
    fn validate(&self) -> Result<()> {
        let n_bound = self.boundary_points.len();
        let per_point = n_bound * self.n_dim;
        let per_mode = per_point * self.n_mode;

        if !self.boundary_points.windows(2).all(|w| w[0] < w[1]) {
            bail!("Boundary points must be strictly ascending.");
        }
        if let Some(&last) = self.boundary_points.last() {
            if last >= self.n_point {
                bail!(
                    "Boundary point {} out of range for {} points.",
                    last,
                    self.n_point
                );
            }
        }
        for (name, len, expected) in [
            ("displacement", self.displacement.len(), per_point),
            ("velocity", self.velocity.len(), per_point),
            ("mode_shape", self.mode_shape.len(), per_mode),
            ("mode_shape_twm", self.mode_shape_twm.len(), per_mode),
            ("blade_id", self.blade_id.len(), n_bound),
        ] {
            if len != expected {
                bail!(
                    "Snapshot buffer {} has {} entries, expected {}.",
                    name,
                    len,
                    expected
                );
            }
        }
        Ok(())
    }
}

impl<T: Scalar> MeshBoundVariable<T> {
    /// Copies membership and all boundary buffers into a passive snapshot.
    pub fn snapshot(&self) -> Result<BoundarySnapshot> {
        Ok(BoundarySnapshot {
            n_point: self.n_point,
            n_dim: self.n_dim,
            n_mode: self.n_mode,
            boundary_points: self.vertex_map.boundary_points().to_vec(),
            displacement: to_passive(self.boundary_displacement.as_slice())
                .context("Failed to copy boundary displacement.")?,
            velocity: to_passive(self.boundary_velocity.as_slice())
                .context("Failed to copy boundary velocity.")?,
            mode_shape: to_passive(self.boundary_mode_shape.as_slice())
                .context("Failed to copy boundary mode shape.")?,
            mode_shape_twm: to_passive(self.boundary_mode_shape_twm.as_slice())
                .context("Failed to copy traveling-wave mode shape.")?,
            blade_id: self.boundary_blade_id.clone(),
        })
    }

    /// Rebuilds membership and buffers from `snapshot`.
    ///
    /// The new map and buffers are built aside and swapped in at the end, so a
    /// rejected snapshot leaves the store as it was.
    pub fn restore(&mut self, snapshot: &BoundarySnapshot) -> Result<()> {
        if snapshot.n_point != self.n_point {
            bail!(
                "Snapshot point count mismatch. Expected {}, got {}.",
                self.n_point,
                snapshot.n_point
            );
        }
        if snapshot.n_dim != self.n_dim {
            bail!(
                "Snapshot dimension mismatch. Expected {}, got {}.",
                self.n_dim,
                snapshot.n_dim
            );
        }
        snapshot.validate().context("Invalid boundary snapshot.")?;

        let mut vertex_map = VertexMap::new(self.n_point);
        for &point in &snapshot.boundary_points {
            vertex_map.set_is_vertex(point, true);
        }
        let n_bound = vertex_map
            .build()
            .context("Failed to rebuild the vertex map from snapshot.")?;

        let mode_rows = snapshot.n_mode * self.n_dim;
        let displacement = from_passive(self.n_dim, n_bound, &snapshot.displacement)
            .context("Failed to restore boundary displacement.")?;
        let velocity = from_passive(self.n_dim, n_bound, &snapshot.velocity)
            .context("Failed to restore boundary velocity.")?;
        let mode_shape = from_passive(mode_rows, n_bound, &snapshot.mode_shape)
            .context("Failed to restore boundary mode shape.")?;
        let mode_shape_twm = from_passive(mode_rows, n_bound, &snapshot.mode_shape_twm)
            .context("Failed to restore traveling-wave mode shape.")?;

        self.vertex_map = vertex_map;
        self.n_mode = snapshot.n_mode;
        self.boundary_displacement = displacement;
        self.boundary_velocity = velocity;
        self.boundary_mode_shape = mode_shape;
        self.boundary_mode_shape_twm = mode_shape_twm;
        self.boundary_blade_id = snapshot.blade_id.clone();

        debug!(
            "Restored boundary snapshot: {} boundary points, {} modes.",
            n_bound, snapshot.n_mode
        );
        Ok(())
    }
}

fn to_passive<T: Scalar>(values: &[T]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.to_f64()
                .ok_or_else(|| anyhow!("Value {:?} has no f64 representation.", v))
        })
        .collect()
}

/// Column-major `rows × cols` matrix from passive values. Lengths are checked
/// by `validate`.
fn from_passive<T: Scalar>(rows: usize, cols: usize, src: &[f64]) -> Result<DMatrix<T>> {
    let values = src
        .iter()
        .map(|&s| T::from_f64(s).ok_or_else(|| anyhow!("Cannot convert {} to scalar type.", s)))
        .collect::<Result<Vec<T>>>()?;
    Ok(DMatrix::from_vec(rows, cols, values))
}
