//! Mesh-deformation variables stored only at moving-boundary points.
//!
//! [`MeshBoundVariable`] is addressed with global point indices like any other
//! per-point container, but keeps its data in compact buffers indexed by
//! boundary slot. Reads at interior points return zero and writes there are
//! dropped, so the deformation solver can sweep every point with one code path.
//!
//! Allocation happens in two phases:
//! 1. [`MeshBoundVariable::allocate_boundary_variables`] builds the vertex map
//!    and sizes displacement, velocity and blade ids.
//! 2. [`MeshBoundVariable::initialize_mode_shape_matrix`] sizes the mode-shape
//!    matrices once the number of structural modes is known, and may be
//!    repeated when a different structural model is loaded.
//!
//! Every buffer has one column per boundary slot, so the values of a point are
//! contiguous. Mode shapes stack `n_mode` blocks of `n_dim` rows.

use crate::config::DeformConfig;
use crate::error::BoundaryError;
use crate::traits::{AdScalar, Scalar};
use crate::vertex_map::VertexMap;
use log::{debug, info};
use nalgebra::DMatrix;

#[derive(Debug, Clone)]
pub struct MeshBoundVariable<T: Scalar> {
    pub(crate) n_point: usize,
    pub(crate) n_dim: usize,
    pub(crate) n_var: usize,
    pub(crate) n_mode: usize,
    pub(crate) config: DeformConfig,
    pub(crate) vertex_map: VertexMap,
    /// `n_dim × n_boundary`
    pub(crate) boundary_displacement: DMatrix<T>,
    pub(crate) boundary_velocity: DMatrix<T>,
    /// `(n_mode · n_dim) × n_boundary`
    pub(crate) boundary_mode_shape: DMatrix<T>,
    /// Traveling-wave mode shapes, read independently of the standing ones.
    pub(crate) boundary_mode_shape_twm: DMatrix<T>,
    pub(crate) boundary_blade_id: Vec<u16>,
}

impl<T: Scalar> MeshBoundVariable<T> {
    /// Creates the store for a mesh of `n_point` points. No point is on a
    /// boundary until marked with [`set_is_vertex`](Self::set_is_vertex).
    pub fn new(
        n_point: usize,
        n_dim: usize,
        config: DeformConfig,
    ) -> Result<Self, BoundaryError> {
        if !(2..=3).contains(&n_dim) {
            return Err(BoundaryError::InvalidDimension(n_dim));
        }
        let zero = T::zero();
        Ok(Self {
            n_point,
            n_dim,
            n_var: n_dim,
            n_mode: 0,
            config,
            vertex_map: VertexMap::new(n_point),
            boundary_displacement: DMatrix::from_element(n_dim, 0, zero),
            boundary_velocity: DMatrix::from_element(n_dim, 0, zero),
            boundary_mode_shape: DMatrix::from_element(0, 0, zero),
            boundary_mode_shape_twm: DMatrix::from_element(0, 0, zero),
            boundary_blade_id: Vec::new(),
        })
    }

    pub fn n_point(&self) -> usize {
        self.n_point
    }

    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// Modes the mode-shape matrices are currently sized for.
    pub fn n_mode(&self) -> usize {
        self.n_mode
    }

    /// Boundary points fixed by the last allocation.
    pub fn n_boundary(&self) -> usize {
        self.vertex_map.n_vertex()
    }

    pub fn config(&self) -> &DeformConfig {
        &self.config
    }

    /// The membership map, for bulk iteration over boundary points.
    pub fn vertex_map(&self) -> &VertexMap {
        &self.vertex_map
    }

    pub fn is_vertex(&self, point: usize) -> bool {
        self.vertex_map.is_vertex(point)
    }

    pub fn set_is_vertex(&mut self, point: usize, is_vertex: bool) {
        self.vertex_map.set_is_vertex(point, is_vertex);
    }

    /// Compacts the marked points and sizes the per-point buffers, all zero.
    ///
    /// Does nothing if the map is already built and membership has not changed
    /// since. After a membership change the buffers are rebuilt from scratch.
    /// Mode shapes are sized here too when a mode count is known: the one set
    /// by the last [`initialize_mode_shape_matrix`](Self::initialize_mode_shape_matrix),
    /// otherwise the configured one.
    pub fn allocate_boundary_variables(&mut self) -> Result<(), BoundaryError> {
        if self.vertex_map.is_valid() {
            return Ok(());
        }

        let n_bound = self.vertex_map.build()?;
        let zero = T::zero();
        self.boundary_displacement = DMatrix::from_element(self.n_dim, n_bound, zero);
        self.boundary_velocity = DMatrix::from_element(self.n_dim, n_bound, zero);
        self.boundary_blade_id.clear();
        self.boundary_blade_id.resize(n_bound, 0);

        let n_mode = if self.n_mode > 0 {
            self.n_mode
        } else {
            self.config.n_modes
        };
        if n_mode > 0 {
            self.initialize_mode_shape_matrix(n_mode);
        }
        Ok(())
    }

    /// Sizes both mode-shape matrices for `n_mode` modes over the current
    /// boundary and zeroes them. Any previous modal content is discarded.
    pub fn initialize_mode_shape_matrix(&mut self, n_mode: usize) {
        debug_assert!(
            self.vertex_map.is_valid(),
            "mode shapes initialized before the vertex map was built"
        );
        self.n_mode = n_mode;
        let n_bound = self.vertex_map.n_vertex();
        info!(
            "Initializing mode shape matrices: {} modes, {} boundary points.",
            n_mode, n_bound
        );

        let zero = T::zero();
        let rows = n_mode * self.n_dim;
        self.boundary_mode_shape = DMatrix::from_element(rows, n_bound, zero);
        self.boundary_mode_shape_twm = DMatrix::from_element(rows, n_bound, zero);
    }

    #[inline]
    fn slot(&self, point: usize) -> Option<usize> {
        self.vertex_map.vertex_index(point)
    }

    #[inline]
    fn mode_row(&self, mode: usize, dim: usize) -> usize {
        debug_assert!(self.n_mode > 0, "mode shapes accessed before initialization");
        debug_assert!(dim < self.n_dim);
        mode * self.n_dim + dim
    }

    // --- Displacement ---

    pub fn bound_disp(&self, point: usize, dim: usize) -> T {
        match self.slot(point) {
            Some(slot) => self.boundary_displacement[(dim, slot)],
            None => T::zero(),
        }
    }

    /// Writes all `n_dim` components from `values`.
    pub fn set_bound_disp(&mut self, point: usize, values: &[T]) {
        let Some(slot) = self.slot(point) else {
            return;
        };
        let n_dim = self.n_dim;
        self.boundary_displacement
            .column_mut(slot)
            .copy_from_slice(&values[..n_dim]);
    }

    pub fn set_bound_disp_component(&mut self, point: usize, dim: usize, value: T) {
        if let Some(slot) = self.slot(point) {
            self.boundary_displacement[(dim, slot)] = value;
        }
    }

    // --- Velocity ---

    pub fn bound_vel(&self, point: usize, dim: usize) -> T {
        match self.slot(point) {
            Some(slot) => self.boundary_velocity[(dim, slot)],
            None => T::zero(),
        }
    }

    /// Writes all `n_dim` components from `values`.
    pub fn set_bound_vel(&mut self, point: usize, values: &[T]) {
        let Some(slot) = self.slot(point) else {
            return;
        };
        let n_dim = self.n_dim;
        self.boundary_velocity
            .column_mut(slot)
            .copy_from_slice(&values[..n_dim]);
    }

    pub fn set_bound_vel_component(&mut self, point: usize, dim: usize, value: T) {
        if let Some(slot) = self.slot(point) {
            self.boundary_velocity[(dim, slot)] = value;
        }
    }

    // --- Mode shapes ---

    pub fn bound_mode_shape(&self, point: usize, mode: usize, dim: usize) -> T {
        match self.slot(point) {
            Some(slot) => self.boundary_mode_shape[(self.mode_row(mode, dim), slot)],
            None => T::zero(),
        }
    }

    pub fn set_bound_mode_shape(&mut self, point: usize, mode: usize, dim: usize, value: T) {
        if let Some(slot) = self.slot(point) {
            let row = self.mode_row(mode, dim);
            self.boundary_mode_shape[(row, slot)] = value;
        }
    }

    pub fn bound_mode_shape_twm(&self, point: usize, mode: usize, dim: usize) -> T {
        match self.slot(point) {
            Some(slot) => self.boundary_mode_shape_twm[(self.mode_row(mode, dim), slot)],
            None => T::zero(),
        }
    }

    pub fn set_bound_mode_shape_twm(&mut self, point: usize, mode: usize, dim: usize, value: T) {
        if let Some(slot) = self.slot(point) {
            let row = self.mode_row(mode, dim);
            self.boundary_mode_shape_twm[(row, slot)] = value;
        }
    }

    // --- Blade id ---

    pub fn bound_blade_id(&self, point: usize) -> u16 {
        match self.slot(point) {
            Some(slot) => self.boundary_blade_id[slot],
            None => 0,
        }
    }

    pub fn set_bound_blade_id(&mut self, point: usize, blade_id: u16) {
        if let Some(slot) = self.slot(point) {
            debug_assert!(
                self.config.n_blades == 0 || usize::from(blade_id) < self.config.n_blades,
                "blade id {} outside the configured {} blades",
                blade_id,
                self.config.n_blades
            );
            self.boundary_blade_id[slot] = blade_id;
        }
    }
}

impl<T: AdScalar> MeshBoundVariable<T> {
    /// Marks every stored boundary displacement as an independent input of the
    /// differentiation engine.
    pub fn register_bound_disp(&mut self) {
        for value in self.boundary_displacement.iter_mut() {
            value.mark_as_input();
        }
        debug!(
            "Registered {} boundary displacement entries as AD inputs.",
            self.boundary_displacement.len()
        );
    }

    /// Writes the derivative of each displacement component of `point` into
    /// `out[..n_var]`. Leaves `out` untouched for interior points.
    pub fn adjoint_bound_disp(&self, point: usize, out: &mut [f64]) {
        let Some(slot) = self.slot(point) else {
            return;
        };
        let column = self.boundary_displacement.column(slot);
        for (adj, value) in out.iter_mut().zip(column.iter().take(self.n_var)) {
            *adj = value.derivative();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MeshBoundVariable;
    use crate::autodiff::{tape, AReal};
    use crate::config::DeformConfig;
    use crate::error::BoundaryError;

    fn allocated(n_point: usize, n_dim: usize, marked: &[usize]) -> MeshBoundVariable<f64> {
        let mut var = MeshBoundVariable::new(n_point, n_dim, DeformConfig::default())
            .expect("store should construct");
        for &point in marked {
            var.set_is_vertex(point, true);
        }
        var.allocate_boundary_variables()
            .expect("allocation should succeed");
        var
    }

    #[test]
    fn rejects_unsupported_dimension() {
        let result = MeshBoundVariable::<f64>::new(10, 4, DeformConfig::default());
        assert!(matches!(result, Err(BoundaryError::InvalidDimension(4))));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn three_of_ten_points_scenario() {
        let mut var = allocated(10, 3, &[2, 5, 7]);
        assert_eq!(var.n_boundary(), 3);

        var.set_bound_disp_component(5, 1, 3.14);
        assert_eq!(var.bound_disp(5, 1), 3.14);
        for dim in 0..3 {
            assert_eq!(var.bound_disp(3, dim), 0.0);
        }
    }

    #[test]
    fn access_before_allocation_degrades_to_zero() {
        let mut var = MeshBoundVariable::<f64>::new(4, 2, DeformConfig::default())
            .expect("store should construct");
        var.set_is_vertex(1, true);
        var.set_bound_disp(1, &[1.0, 2.0]);
        assert_eq!(var.bound_disp(1, 0), 0.0);
        assert_eq!(var.bound_mode_shape(1, 0, 0), 0.0);
        assert_eq!(var.n_boundary(), 0);
    }

    #[test]
    fn interior_writes_are_dropped() {
        let mut var = allocated(6, 2, &[1, 4]);
        var.initialize_mode_shape_matrix(2);
        let disp = var.boundary_displacement.clone();
        let vel = var.boundary_velocity.clone();
        let modes = var.boundary_mode_shape.clone();
        let modes_twm = var.boundary_mode_shape_twm.clone();
        let blades = var.boundary_blade_id.clone();

        var.set_bound_disp(0, &[1.0, 2.0]);
        var.set_bound_disp_component(2, 1, 5.0);
        var.set_bound_vel(3, &[1.0, 1.0]);
        var.set_bound_vel_component(5, 0, 9.0);
        var.set_bound_blade_id(0, 3);
        var.set_bound_disp_component(42, 0, 1.0);
        var.set_bound_mode_shape(2, 1, 0, 4.0);
        var.set_bound_mode_shape_twm(3, 0, 1, -4.0);
        var.set_bound_mode_shape(42, 0, 0, 1.0);

        assert_eq!(var.boundary_displacement, disp);
        assert_eq!(var.boundary_velocity, vel);
        assert_eq!(var.boundary_mode_shape, modes);
        assert_eq!(var.boundary_mode_shape_twm, modes_twm);
        assert_eq!(var.boundary_blade_id, blades);
        assert_eq!(var.bound_vel(5, 0), 0.0);
        assert_eq!(var.bound_blade_id(0), 0);
    }

    #[test]
    fn out_of_range_blade_id_at_interior_point_is_ignored() {
        let config = DeformConfig {
            n_modes: 0,
            n_blades: 4,
        };
        let mut var = MeshBoundVariable::<f64>::new(6, 2, config).expect("store should construct");
        var.set_is_vertex(1, true);
        var.allocate_boundary_variables()
            .expect("allocation should succeed");

        var.set_bound_blade_id(3, 9);
        assert_eq!(var.bound_blade_id(3), 0);
        assert_eq!(var.boundary_blade_id, vec![0]);
    }

    #[test]
    fn vector_setters_round_trip() {
        let mut var = allocated(8, 3, &[0, 6]);
        var.set_bound_disp(6, &[0.1, -0.2, 0.3]);
        var.set_bound_vel(0, &[4.0, 5.0, 6.0]);
        assert_eq!(var.bound_disp(6, 0), 0.1);
        assert_eq!(var.bound_disp(6, 1), -0.2);
        assert_eq!(var.bound_disp(6, 2), 0.3);
        assert_eq!(var.bound_vel(0, 2), 6.0);
        assert_eq!(var.bound_vel(6, 2), 0.0);
    }

    #[test]
    fn blade_ids_round_trip() {
        let mut var = allocated(5, 2, &[1, 2]);
        var.set_bound_blade_id(1, 7);
        var.set_bound_blade_id(2, 3);
        assert_eq!(var.bound_blade_id(1), 7);
        assert_eq!(var.bound_blade_id(2), 3);
    }

    #[test]
    fn mode_shape_variants_are_stored_separately() {
        let mut var = allocated(10, 3, &[2, 5, 7]);
        var.initialize_mode_shape_matrix(2);
        var.set_bound_mode_shape(7, 1, 2, 0.5);
        var.set_bound_mode_shape_twm(7, 1, 2, -0.25);
        assert_eq!(var.bound_mode_shape(7, 1, 2), 0.5);
        assert_eq!(var.bound_mode_shape_twm(7, 1, 2), -0.25);
        assert_eq!(var.bound_mode_shape(7, 0, 2), 0.0);
        assert_eq!(var.bound_mode_shape(3, 1, 2), 0.0);
        assert_eq!(var.bound_mode_shape_twm(3, 1, 2), 0.0);
    }

    #[test]
    fn mode_shape_reinitialization_discards_content() {
        let mut var = allocated(4, 2, &[0, 3]);
        var.initialize_mode_shape_matrix(3);
        var.set_bound_mode_shape(0, 2, 1, 1.0);
        var.set_bound_mode_shape_twm(3, 0, 0, 2.0);

        var.initialize_mode_shape_matrix(5);
        assert_eq!(var.n_mode(), 5);
        for point in [0, 3] {
            for mode in 0..5 {
                for dim in 0..2 {
                    assert_eq!(var.bound_mode_shape(point, mode, dim), 0.0);
                    assert_eq!(var.bound_mode_shape_twm(point, mode, dim), 0.0);
                }
            }
        }
    }

    #[test]
    fn configured_mode_count_allocates_with_geometry() {
        let config = DeformConfig {
            n_modes: 4,
            n_blades: 2,
        };
        let mut var = MeshBoundVariable::<f64>::new(6, 2, config).expect("store should construct");
        var.set_is_vertex(3, true);
        var.allocate_boundary_variables()
            .expect("allocation should succeed");
        assert_eq!(var.n_mode(), 4);
        var.set_bound_mode_shape(3, 3, 1, 1.5);
        assert_eq!(var.bound_mode_shape(3, 3, 1), 1.5);
    }

    #[test]
    fn reallocation_keeps_reloaded_mode_count() {
        let config = DeformConfig {
            n_modes: 4,
            n_blades: 0,
        };
        let mut var = MeshBoundVariable::<f64>::new(8, 3, config).expect("store should construct");
        var.set_is_vertex(2, true);
        var.allocate_boundary_variables()
            .expect("allocation should succeed");
        assert_eq!(var.n_mode(), 4);

        // A structural model with more modes is loaded after allocation.
        var.initialize_mode_shape_matrix(6);
        var.set_is_vertex(5, true);
        var.allocate_boundary_variables()
            .expect("reallocation should succeed");

        assert_eq!(var.n_mode(), 6);
        var.set_bound_mode_shape(5, 5, 2, 1.25);
        var.set_bound_mode_shape_twm(2, 5, 0, -1.25);
        assert_eq!(var.bound_mode_shape(5, 5, 2), 1.25);
        assert_eq!(var.bound_mode_shape_twm(2, 5, 0), -1.25);
    }

    #[test]
    fn buffers_hold_one_column_per_boundary_point() {
        let mut var = allocated(10, 3, &[2, 5, 7]);
        var.initialize_mode_shape_matrix(2);
        assert_eq!(var.boundary_displacement.shape(), (3, 3));
        assert_eq!(var.boundary_mode_shape.shape(), (6, 3));

        var.set_bound_disp(5, &[1.0, 2.0, 3.0]);
        var.set_bound_mode_shape(7, 1, 0, 8.0);
        let column: Vec<f64> = var.boundary_displacement.column(1).iter().copied().collect();
        assert_eq!(column, vec![1.0, 2.0, 3.0]);
        assert_eq!(var.boundary_mode_shape[(3, 2)], 8.0);
    }

    #[test]
    fn allocation_is_idempotent_until_membership_changes() {
        let mut var = allocated(6, 2, &[1, 4]);
        var.set_bound_disp_component(4, 0, 2.0);
        var.allocate_boundary_variables()
            .expect("second allocation should succeed");
        assert_eq!(var.bound_disp(4, 0), 2.0);

        var.set_is_vertex(2, true);
        var.allocate_boundary_variables()
            .expect("reallocation should succeed");
        assert_eq!(var.n_boundary(), 3);
        assert_eq!(var.bound_disp(4, 0), 0.0);
    }

    #[test]
    fn identity_computation_yields_unit_adjoints() {
        tape::reset();
        let mut var = MeshBoundVariable::<AReal>::new(10, 2, DeformConfig::default())
            .expect("store should construct");
        for point in [2, 5, 7] {
            var.set_is_vertex(point, true);
        }
        var.allocate_boundary_variables()
            .expect("allocation should succeed");
        var.set_bound_disp(5, &[AReal::new(0.3), AReal::new(-1.2)]);

        var.register_bound_disp();
        tape::start_recording();
        let outputs: Vec<AReal> = (0..2).map(|dim| var.bound_disp(5, dim)).collect();
        tape::stop_recording();
        for output in &outputs {
            tape::set_adjoint(output, 1.0);
        }
        tape::compute_adjoint();

        let mut adj = [0.0; 2];
        var.adjoint_bound_disp(5, &mut adj);
        assert_eq!(adj, [1.0, 1.0]);

        let mut untouched = [-7.0; 2];
        var.adjoint_bound_disp(3, &mut untouched);
        assert_eq!(untouched, [-7.0, -7.0]);
    }

    #[test]
    fn adjoint_of_scaled_sum_reaches_each_component() {
        tape::reset();
        let mut var = MeshBoundVariable::<AReal>::new(4, 3, DeformConfig::default())
            .expect("store should construct");
        var.set_is_vertex(1, true);
        var.allocate_boundary_variables()
            .expect("allocation should succeed");
        var.set_bound_disp(1, &[AReal::new(1.0), AReal::new(2.0), AReal::new(3.0)]);

        var.register_bound_disp();
        tape::start_recording();
        // J = 2 d0 + d1 * d2
        let two = AReal::new(2.0);
        let objective = two * var.bound_disp(1, 0) + var.bound_disp(1, 1) * var.bound_disp(1, 2);
        tape::stop_recording();
        tape::set_adjoint(&objective, 1.0);
        tape::compute_adjoint();

        let mut adj = [0.0; 3];
        var.adjoint_bound_disp(1, &mut adj);
        assert_eq!(adj, [2.0, 3.0, 2.0]);
    }

    #[test]
    fn passive_store_reports_zero_adjoints() {
        let mut var = allocated(3, 2, &[0]);
        var.set_bound_disp(0, &[1.0, 1.0]);
        var.register_bound_disp();
        let mut adj = [5.0; 2];
        var.adjoint_bound_disp(0, &mut adj);
        assert_eq!(adj, [0.0, 0.0]);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn unmarked_points_read_zero_and_ignore_writes(
                marks in proptest::collection::vec(0usize..40, 0..20),
                writes in proptest::collection::vec((0usize..40, 0usize..3, -10.0f64..10.0), 1..50),
            ) {
                let mut var = allocated(40, 3, &marks);
                for &(point, dim, value) in &writes {
                    let before = var.boundary_displacement.clone();
                    var.set_bound_disp_component(point, dim, value);
                    if var.is_vertex(point) {
                        prop_assert_eq!(var.bound_disp(point, dim), value);
                    } else {
                        prop_assert_eq!(&var.boundary_displacement, &before);
                        prop_assert_eq!(var.bound_disp(point, dim), 0.0);
                    }
                }
            }
        }
    }
}
