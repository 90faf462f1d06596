//! Global point index ↔ compact boundary slot translation.
//!
//! Membership is a cheap per-point flag that can be set while walking mesh
//! markers in any order. [`VertexMap::build`] then compacts the flagged points
//! into dense slots `0..n_vertex` in ascending point order. Boundary buffers
//! are sized to `n_vertex` and addressed by slot, so interior points cost one
//! flag and one `u32` each.

use crate::error::BoundaryError;
use log::info;

/// Sentinel stored for points that own no slot.
const NO_SLOT: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
pub struct VertexMap {
    is_vertex: Vec<bool>,
    /// point -> slot, `NO_SLOT` for interior points. Sized on `build`.
    map: Vec<u32>,
    /// slot -> point.
    points: Vec<usize>,
    valid: bool,
}

impl VertexMap {
    /// An open map over `n_point` points, none of them on a boundary.
    pub fn new(n_point: usize) -> Self {
        Self {
            is_vertex: vec![false; n_point],
            map: Vec::new(),
            points: Vec::new(),
            valid: false,
        }
    }

    /// Clears all membership and resizes to `n_point`, leaving the map open.
    pub fn reset(&mut self, n_point: usize) {
        self.is_vertex.clear();
        self.is_vertex.resize(n_point, false);
        self.map.clear();
        self.points.clear();
        self.valid = false;
    }

    pub fn n_point(&self) -> usize {
        self.is_vertex.len()
    }

    /// Number of boundary slots fixed by the last `build`.
    pub fn n_vertex(&self) -> usize {
        self.points.len()
    }

    /// Whether the map has been built since membership last changed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_vertex(&self, point: usize) -> bool {
        self.is_vertex.get(point).copied().unwrap_or(false)
    }

    /// Marks or unmarks a point. Out-of-range points are ignored; an actual
    /// change reopens a built map.
    pub fn set_is_vertex(&mut self, point: usize, is_vertex: bool) {
        if let Some(flag) = self.is_vertex.get_mut(point) {
            if *flag != is_vertex {
                *flag = is_vertex;
                self.valid = false;
            }
        }
    }

    /// Compacts the flagged points into slots and returns their number.
    pub fn build(&mut self) -> Result<usize, BoundaryError> {
        let count = self.is_vertex.iter().filter(|&&flag| flag).count();
        if count >= NO_SLOT as usize {
            return Err(BoundaryError::TooManyVertices { count });
        }

        self.map.clear();
        self.map.resize(self.is_vertex.len(), NO_SLOT);
        self.points.clear();
        self.points.reserve(count);

        for (point, &flag) in self.is_vertex.iter().enumerate() {
            if flag {
                self.map[point] = self.points.len() as u32;
                self.points.push(point);
            }
        }
        self.valid = true;

        info!(
            "Vertex map built: {} boundary vertices out of {} points.",
            count,
            self.is_vertex.len()
        );
        Ok(count)
    }

    /// Slot of a boundary point, `None` for interior or out-of-range points.
    ///
    /// On an open map the slots of the last build are kept: points marked since
    /// then have none, and unmarked points lose theirs.
    #[inline]
    pub fn vertex_index(&self, point: usize) -> Option<usize> {
        if !self.is_vertex(point) {
            return None;
        }
        match self.map.get(point) {
            Some(&slot) if slot != NO_SLOT => Some(slot as usize),
            _ => None,
        }
    }

    /// Global point that owns `slot`.
    pub fn point_index(&self, slot: usize) -> Option<usize> {
        self.points.get(slot).copied()
    }

    /// Boundary points in slot order.
    pub fn boundary_points(&self) -> &[usize] {
        &self.points
    }

    /// `(point, slot)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.points
            .iter()
            .enumerate()
            .map(|(slot, &point)| (point, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::VertexMap;

    fn map_with(n_point: usize, marked: &[usize]) -> VertexMap {
        let mut map = VertexMap::new(n_point);
        for &point in marked {
            map.set_is_vertex(point, true);
        }
        map
    }

    #[test]
    fn build_compacts_marked_points_in_ascending_order() {
        let mut map = map_with(10, &[7, 2, 5]);
        assert_eq!(map.build().expect("build should succeed"), 3);
        assert_eq!(map.vertex_index(2), Some(0));
        assert_eq!(map.vertex_index(5), Some(1));
        assert_eq!(map.vertex_index(7), Some(2));
        assert_eq!(map.vertex_index(3), None);
        assert_eq!(map.boundary_points(), &[2, 5, 7]);
    }

    #[test]
    fn out_of_range_points_are_never_vertices() {
        let mut map = map_with(4, &[1]);
        map.set_is_vertex(100, true);
        map.build().expect("build should succeed");
        assert!(!map.is_vertex(100));
        assert_eq!(map.vertex_index(100), None);
        assert_eq!(map.n_vertex(), 1);
    }

    #[test]
    fn repeated_marking_is_idempotent() {
        let mut map = map_with(6, &[4, 4, 4]);
        map.build().expect("build should succeed");
        map.set_is_vertex(4, true);
        assert!(map.is_valid());
        assert_eq!(map.n_vertex(), 1);
    }

    #[test]
    fn membership_change_reopens_map_until_rebuilt() {
        let mut map = map_with(6, &[1, 3]);
        map.build().expect("build should succeed");
        map.set_is_vertex(3, false);
        assert!(!map.is_valid());
        assert_eq!(map.build().expect("rebuild should succeed"), 1);
        assert_eq!(map.vertex_index(3), None);
        assert_eq!(map.vertex_index(1), Some(0));
    }

    #[test]
    fn inverse_lookup_and_iteration_follow_slot_order() {
        let mut map = map_with(8, &[6, 0, 3]);
        map.build().expect("build should succeed");
        assert_eq!(map.point_index(1), Some(3));
        assert_eq!(map.point_index(3), None);
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs, vec![(0, 0), (3, 1), (6, 2)]);
    }

    #[test]
    fn reset_clears_membership() {
        let mut map = map_with(5, &[0, 1]);
        map.build().expect("build should succeed");
        map.reset(3);
        assert_eq!(map.n_point(), 3);
        assert_eq!(map.n_vertex(), 0);
        assert!(!map.is_vertex(0));
        assert!(!map.is_valid());
    }

    #[test]
    fn lookup_on_open_map_uses_last_build() {
        let mut map = map_with(5, &[0, 2]);
        assert_eq!(map.vertex_index(0), None);

        map.build().expect("build should succeed");
        map.set_is_vertex(4, true);
        map.set_is_vertex(0, false);
        assert!(!map.is_valid());
        assert_eq!(map.vertex_index(4), None);
        assert_eq!(map.vertex_index(0), None);
        assert_eq!(map.vertex_index(2), Some(1));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slots_form_bijection_onto_dense_range(
                n_point in 1usize..200,
                marks in proptest::collection::vec(0usize..200, 0..120),
            ) {
                let mut map = VertexMap::new(n_point);
                for &point in &marks {
                    map.set_is_vertex(point, true);
                }
                let n_vertex = map.build().unwrap();

                let mut seen = vec![false; n_vertex];
                for point in 0..n_point {
                    match map.vertex_index(point) {
                        Some(slot) => {
                            prop_assert!(map.is_vertex(point));
                            prop_assert!(slot < n_vertex);
                            prop_assert!(!seen[slot], "slot {} assigned twice", slot);
                            seen[slot] = true;
                            prop_assert_eq!(map.point_index(slot), Some(point));
                        }
                        None => prop_assert!(!map.is_vertex(point)),
                    }
                }
                prop_assert!(seen.iter().all(|&s| s));
            }
        }
    }
}
