//! Component extraction and the per-lattice index shared by scoring and mutation.
//!
//! [`LatticeIndex`] is built once per lattice and holds everything that does not
//! depend on the handle assignment: ordered component cells, cached footprints
//! and the list of exposed handle/antihandle vectors. It is immutable and can
//! be shared across scoring workers behind an `Arc`.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::schema::{
    ComponentKey, Face, HandleAssignment, Lattice, LatticeGeometry, VectorKey,
};

use super::correlation::{Footprint, ProjectedVector};

/// One component with its cells in sequence order.
#[derive(Debug, Clone)]
pub struct Component {
    pub key: ComponentKey,
    /// Lattice `(x, y)` cells in sequence order.
    pub cells: Vec<(usize, usize)>,
    pub footprint: Footprint,
}

/// A component face exposed at one interface.
#[derive(Debug, Clone)]
pub struct ExposedVector {
    pub key: VectorKey,
    pub face: Face,
    /// Index into [`LatticeIndex::components`].
    pub component: usize,
}

/// Assignment-independent view of a lattice.
#[derive(Debug, Clone)]
pub struct LatticeIndex {
    geometry: LatticeGeometry,
    max_length: u32,
    components: Vec<Component>,
    vectors: Vec<ExposedVector>,
    lookup: HashMap<VectorKey, usize>,
}

impl LatticeIndex {
    /// Extract components and exposed vectors from a lattice.
    pub fn build(lattice: &Lattice) -> Self {
        let geometry = lattice.geometry();
        let mut grouped: BTreeMap<ComponentKey, Vec<(usize, usize)>> = BTreeMap::new();
        for ((x, y, layer), &id) in lattice.occupancy().indexed_iter() {
            if id != 0 {
                grouped
                    .entry(ComponentKey::new(layer, id))
                    .or_default()
                    .push((x, y));
            }
        }

        let components: Vec<Component> = grouped
            .into_iter()
            .map(|(key, cells)| {
                let cells = order_cells(cells, geometry);
                let coords: Vec<(i32, i32)> =
                    cells.iter().map(|&(x, y)| (x as i32, y as i32)).collect();
                let footprint = Footprint::from_cells(&coords, geometry);
                Component {
                    key,
                    cells,
                    footprint,
                }
            })
            .collect();

        let max_length = components
            .iter()
            .map(|c| c.cells.len() as u32)
            .max()
            .unwrap_or(0);

        let mut vectors = Vec::new();
        for (ci, component) in components.iter().enumerate() {
            let layer = component.key.layer;
            let candidates = [layer.checked_sub(1), Some(layer)];
            for interface in candidates.into_iter().flatten() {
                if interface >= lattice.interfaces() {
                    continue;
                }
                let binds = component
                    .cells
                    .iter()
                    .any(|&(x, y)| lattice.is_assignable(x, y, interface));
                if !binds {
                    continue;
                }
                if let Some(face) = lattice.face_at(layer, interface) {
                    vectors.push(ExposedVector {
                        key: VectorKey {
                            component: component.key,
                            interface,
                        },
                        face,
                        component: ci,
                    });
                }
            }
        }

        let lookup = vectors.iter().enumerate().map(|(i, v)| (v.key, i)).collect();

        log::debug!(
            "Indexed {} components exposing {} vectors (max length {})",
            components.len(),
            vectors.len(),
            max_length
        );

        Self {
            geometry,
            max_length,
            components,
            vectors,
            lookup,
        }
    }

    #[inline]
    pub fn geometry(&self) -> LatticeGeometry {
        self.geometry
    }

    /// Longest component, the upper bound of every mismatch count.
    #[inline]
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn vectors(&self) -> &[ExposedVector] {
        &self.vectors
    }

    /// Indices of vectors presenting `face`.
    pub fn vectors_with_face(&self, face: Face) -> impl Iterator<Item = usize> + '_ {
        self.vectors
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.face == face)
            .map(|(i, _)| i)
    }

    pub fn vector_index(&self, key: &VectorKey) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// Handle positions `(x, y, interface)` covered by a vector.
    pub fn vector_positions(
        &self,
        key: &VectorKey,
    ) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let interface = key.interface;
        self.vector_index(key)
            .map(|i| self.components[self.vectors[i].component].cells.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&(x, y)| (x, y, interface))
    }

    /// Project an assignment onto one vector.
    pub fn project<'a>(
        &'a self,
        vector: usize,
        assignment: &HandleAssignment,
    ) -> ProjectedVector<'a> {
        let exposed = &self.vectors[vector];
        let component = &self.components[exposed.component];
        let values = component
            .cells
            .iter()
            .map(|&(x, y)| assignment.get(x, y, exposed.key.interface))
            .collect();
        ProjectedVector::new(&component.footprint, values)
    }
}

/// Order a component's cells by walking its chain from the smallest endpoint.
///
/// Cells that do not form a simple chain fall back to `(x, y)` order.
fn order_cells(mut cells: Vec<(usize, usize)>, geometry: LatticeGeometry) -> Vec<(usize, usize)> {
    cells.sort_unstable();
    if cells.len() < 3 {
        return cells;
    }

    let members: HashSet<(i32, i32)> = cells.iter().map(|&(x, y)| (x as i32, y as i32)).collect();
    let neighbours = |(x, y): (i32, i32)| -> Vec<(i32, i32)> {
        geometry
            .neighbour_steps()
            .iter()
            .map(|&(dx, dy)| (x + dx, y + dy))
            .filter(|p| members.contains(p))
            .collect()
    };

    let degrees: Vec<usize> = cells
        .iter()
        .map(|&(x, y)| neighbours((x as i32, y as i32)).len())
        .collect();
    if degrees.iter().any(|&d| d > 2) {
        return cells;
    }
    let Some(start) = cells.iter().zip(&degrees).find(|(_, d)| **d == 1).map(|(c, _)| *c) else {
        return cells;
    };

    let mut ordered = Vec::with_capacity(cells.len());
    let mut visited = HashSet::with_capacity(cells.len());
    let mut current = (start.0 as i32, start.1 as i32);
    loop {
        ordered.push((current.0 as usize, current.1 as usize));
        visited.insert(current);
        match neighbours(current).into_iter().find(|p| !visited.contains(p)) {
            Some(next) => current = next,
            None => break,
        }
    }

    if ordered.len() == cells.len() {
        ordered
    } else {
        cells
    }
}
