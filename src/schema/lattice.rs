//! Lattice model: component occupancy, interface orientation and handle grids.
//!
//! All grids are indexed `[x][y][z]` where `z` is a layer (occupancy) or an
//! interface between two adjacent layers (handles, masks). Interface `i` sits
//! between layers `i` and `i + 1`.

use serde::{Deserialize, Serialize};

/// Dense 3D grid stored in `[x][y][z]` order.
///
/// Serialized as nested arrays so JSON designs read the same way as the
/// occupancy tables they come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Vec<Vec<T>>>",
    into = "Vec<Vec<Vec<T>>>",
    bound(
        serialize = "T: Clone + Serialize",
        deserialize = "T: Clone + Deserialize<'de>"
    )
)]
pub struct Grid3<T> {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid3<T> {
    /// Create a grid filled with `T::default()`.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            data: vec![T::default(); width * height * depth],
        }
    }
}

impl<T: Clone> Grid3<T> {
    /// Create a grid filled with `value`.
    pub fn filled(width: usize, height: usize, depth: usize, value: T) -> Self {
        Self {
            width,
            height,
            depth,
            data: vec![value; width * height * depth],
        }
    }

    /// Wrap a flat `[x][y][z]` buffer.
    pub fn from_vec(
        width: usize,
        height: usize,
        depth: usize,
        data: Vec<T>,
    ) -> Result<Self, ShapeMismatchError> {
        if data.len() != width * height * depth {
            return Err(ShapeMismatchError {
                expected: (width, height, depth),
                found: (data.len(), 1, 1),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Dimensions as `(width, height, depth)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        (x * self.height + y) * self.depth + z
    }

    /// Read a cell.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        &self.data[self.index(x, y, z)]
    }

    /// Overwrite a cell.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) {
        let idx = self.index(x, y, z);
        self.data[idx] = value;
    }

    /// Flat view in `[x][y][z]` order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate over `((x, y, z), &value)`.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize, usize), &T)> + '_ {
        let (height, depth) = (self.height, self.depth);
        self.data.iter().enumerate().map(move |(i, v)| {
            let z = i % depth;
            let y = (i / depth) % height;
            let x = i / (depth * height);
            ((x, y, z), v)
        })
    }
}

impl<T: Clone> TryFrom<Vec<Vec<Vec<T>>>> for Grid3<T> {
    type Error = LatticeError;

    fn try_from(nested: Vec<Vec<Vec<T>>>) -> Result<Self, Self::Error> {
        let width = nested.len();
        let height = nested.first().map_or(0, Vec::len);
        let depth = nested
            .first()
            .and_then(|col| col.first())
            .map_or(0, Vec::len);

        let mut data = Vec::with_capacity(width * height * depth);
        for (x, column) in nested.into_iter().enumerate() {
            if column.len() != height {
                return Err(LatticeError::Ragged(format!(
                    "column {x} has {} rows, expected {height}",
                    column.len()
                )));
            }
            for (y, stack) in column.into_iter().enumerate() {
                if stack.len() != depth {
                    return Err(LatticeError::Ragged(format!(
                        "cell ({x}, {y}) has {} layers, expected {depth}",
                        stack.len()
                    )));
                }
                data.extend(stack);
            }
        }

        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }
}

impl<T: Clone> From<Grid3<T>> for Vec<Vec<Vec<T>>> {
    fn from(grid: Grid3<T>) -> Self {
        let mut cells = grid.data.into_iter();
        (0..grid.width)
            .map(|_| {
                (0..grid.height)
                    .map(|_| cells.by_ref().take(grid.depth).collect())
                    .collect()
            })
            .collect()
    }
}

/// Cell connectivity of the lattice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LatticeGeometry {
    /// Square grid, four neighbours, 90° rotations.
    #[default]
    Square,
    /// Triangular grid in axial `(q, r)` coordinates, six neighbours, 60° rotations.
    Triangular,
}

impl LatticeGeometry {
    /// Number of distinct in-plane rotations.
    #[inline]
    pub fn rotation_count(self) -> usize {
        match self {
            Self::Square => 4,
            Self::Triangular => 6,
        }
    }

    /// Unit steps to neighbouring cells.
    pub fn neighbour_steps(self) -> &'static [(i32, i32)] {
        match self {
            Self::Square => &[(1, 0), (0, 1), (-1, 0), (0, -1)],
            Self::Triangular => &[(1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1), (1, -1)],
        }
    }

    /// Rotate an offset counter-clockwise by `steps` elementary rotations.
    #[inline]
    pub fn rotate(self, (x, y): (i32, i32), steps: usize) -> (i32, i32) {
        let mut p = (x, y);
        for _ in 0..steps % self.rotation_count() {
            p = match self {
                Self::Square => (-p.1, p.0),
                Self::Triangular => (-p.1, p.0 + p.1),
            };
        }
        p
    }

    /// Rotation index corresponding to a half turn.
    #[inline]
    pub fn half_turn(self) -> usize {
        self.rotation_count() / 2
    }
}

/// Which side of an interface carries handles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum InterfaceOrientation {
    /// The upper layer presents handles, the lower layer antihandles.
    #[default]
    UpperHandles,
    /// The lower layer presents handles, the upper layer antihandles.
    LowerHandles,
}

/// Chemistry a component presents at an interface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    Handle,
    Antihandle,
}

/// Identifies one component: its layer and occupancy id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub layer: usize,
    pub id: u32,
}

impl ComponentKey {
    pub fn new(layer: usize, id: u32) -> Self {
        Self { layer, id }
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}-{}", self.layer, self.id)
    }
}

#[derive(Deserialize)]
struct LatticeSpec {
    occupancy: Grid3<u32>,
    #[serde(default)]
    geometry: LatticeGeometry,
    #[serde(default)]
    orientations: Option<Vec<InterfaceOrientation>>,
}

impl TryFrom<LatticeSpec> for Lattice {
    type Error = LatticeError;

    fn try_from(spec: LatticeSpec) -> Result<Self, Self::Error> {
        let interfaces = spec.occupancy.depth().saturating_sub(1);
        let orientations = spec
            .orientations
            .unwrap_or_else(|| vec![InterfaceOrientation::default(); interfaces]);
        Lattice::new(spec.occupancy, spec.geometry, orientations)
    }
}

/// Immutable occupancy lattice: which component sits in which cell of which layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LatticeSpec")]
pub struct Lattice {
    occupancy: Grid3<u32>,
    geometry: LatticeGeometry,
    orientations: Vec<InterfaceOrientation>,
}

impl Lattice {
    /// Build a validated lattice.
    pub fn new(
        occupancy: Grid3<u32>,
        geometry: LatticeGeometry,
        orientations: Vec<InterfaceOrientation>,
    ) -> Result<Self, LatticeError> {
        let layers = occupancy.depth();
        if layers < 2 {
            return Err(LatticeError::TooFewLayers(layers));
        }
        if orientations.len() != layers - 1 {
            return Err(LatticeError::OrientationCount {
                expected: layers - 1,
                found: orientations.len(),
            });
        }
        Ok(Self {
            occupancy,
            geometry,
            orientations,
        })
    }

    /// Square lattice with handles on the upper face of every interface.
    pub fn square(occupancy: Grid3<u32>) -> Result<Self, LatticeError> {
        let interfaces = occupancy.depth().saturating_sub(1);
        Self::new(
            occupancy,
            LatticeGeometry::Square,
            vec![InterfaceOrientation::UpperHandles; interfaces],
        )
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.occupancy.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.occupancy.height()
    }

    #[inline]
    pub fn layers(&self) -> usize {
        self.occupancy.depth()
    }

    #[inline]
    pub fn interfaces(&self) -> usize {
        self.layers() - 1
    }

    #[inline]
    pub fn geometry(&self) -> LatticeGeometry {
        self.geometry
    }

    pub fn occupancy(&self) -> &Grid3<u32> {
        &self.occupancy
    }

    /// Component id at a cell (0 = empty).
    #[inline]
    pub fn component_at(&self, x: usize, y: usize, layer: usize) -> u32 {
        *self.occupancy.get(x, y, layer)
    }

    #[inline]
    pub fn orientation(&self, interface: usize) -> InterfaceOrientation {
        self.orientations[interface]
    }

    /// Face a component in `layer` presents at `interface`, if it touches it.
    pub fn face_at(&self, layer: usize, interface: usize) -> Option<Face> {
        let is_upper = if layer == interface + 1 {
            true
        } else if layer == interface {
            false
        } else {
            return None;
        };
        Some(match (self.orientation(interface), is_upper) {
            (InterfaceOrientation::UpperHandles, true)
            | (InterfaceOrientation::LowerHandles, false) => Face::Handle,
            _ => Face::Antihandle,
        })
    }

    /// A handle may only sit where both adjacent layers are occupied.
    #[inline]
    pub fn is_assignable(&self, x: usize, y: usize, interface: usize) -> bool {
        self.component_at(x, y, interface) != 0 && self.component_at(x, y, interface + 1) != 0
    }

    /// Structural validity mask over handle positions.
    pub fn validity_mask(&self) -> MutationMask {
        let mut mask = MutationMask::empty_for(self);
        for x in 0..self.width() {
            for y in 0..self.height() {
                for i in 0..self.interfaces() {
                    if self.is_assignable(x, y, i) {
                        mask.set(x, y, i, true);
                    }
                }
            }
        }
        mask
    }

    /// Shape an assignment must have to pair with this lattice.
    #[inline]
    pub fn assignment_shape(&self) -> (usize, usize, usize) {
        (self.width(), self.height(), self.interfaces())
    }

    /// Fail unless the assignment has one grid layer per interface.
    pub fn check_shape(&self, assignment: &HandleAssignment) -> Result<(), ShapeMismatchError> {
        let expected = self.assignment_shape();
        let found = assignment.dims();
        if expected != found {
            return Err(ShapeMismatchError { expected, found });
        }
        Ok(())
    }

    /// Positions holding a handle where the structure has no binding site.
    pub fn illegal_positions(&self, assignment: &HandleAssignment) -> Vec<(usize, usize, usize)> {
        assignment
            .grid()
            .indexed_iter()
            .filter(|&((x, y, i), &h)| h != 0 && !self.is_assignable(x, y, i))
            .map(|(pos, _)| pos)
            .collect()
    }
}

/// Handle identifiers per `[x][y][interface]` (0 = unassigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleAssignment {
    handles: Grid3<u16>,
}

impl HandleAssignment {
    /// All-zero assignment shaped for `lattice`.
    pub fn empty_for(lattice: &Lattice) -> Self {
        let (w, h, d) = lattice.assignment_shape();
        Self {
            handles: Grid3::new(w, h, d),
        }
    }

    pub fn from_grid(handles: Grid3<u16>) -> Self {
        Self { handles }
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        self.handles.dims()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, interface: usize) -> u16 {
        *self.handles.get(x, y, interface)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, interface: usize, handle: u16) {
        self.handles.set(x, y, interface, handle);
    }

    pub fn grid(&self) -> &Grid3<u16> {
        &self.handles
    }

    /// Plain nested array for exporters.
    pub fn to_nested(&self) -> Vec<Vec<Vec<u16>>> {
        self.handles.clone().into()
    }
}

/// Positions eligible for rewriting during one mutation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationMask {
    cells: Grid3<bool>,
}

impl MutationMask {
    /// Mask with nothing selected, shaped for `lattice`'s handle grid.
    pub fn empty_for(lattice: &Lattice) -> Self {
        let (w, h, d) = lattice.assignment_shape();
        Self {
            cells: Grid3::filled(w, h, d, false),
        }
    }

    /// Mask with nothing selected and the same shape as this one.
    pub fn empty_like(&self) -> Self {
        let (w, h, d) = self.cells.dims();
        Self {
            cells: Grid3::filled(w, h, d, false),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, interface: usize) -> bool {
        *self.cells.get(x, y, interface)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, interface: usize, value: bool) {
        self.cells.set(x, y, interface, value);
    }

    /// Keep only positions selected in both masks.
    pub fn intersect(&mut self, other: &MutationMask) {
        debug_assert_eq!(self.cells.dims(), other.cells.dims());
        for (a, b) in self.cells.data.iter_mut().zip(other.cells.as_slice()) {
            *a &= *b;
        }
    }

    /// Number of selected positions.
    pub fn count(&self) -> usize {
        self.cells.as_slice().iter().filter(|&&v| v).count()
    }

    /// Selected positions in `[x][y][interface]` order.
    pub fn selected(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.cells
            .indexed_iter()
            .filter(|(_, v)| **v)
            .map(|(pos, _)| pos)
    }
}

/// Lattice and assignment disagree on shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Shape mismatch: expected {expected:?}, found {found:?}")]
pub struct ShapeMismatchError {
    /// Expected `(width, height, interfaces)`.
    pub expected: (usize, usize, usize),
    /// Shape actually supplied.
    pub found: (usize, usize, usize),
}

/// Invalid lattice input.
#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    #[error("Lattice needs at least two layers, found {0}")]
    TooFewLayers(usize),
    #[error("Expected {expected} interface orientations, found {found}")]
    OrientationCount { expected: usize, found: usize },
    #[error("Ragged grid: {0}")]
    Ragged(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_cross() -> Lattice {
        // 4x4, layer 0 rows, layer 1 columns
        let mut occ = Grid3::new(4, 4, 2);
        for x in 0..4 {
            for y in 0..4 {
                occ.set(x, y, 0, y as u32 + 1);
                occ.set(x, y, 1, x as u32 + 1);
            }
        }
        Lattice::square(occ).unwrap()
    }

    #[test]
    fn test_grid_nested_roundtrip() {
        let nested = vec![vec![vec![1u32, 2], vec![3, 4]], vec![vec![5, 6], vec![7, 8]]];
        let grid = Grid3::try_from(nested.clone()).unwrap();
        assert_eq!(grid.dims(), (2, 2, 2));
        assert_eq!(*grid.get(1, 0, 1), 6);
        let back: Vec<Vec<Vec<u32>>> = grid.into();
        assert_eq!(back, nested);
    }

    #[test]
    fn test_ragged_grid_rejected() {
        let nested = vec![vec![vec![1u32, 2]], vec![vec![3]]];
        assert!(matches!(
            Grid3::try_from(nested),
            Err(LatticeError::Ragged(_))
        ));
    }

    #[test]
    fn test_single_layer_rejected() {
        let occ: Grid3<u32> = Grid3::new(2, 2, 1);
        assert!(matches!(
            Lattice::square(occ),
            Err(LatticeError::TooFewLayers(1))
        ));
    }

    #[test]
    fn test_validity_mask_requires_both_layers() {
        let mut occ = Grid3::new(3, 1, 2);
        occ.set(0, 0, 0, 1);
        occ.set(0, 0, 1, 1);
        occ.set(1, 0, 0, 1);
        let lattice = Lattice::square(occ).unwrap();
        let mask = lattice.validity_mask();
        assert!(mask.get(0, 0, 0));
        assert!(!mask.get(1, 0, 0));
        assert!(!mask.get(2, 0, 0));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn test_faces_follow_orientation() {
        let lattice = two_layer_cross();
        assert_eq!(lattice.face_at(1, 0), Some(Face::Handle));
        assert_eq!(lattice.face_at(0, 0), Some(Face::Antihandle));

        let flipped = Lattice::new(
            lattice.occupancy().clone(),
            LatticeGeometry::Square,
            vec![InterfaceOrientation::LowerHandles],
        )
        .unwrap();
        assert_eq!(flipped.face_at(0, 0), Some(Face::Handle));
        assert_eq!(flipped.face_at(1, 0), Some(Face::Antihandle));
    }

    #[test]
    fn test_check_shape() {
        let lattice = two_layer_cross();
        let ok = HandleAssignment::empty_for(&lattice);
        assert!(lattice.check_shape(&ok).is_ok());

        let bad = HandleAssignment::from_grid(Grid3::new(4, 4, 2));
        let err = lattice.check_shape(&bad).unwrap_err();
        assert_eq!(err.expected, (4, 4, 1));
        assert_eq!(err.found, (4, 4, 2));
    }

    #[test]
    fn test_rotation_cycles() {
        for geometry in [LatticeGeometry::Square, LatticeGeometry::Triangular] {
            let p = (2, 1);
            assert_eq!(geometry.rotate(p, geometry.rotation_count()), p);
            let half = geometry.rotate(p, geometry.half_turn());
            assert_eq!(half, (-2, -1));
        }
    }

    #[test]
    fn test_lattice_json_defaults_orientation() {
        let json = r#"{"occupancy": [[[1, 1]], [[1, 1]]]}"#;
        let lattice: Lattice = serde_json::from_str(json).unwrap();
        assert_eq!(lattice.interfaces(), 1);
        assert_eq!(lattice.orientation(0), InterfaceOrientation::UpperHandles);
        assert_eq!(lattice.geometry(), LatticeGeometry::Square);
    }
}
