//! Mismatch kernel: alignment search between two handle vectors.
//!
//! A vector's cells live in the component's intrinsic frame (first cell at the
//! origin, first step along +x). Two vectors are compared under every in-plane
//! rotation of one operand and every translation; a *match* is an overlapping
//! cell pair carrying the same non-zero handle id, and
//! `mismatch = max(len(A), len(B)) - matches`.
//!
//! # Alignments
//!
//! The rotation-0 and half-turn sweeps are split by translation direction into
//! the four canonical alignments (forward, reverse, and both again with `A`
//! reversed). Remaining rotations are folded into `off_axis`.
//!
//! # Complexity
//!
//! Linear operands use a dense register sweep: O(L²) per alignment with no
//! allocation. Two-dimensional operands accumulate a translation histogram per
//! rotation: O(|A|·|B|) per rotation.

use crate::schema::LatticeGeometry;

/// Per-alignment minimum mismatch counts for one ordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRecord {
    /// `A` unrotated, translation ≥ 0 in `(y, x)` lexicographic order.
    pub forward: u32,
    /// `A` unrotated, translation ≤ 0 in `(y, x)` lexicographic order.
    pub reverse: u32,
    /// `A` half-turned, translation ≥ 0.
    pub forward_flipped: u32,
    /// `A` half-turned, translation ≤ 0.
    pub reverse_flipped: u32,
    /// Best of the remaining rotations; `None` when they were skipped.
    pub off_axis: Option<u32>,
}

impl MatchRecord {
    fn unmatched(length: u32) -> Self {
        Self {
            forward: length,
            reverse: length,
            forward_flipped: length,
            reverse_flipped: length,
            off_axis: None,
        }
    }

    /// Minimum mismatch across every evaluated alignment.
    #[inline]
    pub fn pair_score(&self) -> u32 {
        let aligned = self
            .forward
            .min(self.reverse)
            .min(self.forward_flipped)
            .min(self.reverse_flipped);
        self.off_axis.map_or(aligned, |o| aligned.min(o))
    }
}

/// Component cell layout in its intrinsic frame, cached per rotation.
#[derive(Debug, Clone)]
pub struct Footprint {
    geometry: LatticeGeometry,
    /// Cells per rotation, shifted so the bounding box starts at the origin.
    rotations: Vec<Vec<(i32, i32)>>,
    /// Bounding box `(width, height)` per rotation.
    extents: Vec<(i32, i32)>,
    /// Register slot of each cell when the footprint lies on one line.
    register: Option<Vec<usize>>,
}

impl Footprint {
    /// Build from lattice coordinates given in sequence order.
    pub fn from_cells(cells: &[(i32, i32)], geometry: LatticeGeometry) -> Self {
        let origin = cells.first().copied().unwrap_or((0, 0));
        let local: Vec<(i32, i32)> = cells
            .iter()
            .map(|&(x, y)| (x - origin.0, y - origin.1))
            .collect();

        // Turn the first step onto +x
        let turn = local
            .get(1)
            .and_then(|&step| {
                (0..geometry.rotation_count()).find(|&k| {
                    let (sx, sy) = geometry.rotate(step, k);
                    sy == 0 && sx > 0
                })
            })
            .unwrap_or(0);
        let intrinsic: Vec<(i32, i32)> = local.iter().map(|&p| geometry.rotate(p, turn)).collect();

        let (rotations, extents): (Vec<_>, Vec<_>) = (0..geometry.rotation_count())
            .map(|k| {
                let rotated: Vec<(i32, i32)> =
                    intrinsic.iter().map(|&p| geometry.rotate(p, k)).collect();
                normalise(rotated)
            })
            .unzip();

        let register = if rotations[0].iter().all(|&(_, y)| y == 0) {
            Some(rotations[0].iter().map(|&(x, _)| x as usize).collect())
        } else {
            None
        };

        Self {
            geometry,
            rotations,
            extents,
            register,
        }
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.rotations[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All cells on a single line.
    #[inline]
    pub fn is_linear(&self) -> bool {
        self.register.is_some()
    }

    /// Cells under rotation `k`, in sequence order.
    pub fn cells(&self, k: usize) -> &[(i32, i32)] {
        &self.rotations[k]
    }

    /// Dense register of `values` along the line, zero in gaps.
    pub fn to_register(&self, values: &[u16]) -> Option<Vec<u16>> {
        let slots = self.register.as_ref()?;
        let width = slots.iter().max().map_or(0, |m| m + 1);
        let mut register = vec![0u16; width];
        for (&slot, &v) in slots.iter().zip(values) {
            register[slot] = v;
        }
        Some(register)
    }
}

fn normalise(mut cells: Vec<(i32, i32)>) -> (Vec<(i32, i32)>, (i32, i32)) {
    let min_x = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.1).min().unwrap_or(0);
    for c in &mut cells {
        c.0 -= min_x;
        c.1 -= min_y;
    }
    let w = cells.iter().map(|c| c.0 + 1).max().unwrap_or(0);
    let h = cells.iter().map(|c| c.1 + 1).max().unwrap_or(0);
    (cells, (w, h))
}

/// Handle values of one vector projected onto its footprint.
#[derive(Debug, Clone)]
pub struct ProjectedVector<'a> {
    pub footprint: &'a Footprint,
    /// Values in sequence order.
    pub values: Vec<u16>,
    /// Dense register for linear footprints.
    pub register: Option<Vec<u16>>,
}

impl<'a> ProjectedVector<'a> {
    pub fn new(footprint: &'a Footprint, values: Vec<u16>) -> Self {
        let register = footprint.to_register(&values);
        Self {
            footprint,
            values,
            register,
        }
    }

    #[inline]
    fn nominal_len(&self) -> u32 {
        self.values.len() as u32
    }

    fn has_common_handle(&self, other: &ProjectedVector<'_>) -> bool {
        self.values
            .iter()
            .any(|&v| v != 0 && other.values.contains(&v))
    }
}

/// Compare two projected vectors.
///
/// `skip_linear_off_axis` drops the off-axis rotations when both operands are
/// linear (an approximation; see [`crate::schema::RotationMode`]).
pub fn match_vectors(
    a: &ProjectedVector<'_>,
    b: &ProjectedVector<'_>,
    skip_linear_off_axis: bool,
) -> MatchRecord {
    let length = a.nominal_len().max(b.nominal_len());

    if let (Some(ra), Some(rb)) = (&a.register, &b.register) {
        let mut record = linear_match(ra, rb, length);
        if !skip_linear_off_axis {
            // Two distinct lines cross in at most one cell
            let crossing = u32::from(a.has_common_handle(b));
            record.off_axis = Some(length - crossing);
        }
        return record;
    }

    general_match(a, b, length)
}

/// Four-alignment sweep over dense registers.
pub fn linear_match(a: &[u16], b: &[u16], length: u32) -> MatchRecord {
    let mut record = MatchRecord::unmatched(length);
    if a.is_empty() || b.is_empty() {
        return record;
    }

    let mut best = [0u32; 4];
    for s in 0..b.len() {
        best[0] = best[0].max(shifted_matches(a.iter(), &b[s..]));
        best[2] = best[2].max(shifted_matches(a.iter().rev(), &b[s..]));
    }
    for s in 0..a.len() {
        best[1] = best[1].max(shifted_matches(a[s..].iter(), b));
        best[3] = best[3].max(shifted_matches(a[..a.len() - s].iter().rev(), b));
    }

    debug_assert!(best.iter().all(|&m| m <= length));
    record.forward = length - best[0];
    record.reverse = length - best[1];
    record.forward_flipped = length - best[2];
    record.reverse_flipped = length - best[3];
    record
}

#[inline]
fn shifted_matches<'x>(a: impl Iterator<Item = &'x u16>, b: &[u16]) -> u32 {
    a.zip(b).filter(|&(&x, &y)| x != 0 && x == y).count() as u32
}

/// Rotation and translation sweep for arbitrary footprints.
pub fn general_match(a: &ProjectedVector<'_>, b: &ProjectedVector<'_>, length: u32) -> MatchRecord {
    let mut record = MatchRecord::unmatched(length);
    if a.values.is_empty() || b.values.is_empty() {
        return record;
    }
    let geometry = a.footprint.geometry;
    let b_cells = b.footprint.cells(0);
    let (bw, bh) = b.footprint.extents[0];

    // B cells grouped by handle id
    let mut by_value: Vec<(u16, (i32, i32))> = b
        .values
        .iter()
        .zip(b_cells)
        .filter(|(v, _)| **v != 0)
        .map(|(&v, &c)| (v, c))
        .collect();
    by_value.sort_unstable();

    let half = geometry.half_turn();
    let mut off_axis = length;
    let mut counts: Vec<u32> = Vec::new();

    for k in 0..geometry.rotation_count() {
        let a_cells = a.footprint.cells(k);
        let (aw, ah) = a.footprint.extents[k];
        let tw = (aw + bw - 1).max(1);
        let th = (ah + bh - 1).max(1);
        counts.clear();
        counts.resize((tw * th) as usize, 0);

        for (&v, &(ax, ay)) in a.values.iter().zip(a_cells) {
            if v == 0 {
                continue;
            }
            let start = by_value.partition_point(|(bv, _)| *bv < v);
            for &(_, (bx, by)) in by_value[start..].iter().take_while(|(bv, _)| *bv == v) {
                let tx = bx - ax + aw - 1;
                let ty = by - ay + ah - 1;
                counts[(ty * tw + tx) as usize] += 1;
            }
        }

        // Translation (0, 0) sits at (aw - 1, ah - 1)
        let origin = ((ah - 1) * tw + (aw - 1)) as usize;
        let mut ahead = 0u32;
        let mut behind = 0u32;
        for (idx, &c) in counts.iter().enumerate() {
            if idx >= origin {
                ahead = ahead.max(c);
            }
            if idx <= origin {
                behind = behind.max(c);
            }
        }
        debug_assert!(ahead <= length && behind <= length);

        if k == 0 {
            record.forward = length - ahead;
            record.reverse = length - behind;
        } else if k == half {
            record.forward_flipped = length - ahead;
            record.reverse_flipped = length - behind;
        } else {
            off_axis = off_axis.min(length - ahead.max(behind));
        }
    }

    if geometry.rotation_count() > 2 {
        record.off_axis = Some(off_axis);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(len: usize) -> Footprint {
        let cells: Vec<(i32, i32)> = (0..len as i32).map(|x| (x, 0)).collect();
        Footprint::from_cells(&cells, LatticeGeometry::Square)
    }

    fn ell() -> Footprint {
        // 3 cells along x, then 2 up
        let cells = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)];
        Footprint::from_cells(&cells, LatticeGeometry::Square)
    }

    #[test]
    fn test_vertical_line_is_linear_in_own_frame() {
        let cells: Vec<(i32, i32)> = (0..5).map(|y| (3, 7 + y)).collect();
        let fp = Footprint::from_cells(&cells, LatticeGeometry::Square);
        assert!(fp.is_linear());
        assert_eq!(fp.len(), 5);
        assert!(!ell().is_linear());
    }

    #[test]
    fn test_identical_vectors_fully_match() {
        let fp = line(4);
        let a = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let b = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let record = match_vectors(&a, &b, false);
        assert_eq!(record.forward, 0);
        assert_eq!(record.pair_score(), 0);
    }

    #[test]
    fn test_reversed_vector_matches_flipped() {
        let fp = line(4);
        let a = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let b = ProjectedVector::new(&fp, vec![4, 3, 2, 1]);
        let record = match_vectors(&a, &b, true);
        // one handle lines up at each shift
        assert_eq!(record.forward, 3);
        assert_eq!(record.forward_flipped, 0);
        assert_eq!(record.reverse_flipped, 0);
        assert_eq!(record.off_axis, None);
    }

    #[test]
    fn test_shift_is_found() {
        let fp = line(5);
        let a = ProjectedVector::new(&fp, vec![7, 8, 9, 0, 0]);
        let b = ProjectedVector::new(&fp, vec![0, 0, 7, 8, 9]);
        let record = match_vectors(&a, &b, true);
        assert_eq!(record.forward, 2);
        assert_eq!(record.reverse, 5);
    }

    #[test]
    fn test_off_axis_counts_single_crossing() {
        let fp = line(4);
        let a = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let b = ProjectedVector::new(&fp, vec![5, 6, 7, 1]);
        let record = match_vectors(&a, &b, false);
        assert_eq!(record.off_axis, Some(3));
        assert_eq!(record.pair_score(), 3);
    }

    #[test]
    fn test_linear_fast_path_agrees_with_general_sweep() {
        let fp = line(6);
        let a = ProjectedVector::new(&fp, vec![1, 0, 2, 3, 1, 2]);
        let b = ProjectedVector::new(&fp, vec![3, 1, 2, 0, 2, 1]);
        let fast = match_vectors(&a, &b, false);
        let slow = general_match(&a, &b, 6);
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_two_dimensional_rotation_found() {
        // Open 2x2 loop: a quarter turn maps the footprint onto itself
        let cells = [(0, 0), (1, 0), (1, 1), (0, 1)];
        let fp = Footprint::from_cells(&cells, LatticeGeometry::Square);
        assert!(!fp.is_linear());
        let a = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let b = ProjectedVector::new(&fp, vec![4, 1, 2, 3]);
        let record = match_vectors(&a, &b, true);
        assert_eq!(record.forward, 3);
        assert_eq!(record.off_axis, Some(0));
        assert_eq!(record.pair_score(), 0);
    }

    #[test]
    fn test_triangular_line_has_off_axis() {
        let cells: Vec<(i32, i32)> = (0..4).map(|r| (0, r)).collect();
        let fp = Footprint::from_cells(&cells, LatticeGeometry::Triangular);
        assert!(fp.is_linear());
        let a = ProjectedVector::new(&fp, vec![1, 2, 3, 4]);
        let slow = general_match(&a, &a, 4);
        assert_eq!(slow.forward, 0);
        assert_eq!(slow.off_axis, Some(3));
        assert_eq!(match_vectors(&a, &a, false), slow);
    }

    fn handles(len: usize) -> impl Strategy<Value = Vec<u16>> {
        prop::collection::vec(0u16..5, len)
    }

    proptest! {
        #[test]
        fn prop_pair_score_symmetric(a in handles(8), b in handles(8), skip in any::<bool>()) {
            let fp = line(8);
            let pa = ProjectedVector::new(&fp, a);
            let pb = ProjectedVector::new(&fp, b);
            prop_assert_eq!(
                match_vectors(&pa, &pb, skip).pair_score(),
                match_vectors(&pb, &pa, skip).pair_score()
            );
        }

        #[test]
        fn prop_pair_score_symmetric_two_dimensional(a in handles(5), b in handles(5)) {
            let fp = ell();
            let pa = ProjectedVector::new(&fp, a);
            let pb = ProjectedVector::new(&fp, b);
            prop_assert_eq!(
                match_vectors(&pa, &pb, false).pair_score(),
                match_vectors(&pb, &pa, false).pair_score()
            );
        }

        #[test]
        fn prop_zero_vector_never_matches(b in handles(8)) {
            let fp = line(8);
            let zeros = ProjectedVector::new(&fp, vec![0; 8]);
            let pb = ProjectedVector::new(&fp, b);
            prop_assert_eq!(match_vectors(&zeros, &pb, false).pair_score(), 8);
            prop_assert_eq!(match_vectors(&pb, &zeros, false).pair_score(), 8);
        }

        #[test]
        fn prop_mismatch_bounded_by_length(a in handles(8), b in handles(8)) {
            let fp = line(8);
            let record = match_vectors(
                &ProjectedVector::new(&fp, a),
                &ProjectedVector::new(&fp, b),
                false,
            );
            for m in [record.forward, record.reverse, record.forward_flipped, record.reverse_flipped] {
                prop_assert!(m <= 8);
            }
            prop_assert!(record.off_axis.unwrap_or(0) <= 8);
        }
    }
}
