use crate::core::models::structure::Structure;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Rotation3, Vector3};
use std::cmp::Ordering;
use tracing::trace;

/// A maximal set of atoms connected through the bonding graph, together with
/// the sub-structure they form.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Indices into the analysed structure, ascending.
    pub indices: Vec<usize>,
    pub structure: Structure,
}

impl Fragment {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mean Cartesian z coordinate of the fragment's atoms.
    pub fn mean_z(&self) -> f64 {
        let positions = self.structure.positions();
        if positions.is_empty() {
            return 0.0;
        }
        positions.iter().map(|p| p.z).sum::<f64>() / positions.len() as f64
    }

    /// Minimum and maximum Cartesian coordinate along `axis`.
    pub fn span(&self, axis: usize) -> (f64, f64) {
        self.structure
            .positions()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            })
    }
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            Ordering::Less => self.parent[rx] = ry,
            Ordering::Greater => self.parent[ry] = rx,
            Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// Number of periodic images needed along each axis so that every pair within
/// `cutoff` is found. Non-periodic axes, and every axis of a singular cell,
/// get zero images.
fn image_counts(structure: &Structure, cutoff: f64) -> [i64; 3] {
    if structure.is_singular() {
        return [0; 3];
    }
    let volume = structure.volume();
    let pbc = structure.pbc();
    [0, 1, 2].map(|axis| {
        if !pbc[axis] {
            return 0;
        }
        let a = structure.lattice_vector((axis + 1) % 3);
        let b = structure.lattice_vector((axis + 2) % 3);
        let height = volume / a.cross(&b).norm();
        (cutoff / height).ceil().max(1.0) as i64
    })
}

/// Partitions the atoms of `structure` into bonded fragments.
///
/// Two atoms are bonded when their distance, including across periodic
/// boundaries of axes flagged periodic, is at most
/// `scale * (r_i + r_j)` with `r` the tabulated covalent radii. Fragments are
/// ordered by ascending mean z; equal means are ordered by their smallest
/// atom index.
pub fn find_fragments(structure: &Structure, scale: f64) -> Vec<Fragment> {
    let n = structure.len();
    if n == 0 {
        return Vec::new();
    }
    let radii: Vec<f64> = structure
        .covalent_radii()
        .into_iter()
        .map(|r| r * scale)
        .collect();
    let max_cutoff = 2.0 * radii.iter().cloned().fold(0.0, f64::max);
    let counts = image_counts(structure, max_cutoff);

    // A generic rotation keeps lattice-aligned atoms from sharing split-axis
    // values in the tree.
    let frame = Rotation3::from_euler_angles(0.31, 0.73, 1.13);
    let mut image_points: Vec<[f64; 3]> = Vec::new();
    for i in -counts[0]..=counts[0] {
        for j in -counts[1]..=counts[1] {
            for k in -counts[2]..=counts[2] {
                let offset: Vector3<f64> = structure.cell().transpose()
                    * Vector3::new(i as f64, j as f64, k as f64);
                image_points.extend(structure.positions().iter().map(|p| {
                    let q = frame * (p.coords + offset);
                    [q.x, q.y, q.z]
                }));
            }
        }
    }
    let kdtree: KdTree<f64, 3> = (&image_points).into();

    let mut components = UnionFind::new(n);
    for (i, p) in structure.positions().iter().enumerate() {
        let q = frame * p.coords;
        let query = [q.x, q.y, q.z];
        for neighbour in kdtree.within_unsorted::<SquaredEuclidean>(&query, max_cutoff * max_cutoff)
        {
            let j = neighbour.item as usize % n;
            let cutoff = radii[i] + radii[j];
            if j != i && neighbour.distance <= cutoff * cutoff {
                components.union(i, j);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root = vec![usize::MAX; n];
    for atom in 0..n {
        let root = components.find(atom);
        if group_of_root[root] == usize::MAX {
            group_of_root[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[group_of_root[root]].push(atom);
    }

    let mut fragments: Vec<Fragment> = groups
        .into_iter()
        .map(|indices| Fragment {
            structure: structure.subset(&indices),
            indices,
        })
        .collect();
    fragments.sort_by(|a, b| {
        a.mean_z()
            .total_cmp(&b.mean_z())
            .then_with(|| a.indices[0].cmp(&b.indices[0]))
    });
    trace!(atoms = n, fragments = fragments.len(), "Bonded fragments found");
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Point3};

    fn cubic_box(length: f64, positions: Vec<Point3<f64>>, pbc: [bool; 3]) -> Structure {
        let species = vec!["C".to_string(); positions.len()];
        Structure::new(Matrix3::identity() * length, species, positions, pbc).unwrap()
    }

    #[test]
    fn find_fragments_separates_two_isolated_dimers() {
        let s = cubic_box(
            30.0,
            vec![
                Point3::new(5.0, 5.0, 12.0),
                Point3::new(6.4, 5.0, 12.0),
                Point3::new(5.0, 5.0, 5.0),
                Point3::new(6.4, 5.0, 5.0),
            ],
            [true; 3],
        );
        let fragments = find_fragments(&s, 1.0);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].indices, vec![2, 3]);
        assert_eq!(fragments[1].indices, vec![0, 1]);
        assert!(fragments.iter().all(|f| f.structure.len() == 2));
    }

    #[test]
    fn find_fragments_returns_one_fragment_for_bonded_crystal() {
        let s = Structure::new(
            Matrix3::new(2.8, 0.0, 0.0, 0.0, 1.4, 0.0, 0.0, 0.0, 1.4),
            vec!["C".into(), "C".into()],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.4, 0.0, 0.0)],
            [true; 3],
        )
        .unwrap();
        assert_eq!(find_fragments(&s, 1.0).len(), 1);
    }

    #[test]
    fn find_fragments_bonds_across_periodic_boundaries_only_when_periodic() {
        let positions = vec![Point3::new(0.0, 1.0, 1.0), Point3::new(1.6, 1.0, 1.0)];
        let periodic = cubic_box(3.0, positions.clone(), [true; 3]);
        let open = cubic_box(3.0, positions, [false; 3]);
        assert_eq!(find_fragments(&periodic, 1.0).len(), 1);
        assert_eq!(find_fragments(&open, 1.0).len(), 2);
    }

    #[test]
    fn find_fragments_orders_ties_by_smallest_index() {
        let s = cubic_box(
            30.0,
            vec![Point3::new(20.0, 5.0, 5.0), Point3::new(5.0, 5.0, 5.0)],
            [false; 3],
        );
        let fragments = find_fragments(&s, 1.0);
        assert_eq!(fragments[0].indices, vec![0]);
        assert_eq!(fragments[1].indices, vec![1]);
    }

    #[test]
    fn find_fragments_of_empty_structure_is_empty() {
        let s = cubic_box(3.0, vec![], [true; 3]);
        assert!(find_fragments(&s, 1.0).is_empty());
    }

    #[test]
    fn fragment_span_reports_coordinate_range() {
        let s = cubic_box(
            30.0,
            vec![Point3::new(5.0, 5.0, 5.0), Point3::new(6.4, 5.0, 5.0)],
            [false; 3],
        );
        let fragments = find_fragments(&s, 1.0);
        assert_eq!(fragments[0].span(0), (5.0, 6.4));
        assert!((fragments[0].mean_z() - 5.0).abs() < 1e-12);
    }
}
