//! Least Squares Conformal Maps (LSCM) parameterization.
//!
//! LSCM computes an angle-preserving flattening of a triangle patch with
//! boundary by minimizing the discrete conformal energy. Two boundary vertices
//! are pinned to remove the similarity-transform null space.
//!
//! # References
//!
//! - Lévy, B., Petitjean, S., Ray, N., & Maillot, J. (2002). "Least squares
//!   conformal maps for automatic texture atlas generation." ACM SIGGRAPH.

use std::collections::HashMap;

use nalgebra::{DVector, Point2, Point3};

use crate::error::{BakeError, Result};

use super::planar::planar_projection;
use super::sparse::{conjugate_gradient_from, CsrMatrix};

/// Options for LSCM parameterization.
#[derive(Debug, Clone)]
pub struct LscmOptions {
    /// Maximum iterations for the conjugate gradient solver. The solver is
    /// always allowed at least one iteration per unknown.
    pub max_iterations: usize,

    /// Convergence tolerance for the CG solver (relative residual).
    pub tolerance: f64,
}

impl Default for LscmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

impl LscmOptions {
    /// Set the maximum CG iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }
}

/// A vertex pinned to a fixed UV coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinnedVertex {
    /// Local vertex index.
    pub vertex: usize,
    /// The fixed coordinate.
    pub uv: Point2<f64>,
}

/// Compute an LSCM flattening of a triangle patch.
///
/// `positions` and `faces` describe the patch with local vertex indices. The
/// result holds one UV per local vertex, in units comparable to the 3D edge
/// lengths (the pins are placed at their 3D distance apart).
///
/// # Errors
///
/// - [`BakeError::InvalidParameter`] if the patch has no faces or no boundary
/// - [`BakeError::ConvergenceFailed`] if the solver does not converge
pub fn lscm(
    positions: &[Point3<f64>],
    faces: &[[usize; 3]],
    options: &LscmOptions,
) -> Result<Vec<Point2<f64>>> {
    if faces.is_empty() {
        return Err(BakeError::invalid_param("faces", 0, "patch has no faces"));
    }

    let boundary = boundary_vertices(faces, positions.len());
    if boundary.len() < 2 {
        return Err(BakeError::invalid_param(
            "boundary",
            boundary.len(),
            "patch must have a boundary to be flattened",
        ));
    }

    let (pin0, pin1) = select_pins(positions, &boundary);
    let system = build_system(positions, faces, &pin0, &pin1);
    let guess = initial_guess(positions, faces, &pin0, &pin1, &system);
    let max_iterations = options.max_iterations.max(system.rhs.len());
    let solution = conjugate_gradient_from(
        &system.matrix,
        &system.rhs,
        guess,
        max_iterations,
        options.tolerance,
    )?;

    let n = positions.len();
    let coord = |i: usize| solution[system.free_index[i]];
    let mut uvs = vec![Point2::origin(); n];
    for (v, uv) in uvs.iter_mut().enumerate() {
        if v != pin0.vertex && v != pin1.vertex {
            *uv = Point2::new(coord(v), coord(n + v));
        }
    }
    uvs[pin0.vertex] = pin0.uv;
    uvs[pin1.vertex] = pin1.uv;

    Ok(uvs)
}

/// Vertices on at least one edge used by a single face, in ascending order.
fn boundary_vertices(faces: &[[usize; 3]], n_vertices: usize) -> Vec<usize> {
    let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
    for face in faces {
        for i in 0..3 {
            let a = face[i];
            let b = face[(i + 1) % 3];
            let edge = if a < b { (a, b) } else { (b, a) };
            *edge_count.entry(edge).or_insert(0) += 1;
        }
    }

    let mut is_boundary = vec![false; n_vertices];
    for ((a, b), count) in edge_count {
        if count == 1 {
            is_boundary[a] = true;
            is_boundary[b] = true;
        }
    }

    (0..n_vertices).filter(|&i| is_boundary[i]).collect()
}

/// Pick two far-apart boundary vertices with a double sweep.
///
/// The first pin goes to the origin, the second onto the positive u axis at
/// the 3D distance between the two.
fn select_pins(positions: &[Point3<f64>], boundary: &[usize]) -> (PinnedVertex, PinnedVertex) {
    let farthest_from = |origin: usize| -> usize {
        let mut best = origin;
        let mut best_dist = -1.0;
        for &v in boundary {
            let d = (positions[v] - positions[origin]).norm_squared();
            if d > best_dist {
                best_dist = d;
                best = v;
            }
        }
        best
    };

    let a = farthest_from(boundary[0]);
    let mut b = farthest_from(a);
    if b == a {
        // All boundary vertices coincide; any other vertex serves.
        b = boundary.iter().copied().find(|&v| v != a).unwrap_or(a);
    }

    let dist = (positions[b] - positions[a]).norm().max(1e-12);
    (
        PinnedVertex {
            vertex: a,
            uv: Point2::origin(),
        },
        PinnedVertex {
            vertex: b,
            uv: Point2::new(dist, 0.0),
        },
    )
}

/// Build the normal equations of the area-weighted conformal energy.
///
/// Unknowns are ordered `[u_0 .. u_{n-1}, v_0 .. v_{n-1}]`. The four pinned
/// coordinates are eliminated: the returned system covers the free unknowns
/// only, and `free_index` maps each full unknown to its reduced row.
fn build_system(
    positions: &[Point3<f64>],
    faces: &[[usize; 3]],
    pin0: &PinnedVertex,
    pin1: &PinnedVertex,
) -> ReducedSystem {
    let n = positions.len();

    let mut pinned: Vec<Option<f64>> = vec![None; 2 * n];
    for pin in [pin0, pin1] {
        pinned[pin.vertex] = Some(pin.uv.x);
        pinned[n + pin.vertex] = Some(pin.uv.y);
    }

    let mut free_index = vec![usize::MAX; 2 * n];
    let mut n_free = 0;
    for (i, p) in pinned.iter().enumerate() {
        if p.is_none() {
            free_index[i] = n_free;
            n_free += 1;
        }
    }

    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(faces.len() * 36);
    let mut rhs = DVector::zeros(n_free);

    let mut add = |row: usize, col: usize, value: f64| {
        if pinned[row].is_some() {
            return;
        }
        match pinned[col] {
            Some(fixed) => rhs[free_index[row]] -= value * fixed,
            None => triplets.push((free_index[row], free_index[col], value)),
        }
    };

    for face in faces {
        let Some(local) = local_frame(&positions[face[0]], &positions[face[1]], &positions[face[2]])
        else {
            continue;
        };
        let [q0, q1, q2] = local;
        let area = 0.5 * ((q1.x - q0.x) * (q2.y - q0.y) - (q2.x - q0.x) * (q1.y - q0.y));
        let inv_2a = 1.0 / (2.0 * area);

        // Gradient of the hat function of each corner.
        let grads = [
            ((q1.y - q2.y) * inv_2a, (q2.x - q1.x) * inv_2a),
            ((q2.y - q0.y) * inv_2a, (q0.x - q2.x) * inv_2a),
            ((q0.y - q1.y) * inv_2a, (q1.x - q0.x) * inv_2a),
        ];

        for (a, &(ax_i, ay_i)) in grads.iter().enumerate() {
            for (b, &(ax_j, ay_j)) in grads.iter().enumerate() {
                let vi = face[a];
                let vj = face[b];
                let uu = (ax_i * ax_j + ay_i * ay_j) * area;
                let uv = (ay_i * ax_j - ax_i * ay_j) * area;

                add(vi, vj, uu);
                add(n + vi, n + vj, uu);
                add(vi, n + vj, uv);
                add(n + vi, vj, -uv);
            }
        }
    }

    ReducedSystem {
        matrix: CsrMatrix::from_triplets(n_free, n_free, triplets),
        rhs,
        free_index,
    }
}

struct ReducedSystem {
    matrix: CsrMatrix,
    rhs: DVector<f64>,
    free_index: Vec<usize>,
}

/// Mean-plane projection moved by the similarity that takes it onto the pins,
/// restricted to the free unknowns.
fn initial_guess(
    positions: &[Point3<f64>],
    faces: &[[usize; 3]],
    pin0: &PinnedVertex,
    pin1: &PinnedVertex,
    system: &ReducedSystem,
) -> DVector<f64> {
    let n = positions.len();
    let mut x = DVector::zeros(system.rhs.len());

    let planar = planar_projection(positions, faces);
    let origin = planar[pin0.vertex];
    let d = planar[pin1.vertex] - origin;
    let len_sq = d.norm_squared();
    if len_sq < 1e-300 {
        return x;
    }

    // Complex ratio (pin1 - pin0) / d as a rotation and scale.
    let t = pin1.uv - pin0.uv;
    let (c, s) = ((t.x * d.x + t.y * d.y) / len_sq, (t.y * d.x - t.x * d.y) / len_sq);

    for (v, p) in planar.iter().enumerate() {
        let q = p - origin;
        let u = pin0.uv.x + c * q.x - s * q.y;
        let w = pin0.uv.y + s * q.x + c * q.y;
        if let Some(&row) = system.free_index.get(v).filter(|&&r| r != usize::MAX) {
            x[row] = u;
        }
        if let Some(&row) = system.free_index.get(n + v).filter(|&&r| r != usize::MAX) {
            x[row] = w;
        }
    }
    x
}

/// Isometric 2D layout of a 3D triangle: first corner at the origin, first
/// edge along +x, third corner above the x axis.
///
/// Returns `None` for a degenerate triangle.
pub fn local_frame(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<[Point2<f64>; 3]> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let e1_len = e1.norm();
    let normal = e1.cross(&e2);
    if e1_len < 1e-300 || normal.norm() < 1e-300 {
        return None;
    }
    let x_axis = e1 / e1_len;
    let y_axis = normal.cross(&e1).normalize();

    Some([
        Point2::origin(),
        Point2::new(e1_len, 0.0),
        Point2::new(e2.dot(&x_axis), e2.dot(&y_axis)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
        0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
    }

    fn grid(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let mut positions = Vec::new();
        let mut faces = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                positions.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + n + 1;
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        (positions, faces)
    }

    #[test]
    fn test_local_frame_is_isometric() {
        let p0 = Point3::new(1.0, 1.0, 1.0);
        let p1 = Point3::new(1.0, 4.0, 1.0);
        let p2 = Point3::new(1.0, 1.0, 5.0);
        let [q0, q1, q2] = local_frame(&p0, &p1, &p2).unwrap();
        assert!(((q1 - q0).norm() - 3.0).abs() < 1e-12);
        assert!(((q2 - q0).norm() - 4.0).abs() < 1e-12);
        assert!(((q2 - q1).norm() - 5.0).abs() < 1e-12);
        assert!(q2.y > 0.0);
    }

    #[test]
    fn test_local_frame_degenerate() {
        let p = Point3::new(0.0, 0.0, 0.0);
        let q = Point3::new(1.0, 0.0, 0.0);
        let r = Point3::new(2.0, 0.0, 0.0);
        assert!(local_frame(&p, &q, &r).is_none());
    }

    #[test]
    fn test_lscm_flat_grid_is_similarity() {
        // A planar grid has a zero-energy conformal map: the result must be a
        // similarity transform of the input, so edge length ratios survive.
        let (positions, faces) = grid(3);
        let uvs = lscm(&positions, &faces, &LscmOptions::default()).unwrap();
        assert_eq!(uvs.len(), 16);

        let scale = (uvs[1] - uvs[0]).norm();
        assert!(scale > 0.0);
        for face in &faces {
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                let len3 = (positions[b] - positions[a]).norm();
                let len2 = (uvs[b] - uvs[a]).norm();
                assert!((len2 / scale - len3).abs() < 1e-5, "edge ({}, {})", a, b);
            }
        }
    }

    #[test]
    fn test_lscm_preserves_orientation() {
        let (positions, faces) = grid(2);
        let uvs = lscm(&positions, &faces, &LscmOptions::default()).unwrap();
        for f in &faces {
            assert!(signed_area(uvs[f[0]], uvs[f[1]], uvs[f[2]]) > 0.0);
        }
    }

    #[test]
    fn test_lscm_bent_strip() {
        // Two quads folded 90 degrees along a shared edge.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let faces = vec![[0, 1, 3], [0, 3, 2], [2, 3, 5], [2, 5, 4]];
        let uvs = lscm(&positions, &faces, &LscmOptions::default()).unwrap();
        let total: f64 = faces
            .iter()
            .map(|f| signed_area(uvs[f[0]], uvs[f[1]], uvs[f[2]]))
            .sum();
        // Developable surface: unfolds to a 1x2 rectangle up to pin scale.
        let pin_scale = (uvs[1] - uvs[0]).norm();
        assert!(total > 0.0);
        assert!((total / (pin_scale * pin_scale) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_dense_curved_patch_converges() {
        // 3200 triangles on a gentle paraboloid. The iteration cap grows with
        // the unknowns, so a small configured cap does not force a failure.
        let (mut positions, faces) = grid(40);
        for p in &mut positions {
            let (x, y) = (p.x / 40.0 - 0.5, p.y / 40.0 - 0.5);
            p.z = 8.0 * (x * x + y * y);
        }
        let options = LscmOptions::default().with_max_iterations(10);
        let uvs = lscm(&positions, &faces, &options).unwrap();
        for f in &faces {
            assert!(signed_area(uvs[f[0]], uvs[f[1]], uvs[f[2]]) > 0.0);
        }
    }

    #[test]
    fn test_flat_patch_converges_from_projection() {
        // The projection of a planar patch already is its conformal map.
        let (positions, faces) = grid(30);
        let options = LscmOptions::default().with_max_iterations(1);
        let uvs = lscm(&positions, &faces, &options).unwrap();
        let scale = (uvs[1] - uvs[0]).norm();
        assert!(((uvs[31] - uvs[0]).norm() / scale - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_patch_rejected() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let err = lscm(&positions, &faces, &LscmOptions::default()).unwrap_err();
        assert!(matches!(err, BakeError::InvalidParameter { name: "boundary", .. }));
    }

    #[test]
    fn test_boundary_vertices() {
        assert_eq!(boundary_vertices(&[[0, 1, 2]], 3), vec![0, 1, 2]);
        let (_, faces) = grid(2);
        // Only the center of a 3x3 vertex grid is interior.
        assert_eq!(boundary_vertices(&faces, 9).len(), 8);
    }
}
