//! Chart building.
//!
//! Partitions the triangles of a [`ColorMesh`] into charts: edge-connected
//! groups whose normals stay close to the chart's mean normal, so each chart
//! can be flattened with little stretching. Every chart is then flattened
//! independently into its own local 2D parameter space.
//!
//! # Algorithm
//!
//! 1. Build the face adjacency graph. Non-manifold edges act as seams.
//! 2. Flag degenerate triangles (area below `degenerate_epsilon` relative to
//!    the squared bounding box diagonal). Each one becomes a single-triangle
//!    chart with all three corners at the local origin.
//! 3. Grow charts breadth-first from seeds taken in triangle order. A
//!    neighbor joins when every member, the neighbor included, satisfies
//!    `1 - n_t · n̄ <= max_distortion` against the area-weighted mean normal
//!    `n̄` of the grown chart.
//! 4. Flatten each chart with LSCM. If the solve fails or folds a triangle
//!    the chart is projected onto its mean plane instead.
//!
//! Since `max_distortion` is kept below 1, every member faces the same side
//! of the chart's mean plane. Charts are therefore never closed surfaces and
//! always have a boundary to pin.

use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};
use nalgebra::{Point2, Point3, Vector3};
use rayon::prelude::*;

use crate::algo::parameterize::{local_frame, lscm, planar_projection, LscmOptions};
use crate::algo::progress::{Progress, Stage};
use crate::error::{BakeError, Diagnostic, DiagnosticStage, Result};
use crate::mesh::{ChartId, ColorMesh, FaceAdjacency, TriangleId, VertexId};

/// Highest distortion threshold honored; larger values are clamped to it.
pub const MAX_DISTORTION_CEILING: f64 = 0.95;

/// Options for chart building.
#[derive(Debug, Clone)]
pub struct ChartOptions {
    /// Largest allowed `1 - n_t · n̄` for any chart member (default: 0.25).
    ///
    /// Lower values produce more, flatter charts. Values above
    /// [`MAX_DISTORTION_CEILING`] are clamped.
    pub max_distortion: f64,

    /// Triangles with area at most `degenerate_epsilon * diagonal²` are
    /// treated as degenerate (default: 1e-12).
    pub degenerate_epsilon: f64,

    /// Solver settings for the conformal flattening.
    pub lscm: LscmOptions,

    /// Whether to flatten charts in parallel (default: true).
    pub parallel: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            max_distortion: 0.25,
            degenerate_epsilon: 1e-12,
            lscm: LscmOptions::default(),
            parallel: true,
        }
    }
}

impl ChartOptions {
    /// Set the distortion threshold for growing charts.
    pub fn with_max_distortion(mut self, max_distortion: f64) -> Self {
        self.max_distortion = max_distortion;
        self
    }

    /// Set the relative area below which triangles are degenerate.
    pub fn with_degenerate_epsilon(mut self, epsilon: f64) -> Self {
        self.degenerate_epsilon = epsilon;
        self
    }

    /// Set the LSCM solver options.
    pub fn with_lscm(mut self, lscm: LscmOptions) -> Self {
        self.lscm = lscm;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.max_distortion.is_finite() || self.max_distortion < 0.0 {
            return Err(BakeError::invalid_param(
                "max_distortion",
                self.max_distortion,
                "must be a finite, non-negative number",
            ));
        }
        if !self.degenerate_epsilon.is_finite() || self.degenerate_epsilon < 0.0 {
            return Err(BakeError::invalid_param(
                "degenerate_epsilon",
                self.degenerate_epsilon,
                "must be a finite, non-negative number",
            ));
        }
        if self.lscm.max_iterations == 0 {
            return Err(BakeError::invalid_param(
                "lscm.max_iterations",
                self.lscm.max_iterations,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A group of triangles sharing one local 2D parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Chart identifier, equal to the chart's position in the output.
    pub id: ChartId,
    /// Member triangles in ascending order.
    pub triangles: Vec<TriangleId>,
    /// Local parameter-space position of each corner, parallel to
    /// `triangles` and following each triangle's vertex order.
    pub uvs: Vec<[Point2<f64>; 3]>,
    /// Total 3D surface area of the members.
    pub area_3d: f64,
    /// Whether this chart holds a single degenerate triangle.
    pub degenerate: bool,
}

impl Chart {
    /// Number of triangles.
    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the chart has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Total unsigned area of the flattened triangles.
    pub fn area_2d(&self) -> f64 {
        self.uvs
            .iter()
            .map(|[a, b, c]| signed_area(a, b, c).abs())
            .sum()
    }

    /// Axis-aligned bounds `(min, max)` of the local parameterization.
    pub fn bounds(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for uv in self.uvs.iter().flatten() {
            min = min.inf(uv);
            max = max.sup(uv);
        }
        if self.uvs.is_empty() {
            return (Point2::origin(), Point2::origin());
        }
        (min, max)
    }
}

/// Partition `mesh` into flattened charts.
///
/// Returns the charts in id order together with the diagnostics raised while
/// building them: non-manifold edges first, then degenerate triangles in
/// triangle order, then flattening fallbacks in chart order.
///
/// # Errors
///
/// Returns [`BakeError::InvalidParameter`] if `options` fails validation.
pub fn build_charts(
    mesh: &ColorMesh,
    options: &ChartOptions,
    progress: &Progress,
) -> Result<(Vec<Chart>, Vec<Diagnostic>)> {
    options.validate()?;
    let threshold = options.max_distortion.min(MAX_DISTORTION_CEILING);

    progress.report(Stage::BuildCharts, 0, 1);
    let (adjacency, mut diagnostics) = FaceAdjacency::build(mesh);
    for diagnostic in &diagnostics {
        warn!("{}", diagnostic);
    }

    let degenerate = flag_degenerate(mesh, options.degenerate_epsilon);
    for t in mesh.triangle_ids().filter(|t| degenerate[t.index()]) {
        let diagnostic = Diagnostic::DegenerateGeometry {
            triangle: t,
            stage: DiagnosticStage::Charting,
        };
        warn!("{}", diagnostic);
        diagnostics.push(diagnostic);
    }

    let groups = grow_charts(mesh, &adjacency, &degenerate, threshold);
    progress.finish(Stage::BuildCharts);
    debug!(
        "grew {} charts from {} triangles (threshold {})",
        groups.len(),
        mesh.num_triangles(),
        threshold
    );

    progress.report(Stage::Flatten, 0, groups.len());
    let flatten = |(i, group): (usize, &Vec<TriangleId>)| {
        let is_degenerate = group.len() == 1 && degenerate[group[0].index()];
        flatten_chart(mesh, ChartId::new(i), group, is_degenerate, &options.lscm)
    };
    let flattened: Vec<(Chart, bool)> = if options.parallel {
        groups.par_iter().enumerate().map(flatten).collect()
    } else {
        groups.iter().enumerate().map(flatten).collect()
    };
    progress.finish(Stage::Flatten);

    let mut charts = Vec::with_capacity(flattened.len());
    for (chart, fell_back) in flattened {
        if fell_back {
            let diagnostic = Diagnostic::FlatteningFallback { chart: chart.id };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
        }
        charts.push(chart);
    }

    info!(
        "built {} charts ({} degenerate)",
        charts.len(),
        charts.iter().filter(|c| c.degenerate).count()
    );
    Ok((charts, diagnostics))
}

fn flag_degenerate(mesh: &ColorMesh, epsilon: f64) -> Vec<bool> {
    let diagonal_sq = mesh
        .bounding_box()
        .map(|(min, max)| (max - min).norm_squared())
        .unwrap_or(0.0);
    let limit = epsilon * diagonal_sq;
    mesh.triangle_ids()
        .map(|t| mesh.triangle_area(t) <= limit)
        .collect()
}

/// Breadth-first chart growth. Returns member lists in ascending order.
fn grow_charts(
    mesh: &ColorMesh,
    adjacency: &FaceAdjacency,
    degenerate: &[bool],
    threshold: f64,
) -> Vec<Vec<TriangleId>> {
    let n = mesh.num_triangles();
    let normals: Vec<Vector3<f64>> = mesh.triangle_ids().map(|t| mesh.triangle_normal(t)).collect();
    let areas: Vec<f64> = mesh.triangle_ids().map(|t| mesh.triangle_area(t)).collect();
    let min_cos = 1.0 - threshold;

    let mut assigned = vec![false; n];
    let mut charts = Vec::new();

    for seed in 0..n {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let seed_id = TriangleId::new(seed);
        if degenerate[seed] {
            charts.push(vec![seed_id]);
            continue;
        }

        let mut cone = NormalCone::new(normals[seed], areas[seed], min_cos);
        let mut members = vec![seed_id];
        let mut queue = VecDeque::from([seed_id]);

        while let Some(t) = queue.pop_front() {
            for &neighbor in adjacency.neighbors(t) {
                let i = neighbor.index();
                if assigned[i] || degenerate[i] {
                    continue;
                }
                if cone.try_add(&members, &normals, normals[i], areas[i]) {
                    assigned[i] = true;
                    members.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }

        members.sort_unstable();
        charts.push(members);
    }

    charts
}

/// Running mean normal of a growing chart with a bound on member spread.
///
/// `spread` is an upper bound on the angle between any member normal and the
/// mean axis. Moving the axis by `drift` moves every member by at most
/// `drift`, so the exact per-member check only runs once the bound exceeds
/// the allowed angle.
struct NormalCone {
    sum: Vector3<f64>,
    axis: Vector3<f64>,
    spread: f64,
    min_cos: f64,
    max_angle: f64,
}

impl NormalCone {
    fn new(normal: Vector3<f64>, area: f64, min_cos: f64) -> Self {
        Self {
            sum: normal * area,
            axis: normal,
            spread: 0.0,
            min_cos,
            max_angle: min_cos.clamp(-1.0, 1.0).acos(),
        }
    }

    /// Add the candidate if the grown chart stays within the threshold.
    fn try_add(
        &mut self,
        members: &[TriangleId],
        normals: &[Vector3<f64>],
        normal: Vector3<f64>,
        area: f64,
    ) -> bool {
        let sum = self.sum + normal * area;
        let Some(axis) = sum.try_normalize(1e-300) else {
            return false;
        };
        if normal.dot(&axis) < self.min_cos {
            return false;
        }

        let candidate = angle_between(&normal, &axis);
        let bound = self.spread + angle_between(&self.axis, &axis);
        let spread = if bound <= self.max_angle {
            bound.max(candidate)
        } else {
            let mut worst = candidate;
            for m in members {
                let n = &normals[m.index()];
                if n.dot(&axis) < self.min_cos {
                    return false;
                }
                worst = worst.max(angle_between(n, &axis));
            }
            worst
        };

        self.sum = sum;
        self.axis = axis;
        self.spread = spread;
        true
    }
}

#[inline]
fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

#[inline]
fn signed_area(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

/// Flatten one chart. The flag is set when the planar fallback was used.
fn flatten_chart(
    mesh: &ColorMesh,
    id: ChartId,
    triangles: &[TriangleId],
    degenerate: bool,
    lscm_options: &LscmOptions,
) -> (Chart, bool) {
    let area_3d: f64 = triangles.iter().map(|&t| mesh.triangle_area(t)).sum();
    let chart = |uvs: Vec<[Point2<f64>; 3]>| Chart {
        id,
        triangles: triangles.to_vec(),
        uvs,
        area_3d,
        degenerate,
    };

    if degenerate {
        return (chart(vec![[Point2::origin(); 3]; triangles.len()]), false);
    }

    let (positions, faces) = local_patch(mesh, triangles);

    if let [[a, b, c]] = faces.as_slice() {
        if let Some(frame) = local_frame(&positions[*a], &positions[*b], &positions[*c]) {
            let mut uvs = vec![frame];
            align_bounding_box(&mut uvs);
            return (chart(uvs), false);
        }
    }

    let (vertex_uvs, fell_back) = match lscm(&positions, &faces, lscm_options) {
        Ok(uvs) => match orientation(&uvs, &faces, area_3d) {
            Orientation::Positive => (uvs, false),
            Orientation::Negative => (uvs.iter().map(|p| Point2::new(-p.x, p.y)).collect(), false),
            Orientation::Folded => {
                debug!("{:?}: conformal map folds, projecting onto mean plane", id);
                (planar_projection(&positions, &faces), true)
            }
        },
        Err(err) => {
            debug!("{:?}: {}, projecting onto mean plane", id, err);
            (planar_projection(&positions, &faces), true)
        }
    };

    let mut uvs: Vec<[Point2<f64>; 3]> = faces
        .iter()
        .map(|f| [vertex_uvs[f[0]], vertex_uvs[f[1]], vertex_uvs[f[2]]])
        .collect();
    align_bounding_box(&mut uvs);
    (chart(uvs), fell_back)
}

/// Rotate a flattened chart so its minimum-area bounding rectangle is
/// axis-aligned.
///
/// The optimal rectangle has a side collinear with a convex hull edge, so
/// only hull edge directions are tried.
fn align_bounding_box(uvs: &mut [[Point2<f64>; 3]]) {
    let hull = convex_hull(uvs.iter().flatten().copied().collect());
    if hull.len() < 3 {
        return;
    }

    let mut best: Option<(f64, f64, f64)> = None;
    for (i, p) in hull.iter().enumerate() {
        let edge = hull[(i + 1) % hull.len()] - p;
        let len = edge.norm();
        if len < 1e-300 {
            continue;
        }
        let (cos, sin) = (edge.x / len, edge.y / len);

        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for q in &hull {
            let r = Point2::new(cos * q.x + sin * q.y, cos * q.y - sin * q.x);
            min = min.inf(&r);
            max = max.sup(&r);
        }
        let area = (max.x - min.x) * (max.y - min.y);
        if best.map_or(true, |(a, _, _)| area < a) {
            best = Some((area, cos, sin));
        }
    }

    if let Some((_, cos, sin)) = best {
        for uv in uvs.iter_mut().flatten() {
            *uv = Point2::new(cos * uv.x + sin * uv.y, cos * uv.y - sin * uv.x);
        }
    }
}

/// Counter-clockwise convex hull (monotone chain), collinear points dropped.
fn convex_hull(mut points: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut hull = half_hull(points.iter());
    hull.extend(half_hull(points.iter().rev()));
    hull
}

fn half_hull<'a>(points: impl Iterator<Item = &'a Point2<f64>>) -> Vec<Point2<f64>> {
    let mut half: Vec<Point2<f64>> = Vec::new();
    for p in points {
        while let [.., o, a] = half.as_slice() {
            if (a.x - o.x) * (p.y - o.y) - (a.y - o.y) * (p.x - o.x) > 0.0 {
                break;
            }
            half.pop();
        }
        half.push(*p);
    }
    half.pop();
    half
}

/// Chart-local copy of the member vertices, numbered by first use.
fn local_patch(mesh: &ColorMesh, triangles: &[TriangleId]) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut local: HashMap<VertexId, usize> = HashMap::new();
    let mut positions = Vec::new();
    let mut faces = Vec::with_capacity(triangles.len());

    for &t in triangles {
        let mut face = [0usize; 3];
        for (slot, v) in face.iter_mut().zip(mesh.triangle(t)) {
            *slot = *local.entry(v).or_insert_with(|| {
                positions.push(*mesh.position(v));
                positions.len() - 1
            });
        }
        faces.push(face);
    }

    (positions, faces)
}

enum Orientation {
    Positive,
    Negative,
    Folded,
}

/// Classify a flattening by the signs of its triangle areas.
///
/// Mixed signs, zero-area triangles, non-finite coordinates or a total area
/// collapsed far below the 3D area all count as folded.
fn orientation(uvs: &[Point2<f64>], faces: &[[usize; 3]], area_3d: f64) -> Orientation {
    if uvs.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Orientation::Folded;
    }

    let mut positive = 0;
    let mut negative = 0;
    let mut total = 0.0;
    for f in faces {
        let area = signed_area(&uvs[f[0]], &uvs[f[1]], &uvs[f[2]]);
        if area > 0.0 {
            positive += 1;
        } else if area < 0.0 {
            negative += 1;
        }
        total += area.abs();
    }

    if total <= 1e-9 * area_3d {
        Orientation::Folded
    } else if positive == faces.len() {
        Orientation::Positive
    } else if negative == faces.len() {
        Orientation::Negative
    } else {
        Orientation::Folded
    }
}
