//! Vertex-colored input mesh.

use nalgebra::{Point3, Vector3, Vector4};

use super::index::{TriangleId, VertexId};

/// A linear RGBA color with components in `[0, 1]`.
pub type Rgba = Vector4<f32>;

/// Number of color channels carried by a mesh or written to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorChannels {
    /// Red, green, blue. Alpha is implicitly 1.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ColorChannels {
    /// Number of channels.
    #[inline]
    pub fn count(self) -> usize {
        match self {
            ColorChannels::Rgb => 3,
            ColorChannels::Rgba => 4,
        }
    }

    /// Channel layout for a given channel count.
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            3 => Some(ColorChannels::Rgb),
            4 => Some(ColorChannels::Rgba),
            _ => None,
        }
    }
}

/// A triangle mesh with one color per vertex and no texture coordinates.
///
/// Constructed through [`build_color_mesh`](super::build_color_mesh), which
/// guarantees that every triangle references three distinct, existing vertices
/// and that every vertex has a color.
#[derive(Debug, Clone)]
pub struct ColorMesh {
    pub(crate) positions: Vec<Point3<f64>>,
    pub(crate) colors: Vec<Rgba>,
    pub(crate) triangles: Vec<[VertexId; 3]>,
    pub(crate) channels: ColorChannels,
}

impl ColorMesh {
    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Channel layout of the input colors.
    #[inline]
    pub fn channels(&self) -> ColorChannels {
        self.channels
    }

    /// Vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Vertex colors.
    #[inline]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Triangle vertex indices.
    #[inline]
    pub fn triangles(&self) -> &[[VertexId; 3]] {
        &self.triangles
    }

    /// Position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.positions[v.index()]
    }

    /// Color of a vertex.
    #[inline]
    pub fn color(&self, v: VertexId) -> Rgba {
        self.colors[v.index()]
    }

    /// Vertices of a triangle.
    #[inline]
    pub fn triangle(&self, t: TriangleId) -> [VertexId; 3] {
        self.triangles[t.index()]
    }

    /// Iterate over all triangle ids.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> {
        (0..self.triangles.len()).map(TriangleId::new)
    }

    /// Corner positions of a triangle.
    pub fn triangle_positions(&self, t: TriangleId) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangle(t);
        [self.positions[a.index()], self.positions[b.index()], self.positions[c.index()]]
    }

    /// Corner colors of a triangle.
    pub fn triangle_colors(&self, t: TriangleId) -> [Rgba; 3] {
        let [a, b, c] = self.triangle(t);
        [self.colors[a.index()], self.colors[b.index()], self.colors[c.index()]]
    }

    /// Unnormalized normal (twice the area, perpendicular to the triangle).
    pub fn triangle_cross(&self, t: TriangleId) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_positions(t);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Area of a triangle.
    pub fn triangle_area(&self, t: TriangleId) -> f64 {
        0.5 * self.triangle_cross(t).norm()
    }

    /// Unit normal of a triangle, or zero for a degenerate triangle.
    pub fn triangle_normal(&self, t: TriangleId) -> Vector3<f64> {
        let n = self.triangle_cross(t);
        let len = n.norm();
        if len > 0.0 {
            n / len
        } else {
            Vector3::zeros()
        }
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        self.triangle_ids().map(|t| self.triangle_area(t)).sum()
    }

    /// Axis-aligned bounding box of all vertices.
    ///
    /// Returns `None` for a mesh without vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.positions {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_color_mesh;

    fn right_triangle() -> ColorMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let colors: Vec<[f32; 3]> = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        build_color_mesh(&positions, &colors, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_triangle_geometry() {
        let mesh = right_triangle();
        let t = TriangleId::new(0);
        assert!((mesh.triangle_area(t) - 2.0).abs() < 1e-12);
        assert!((mesh.triangle_normal(t) - Vector3::z()).norm() < 1e-12);
        assert!((mesh.surface_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box() {
        let mesh = right_triangle();
        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_channel_counts() {
        assert_eq!(ColorChannels::Rgb.count(), 3);
        assert_eq!(ColorChannels::from_count(4), Some(ColorChannels::Rgba));
        assert_eq!(ColorChannels::from_count(2), None);
    }
}
