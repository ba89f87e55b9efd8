//! UV-mapped output mesh.

use nalgebra::{Point2, Point3};

use super::index::VertexId;

/// Where `v = 0` lies in the texture image.
///
/// Consumers disagree on this: glTF and DirectX put the origin at the top-left
/// texel, OBJ and OpenGL at the bottom-left. The pipeline never guesses; the
/// caller picks one in [`BakeOptions`](crate::pipeline::BakeOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UvOrigin {
    /// `v = 0` is the first (top) row of the image.
    #[default]
    TopLeft,
    /// `v = 0` is the last (bottom) row of the image.
    BottomLeft,
}

impl UvOrigin {
    /// Convert a UV expressed in the top-left convention into this convention.
    #[inline]
    pub fn from_top_left(self, uv: Point2<f64>) -> Point2<f64> {
        match self {
            UvOrigin::TopLeft => uv,
            UvOrigin::BottomLeft => Point2::new(uv.x, 1.0 - uv.y),
        }
    }

    /// Convert a UV expressed in this convention into the top-left convention.
    #[inline]
    pub fn to_top_left(self, uv: Point2<f64>) -> Point2<f64> {
        // The flip is its own inverse.
        self.from_top_left(uv)
    }
}

/// A triangle mesh with one UV coordinate per vertex and no vertex colors.
///
/// Produced by the mesh rewriter. Vertices shared by triangles with different
/// UVs in the input have been duplicated, so `num_vertices()` is at least the
/// input vertex count.
#[derive(Debug, Clone, PartialEq)]
pub struct TexturedMesh {
    pub(crate) positions: Vec<Point3<f64>>,
    pub(crate) uvs: Vec<Point2<f64>>,
    pub(crate) triangles: Vec<[VertexId; 3]>,
    pub(crate) source_vertex: Vec<VertexId>,
    pub(crate) uv_origin: UvOrigin,
}

impl TexturedMesh {
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

    /// Vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Vertex UV coordinates in [`uv_origin`](Self::uv_origin) convention.
    #[inline]
    pub fn uvs(&self) -> &[Point2<f64>] {
        &self.uvs
    }

    /// Triangles, in the same order as the input mesh.
    #[inline]
    pub fn triangles(&self) -> &[[VertexId; 3]] {
        &self.triangles
    }

    /// The input vertex each output vertex was copied from.
    #[inline]
    pub fn source_vertex(&self, v: VertexId) -> VertexId {
        self.source_vertex[v.index()]
    }

    /// UV origin convention of [`uvs`](Self::uvs).
    #[inline]
    pub fn uv_origin(&self) -> UvOrigin {
        self.uv_origin
    }

    /// UVs converted to another origin convention.
    pub fn uvs_in(&self, origin: UvOrigin) -> Vec<Point2<f64>> {
        self.uvs
            .iter()
            .map(|&uv| origin.from_top_left(self.uv_origin.to_top_left(uv)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_origin_flip() {
        let uv = Point2::new(0.25, 0.1);
        assert_eq!(UvOrigin::TopLeft.from_top_left(uv), uv);
        let flipped = UvOrigin::BottomLeft.from_top_left(uv);
        assert!((flipped.y - 0.9).abs() < 1e-12);
        let back = UvOrigin::BottomLeft.to_top_left(flipped);
        assert!((back.y - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_uvs_in_other_origin() {
        let mesh = TexturedMesh {
            positions: vec![Point3::origin(); 1],
            uvs: vec![Point2::new(0.5, 0.2)],
            triangles: Vec::new(),
            source_vertex: vec![VertexId::new(0)],
            uv_origin: UvOrigin::BottomLeft,
        };
        let top_left = mesh.uvs_in(UvOrigin::TopLeft);
        assert!((top_left[0].y - 0.8).abs() < 1e-12);
        let same = mesh.uvs_in(UvOrigin::BottomLeft);
        assert!((same[0] - mesh.uvs()[0]).norm() < 1e-12);
    }
}
