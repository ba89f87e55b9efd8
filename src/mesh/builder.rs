//! Mesh construction and validation.
//!
//! Loaders hand over raw positions, colors and face index lists. This module
//! checks every structural precondition the pipeline relies on before any
//! stage runs.

use nalgebra::{Point3, Vector4};

use super::colored::{ColorChannels, ColorMesh, Rgba};
use super::index::VertexId;
use crate::error::{InvalidMeshReason, Result};

/// Build a vertex-colored mesh from face-vertex lists.
///
/// `colors` holds one entry per position with either 3 (RGB) or 4 (RGBA)
/// components in `[0, 1]`; all entries must have the same length. Component
/// values outside `[0, 1]` are clamped.
///
/// # Errors
///
/// Returns [`BakeError::InvalidMesh`](crate::error::BakeError::InvalidMesh) if
/// the mesh is empty or too large for 32-bit indices, an index is out of
/// range or repeated within a face, the color count or channel count is
/// inconsistent, or a value is not finite.
///
/// # Example
///
/// ```
/// use vertexbake::mesh::build_color_mesh;
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let colors: Vec<[f32; 3]> = vec![[1.0, 0.0, 0.0]; 3];
/// let mesh = build_color_mesh(&positions, &colors, &[[0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
pub fn build_color_mesh<C: AsRef<[f32]>>(
    positions: &[Point3<f64>],
    colors: &[C],
    triangles: &[[usize; 3]],
) -> Result<ColorMesh> {
    let faces: Vec<&[usize]> = triangles.iter().map(|t| t.as_slice()).collect();
    build_validated(positions, colors, &faces)
}

/// Build a vertex-colored mesh from arbitrary polygon index lists.
///
/// Loaders that do not triangulate hand their faces over here; any face that is
/// not a triangle is rejected with
/// [`InvalidMeshReason::NonTriangleFace`](crate::error::InvalidMeshReason::NonTriangleFace).
/// All other checks match [`build_color_mesh`].
pub fn build_color_mesh_from_polygons<C: AsRef<[f32]>>(
    positions: &[Point3<f64>],
    colors: &[C],
    faces: &[Vec<usize>],
) -> Result<ColorMesh> {
    let faces: Vec<&[usize]> = faces.iter().map(|f| f.as_slice()).collect();
    build_validated(positions, colors, &faces)
}

fn build_validated<C: AsRef<[f32]>>(
    positions: &[Point3<f64>],
    colors: &[C],
    faces: &[&[usize]],
) -> Result<ColorMesh> {
    if faces.is_empty() {
        return Err(InvalidMeshReason::EmptyMesh.into());
    }
    check_index_range(positions.len(), faces.len())?;

    if colors.len() != positions.len() {
        return Err(InvalidMeshReason::ColorCountMismatch {
            positions: positions.len(),
            colors: colors.len(),
        }
        .into());
    }

    for (vi, p) in positions.iter().enumerate() {
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(InvalidMeshReason::NonFiniteValue { vertex: vi }.into());
        }
    }

    let channels = validate_colors(colors)?;
    let triangles = validate_faces(faces, positions.len())?;

    let colors = colors
        .iter()
        .map(|c| to_rgba(c.as_ref()))
        .collect::<Vec<_>>();

    Ok(ColorMesh {
        positions: positions.to_vec(),
        colors,
        triangles,
        channels,
    })
}

/// Every input vertex and every triangle corner of the rewritten mesh must
/// fit a `u32` index.
fn check_index_range(vertices: usize, triangles: usize) -> Result<()> {
    let limit = u32::MAX as usize;
    let rewritten = triangles.checked_mul(3).and_then(|c| c.checked_add(vertices));
    if vertices > limit || triangles > limit || rewritten.map_or(true, |n| n > limit) {
        return Err(InvalidMeshReason::TooLarge { vertices, triangles }.into());
    }
    Ok(())
}

fn validate_colors<C: AsRef<[f32]>>(colors: &[C]) -> Result<ColorChannels> {
    // No colors means no positions; face validation reports that case.
    let expected = colors.first().map(|c| c.as_ref().len()).unwrap_or(3);
    let channels = ColorChannels::from_count(expected).ok_or(
        InvalidMeshReason::InconsistentChannels {
            vertex: 0,
            expected: 3,
            found: expected,
        },
    )?;

    for (vi, c) in colors.iter().enumerate() {
        let c = c.as_ref();
        if c.len() != expected {
            return Err(InvalidMeshReason::InconsistentChannels {
                vertex: vi,
                expected,
                found: c.len(),
            }
            .into());
        }
        if c.iter().any(|x| !x.is_finite()) {
            return Err(InvalidMeshReason::NonFiniteValue { vertex: vi }.into());
        }
    }

    Ok(channels)
}

fn validate_faces(faces: &[&[usize]], num_vertices: usize) -> Result<Vec<[VertexId; 3]>> {
    let mut triangles = Vec::with_capacity(faces.len());

    for (fi, &face) in faces.iter().enumerate() {
        if face.len() != 3 {
            return Err(InvalidMeshReason::NonTriangleFace {
                face: fi,
                count: face.len(),
            }
            .into());
        }
        for &vi in face {
            if vi >= num_vertices {
                return Err(InvalidMeshReason::IndexOutOfRange { face: fi, vertex: vi }.into());
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(InvalidMeshReason::RepeatedIndex { face: fi }.into());
        }
        triangles.push([
            VertexId::new(face[0]),
            VertexId::new(face[1]),
            VertexId::new(face[2]),
        ]);
    }

    Ok(triangles)
}

fn to_rgba(c: &[f32]) -> Rgba {
    let alpha = c.get(3).copied().unwrap_or(1.0);
    Vector4::new(c[0], c[1], c[2], alpha).map(|x| x.clamp(0.0, 1.0))
}
