//! Mesh rewriting.
//!
//! Attaches the packed UVs to the mesh. A rendering vertex carries exactly
//! one UV, so an input vertex is duplicated for every distinct UV its
//! corners receive: once per chart it appears in, and again if a chart gives
//! it more than one UV.
//!
//! Output vertices live in an arena keyed by `(input vertex, chart)`. The
//! first use of each input vertex keeps its index, so the output begins
//! with the input vertices in their original order and duplicates follow.

use std::collections::HashMap;

use log::debug;
use nalgebra::Point2;

use crate::algo::chart::Chart;
use crate::algo::pack::AtlasLayout;
use crate::algo::progress::{Progress, Stage};
use crate::mesh::{ChartId, ColorMesh, TexturedMesh, UvOrigin, VertexId};

/// UVs closer than this are the same.
const UV_EPSILON: f64 = 1e-9;

/// Build the UV-mapped mesh for a packed layout.
///
/// Triangles keep their order; corners are rewired to the output vertices.
/// Input vertices no triangle references keep their index with UV `(0, 0)`.
pub fn rewrite_mesh(
    mesh: &ColorMesh,
    charts: &[Chart],
    layout: &AtlasLayout,
    uv_origin: UvOrigin,
    progress: &Progress,
) -> TexturedMesh {
    progress.report(Stage::Rewrite, 0, 1);

    let n = mesh.num_vertices();
    let mut positions = mesh.positions().to_vec();
    let mut uvs = vec![Point2::origin(); n];
    let mut source_vertex: Vec<VertexId> = (0..n).map(VertexId::new).collect();
    let mut claimed = vec![false; n];
    let mut triangles = mesh.triangles().to_vec();

    let mut arena: HashMap<(VertexId, ChartId), Vec<VertexId>> = HashMap::new();

    for chart in charts {
        for (&t, corners) in chart.triangles.iter().zip(&chart.uvs) {
            let input = mesh.triangle(t);
            let mut output = [VertexId::new(0); 3];

            for ((slot, &v), local) in output.iter_mut().zip(&input).zip(corners) {
                let uv = layout.to_uv(chart.id, local);
                let copies = arena.entry((v, chart.id)).or_default();

                let existing = copies
                    .iter()
                    .copied()
                    .find(|c| (uvs[c.index()] - uv).norm() <= UV_EPSILON);
                *slot = match existing {
                    Some(copy) => copy,
                    None => {
                        let copy = if claimed[v.index()] {
                            positions.push(*mesh.position(v));
                            uvs.push(uv);
                            source_vertex.push(v);
                            VertexId::new(positions.len() - 1)
                        } else {
                            claimed[v.index()] = true;
                            uvs[v.index()] = uv;
                            v
                        };
                        copies.push(copy);
                        copy
                    }
                };
            }

            triangles[t.index()] = output;
        }
    }

    let duplicates = positions.len() - n;
    for uv in &mut uvs {
        debug_assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
        *uv = uv_origin.from_top_left(*uv);
    }

    progress.finish(Stage::Rewrite);
    debug!("rewrote mesh: {} vertices ({} split along seams)", positions.len(), duplicates);

    TexturedMesh {
        positions,
        uvs,
        triangles,
        source_vertex,
        uv_origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::chart::{build_charts, ChartOptions};
    use crate::algo::pack::{pack_charts, AtlasOptions};
    use crate::mesh::{build_color_mesh, TriangleId};
    use crate::test_util::{cube, grid, solid_mesh};
    use nalgebra::Point3;

    fn rewrite(mesh: &ColorMesh, origin: UvOrigin) -> (Vec<Chart>, AtlasLayout, TexturedMesh) {
        let (charts, _) = build_charts(mesh, &ChartOptions::default(), &Progress::none()).unwrap();
        let layout = pack_charts(&charts, &AtlasOptions::default(), &Progress::none()).unwrap();
        let out = rewrite_mesh(mesh, &charts, &layout, origin, &Progress::none());
        (charts, layout, out)
    }

    #[test]
    fn test_single_chart_keeps_vertices() {
        let (positions, faces) = grid(3);
        let mesh = solid_mesh(positions, &faces, [1.0, 1.0, 1.0]);
        let (_, _, out) = rewrite(&mesh, UvOrigin::TopLeft);

        assert_eq!(out.num_vertices(), mesh.num_vertices());
        assert_eq!(out.triangles(), mesh.triangles());
        for v in 0..out.num_vertices() {
            assert_eq!(out.source_vertex(VertexId::new(v)), VertexId::new(v));
        }
    }

    #[test]
    fn test_cube_splits_shared_corners() {
        let mesh = cube([1.0, 0.0, 0.0]);
        let (charts, layout, out) = rewrite(&mesh, UvOrigin::TopLeft);

        // Six separate faces of four corners each.
        assert_eq!(out.num_vertices(), 24);
        assert_eq!(out.num_triangles(), 12);

        for chart in &charts {
            for (&t, corners) in chart.triangles.iter().zip(&chart.uvs) {
                let tri = out.triangles()[t.index()];
                for (v, local) in tri.iter().zip(corners) {
                    let expected = layout.to_uv(chart.id, local);
                    assert!((out.uvs()[v.index()] - expected).norm() < 1e-9);
                    let source = out.source_vertex(*v);
                    assert_eq!(out.positions()[v.index()], *mesh.position(source));
                }
            }
        }
        for uv in out.uvs() {
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
        }
    }

    #[test]
    fn test_bottom_left_origin_flips_v() {
        let mesh = cube([1.0, 0.0, 0.0]);
        let (_, _, top) = rewrite(&mesh, UvOrigin::TopLeft);
        let (_, _, bottom) = rewrite(&mesh, UvOrigin::BottomLeft);

        assert_eq!(bottom.uv_origin(), UvOrigin::BottomLeft);
        for (a, b) in top.uvs().iter().zip(bottom.uvs()) {
            assert!((a.x - b.x).abs() < 1e-12);
            assert!((a.y - (1.0 - b.y)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unreferenced_vertex_keeps_index() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(9.0, 9.0, 9.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let colors: Vec<[f32; 3]> = vec![[1.0, 1.0, 1.0]; 4];
        let mesh = build_color_mesh(&positions, &colors, &[[0, 2, 3]]).unwrap();
        let (_, _, out) = rewrite(&mesh, UvOrigin::TopLeft);

        assert_eq!(out.num_vertices(), 4);
        assert_eq!(out.uvs()[1], Point2::origin());
        assert_eq!(out.positions()[1], Point3::new(9.0, 9.0, 9.0));
        assert_eq!(
            out.triangles()[TriangleId::new(0).index()],
            [VertexId::new(0), VertexId::new(2), VertexId::new(3)]
        );
    }
}
