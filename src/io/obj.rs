//! Wavefront OBJ format support.
//!
//! Input meshes carry their colors in the common `v x y z r g b` extension.
//! Output meshes are written with one `vt` per vertex and a material library
//! that points at the baked texture.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;
use nalgebra::Point3;

use crate::error::{BakeError, Result};
use crate::mesh::{build_color_mesh_from_polygons, ColorMesh, TexturedMesh, UvOrigin};

/// Name of the material written by [`save_textured`].
pub const MATERIAL_NAME: &str = "baked";

/// Load a vertex-colored mesh from an OBJ file.
///
/// All objects and groups in the file are merged into one mesh. Polygons
/// are triangulated; points and lines are ignored. Materials are not read.
///
/// # Errors
///
/// Returns [`BakeError::LoadError`] if the file cannot be parsed or has no
/// vertex colors.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ColorMesh> {
    let path = path.as_ref();
    let load_error = |message: String| BakeError::LoadError {
        path: path.to_path_buf(),
        message,
    };

    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: false,
            triangulate: true,
            ignore_lines: true,
            ignore_points: true,
            ..Default::default()
        },
    )
    .map_err(|e| load_error(e.to_string()))?;

    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut colors: Vec<[f32; 3]> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    for model in &models {
        let mesh = &model.mesh;
        let count = mesh.positions.len() / 3;
        if mesh.vertex_color.len() != mesh.positions.len() {
            return Err(load_error(format!(
                "object '{}' has no per-vertex colors",
                model.name
            )));
        }

        let offset = positions.len();
        positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
        );
        colors.extend(mesh.vertex_color.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
        faces.extend(
            mesh.indices
                .chunks(3)
                .map(|f| f.iter().map(|&i| offset + i as usize).collect()),
        );
        debug!("read object '{}': {} vertices", model.name, count);
    }

    build_color_mesh_from_polygons(&positions, &colors, &faces)
}

/// Write a UV-mapped mesh as OBJ.
///
/// UVs are written with a bottom-left origin as OBJ expects, whatever the
/// mesh's own convention. When `material_library` is given the file
/// references it and uses [`MATERIAL_NAME`].
pub fn save_textured<P: AsRef<Path>>(
    mesh: &TexturedMesh,
    path: P,
    material_library: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Generated by vertexbake")?;
    if let Some(library) = material_library {
        writeln!(writer, "mtllib {}", library)?;
    }

    for p in mesh.positions() {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for uv in mesh.uvs_in(UvOrigin::BottomLeft) {
        writeln!(writer, "vt {} {}", uv.x, uv.y)?;
    }

    if material_library.is_some() {
        writeln!(writer, "usemtl {}", MATERIAL_NAME)?;
    }
    // Positions and UVs share one index.
    for tri in mesh.triangles() {
        let [a, b, c] = tri.map(|v| v.index() + 1);
        writeln!(writer, "f {}/{} {}/{} {}/{}", a, a, b, b, c, c)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a material library with one diffuse-textured material.
pub fn save_material<P: AsRef<Path>>(path: P, texture: &str) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Generated by vertexbake")?;
    writeln!(writer, "newmtl {}", MATERIAL_NAME)?;
    writeln!(writer, "Ka 1 1 1")?;
    writeln!(writer, "Kd 1 1 1")?;
    writeln!(writer, "Ks 0 0 0")?;
    writeln!(writer, "d 1")?;
    writeln!(writer, "illum 1")?;
    writeln!(writer, "map_Kd {}", texture)?;

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ColorChannels;
    use nalgebra::Point2;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_vertex_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "quad.obj",
            "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 1 1 0 0 0 1\nv 0 1 0 1 1 1\nf 1 2 3 4\n",
        );
        let mesh = load(&path).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.channels(), ColorChannels::Rgb);
        assert!((mesh.colors()[1].y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_without_colors_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "plain.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert!(matches!(load(&path), Err(BakeError::LoadError { .. })));
    }

    #[test]
    fn test_merges_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "two.obj",
            "o a\nv 0 0 0 1 0 0\nv 1 0 0 1 0 0\nv 0 1 0 1 0 0\nf 1 2 3\n\
             o b\nv 5 0 0 0 1 0\nv 6 0 0 0 1 0\nv 5 1 0 0 1 0\nf 4 5 6\n",
        );
        let mesh = load(&path).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_triangles(), 2);
        for &v in &mesh.triangles()[1] {
            assert!(mesh.position(v).x >= 5.0);
        }
    }

    #[test]
    fn test_save_textured_writes_bottom_left_uvs() {
        let mesh = TexturedMesh {
            positions: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            uvs: vec![Point2::new(0.25, 0.0), Point2::new(0.75, 0.0), Point2::new(0.25, 0.5)],
            triangles: vec![[0, 1, 2].map(crate::mesh::VertexId::new)],
            source_vertex: (0..3).map(crate::mesh::VertexId::new).collect(),
            uv_origin: UvOrigin::TopLeft,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.obj");
        save_textured(&mesh, &path, Some("out.mtl")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.contains("mtllib out.mtl"));
        assert!(text.contains("usemtl baked"));
        assert!(text.contains("vt 0.25 1\n"));
        assert!(text.contains("vt 0.25 0.5\n"));
        assert!(text.contains("f 1/1 2/2 3/3"));
    }
}
