//! Mesh and texture file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | colors as `v x y z r g b`; saved with MTL and PNG |
//! | PLY | `.ply` | ✓ | ✗ | `uchar`, `ushort` or float color channels |
//! | Binary glTF | `.glb` | ✗ | ✓ | PNG embedded, metallic-roughness material |
//! | PNG | `.png` | ✗ | ✓ | baked texture |
//!
//! # Usage
//!
//! ```no_run
//! use vertexbake::io::{export, load};
//! use vertexbake::prelude::{bake, BakeOptions};
//!
//! let mesh = load("scan.ply").unwrap();
//! let output = bake(&mesh, &BakeOptions::default()).unwrap();
//!
//! // Writes scan_baked.obj, scan_baked.mtl and scan_baked.png
//! export("scan_baked.obj", &output).unwrap();
//!
//! // Writes one self-contained file
//! export("scan_baked.glb", &output).unwrap();
//! ```

pub mod glb;
pub mod obj;
pub mod ply;
pub mod texture;

use std::path::Path;

use log::info;

use crate::error::{BakeError, Result};
use crate::mesh::ColorMesh;
use crate::pipeline::BakeOutput;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// PLY (Stanford polygon) format.
    Ply,
    /// Binary glTF, output only.
    Glb,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "ply" => Some(Format::Ply),
            "glb" => Some(Format::Glb),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn unsupported(path: &Path) -> BakeError {
    BakeError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    }
}

/// Load a vertex-colored mesh with automatic format detection.
///
/// The format is determined by the file extension.
///
/// # Example
///
/// ```no_run
/// use vertexbake::io::load;
///
/// let mesh = load("model.obj").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<ColorMesh> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| unsupported(path))?;

    let mesh = match format {
        Format::Obj => obj::load(path)?,
        Format::Ply => ply::load(path)?,
        Format::Glb => return Err(unsupported(path)),
    };
    info!(
        "loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.num_vertices(),
        mesh.num_triangles()
    );
    Ok(mesh)
}

/// Write a bake result, choosing the format from the extension.
///
/// `.obj` writes an OBJ file with a sibling `.mtl` and `.png`. The material
/// library and texture take the OBJ file's stem and are referenced by bare
/// file name, so the three files can be moved together. `.glb` writes one
/// binary glTF file with the texture embedded.
///
/// # Errors
///
/// Returns [`BakeError::UnsupportedFormat`] unless `path` ends in `.obj` or
/// `.glb`.
pub fn export<P: AsRef<Path>>(path: P, output: &BakeOutput) -> Result<()> {
    let path = path.as_ref();
    match Format::from_path(path) {
        Some(Format::Obj) => export_obj(path, output),
        Some(Format::Glb) => {
            glb::save(&output.mesh, &output.texture, output.channels, path)?;
            info!("wrote {}", path.display());
            Ok(())
        }
        _ => Err(unsupported(path)),
    }
}

fn export_obj(path: &Path, output: &BakeOutput) -> Result<()> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| BakeError::SaveError {
            path: path.to_path_buf(),
            message: "file name is not valid UTF-8".to_string(),
        })?;

    let material_path = path.with_extension("mtl");
    let texture_path = path.with_extension("png");
    let material_name = format!("{}.mtl", stem);
    let texture_name = format!("{}.png", stem);

    texture::save(&output.texture, output.channels, &texture_path)?;
    obj::save_material(&material_path, &texture_name)?;
    obj::save_textured(&output.mesh, path, Some(&material_name))?;

    info!(
        "wrote {}, {} and {}",
        path.display(),
        material_path.display(),
        texture_path.display()
    );
    Ok(())
}
