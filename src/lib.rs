//! # vertexbake
//!
//! Bake vertex-colored triangle meshes into UV-mapped meshes with a color
//! texture atlas.
//!
//! Scanned and procedurally generated geometry often carries its color per
//! vertex, while most renderers and engines expect texture maps. vertexbake
//! unwraps the mesh into charts, packs them into one square atlas,
//! rasterizes the interpolated vertex colors into it, dilates the colors
//! across chart seams and rewrites the mesh with matching UVs.
//!
//! ## Features
//!
//! - **Chart building**: normal-cone chart growth with LSCM flattening
//! - **Atlas packing**: density-normalized shelf packing with padding
//! - **Baking**: parallel per-chart rasterization with optional supersampling
//! - **Seam dilation**: bounded, deterministic flood fill into the padding
//! - **File formats**: vertex-colored OBJ and PLY in, OBJ + MTL + PNG or GLB out
//!
//! ## Quick Start
//!
//! ```no_run
//! use vertexbake::prelude::*;
//!
//! let mesh = vertexbake::io::load("scan.ply").unwrap();
//! let output = bake(&mesh, &BakeOptions::default().with_padding(2)).unwrap();
//!
//! for diagnostic in &output.diagnostics {
//!     eprintln!("warning: {}", diagnostic);
//! }
//! vertexbake::io::export("scan_baked.obj", &output).unwrap();
//! ```
//!
//! ## Building Meshes Programmatically
//!
//! ```
//! use vertexbake::prelude::*;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let colors: Vec<[f32; 3]> = vec![
//!     [1.0, 0.0, 0.0],
//!     [0.0, 1.0, 0.0],
//!     [0.0, 0.0, 1.0],
//!     [1.0, 1.0, 0.0],
//! ];
//! let mesh = build_color_mesh(&positions, &colors, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let output = bake(&mesh, &BakeOptions::default()).unwrap();
//! assert_eq!(output.charts.len(), 1);
//! for uv in output.mesh.uvs() {
//!     assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;
pub mod pipeline;

#[cfg(test)]
mod test_util;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use vertexbake::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::bake::{TexelState, TextureImage};
    pub use crate::algo::dilate::Connectivity;
    pub use crate::algo::pack::AtlasLayout;
    pub use crate::error::{BakeError, Diagnostic, Result};
    pub use crate::mesh::{
        build_color_mesh, ChartId, ColorChannels, ColorMesh, Rgba, TexturedMesh, TriangleId, UvOrigin,
        VertexId,
    };
    pub use crate::pipeline::{bake, bake_with_progress, BakeOptions, BakeOutput};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
