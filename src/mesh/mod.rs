//! Core mesh data structures.
//!
//! # Overview
//!
//! [`ColorMesh`] is the pipeline input: positions, one color per vertex and
//! triangle indices. [`TexturedMesh`] is the output: positions, one UV per
//! vertex and triangle indices, with vertices duplicated along UV seams.
//!
//! Elements are addressed through the type-safe indices [`VertexId`],
//! [`TriangleId`] and [`ChartId`].
//!
//! # Construction
//!
//! ```
//! use vertexbake::mesh::{build_color_mesh, ColorChannels};
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let colors: Vec<[f32; 4]> = vec![[1.0, 0.0, 0.0, 1.0]; 3];
//!
//! let mesh = build_color_mesh(&positions, &colors, &[[0, 1, 2]]).unwrap();
//! assert_eq!(mesh.channels(), ColorChannels::Rgba);
//! ```

mod adjacency;
mod builder;
mod colored;
mod index;
mod textured;

pub use adjacency::FaceAdjacency;
pub use builder::{build_color_mesh, build_color_mesh_from_polygons};
pub use colored::{ColorChannels, ColorMesh, Rgba};
pub use index::{ChartId, TriangleId, VertexId};
pub use textured::{TexturedMesh, UvOrigin};
