//! Chart flattening.
//!
//! Each chart is flattened independently into a local 2D parameter space.
//! The primary method is [`lscm`], which preserves angles and, for
//! developable patches, edge-length ratios. [`planar_projection`] is the
//! fallback used when the conformal solve fails or folds a triangle.
//!
//! Both work on a patch given as local positions plus faces indexing into
//! them, so callers decide how mesh vertices map to patch vertices.
//!
//! # Example
//!
//! ```
//! use vertexbake::algo::parameterize::{lscm, LscmOptions};
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//!
//! let uvs = lscm(&positions, &faces, &LscmOptions::default()).unwrap();
//! assert_eq!(uvs.len(), 4);
//! ```
//!
//! # References
//!
//! - Lévy, B., Petitjean, S., Ray, N., & Maillot, J. (2002). "Least squares
//!   conformal maps for automatic texture atlas generation." ACM SIGGRAPH.

mod lscm;
mod planar;
mod sparse;

pub use lscm::{local_frame, lscm, LscmOptions, PinnedVertex};
pub use planar::planar_projection;
pub use sparse::{conjugate_gradient, CsrMatrix};
