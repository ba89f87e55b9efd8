//! The baking stages.
//!
//! Each stage is usable on its own; [`crate::pipeline`] chains them:
//!
//! - **Charting** ([`chart`]): partition triangles into flattenable charts
//! - **Parameterization** ([`parameterize`]): LSCM and planar flattening
//! - **Packing** ([`pack`]): place charts in a square atlas
//! - **Baking** ([`bake`]): rasterize vertex colors into texels
//! - **Dilation** ([`dilate`]): grow colors across seams
//! - **Rewriting** ([`rewrite`]): attach UVs, splitting seam vertices
//! - **Progress** ([`progress`]): stage callbacks

pub mod bake;
pub mod chart;
pub mod dilate;
pub mod pack;
pub mod parameterize;
pub mod progress;
pub mod rewrite;
