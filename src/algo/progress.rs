//! Progress reporting for the baking pipeline.
//!
//! # Example
//!
//! ```
//! use vertexbake::algo::progress::{Progress, Stage};
//!
//! let progress = Progress::new(|stage: Stage, current, total| {
//!     println!("{}: {}/{}", stage, current, total);
//! });
//! progress.report(Stage::Pack, 0, 1);
//! ```

use std::fmt;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Growing charts over the face adjacency graph.
    BuildCharts,
    /// Flattening each chart into 2D.
    Flatten,
    /// Packing charts into the atlas.
    Pack,
    /// Rasterizing triangles into the texture.
    Bake,
    /// Reducing a supersampled texture to the target resolution.
    Downsample,
    /// Growing baked texels into the padding.
    Dilate,
    /// Attaching UVs to the mesh.
    Rewrite,
}

impl Stage {
    /// Human-readable stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::BuildCharts => "Building charts",
            Stage::Flatten => "Flattening charts",
            Stage::Pack => "Packing atlas",
            Stage::Bake => "Baking texels",
            Stage::Downsample => "Downsampling",
            Stage::Dilate => "Dilating seams",
            Stage::Rewrite => "Rewriting mesh",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A progress callback receiving `(stage, current, total)` updates.
///
/// Within a stage `current` counts from 0 to `total`; a report with
/// `current == total` marks the stage as finished.
pub struct Progress {
    callback: Box<dyn Fn(Stage, usize, usize) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Stage, usize, usize) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress within a stage.
    #[inline]
    pub fn report(&self, stage: Stage, current: usize, total: usize) {
        (self.callback)(stage, current, total);
    }

    /// Report that a stage finished.
    #[inline]
    pub fn finish(&self, stage: Stage) {
        (self.callback)(stage, 1, 1);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
