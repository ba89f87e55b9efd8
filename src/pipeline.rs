//! The end-to-end baking pipeline.
//!
//! [`bake`] runs every stage in order on one mesh:
//!
//! 1. [`build_charts`]: partition and flatten
//! 2. [`pack_charts`]: place charts in the atlas
//! 3. [`bake_texture`]: rasterize vertex colors
//! 4. [`downsample`]: only when supersampling
//! 5. [`dilate`]: grow colors into the padding
//! 6. [`rewrite_mesh`]: attach UVs
//!
//! Options are validated before any stage runs. Per-triangle anomalies do not
//! stop the pipeline; they are collected in [`BakeOutput::diagnostics`].
//!
//! # Example
//!
//! ```
//! use vertexbake::prelude::*;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let colors: Vec<[f32; 3]> = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//! let mesh = build_color_mesh(&positions, &colors, &[[0, 1, 2]]).unwrap();
//!
//! let output = bake(&mesh, &BakeOptions::default()).unwrap();
//! assert_eq!(output.texture.width(), output.layout.resolution);
//! assert!(output.diagnostics.is_empty());
//! ```

use log::info;
use nalgebra::Vector4;

use crate::algo::bake::{bake_texture, downsample, RasterOptions, TextureImage};
use crate::algo::chart::{build_charts, Chart, ChartOptions};
use crate::algo::dilate::{dilate, Connectivity, DilateOptions};
use crate::algo::pack::{pack_charts, AtlasLayout, AtlasOptions};
use crate::algo::progress::Progress;
use crate::algo::rewrite::rewrite_mesh;
use crate::error::{BakeError, Diagnostic, Result};
use crate::mesh::{ColorChannels, ColorMesh, Rgba, TexturedMesh, UvOrigin};

/// Largest supported supersampling factor.
pub const MAX_SUPERSAMPLE: u32 = 8;

/// Options for the whole pipeline.
#[derive(Debug, Clone)]
pub struct BakeOptions {
    /// Chart building options.
    pub charts: ChartOptions,

    /// Atlas packing options.
    pub atlas: AtlasOptions,

    /// Seam dilation options.
    pub dilate: DilateOptions,

    /// Channels of the output texture. `None` follows the input mesh
    /// (default: `None`).
    pub output_channels: Option<ColorChannels>,

    /// UV convention of the output mesh (default: [`UvOrigin::TopLeft`]).
    pub uv_origin: UvOrigin,

    /// Bake at this many times the atlas resolution and box-filter down
    /// (default: 1, off).
    pub supersample: u32,

    /// Color of texels no chart covers (default: transparent black).
    pub background: Rgba,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            charts: ChartOptions::default(),
            atlas: AtlasOptions::default(),
            dilate: DilateOptions::default(),
            output_channels: None,
            uv_origin: UvOrigin::default(),
            supersample: 1,
            background: Vector4::zeros(),
            parallel: true,
        }
    }
}

impl BakeOptions {
    /// Set the distortion threshold for growing charts.
    pub fn with_max_distortion(mut self, max_distortion: f64) -> Self {
        self.charts.max_distortion = max_distortion;
        self
    }

    /// Set the resolution search range.
    pub fn with_resolution_range(mut self, min: u32, max: u32) -> Self {
        self.atlas = self.atlas.with_resolution_range(min, max);
        self
    }

    /// Set the per-side chart padding in texels.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.atlas.padding = padding;
        self
    }

    /// Use a fixed texel density in texels per world unit.
    pub fn with_texel_density(mut self, density: f64) -> Self {
        self.atlas.texel_density = Some(density);
        self
    }

    /// Set the dilation margin. Defaults to the padding when unset.
    pub fn with_dilation_margin(mut self, margin: u32) -> Self {
        self.dilate.margin = Some(margin);
        self
    }

    /// Set the dilation neighborhood.
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.dilate.connectivity = connectivity;
        self
    }

    /// Force the output texture channels.
    pub fn with_output_channels(mut self, channels: ColorChannels) -> Self {
        self.output_channels = Some(channels);
        self
    }

    /// Set the UV convention of the output mesh.
    pub fn with_uv_origin(mut self, origin: UvOrigin) -> Self {
        self.uv_origin = origin;
        self
    }

    /// Set the supersampling factor.
    pub fn with_supersample(mut self, factor: u32) -> Self {
        self.supersample = factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check every option before any work starts.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::InvalidParameter`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        self.charts.validate()?;
        self.atlas.validate()?;
        if self.supersample == 0 || self.supersample > MAX_SUPERSAMPLE {
            return Err(BakeError::invalid_param(
                "supersample",
                self.supersample,
                "must be between 1 and 8",
            ));
        }
        if self.atlas.max_resolution.checked_mul(self.supersample).is_none() {
            return Err(BakeError::invalid_param(
                "max_resolution",
                self.atlas.max_resolution,
                "too large for the supersampling factor",
            ));
        }
        if self.background.iter().any(|c| !c.is_finite()) {
            return Err(BakeError::invalid_param(
                "background",
                format!("{:?}", self.background.as_slice()),
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Everything the pipeline produces.
#[derive(Debug, Clone)]
pub struct BakeOutput {
    /// The UV-mapped mesh, without vertex colors.
    pub mesh: TexturedMesh,
    /// The baked and dilated texture at the layout resolution.
    pub texture: TextureImage,
    /// Where each chart was placed.
    pub layout: AtlasLayout,
    /// The flattened charts.
    pub charts: Vec<Chart>,
    /// Recoverable anomalies, in pipeline order.
    pub diagnostics: Vec<Diagnostic>,
    /// Channels the texture should be encoded with.
    pub channels: ColorChannels,
}

/// Bake a vertex-colored mesh into a UV-mapped mesh and a texture.
///
/// # Errors
///
/// - [`BakeError::InvalidParameter`] if `options` fails validation
/// - [`BakeError::AtlasOverflow`] if the charts do not fit at the maximum
///   resolution
/// - [`BakeError::PackingFailure`] on an internal packing defect
pub fn bake(mesh: &ColorMesh, options: &BakeOptions) -> Result<BakeOutput> {
    bake_with_progress(mesh, options, &Progress::none())
}

/// [`bake`] with progress reporting.
///
/// # Errors
///
/// As [`bake`].
pub fn bake_with_progress(mesh: &ColorMesh, options: &BakeOptions, progress: &Progress) -> Result<BakeOutput> {
    options.validate()?;
    info!(
        "baking mesh with {} vertices and {} triangles",
        mesh.num_vertices(),
        mesh.num_triangles()
    );

    let chart_options = options.charts.clone().with_parallel(options.parallel);
    let (charts, mut diagnostics) = build_charts(mesh, &chart_options, progress)?;

    let layout = pack_charts(&charts, &options.atlas, progress)?;

    let factor = options.supersample;
    let raster = RasterOptions::default()
        .with_background(options.background)
        .with_parallel(options.parallel);
    let (mut texture, bake_diagnostics) = if factor > 1 {
        let (large, found) = bake_texture(mesh, &charts, &layout.scaled(factor), &raster, progress);
        (downsample(&large, factor, progress), found)
    } else {
        bake_texture(mesh, &charts, &layout, &raster, progress)
    };
    diagnostics.extend(bake_diagnostics);

    let margin = options.dilate.margin.unwrap_or(layout.padding);
    dilate(&mut texture, margin, options.dilate.connectivity, progress);

    let textured = rewrite_mesh(mesh, &charts, &layout, options.uv_origin, progress);
    let channels = options.output_channels.unwrap_or(mesh.channels());

    info!(
        "baked {} charts into a {}x{} texture ({} diagnostics)",
        charts.len(),
        texture.width(),
        texture.height(),
        diagnostics.len()
    );

    Ok(BakeOutput {
        mesh: textured,
        texture,
        layout,
        charts,
        diagnostics,
        channels,
    })
}
