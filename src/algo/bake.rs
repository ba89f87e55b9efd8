//! Texel baking.
//!
//! Rasterizes every chart triangle into the atlas texture. A texel is covered
//! when its center lies inside the placed triangle; its color is the
//! barycentric interpolation of the triangle's three vertex colors at that
//! center.
//!
//! Charts never share texels, so each chart renders into a private tile
//! covering its padded rectangle. Tiles may be rendered in parallel and are
//! composited in chart order.

use image::{DynamicImage, ImageBuffer, Rgb, Rgba as ImageRgba};
use log::{debug, info, warn};
use nalgebra::{Point2, Vector4};
use rayon::prelude::*;

use crate::algo::chart::Chart;
use crate::algo::pack::{AtlasLayout, TexelRect};
use crate::algo::progress::{Progress, Stage};
use crate::error::{Diagnostic, DiagnosticStage};
use crate::mesh::{ColorChannels, ColorMesh, Rgba, TriangleId};

/// Inclusion slack for texel centers on a triangle edge.
const EDGE_EPSILON: f64 = 1e-9;

/// Placed triangles with a smaller texel-space area contribute nothing.
const MIN_TEXEL_AREA: f64 = 1e-12;

/// Where a texel's color came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelState {
    /// Not covered by any chart.
    Background,
    /// Rasterized from a triangle.
    Baked,
    /// Copied outward from a neighbor by seam dilation.
    Dilated,
}

/// A square RGBA texture with per-texel provenance.
///
/// Texel `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    background: Rgba,
    texels: Vec<Rgba>,
    states: Vec<TexelState>,
}

impl TextureImage {
    /// Create an image filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            background,
            texels: vec![background; n],
            states: vec![TexelState::Background; n],
        }
    }

    /// Width in texels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color of unwritten texels.
    #[inline]
    pub fn background(&self) -> Rgba {
        self.background
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// Color of texel `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.texels[self.offset(x, y)]
    }

    /// Provenance of texel `(x, y)`.
    #[inline]
    pub fn state(&self, x: u32, y: u32) -> TexelState {
        self.states[self.offset(x, y)]
    }

    /// Check if texel `(x, y)` was baked or dilated.
    #[inline]
    pub fn is_written(&self, x: u32, y: u32) -> bool {
        self.state(x, y) != TexelState::Background
    }

    /// Write a texel.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Rgba, state: TexelState) {
        let i = self.offset(x, y);
        self.texels[i] = color;
        self.states[i] = state;
    }

    /// All texel colors in row-major order.
    #[inline]
    pub fn texels(&self) -> &[Rgba] {
        &self.texels
    }

    /// All texel states in row-major order.
    #[inline]
    pub fn states(&self) -> &[TexelState] {
        &self.states
    }

    /// Number of texels in a given state.
    pub fn count(&self, state: TexelState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// Quantize to an 8-bit image with the given channel layout.
    pub fn to_dynamic_image(&self, channels: ColorChannels) -> DynamicImage {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match channels {
            ColorChannels::Rgb => DynamicImage::ImageRgb8(ImageBuffer::from_fn(self.width, self.height, |x, y| {
                let c = self.get(x, y);
                Rgb([quantize(c.x), quantize(c.y), quantize(c.z)])
            })),
            ColorChannels::Rgba => DynamicImage::ImageRgba8(ImageBuffer::from_fn(self.width, self.height, |x, y| {
                let c = self.get(x, y);
                ImageRgba([quantize(c.x), quantize(c.y), quantize(c.z), quantize(c.w)])
            })),
        }
    }
}

/// Options for texel baking.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Color of texels no triangle covers (default: transparent black).
    pub background: Rgba,

    /// Whether to rasterize charts in parallel (default: true).
    pub parallel: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            background: Vector4::zeros(),
            parallel: true,
        }
    }
}

impl RasterOptions {
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
}

/// One chart's rasterized texels.
struct Tile {
    rect: TexelRect,
    texels: Vec<Option<Rgba>>,
    /// State the written texels take in the image.
    state: TexelState,
    /// Triangles whose placed footprint has no area.
    collapsed: Vec<TriangleId>,
}

/// Bake the vertex colors of `mesh` into a texture at the layout resolution.
///
/// Returns the texture and one [`Diagnostic::DegenerateGeometry`] for every
/// triangle with an empty texel footprint that chart building did not
/// already flag.
pub fn bake_texture(
    mesh: &ColorMesh,
    charts: &[Chart],
    layout: &AtlasLayout,
    options: &RasterOptions,
    progress: &Progress,
) -> (TextureImage, Vec<Diagnostic>) {
    progress.report(Stage::Bake, 0, charts.len());

    let render = |chart: &Chart| rasterize_chart(mesh, chart, layout);
    let tiles: Vec<Tile> = if options.parallel {
        charts.par_iter().map(render).collect()
    } else {
        charts.iter().map(render).collect()
    };

    let mut image = TextureImage::new(layout.resolution, layout.resolution, options.background);
    let mut diagnostics = Vec::new();

    for tile in &tiles {
        for (i, texel) in tile.texels.iter().enumerate() {
            if let Some(color) = texel {
                let x = tile.rect.x + (i as u32 % tile.rect.width);
                let y = tile.rect.y + (i as u32 / tile.rect.width);
                image.set(x, y, *color, tile.state);
            }
        }
        for &triangle in &tile.collapsed {
            debug!("{:?} has an empty texel footprint", triangle);
            let diagnostic = Diagnostic::DegenerateGeometry {
                triangle,
                stage: DiagnosticStage::Baking,
            };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
        }
    }

    progress.finish(Stage::Bake);
    info!(
        "baked {} of {} texels",
        image.count(TexelState::Baked),
        image.texels().len()
    );
    (image, diagnostics)
}

fn rasterize_chart(mesh: &ColorMesh, chart: &Chart, layout: &AtlasLayout) -> Tile {
    let placement = layout.placement(chart.id);
    let rect = placement.rect;
    let mut tile = Tile {
        rect,
        texels: vec![None; rect.width as usize * rect.height as usize],
        state: TexelState::Baked,
        collapsed: Vec::new(),
    };

    // Degenerate charts were reported while building charts. Their reserved
    // interior holds the mean corner color so dilation has a source.
    if chart.degenerate {
        tile.state = TexelState::Dilated;
        let mut sum = Vector4::<f64>::zeros();
        let mut corners = 0u32;
        for &t in &chart.triangles {
            for color in mesh.triangle_colors(t) {
                sum += color.cast::<f64>();
                corners += 1;
            }
        }
        let mean = (sum / corners.max(1) as f64).cast::<f32>();
        let interior = rect.inset(layout.padding);
        for y in interior.y..interior.bottom() {
            for x in interior.x..interior.right() {
                let i = (y - rect.y) as usize * rect.width as usize + (x - rect.x) as usize;
                tile.texels[i] = Some(mean);
            }
        }
        return tile;
    }

    for (&t, corners) in chart.triangles.iter().zip(&chart.uvs) {
        let placed = corners.map(|uv| placement.to_texel(&uv));
        if !rasterize_triangle(&mut tile, &placed, &mesh.triangle_colors(t)) {
            tile.collapsed.push(t);
        }
    }
    tile
}

#[inline]
fn edge(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Rasterize one placed triangle into its chart's tile.
///
/// Returns `false` if the triangle has no texel-space area. A texel already
/// written by an earlier triangle of the same chart keeps its color.
fn rasterize_triangle(tile: &mut Tile, p: &[Point2<f64>; 3], colors: &[Rgba; 3]) -> bool {
    let area = edge(&p[0], &p[1], &p[2]);
    if area.abs() <= MIN_TEXEL_AREA {
        return false;
    }
    let inv_area = 1.0 / area;

    let rect = tile.rect;
    let min_x = p.iter().map(|q| q.x).fold(f64::INFINITY, f64::min);
    let max_x = p.iter().map(|q| q.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = p.iter().map(|q| q.y).fold(f64::INFINITY, f64::min);
    let max_y = p.iter().map(|q| q.y).fold(f64::NEG_INFINITY, f64::max);

    // Texels whose centers can fall inside, clipped to the tile.
    let clip = |lo: f64, hi: f64, start: u32, end: u32| -> Option<(u32, u32)> {
        let first = (lo - 0.5).ceil().max(start as f64);
        let last = (hi - 0.5).floor().min(end as f64 - 1.0);
        (first <= last).then(|| (first as u32, last as u32))
    };
    let Some((x0, x1)) = clip(min_x, max_x, rect.x, rect.right()) else {
        return true;
    };
    let Some((y0, y1)) = clip(min_y, max_y, rect.y, rect.bottom()) else {
        return true;
    };

    let c = colors.map(|c| c.cast::<f64>());
    for y in y0..=y1 {
        for x in x0..=x1 {
            let center = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
            let w0 = edge(&p[1], &p[2], &center) * inv_area;
            let w1 = edge(&p[2], &p[0], &center) * inv_area;
            let w2 = edge(&p[0], &p[1], &center) * inv_area;
            if w0 < -EDGE_EPSILON || w1 < -EDGE_EPSILON || w2 < -EDGE_EPSILON {
                continue;
            }

            let i = (y - rect.y) as usize * rect.width as usize + (x - rect.x) as usize;
            if tile.texels[i].is_none() {
                let color = (c[0] * w0 + c[1] * w1 + c[2] * w2).map(|v| v.clamp(0.0, 1.0));
                tile.texels[i] = Some(color.cast::<f32>());
            }
        }
    }
    true
}

/// Reduce a supersampled texture by an integer `factor`.
///
/// Each output texel averages the baked texels of its `factor × factor`
/// block and counts as baked if any of them was. A block with only dilated
/// texels averages those and stays dilated. Other blocks keep the background
/// color.
pub fn downsample(image: &TextureImage, factor: u32, progress: &Progress) -> TextureImage {
    if factor <= 1 {
        return image.clone();
    }
    progress.report(Stage::Downsample, 0, 1);

    let width = image.width() / factor;
    let height = image.height() / factor;
    let mut out = TextureImage::new(width, height, image.background());

    for y in 0..height {
        for x in 0..width {
            let mut sum = [Vector4::<f64>::zeros(); 2];
            let mut covered = [0u32; 2];
            for sy in y * factor..(y + 1) * factor {
                for sx in x * factor..(x + 1) * factor {
                    let slot = match image.state(sx, sy) {
                        TexelState::Baked => 0,
                        TexelState::Dilated => 1,
                        TexelState::Background => continue,
                    };
                    sum[slot] += image.get(sx, sy).cast::<f64>();
                    covered[slot] += 1;
                }
            }
            for (slot, state) in [(0, TexelState::Baked), (1, TexelState::Dilated)] {
                if covered[slot] > 0 {
                    out.set(x, y, (sum[slot] / covered[slot] as f64).cast::<f32>(), state);
                    break;
                }
            }
        }
    }

    progress.finish(Stage::Downsample);
    debug!(
        "downsampled {}x{} to {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::chart::{build_charts, ChartOptions};
    use crate::algo::pack::{pack_charts, AtlasOptions};
    use crate::mesh::{build_color_mesh, ChartId};
    use crate::test_util::cube;
    use nalgebra::Point3;

    fn rgb_triangle() -> ColorMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.3, 0.8, 0.0),
        ];
        let colors: Vec<[f32; 3]> = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        build_color_mesh(&positions, &colors, &[[0, 1, 2]]).unwrap()
    }

    fn prepare(mesh: &ColorMesh, atlas: &AtlasOptions) -> (Vec<Chart>, AtlasLayout) {
        let (charts, _) = build_charts(mesh, &ChartOptions::default(), &Progress::none()).unwrap();
        let layout = pack_charts(&charts, atlas, &Progress::none()).unwrap();
        (charts, layout)
    }

    #[test]
    fn test_barycentric_color_fidelity() {
        let mesh = rgb_triangle();
        let (charts, layout) = prepare(&mesh, &AtlasOptions::default().with_resolution_range(32, 32));
        let (image, diagnostics) = bake_texture(&mesh, &charts, &layout, &RasterOptions::default(), &Progress::none());
        assert!(diagnostics.is_empty());

        let p = charts[0].uvs[0].map(|uv| layout.to_texel(ChartId::new(0), &uv));
        let area = edge(&p[0], &p[1], &p[2]);
        let mut baked = 0;
        for y in 0..image.height() {
            for x in 0..image.width() {
                if image.state(x, y) != TexelState::Baked {
                    continue;
                }
                baked += 1;
                let c = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
                let w = [
                    edge(&p[1], &p[2], &c) / area,
                    edge(&p[2], &p[0], &c) / area,
                    edge(&p[0], &p[1], &c) / area,
                ];
                let color = image.get(x, y);
                // Vertex colors are pure red, green and blue.
                for channel in 0..3 {
                    assert!((color[channel] as f64 - w[channel]).abs() < 1e-4);
                }
                assert!((color.w - 1.0).abs() < 1e-6);
            }
        }
        assert!(baked > 10);
    }

    #[test]
    fn test_solid_cube_bakes_only_its_color() {
        let mesh = cube([1.0, 0.0, 0.0]);
        let (charts, layout) = prepare(&mesh, &AtlasOptions::default().with_resolution_range(16, 256).with_padding(2));
        let (image, diagnostics) = bake_texture(&mesh, &charts, &layout, &RasterOptions::default(), &Progress::none());
        assert!(diagnostics.is_empty());

        let red = Vector4::new(1.0f32, 0.0, 0.0, 1.0);
        for (color, state) in image.texels().iter().zip(image.states()) {
            match state {
                TexelState::Baked => assert!((color - red).norm() < 1e-6),
                _ => assert_eq!(*color, Vector4::zeros()),
            }
        }

        // Every baked texel lies inside some chart interior.
        for y in 0..image.height() {
            for x in 0..image.width() {
                if image.is_written(x, y) {
                    assert!(layout
                        .placements
                        .iter()
                        .any(|p| p.rect.inset(layout.padding).contains(x, y)));
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = cube([0.2, 0.5, 0.9]);
        let (charts, layout) = prepare(&mesh, &AtlasOptions::default());
        let parallel = bake_texture(&mesh, &charts, &layout, &RasterOptions::default(), &Progress::none());
        let sequential = bake_texture(
            &mesh,
            &charts,
            &layout,
            &RasterOptions::default().with_parallel(false),
            &Progress::none(),
        );
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_collapsed_footprint_is_skipped() {
        let mut tile = Tile {
            rect: TexelRect { x: 0, y: 0, width: 8, height: 8 },
            texels: vec![None; 64],
            state: TexelState::Baked,
            collapsed: Vec::new(),
        };
        let line = [Point2::new(1.0, 1.0), Point2::new(4.0, 4.0), Point2::new(7.0, 7.0)];
        let colors = [Vector4::new(1.0, 1.0, 1.0, 1.0); 3];
        assert!(!rasterize_triangle(&mut tile, &line, &colors));
        assert!(tile.texels.iter().all(|t| t.is_none()));
    }

    #[test]
    fn test_shared_edge_texels_written_once() {
        // Two triangles splitting a 4x4 square along a diagonal that passes
        // through texel centers.
        let mut tile = Tile {
            rect: TexelRect { x: 0, y: 0, width: 4, height: 4 },
            texels: vec![None; 16],
            state: TexelState::Baked,
            collapsed: Vec::new(),
        };
        let white = [Vector4::new(1.0, 1.0, 1.0, 1.0); 3];
        let black = [Vector4::new(0.0, 0.0, 0.0, 1.0); 3];
        let a = [Point2::new(0.0, 0.0), Point2::new(4.0, 0.0), Point2::new(4.0, 4.0)];
        let b = [Point2::new(0.0, 0.0), Point2::new(4.0, 4.0), Point2::new(0.0, 4.0)];
        assert!(rasterize_triangle(&mut tile, &a, &white));
        assert!(rasterize_triangle(&mut tile, &b, &black));

        assert!(tile.texels.iter().all(|t| t.is_some()));
        // Diagonal centers went to the first triangle.
        for i in 0..4 {
            assert_eq!(tile.texels[i * 4 + i], Some(white[0]));
        }
        assert_eq!(tile.texels[4], Some(black[0]));
    }

    #[test]
    fn test_downsample_weights_covered_texels() {
        let mut image = TextureImage::new(4, 4, Vector4::zeros());
        image.set(0, 0, Vector4::new(1.0, 0.0, 0.0, 1.0), TexelState::Baked);
        image.set(1, 0, Vector4::new(0.0, 0.0, 1.0, 1.0), TexelState::Baked);

        let small = downsample(&image, 2, &Progress::none());
        assert_eq!((small.width(), small.height()), (2, 2));
        assert_eq!(small.state(0, 0), TexelState::Baked);
        assert!((small.get(0, 0) - Vector4::new(0.5, 0.0, 0.5, 1.0)).norm() < 1e-6);
        assert_eq!(small.state(1, 1), TexelState::Background);
        assert_eq!(small.count(TexelState::Baked), 1);
    }

    #[test]
    fn test_downsample_keeps_dilated_blocks() {
        let mut image = TextureImage::new(4, 4, Vector4::zeros());
        let gray = Vector4::new(0.5, 0.5, 0.5, 1.0);
        image.set(2, 2, gray, TexelState::Dilated);
        image.set(0, 0, Vector4::new(1.0, 0.0, 0.0, 1.0), TexelState::Baked);
        image.set(1, 1, gray, TexelState::Dilated);

        let small = downsample(&image, 2, &Progress::none());
        assert_eq!(small.state(1, 1), TexelState::Dilated);
        assert_eq!(small.get(1, 1), gray);
        // Baked texels win over dilated ones in the same block.
        assert_eq!(small.state(0, 0), TexelState::Baked);
        assert_eq!(small.get(0, 0), Vector4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_degenerate_chart_holds_mean_color() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
        ];
        let colors: Vec<[f32; 3]> = vec![
            [1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.9, 0.0, 0.0],
            [0.0, 0.6, 0.0],
            [0.0, 0.0, 0.3],
        ];
        let mesh = build_color_mesh(&positions, &colors, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let (charts, layout) = prepare(&mesh, &AtlasOptions::default());
        let degenerate = charts.iter().find(|c| c.degenerate).unwrap();

        let (image, diagnostics) = bake_texture(&mesh, &charts, &layout, &RasterOptions::default(), &Progress::none());
        assert!(diagnostics.is_empty());

        let interior = layout.placement(degenerate.id).rect.inset(layout.padding);
        assert_eq!((interior.width, interior.height), (1, 1));
        assert_eq!(image.state(interior.x, interior.y), TexelState::Dilated);
        let expected = Vector4::new(0.3, 0.2, 0.1, 1.0);
        assert!((image.get(interior.x, interior.y) - expected).norm() < 1e-6);
        assert_eq!(image.count(TexelState::Dilated), 1);
    }

    #[test]
    fn test_to_dynamic_image_channels() {
        let mut image = TextureImage::new(2, 1, Vector4::zeros());
        image.set(1, 0, Vector4::new(1.0, 0.5, 0.0, 0.25), TexelState::Baked);

        let rgba = image.to_dynamic_image(ColorChannels::Rgba).to_rgba8();
        assert_eq!(rgba.get_pixel(1, 0).0, [255, 128, 0, 64]);
        assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 0]);

        let rgb = image.to_dynamic_image(ColorChannels::Rgb);
        assert_eq!(rgb.color(), image::ColorType::Rgb8);
    }
}
