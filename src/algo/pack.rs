//! Atlas packing.
//!
//! Places every chart into one square texture plane. Charts are rescaled to
//! a common texel density (so a chart's share of the texture follows its 3D
//! surface area), optionally rotated by a quarter turn so they are
//! wider than tall, padded and packed onto shelves. Resolutions are tried in
//! increasing order until every chart fits.
//!
//! Texel space has its origin at the top-left corner with `y` growing
//! downward. The UV of a texel-space point is the point divided by the
//! resolution.

use log::{debug, info};
use nalgebra::{Point2, Vector2};

use crate::algo::chart::Chart;
use crate::algo::progress::{Progress, Stage};
use crate::error::{BakeError, Result};
use crate::mesh::ChartId;

/// Options for atlas packing.
#[derive(Debug, Clone)]
pub struct AtlasOptions {
    /// Smallest resolution tried (default: 64).
    pub min_resolution: u32,

    /// Largest resolution tried (default: 4096).
    pub max_resolution: u32,

    /// Texels of padding on each side of every chart (default: 4).
    pub padding: u32,

    /// Fixed texel density in texels per world unit. When `None` the density
    /// is derived per resolution from `target_fill` (default: `None`).
    pub texel_density: Option<f64>,

    /// Fraction of the atlas the chart bounding boxes should cover when the
    /// density is derived (default: 0.5).
    pub target_fill: f64,

    /// Whether charts may be rotated by a quarter turn (default: true).
    pub allow_rotation: bool,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            min_resolution: 64,
            max_resolution: 4096,
            padding: 4,
            texel_density: None,
            target_fill: 0.5,
            allow_rotation: true,
        }
    }
}

impl AtlasOptions {
    /// Set the resolution search range.
    pub fn with_resolution_range(mut self, min: u32, max: u32) -> Self {
        self.min_resolution = min;
        self.max_resolution = max;
        self
    }

    /// Set the per-side padding in texels.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Use a fixed texel density.
    pub fn with_texel_density(mut self, density: f64) -> Self {
        self.texel_density = Some(density);
        self
    }

    /// Set the target interior coverage for derived densities.
    pub fn with_target_fill(mut self, fill: f64) -> Self {
        self.target_fill = fill;
        self
    }

    /// Set whether quarter-turn rotation is allowed.
    pub fn with_rotation(mut self, allow: bool) -> Self {
        self.allow_rotation = allow;
        self
    }

    /// Check that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.min_resolution == 0 {
            return Err(BakeError::invalid_param("min_resolution", 0, "must be at least 1"));
        }
        if self.max_resolution == 0 {
            return Err(BakeError::invalid_param("max_resolution", 0, "must be at least 1"));
        }
        if !(self.target_fill > 0.0 && self.target_fill <= 1.0) {
            return Err(BakeError::invalid_param(
                "target_fill",
                self.target_fill,
                "must be in (0, 1]",
            ));
        }
        if let Some(density) = self.texel_density {
            if !density.is_finite() || density <= 0.0 {
                return Err(BakeError::invalid_param(
                    "texel_density",
                    density,
                    "must be a finite, positive number",
                ));
            }
        }
        Ok(())
    }

    /// Resolutions to try, in order.
    ///
    /// Doubles from `min_resolution` and always ends at `max_resolution`.
    /// When `min_resolution` exceeds `max_resolution` only the maximum is
    /// tried.
    pub fn candidate_resolutions(&self) -> Vec<u32> {
        let max = self.max_resolution;
        let mut r = self.min_resolution.min(max);
        let mut candidates = vec![r];
        while r < max {
            r = r.saturating_mul(2).min(max);
            candidates.push(r);
        }
        candidates
    }
}

/// Quarter-turn rotation applied to a chart before placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Kept as flattened.
    #[default]
    None,
    /// Rotated by 90 degrees: `(x, y) -> (-y, x)`.
    Quarter,
}

impl Rotation {
    #[inline]
    fn apply(self, p: &Point2<f64>) -> Vector2<f64> {
        match self {
            Rotation::None => p.coords,
            Rotation::Quarter => Vector2::new(-p.y, p.x),
        }
    }
}

/// An axis-aligned rectangle of texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexelRect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl TexelRect {
    /// One past the rightmost column.
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the bottom row.
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Number of texels covered.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if two rectangles share at least one texel.
    pub fn intersects(&self, other: &TexelRect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Check if the texel `(x, y)` lies inside.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Shrink by `amount` texels on every side.
    pub fn inset(&self, amount: u32) -> TexelRect {
        TexelRect {
            x: self.x.saturating_add(amount),
            y: self.y.saturating_add(amount),
            width: self.width.saturating_sub(amount.saturating_mul(2)),
            height: self.height.saturating_sub(amount.saturating_mul(2)),
        }
    }
}

/// Where and how one chart is placed in the atlas.
///
/// A local chart point `p` maps to texel space as
/// `translation + scale * rotation(p)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPlacement {
    /// The placed chart.
    pub chart: ChartId,
    /// Texels per local parameter unit.
    pub scale: f64,
    /// Rotation applied before scaling.
    pub rotation: Rotation,
    /// Texel-space offset applied after scaling.
    pub translation: Vector2<f64>,
    /// Reserved rectangle, padding included.
    pub rect: TexelRect,
}

impl ChartPlacement {
    /// Map a local chart point into texel space.
    #[inline]
    pub fn to_texel(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(self.translation + self.rotation.apply(p) * self.scale)
    }
}

/// The packed atlas: one placement per chart, in chart order.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasLayout {
    /// Width and height of the square atlas in texels.
    pub resolution: u32,
    /// Per-side padding in texels.
    pub padding: u32,
    /// Texels per world unit.
    pub texel_density: f64,
    /// Placement of chart `i` at index `i`.
    pub placements: Vec<ChartPlacement>,
}

impl AtlasLayout {
    /// Placement of a chart.
    #[inline]
    pub fn placement(&self, chart: ChartId) -> &ChartPlacement {
        &self.placements[chart.index()]
    }

    /// Map a local chart point into texel space.
    #[inline]
    pub fn to_texel(&self, chart: ChartId, p: &Point2<f64>) -> Point2<f64> {
        self.placement(chart).to_texel(p)
    }

    /// Map a local chart point to a UV in the unit square, origin top-left.
    #[inline]
    pub fn to_uv(&self, chart: ChartId, p: &Point2<f64>) -> Point2<f64> {
        self.to_texel(chart, p) / self.resolution as f64
    }

    /// The same layout at `factor` times the resolution.
    ///
    /// UVs are unchanged; every texel-space quantity is multiplied. Integer
    /// quantities saturate at `u32::MAX`.
    pub fn scaled(&self, factor: u32) -> AtlasLayout {
        let f = factor as f64;
        AtlasLayout {
            resolution: self.resolution.saturating_mul(factor),
            padding: self.padding.saturating_mul(factor),
            texel_density: self.texel_density * f,
            placements: self
                .placements
                .iter()
                .map(|p| ChartPlacement {
                    chart: p.chart,
                    scale: p.scale * f,
                    rotation: p.rotation,
                    translation: p.translation * f,
                    rect: TexelRect {
                        x: p.rect.x.saturating_mul(factor),
                        y: p.rect.y.saturating_mul(factor),
                        width: p.rect.width.saturating_mul(factor),
                        height: p.rect.height.saturating_mul(factor),
                    },
                })
                .collect(),
        }
    }

    /// Fraction of the atlas covered by padded chart rectangles.
    pub fn occupancy(&self) -> f64 {
        let used: u64 = self.placements.iter().map(|p| p.rect.area()).sum();
        used as f64 / (self.resolution as f64 * self.resolution as f64)
    }
}

/// Chart shape after rescaling to world units and rotation.
struct Footprint {
    /// Local units to world units.
    unit_scale: f64,
    rotation: Rotation,
    /// Rotated local bounds.
    min: Vector2<f64>,
    /// World-space size after rotation.
    size: Vector2<f64>,
    area_3d: f64,
    degenerate: bool,
}

impl Footprint {
    fn new(chart: &Chart, allow_rotation: bool) -> Self {
        let area_2d = chart.area_2d();
        let unit_scale = if chart.degenerate || area_2d <= 0.0 {
            0.0
        } else {
            (chart.area_3d / area_2d).sqrt()
        };

        let (min, max) = chart.bounds();
        let local = max - min;
        let rotation = if allow_rotation && local.y > local.x {
            Rotation::Quarter
        } else {
            Rotation::None
        };

        // Bounds of the rotated chart: (x, y) -> (-y, x).
        let (rot_min, rot_size) = match rotation {
            Rotation::None => (min.coords, local),
            Rotation::Quarter => (Vector2::new(-max.y, min.x), Vector2::new(local.y, local.x)),
        };

        Self {
            unit_scale,
            rotation,
            min: rot_min,
            size: rot_size * unit_scale,
            area_3d: chart.area_3d,
            degenerate: chart.degenerate,
        }
    }

    /// Interior size in texels at `density`.
    fn interior(&self, density: f64) -> (u32, u32) {
        if self.degenerate || self.unit_scale == 0.0 {
            return (1, 1);
        }
        let texels = |extent: f64| (extent * density).ceil().min(u32::MAX as f64 / 2.0) as u32 + 1;
        (texels(self.size.x), texels(self.size.y))
    }
}

/// Pack `charts` into a square atlas.
///
/// `charts[i]` must have id `i`, as produced by
/// [`build_charts`](crate::algo::chart::build_charts).
///
/// # Errors
///
/// - [`BakeError::InvalidParameter`] if `options` fails validation
/// - [`BakeError::AtlasOverflow`] if the charts do not fit at
///   `max_resolution`
/// - [`BakeError::PackingFailure`] if the packed layout overlaps itself
pub fn pack_charts(charts: &[Chart], options: &AtlasOptions, progress: &Progress) -> Result<AtlasLayout> {
    options.validate()?;

    let footprints: Vec<Footprint> = charts
        .iter()
        .map(|c| Footprint::new(c, options.allow_rotation))
        .collect();
    let total_area: f64 = footprints
        .iter()
        .filter(|f| !f.degenerate)
        .map(|f| f.size.x * f.size.y)
        .sum();

    let candidates = options.candidate_resolutions();
    let mut required_area = 0;
    let mut last = options.max_resolution;

    for (attempt, &resolution) in candidates.iter().enumerate() {
        progress.report(Stage::Pack, attempt, candidates.len());
        last = resolution;

        let density = match options.texel_density {
            Some(d) => d,
            None if total_area > 0.0 => resolution as f64 * (options.target_fill / total_area).sqrt(),
            None => 1.0,
        };

        let sizes: Vec<(u32, u32)> = footprints
            .iter()
            .map(|f| {
                let (w, h) = f.interior(density);
                (
                    w.saturating_add(options.padding.saturating_mul(2)),
                    h.saturating_add(options.padding.saturating_mul(2)),
                )
            })
            .collect();
        required_area = sizes
            .iter()
            .fold(0u64, |acc, &(w, h)| acc.saturating_add(w as u64 * h as u64));

        let order = packing_order(&footprints, &sizes);
        match shelf_pack(&order, &sizes, resolution) {
            Some(origins) => {
                let layout = assemble(charts, &footprints, &sizes, &origins, resolution, density, options.padding);
                verify(&layout)?;
                progress.finish(Stage::Pack);
                info!(
                    "packed {} charts into {}x{} ({:.1}% occupied)",
                    charts.len(),
                    resolution,
                    resolution,
                    layout.occupancy() * 100.0
                );
                return Ok(layout);
            }
            None => debug!(
                "charts do not fit at {}x{} ({} texels required)",
                resolution, resolution, required_area
            ),
        }
    }

    Err(BakeError::AtlasOverflow {
        resolution: last,
        required_area,
    })
}

/// Chart indices sorted by padded height desc, 3D area desc, then id.
fn packing_order(footprints: &[Footprint], sizes: &[(u32, u32)]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        sizes[b]
            .1
            .cmp(&sizes[a].1)
            .then_with(|| footprints[b].area_3d.total_cmp(&footprints[a].area_3d))
            .then_with(|| a.cmp(&b))
    });
    order
}

struct Shelf {
    y: u32,
    height: u32,
    cursor: u32,
}

/// First-fit shelf packing. Returns the top-left corner of each rectangle,
/// indexed like `sizes`, or `None` if they do not fit.
fn shelf_pack(order: &[usize], sizes: &[(u32, u32)], resolution: u32) -> Option<Vec<(u32, u32)>> {
    let mut origins = vec![(0, 0); sizes.len()];
    let mut shelves: Vec<Shelf> = Vec::new();
    let mut next_y = 0u32;

    for &i in order {
        let (w, h) = sizes[i];
        if w > resolution || h > resolution {
            return None;
        }

        let fit = shelves
            .iter()
            .position(|s| h <= s.height && resolution - s.cursor >= w);
        let index = match fit {
            Some(index) => index,
            None => {
                if resolution - next_y < h {
                    return None;
                }
                shelves.push(Shelf {
                    y: next_y,
                    height: h,
                    cursor: 0,
                });
                next_y += h;
                shelves.len() - 1
            }
        };

        let shelf = &mut shelves[index];
        origins[i] = (shelf.cursor, shelf.y);
        shelf.cursor += w;
    }

    Some(origins)
}

fn assemble(
    charts: &[Chart],
    footprints: &[Footprint],
    sizes: &[(u32, u32)],
    origins: &[(u32, u32)],
    resolution: u32,
    density: f64,
    padding: u32,
) -> AtlasLayout {
    let placements = charts
        .iter()
        .zip(footprints)
        .zip(sizes.iter().zip(origins))
        .map(|((chart, footprint), (&(width, height), &(x, y)))| {
            let rect = TexelRect { x, y, width, height };
            let interior = rect.inset(padding);
            // Chart minimum lands half a texel inside the interior.
            let base = Vector2::new(interior.x as f64 + 0.5, interior.y as f64 + 0.5);
            let scale = footprint.unit_scale * density;
            ChartPlacement {
                chart: chart.id,
                scale,
                rotation: footprint.rotation,
                translation: base - footprint.min * scale,
                rect,
            }
        })
        .collect();

    AtlasLayout {
        resolution,
        padding,
        texel_density: density,
        placements,
    }
}

/// Check that every rectangle lies in the atlas and none overlap.
fn verify(layout: &AtlasLayout) -> Result<()> {
    let r = layout.resolution;
    for p in &layout.placements {
        if p.rect.right() > r || p.rect.bottom() > r {
            return Err(BakeError::PackingFailure(format!(
                "{:?} rectangle {:?} exceeds the {}x{} atlas",
                p.chart, p.rect, r, r
            )));
        }
    }

    let mut by_top: Vec<&ChartPlacement> = layout.placements.iter().collect();
    by_top.sort_by_key(|p| (p.rect.y, p.rect.x));
    for (i, a) in by_top.iter().enumerate() {
        for b in &by_top[i + 1..] {
            if b.rect.y >= a.rect.bottom() {
                break;
            }
            if a.rect.intersects(&b.rect) {
                return Err(BakeError::PackingFailure(format!(
                    "{:?} and {:?} overlap",
                    a.chart, b.chart
                )));
            }
        }
    }
    Ok(())
}
