//! Seam dilation.
//!
//! Grows written texels outward into the background by a bounded number of
//! passes, so filtering near chart borders never reads background color.
//!
//! Every pass is synchronous: the frontier is computed against the texture
//! as it stood at the start of the pass, and texels written during a pass
//! only become sources in the next one. After `margin` passes exactly the
//! texels within `margin` steps of a baked texel are written, where a step
//! follows the chosen [`Connectivity`].

use log::debug;

use crate::algo::bake::{TexelState, TextureImage};
use crate::algo::progress::{Progress, Stage};

/// Neighborhood used by dilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Connectivity {
    /// Up, left, right, down.
    Four,
    /// The four orthogonal neighbors plus the four diagonals.
    #[default]
    Eight,
}

impl Connectivity {
    /// Neighbor offsets in scan order. Orthogonal neighbors come first, so
    /// they win over the farther diagonal ones.
    fn offsets(self) -> &'static [(i32, i32)] {
        const EIGHT: [(i32, i32); 8] = [
            (0, -1),
            (-1, 0),
            (1, 0),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &EIGHT[..4],
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Options for seam dilation.
#[derive(Debug, Clone, Default)]
pub struct DilateOptions {
    /// Number of passes. `None` uses the atlas padding (default: `None`).
    pub margin: Option<u32>,

    /// Neighborhood (default: [`Connectivity::Eight`]).
    pub connectivity: Connectivity,
}

impl DilateOptions {
    /// Set an explicit margin.
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Set the neighborhood.
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }
}

/// Dilate `image` in place by up to `margin` passes.
///
/// Baked texels are never modified. Returns the number of texels written.
pub fn dilate(image: &mut TextureImage, margin: u32, connectivity: Connectivity, progress: &Progress) -> usize {
    let width = image.width() as i64;
    let height = image.height() as i64;
    let offsets = connectivity.offsets();

    let neighbors = move |index: usize| {
        let x = index as i64 % width;
        let y = index as i64 / width;
        offsets.iter().filter_map(move |&(dx, dy)| {
            let nx = x + dx as i64;
            let ny = y + dy as i64;
            (nx >= 0 && ny >= 0 && nx < width && ny < height).then(|| (ny * width + nx) as usize)
        })
    };
    let coords = |index: usize| ((index as i64 % width) as u32, (index as i64 / width) as u32);

    let mut frontier: Vec<usize> = image
        .states()
        .iter()
        .enumerate()
        .filter(|(_, &s)| s != TexelState::Background)
        .map(|(i, _)| i)
        .collect();
    let mut queued = vec![false; image.states().len()];
    let mut written = 0;

    for pass in 0..margin {
        progress.report(Stage::Dilate, pass as usize, margin as usize);

        let mut candidates: Vec<usize> = Vec::new();
        for &source in &frontier {
            for n in neighbors(source) {
                if !queued[n] && image.states()[n] == TexelState::Background {
                    queued[n] = true;
                    candidates.push(n);
                }
            }
        }
        if candidates.is_empty() {
            break;
        }
        candidates.sort_unstable();

        // Donors are read before any write of this pass.
        let updates: Vec<(usize, _)> = candidates
            .iter()
            .filter_map(|&c| {
                neighbors(c)
                    .find(|&n| image.states()[n] != TexelState::Background)
                    .map(|donor| (c, image.texels()[donor]))
            })
            .collect();

        for &(index, color) in &updates {
            let (x, y) = coords(index);
            image.set(x, y, color, TexelState::Dilated);
        }
        written += updates.len();
        frontier = candidates;
    }

    progress.finish(Stage::Dilate);
    debug!("dilated {} texels over at most {} passes", written, margin);
    written
}
