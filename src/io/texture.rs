//! Texture image output.

use std::path::Path;

use log::debug;

use crate::algo::bake::TextureImage;
use crate::error::Result;
use crate::mesh::ColorChannels;

/// Encode a texture with the given channels. The format follows the file
/// extension; only PNG is enabled.
pub fn save<P: AsRef<Path>>(texture: &TextureImage, channels: ColorChannels, path: P) -> Result<()> {
    let path = path.as_ref();
    texture.to_dynamic_image(channels).save(path)?;
    debug!(
        "wrote {}x{} {:?} texture to {}",
        texture.width(),
        texture.height(),
        channels,
        path.display()
    );
    Ok(())
}
