// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::anyhow;
use image::{GrayImage, Pixel, Rgba, RgbImage, RgbaImage};

/// Attach an alpha channel to the overlay.
pub(crate) fn with_alpha(overlay: &RgbImage, alpha: u8) -> RgbaImage {
    let mut layer = RgbaImage::new(overlay.width(), overlay.height());
    for (source, dest) in overlay.pixels().zip(layer.pixels_mut()) {
        let mut pixel = source.to_rgba();
        pixel.channels_mut()[3] = alpha;
        *dest = pixel;
    }
    layer
}

/// Blend the overlay on top of the camera frame.
///
/// The whole overlay is blended, including the fill around the thermal image.
pub(crate) fn composite(
    background: &GrayImage,
    overlay: &RgbImage,
    alpha: u8,
) -> anyhow::Result<RgbImage> {
    if background.dimensions() != overlay.dimensions() {
        return Err(anyhow!(
            "overlay is {:?} but the camera frame is {:?}",
            overlay.dimensions(),
            background.dimensions()
        ));
    }
    let mut flattened = RgbImage::new(background.width(), background.height());
    let pixels = background.pixels().zip(overlay.pixels());
    for ((background, color), dest) in pixels.zip(flattened.pixels_mut()) {
        let mut layered: Rgba<u8> = background.to_rgba();
        let mut color = color.to_rgba();
        color.channels_mut()[3] = alpha;
        layered.blend(&color);
        *dest = layered.to_rgb();
    }
    Ok(flattened)
}
