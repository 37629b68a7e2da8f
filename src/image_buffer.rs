// SPDX-License-Identifier: GPL-3.0-or-later
use bytes::Bytes;
use image::{ImageBuffer, Luma, Rgb};

/// Images where each point is a temperature in degrees Celsius.
pub(crate) type ThermalImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Single channel images with each point scaled into the range `0.0..=1.0`.
pub(crate) type ScaledImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Encoded preview frames are shared between every connected client, so a [bytes::Bytes] buffer
/// is used to avoid copying.
pub(crate) type EncodedFrame = Bytes;

/// The fill color used for overlay pixels not covered by the thermal image.
pub(crate) const FILL_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
