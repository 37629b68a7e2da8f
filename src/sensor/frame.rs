// SPDX-License-Identifier: GPL-3.0-or-later
use image::Luma;
use ndarray::{s, Array2};

use crate::image_buffer::ThermalImage;
use crate::temperature::Temperature;

/// The number of rows in a frame as written by the sensor daemon.
pub(crate) const SENSOR_ROWS: usize = 16;

/// The number of columns in a frame as written by the sensor daemon.
pub(crate) const SENSOR_COLUMNS: usize = 4;

/// The size of one record in the sensor FIFO, a little-endian `u16` per pixel.
pub(crate) const FRAME_BYTES: usize = SENSOR_ROWS * SENSOR_COLUMNS * 2;

/// A single frame from the thermopile array.
///
/// The image is [`SENSOR_COLUMNS`] pixels wide and [`SENSOR_ROWS`] pixels tall, with each pixel
/// in degrees Celsius.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ThermalFrame(ThermalImage);

impl ThermalFrame {
    /// Decode a record from the sensor daemon.
    ///
    /// The daemon writes the samples as hundredths of a Kelvin. They are laid out row-major in a
    /// 16x4 grid that is upside down and mirrored relative to the camera, so both axes are
    /// reversed here.
    pub(crate) fn decode(record: &[u8; FRAME_BYTES]) -> Self {
        let samples: Vec<f32> = record
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .map(|raw| Temperature::<f32>::from_centikelvin(raw).in_celsius())
            .collect();
        let grid = Array2::from_shape_vec((SENSOR_ROWS, SENSOR_COLUMNS), samples)
            .expect("a full record to fill the sensor grid");
        let grid = grid.slice(s![..;-1, ..;-1]);
        let image = ThermalImage::from_fn(SENSOR_COLUMNS as u32, SENSOR_ROWS as u32, |x, y| {
            Luma([grid[[y as usize, x as usize]]])
        });
        Self(image)
    }

    pub(crate) fn image(&self) -> &ThermalImage {
        &self.0
    }

    /// The coldest and hottest points in the frame.
    pub(crate) fn range(&self) -> (Temperature, Temperature) {
        let (min, max) = self
            .0
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), value| {
                (min.min(*value), max.max(*value))
            });
        (Temperature::Celsius(min), Temperature::Celsius(max))
    }
}

impl From<ThermalImage> for ThermalFrame {
    fn from(image: ThermalImage) -> Self {
        Self(image)
    }
}
