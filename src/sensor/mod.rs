// SPDX-License-Identifier: GPL-3.0-or-later
mod frame;
mod reader;
mod settings;

pub(crate) use frame::{ThermalFrame, FRAME_BYTES};
pub(crate) use reader::{open_fifo, FrameReader};
pub(crate) use settings::SensorSettings;
