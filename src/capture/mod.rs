// SPDX-License-Identifier: GPL-3.0-or-later
mod settings;
mod still;

pub(crate) use settings::CaptureSettings;
pub(crate) use still::{capture_still, StillFrame};
