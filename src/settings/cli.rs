// SPDX-License-Identifier: GPL-3.0-or-later
use structopt::StructOpt;

use std::path::PathBuf;

#[derive(Debug, StructOpt)]
#[structopt(about = "Overlay a thermal image on a camera frame")]
pub(crate) struct Args {
    /// Path to a configuration file. Built-in defaults are used when not given.
    #[structopt(short, long = "config", parse(from_os_str))]
    pub(crate) config_path: Option<PathBuf>,

    /// Override the overlay frame rate from the configuration file.
    #[structopt(short, long)]
    pub(crate) frame_rate: Option<f32>,
}
