// SPDX-License-Identifier: GPL-3.0-or-later
use std::panic;
use std::time::Duration;

use tokio::task::JoinError;

/// Collapse the result of a blocking task into a single [`anyhow::Result`].
///
/// Panics within the task are resumed on the current thread instead of being turned into errors.
pub(crate) fn flatten_join_result<T, E>(
    join_result: Result<Result<T, E>, JoinError>,
) -> anyhow::Result<T>
where
    anyhow::Error: From<E>,
{
    match join_result {
        Ok(inner_result) => Ok(inner_result?),
        Err(join_error) => {
            if join_error.is_panic() {
                panic::resume_unwind(join_error.into_panic());
            } else {
                Err(join_error.into())
            }
        }
    }
}

/// Convert a frame rate in frames per second into the delay between frames.
///
/// Rates that are not positive (or not finite) are rejected.
pub(crate) fn frame_period(frame_rate: f32) -> anyhow::Result<Duration> {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        seconds(frame_rate.recip())
    } else {
        Err(anyhow::anyhow!("invalid frame rate {}", frame_rate))
    }
}

/// Convert a number of seconds from the configuration into a [`Duration`].
///
/// Negative values are treated as zero. Values that are not finite, or too large for a
/// `Duration`, are rejected.
pub(crate) fn seconds(secs: f32) -> anyhow::Result<Duration> {
    if !secs.is_finite() {
        return Err(anyhow::anyhow!("invalid duration of {} seconds", secs));
    }
    Duration::try_from_secs_f32(secs.max(0.0))
        .map_err(|err| anyhow::anyhow!("invalid duration of {} seconds: {}", secs, err))
}
