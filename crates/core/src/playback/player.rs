use std::time::{Duration, Instant};

use crate::error::ShowError;
use crate::hardware::RelaySink;
use crate::script::Script;

/// Replay a script against a sink in real time.
///
/// Command timeouts are nominal waits; every iteration also burns real time
/// on hardware writes and scheduling. That overhead accumulates in
/// `time_lost` and is paid back by shortening later waits, so the lights
/// track the audio over a whole song instead of drifting behind it. A wait
/// smaller than the backlog is skipped outright rather than shortened below
/// zero, which means playback can lag a busy moment but never runs ahead of
/// the score.
///
/// Returns the leftover `time_lost` as a drift diagnostic.
pub async fn play_script(script: &Script, sink: &mut dyn RelaySink) -> Result<f64, ShowError> {
    let mut time_lost: f64 = 0.0;

    for command in script.commands() {
        log::debug!(
            "timeout {:.4}s, {} changes, {:.4}s lost",
            command.timeout,
            command.changes.len(),
            time_lost
        );

        let started = Instant::now();
        let mut slept = 0.0;

        if command.timeout > 0.0 {
            let diff = command.timeout - time_lost;
            if diff < 0.0 {
                // Behind by more than this whole wait: skip the sleep and
                // put the timeout toward the backlog.
                time_lost -= command.timeout;
            } else if diff > 0.0 {
                time_lost = 0.0;
                slept = diff;
                tokio::time::sleep(Duration::from_secs_f64(diff)).await;
            } else {
                time_lost = 0.0;
            }
        }

        for (channel, on) in &command.changes {
            sink.set_channel(channel, *on)?;
        }

        // Whatever this iteration cost beyond its scheduled sleep rolls
        // into the next correction.
        time_lost += started.elapsed().as_secs_f64() - slept;
    }

    Ok(time_lost)
}
