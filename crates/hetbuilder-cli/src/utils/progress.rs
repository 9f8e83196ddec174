use hetbuilder::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct DisplayState {
    bar: ProgressBar,
    phase: String,
    /// Tolerance and position of the current sweep level, if any.
    level: Option<(f64, usize, usize)>,
}

impl DisplayState {
    /// Bar prefix: the phase name, extended by the sweep level while a
    /// tolerance sweep runs.
    fn label(&self) -> String {
        match self.level {
            Some((tolerance, level, total)) => {
                format!("{} @ {:.3} A [{}/{}]", self.phase, tolerance, level, total)
            }
            None => self.phase.clone(),
        }
    }
}

/// Renders engine progress events as an indicatif spinner per phase and a
/// bar over the angle grid of each coincidence search.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<DisplayState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(DisplayState {
                bar,
                phase: String::new(),
                level: None,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress display mutex was poisoned; dropping event.");
                return;
            };
            state.apply(progress);
        })
    }
}

impl DisplayState {
    fn apply(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.phase = name.to_string();
                self.level = None;
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar.set_message(self.label());
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                self.bar
                    .finish_with_message(format!("✓ {}", self.phase));
                self.level = None;
            }
            Progress::ToleranceLevel {
                tolerance,
                level,
                total,
            } => {
                self.level = Some((tolerance, level, total));
                self.bar.set_message(self.label());
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_style(bar_style());
                self.bar.set_length(total_steps);
                self.bar.set_position(0);
                self.bar.set_message(self.label());
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(total) = self.bar.length() {
                    self.bar.set_position(total);
                }
            }
            Progress::Message(msg) => self.bar.println(format!("  {}", msg)),
        }
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} angles ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        )
        .progress_chars("=>-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn new_handler_starts_finished_and_empty() {
        let handler = CliProgressHandler::new();
        let state = handler.state.lock().unwrap();
        assert!(state.bar.is_finished());
        assert_eq!(state.bar.length(), Some(0));
        assert!(state.level.is_none());
    }

    #[test]
    fn search_events_drive_the_angle_bar() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Coincidence Search",
        });
        callback(Progress::TaskStart { total_steps: 91 });
        callback(Progress::TaskIncrement);
        callback(Progress::TaskIncrement);
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.length(), Some(91));
            assert_eq!(state.bar.position(), 2);
            assert_eq!(state.bar.message(), "Coincidence Search");
        }

        callback(Progress::TaskFinish);
        callback(Progress::PhaseFinish);
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.position(), 91);
        assert!(state.bar.is_finished());
        assert_eq!(state.bar.message(), "✓ Coincidence Search");
    }

    #[test]
    fn tolerance_level_is_shown_until_the_phase_ends() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Tolerance Sweep",
        });
        callback(Progress::ToleranceLevel {
            tolerance: 0.1,
            level: 2,
            total: 4,
        });
        callback(Progress::TaskStart { total_steps: 1 });
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.message(), "Tolerance Sweep @ 0.100 A [2/4]");
        }

        callback(Progress::PhaseFinish);
        let state = handler.state.lock().unwrap();
        assert!(state.level.is_none());
    }

    #[test]
    fn callback_can_be_called_from_worker_threads() {
        let handler = CliProgressHandler::new();
        let callback = Arc::new(handler.get_callback());
        callback(Progress::TaskStart { total_steps: 8 });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let callback = callback.clone();
                thread::spawn(move || {
                    callback(Progress::TaskIncrement);
                    callback(Progress::TaskIncrement);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.position(), 8);
    }
}
