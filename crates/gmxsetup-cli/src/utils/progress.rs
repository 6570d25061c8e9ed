use gmxsetup::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct StageBar {
    pb: ProgressBar,
    stage: String,
}

/// Shows one spinner per setup stage, labelled with the GROMACS tool currently running.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<StageBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new_spinner()
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(target);
        pb.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(StageBar {
                pb,
                stage: String::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut guard) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };
            let StageBar { pb, stage } = &mut *guard;

            match progress {
                Progress::StageStart { name } => {
                    pb.reset();
                    pb.set_style(Self::spinner_style());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb.set_message(name.to_string());
                    *stage = name.to_string();
                }
                Progress::ToolStart { tool } => {
                    pb.set_message(format!("{} ({})", stage, tool));
                }
                Progress::StageFinish => {
                    pb.disable_steady_tick();
                    pb.finish_with_message(format!("✓ {}", stage));
                }
                Progress::Warning(warning) => {
                    pb.println(format!("  ⚠ {}", warning));
                }
                Progress::Message(msg) => {
                    pb.println(format!("  {}", msg));
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Failed to create spinner style template")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmxsetup::core::tools::Tool;
    use gmxsetup::engine::state::{SetupWarning, WarningKind};
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = hidden();
        let state = handler.state.lock().unwrap();
        assert!(state.pb.is_finished());
        assert!(state.stage.is_empty());
    }

    #[test]
    fn callback_tracks_stage_and_tool() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::StageStart { name: "solvate" });
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.pb.message(), "solvate");
            assert!(!state.pb.is_finished());
        }

        callback(Progress::ToolStart {
            tool: Tool::Genion,
        });
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.pb.message(), format!("solvate ({})", Tool::Genion));
        }

        callback(Progress::Warning(SetupWarning {
            kind: WarningKind::BadParameter,
            message: "qtot = 0.4".to_string(),
        }));
        callback(Progress::StageFinish);
        {
            let state = handler.state.lock().unwrap();
            assert!(state.pb.is_finished());
            assert_eq!(state.pb.message(), "✓ solvate");
        }
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::StageStart { name: "topology" });
            callback(Progress::Message("pdb2gmx done".to_string()));
            callback(Progress::StageFinish);
        })
        .join()
        .unwrap();

        let state = handler.state.lock().unwrap();
        assert!(state.pb.is_finished());
        assert_eq!(state.pb.message(), "✓ topology");
    }
}
