mod frame;
mod input;
mod loop_runner;
mod metrics;
mod session;

pub use frame::PixelFrame;
pub use input::{command_for_key, CommandEvent};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use session::{run_headless, HeadlessSummary, MapLoader, ScriptedCommand};
