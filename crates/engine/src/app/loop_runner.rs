use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::game::{Game, TICK_MS};
use crate::map::{CAMERA_HEIGHT, CAMERA_WIDTH};

use super::frame::PixelFrame;
use super::input::InputCollector;
use super::metrics::MetricsAccumulator;
use super::session::{deliver_commands, follow_map_change, MapLoader};
use super::MetricsHandle;

pub const SLOW_FRAME_ENV_VAR: &str = "QUESTLINE_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    /// Window pixels per game pixel.
    pub scale: u32,
    pub tick: Duration,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Questline".to_string(),
            scale: 3,
            tick: Duration::from_millis(TICK_MS),
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 10,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, game: Game, loader: Box<dyn MapLoader>) -> Result<(), AppError> {
    run_app_with_metrics(config, game, loader, MetricsHandle::default())
}

/// Opens the window and runs `game` until the window closes or Escape is
/// pressed. Simulation advances in fixed ticks; each redraw presents one frame.
pub fn run_app_with_metrics(
    config: LoopConfig,
    mut game: Game,
    mut loader: Box<dyn MapLoader>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let frame_width = CAMERA_WIDTH as u32;
    let frame_height = CAMERA_HEIGHT as u32;
    let scale = config.scale.max(1);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                (frame_width * scale) as f64,
                (frame_height * scale) as f64,
            ))
            .with_min_inner_size(LogicalSize::new(frame_width as f64, frame_height as f64))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut pixels = build_pixels(Arc::clone(&window), frame_width, frame_height)
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let fixed_dt = normalize_non_zero_duration(config.tick, Duration::from_millis(TICK_MS));
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let render_frame_target = target_frame_duration(config.max_render_fps.filter(|fps| *fps > 0));

    info!(
        tick_ms = fixed_dt.as_millis() as u64,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        scale,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        "loop_config"
    );

    game.start();
    let mut input = InputCollector::default();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics = MetricsAccumulator::new(metrics_log_interval, Instant::now());

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(size) => {
                    if size.width == 0 || size.height == 0 {
                        return;
                    }
                    if let Err(error) = pixels.resize_surface(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(false) => input.release_all(),
                WindowEvent::KeyboardInput { event, .. } => {
                    input.handle_key_event(&event);
                    if input.quit_requested() {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if slow_frame_delay > Duration::ZERO {
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    accumulator = accumulator.saturating_add(raw_frame_dt.min(max_frame_delta));

                    let plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..plan.ticks_to_run {
                        deliver_commands(&mut game, input.take_events());
                        game.tick();
                        follow_map_change(&mut game, loader.as_mut());
                    }
                    accumulator = plan.remaining_accumulator;
                    if game.quit_requested() {
                        info!(reason = "game_over_quit", "shutdown_requested");
                        window_target.exit();
                    }
                    let dropped_ticks = (plan.dropped_backlog.as_nanos() / fixed_dt.as_nanos()) as u32;
                    if dropped_ticks > 0 {
                        warn!(
                            dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame,
                            "sim_clamp_triggered"
                        );
                    }
                    metrics.record_ticks(plan.ticks_to_run, dropped_ticks);

                    let cap_sleep = compute_cap_sleep(
                        Instant::now().saturating_duration_since(last_present_instant),
                        render_frame_target,
                    );
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    game.draw(&mut PixelFrame::new(pixels.frame_mut(), frame_width, frame_height));
                    if let Err(error) = pixels.render() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                    metrics.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            dropped_ticks = snapshot.dropped_ticks,
                            entity_count = game.map().store().entity_count(),
                            map = %game.map().store().map_id(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => info!(map = %game.map().store().map_id(), "shutdown"),
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn build_pixels(window: Arc<Window>, width: u32, height: u32) -> Result<Pixels<'static>, PixelsError> {
    let size = window.inner_size();
    let surface = SurfaceTexture::new(size.width, size.height, window);
    Pixels::new(width, height, surface)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(mut accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator -= fixed_dt;
        ticks_to_run += 1;
    }
    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    let fallback = Duration::from_millis(config_slow_frame_ms);
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(env_var = SLOW_FRAME_ENV_VAR, value = %value, "invalid_slow_frame_value");
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(error) => {
            warn!(env_var = SLOW_FRAME_ENV_VAR, error = %error, "unreadable_slow_frame_value");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_consume_whole_ticks_only() {
        let plan = plan_sim_steps(Duration::from_millis(35), Duration::from_millis(10), 10);
        assert_eq!(plan.ticks_to_run, 3);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(5));
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn backlog_beyond_the_tick_cap_is_dropped() {
        let plan = plan_sim_steps(Duration::from_millis(250), Duration::from_millis(10), 10);
        assert_eq!(plan.ticks_to_run, 10);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
        assert_eq!(plan.dropped_backlog, Duration::from_millis(150));
    }

    #[test]
    fn render_cap_sleeps_only_when_early() {
        let target = target_frame_duration(Some(50));
        let frame = target.expect("capped frame duration");
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(5), target),
            frame - Duration::from_millis(5)
        );
        assert_eq!(compute_cap_sleep(Duration::from_millis(30), target), Duration::ZERO);
        assert_eq!(compute_cap_sleep(Duration::from_millis(5), None), Duration::ZERO);
    }

    #[test]
    fn zero_durations_fall_back() {
        let fallback = Duration::from_millis(10);
        assert_eq!(normalize_non_zero_duration(Duration::ZERO, fallback), fallback);
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(3), fallback),
            Duration::from_millis(3)
        );
    }
}
