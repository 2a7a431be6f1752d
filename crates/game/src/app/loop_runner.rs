use std::process::ExitCode;

use engine::{
    run_app, run_headless, Command, CommandEvent, Game, HeadlessSummary, MapLoader, ScriptedCommand,
};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut game,
        mut loader,
        headless_ticks,
    } = app;

    if let Some(ticks) = headless_ticks {
        let summary = run_demo(&mut game, loader.as_mut(), ticks);
        info!(
            map = %summary.map_id,
            map_changes = summary.map_changes,
            "headless_exit"
        );
        return ExitCode::SUCCESS;
    }

    if let Err(err) = run_app(config, game, loader) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_demo(game: &mut Game, loader: &mut dyn MapLoader, ticks: u32) -> HeadlessSummary {
    run_headless(game, loader, ticks, &demo_script())
}

/// Walks east for two seconds, swings the sword, then walks north.
fn demo_script() -> Vec<ScriptedCommand> {
    let at = |tick, event| ScriptedCommand { tick, event };
    vec![
        at(0, CommandEvent::Pressed(Command::Right)),
        at(200, CommandEvent::Released(Command::Right)),
        at(210, CommandEvent::Pressed(Command::Attack)),
        at(212, CommandEvent::Released(Command::Attack)),
        at(260, CommandEvent::Pressed(Command::Up)),
        at(320, CommandEvent::Released(Command::Up)),
    ]
}
