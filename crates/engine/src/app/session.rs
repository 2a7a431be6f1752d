//! Driving a [`Game`] tick by tick: command delivery, map changes and the
//! windowless runner.

use tracing::{info, warn};

use crate::entities::MapEntities;
use crate::game::Game;
use crate::geometry::Point;
use crate::map::{CAMERA_HEIGHT, CAMERA_WIDTH};
use crate::render::RecordingTarget;

use super::input::CommandEvent;

/// Source of the maps teletransporters lead to.
pub trait MapLoader {
    fn load_map(&mut self, map_id: &str) -> Result<MapEntities, String>;
}

pub(crate) fn deliver_commands(game: &mut Game, events: impl IntoIterator<Item = CommandEvent>) {
    for event in events {
        match event {
            CommandEvent::Pressed(command) => game.notify_command_pressed(command),
            CommandEvent::Released(command) => game.notify_command_released(command),
        }
    }
}

/// Loads and enters the map a teletransporter asked for, if any. A map that
/// fails to load leaves the hero where it is.
pub(crate) fn follow_map_change(game: &mut Game, loader: &mut dyn MapLoader) -> bool {
    let Some(change) = game.take_map_change() else {
        return false;
    };
    match loader.load_map(&change.map_id) {
        Ok(map) => {
            game.change_map(map, &change);
            true
        }
        Err(error) => {
            warn!(map = %change.map_id, error = %error, "map_change_failed");
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedCommand {
    pub tick: u32,
    pub event: CommandEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessSummary {
    pub ticks: u32,
    pub map_id: String,
    pub hero_xy: Point,
    pub entity_count: usize,
    pub life: i32,
    pub map_changes: u32,
    pub draw_calls: usize,
}

/// Runs `ticks` simulation steps without a window, feeding the scripted
/// commands at their tick, then draws one frame into a recording target.
pub fn run_headless(
    game: &mut Game,
    loader: &mut dyn MapLoader,
    ticks: u32,
    script: &[ScriptedCommand],
) -> HeadlessSummary {
    game.start();
    let mut map_changes = 0;
    let mut ran = 0;
    for tick in 0..ticks {
        if game.quit_requested() {
            info!(tick, "headless_run_quit");
            break;
        }
        ran += 1;
        deliver_commands(
            game,
            script
                .iter()
                .filter(|scripted| scripted.tick == tick)
                .map(|scripted| scripted.event),
        );
        game.tick();
        if follow_map_change(game, loader) {
            map_changes += 1;
        }
    }

    let mut target = RecordingTarget::new(CAMERA_WIDTH as u32, CAMERA_HEIGHT as u32);
    game.draw(&mut target);
    let summary = HeadlessSummary {
        ticks: ran,
        map_id: game.map().store().map_id().to_string(),
        hero_xy: game.map().hero().base().xy(),
        entity_count: game.map().store().entity_count(),
        life: game.state().equipment.life(),
        map_changes,
        draw_calls: target.calls().len(),
    };
    info!(
        ticks = ran,
        map = %summary.map_id,
        hero_x = summary.hero_xy.x,
        hero_y = summary.hero_xy.y,
        entity_count = summary.entity_count,
        life = summary.life,
        map_changes,
        draw_calls = summary.draw_calls,
        "headless_run_finished"
    );
    summary
}
