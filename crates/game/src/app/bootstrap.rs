use std::env;
use std::path::PathBuf;

use engine::{Equipment, Game, GameState, LoopConfig, MapLoader, Savegame, Treasure};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::collaborators::logged_collaborators;
use super::maps::{BuiltinMaps, MapDirectory, DEFAULT_MAP_ID};

const MAP_ENV_VAR: &str = "QUESTLINE_MAP";
const HEADLESS_TICKS_ENV_VAR: &str = "QUESTLINE_HEADLESS_TICKS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) game: Game,
    pub(crate) loader: Box<dyn MapLoader>,
    /// Run this many ticks without a window instead of opening one.
    pub(crate) headless_ticks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartupSettings {
    /// Directory holding the maps; `None` uses the built-in ones.
    pub(crate) map_dir: Option<PathBuf>,
    pub(crate) start_map: String,
    pub(crate) headless_ticks: Option<u32>,
}

impl StartupSettings {
    fn from_env() -> Self {
        Self::from_values(
            env::var(MAP_ENV_VAR).ok(),
            env::var(HEADLESS_TICKS_ENV_VAR).ok(),
        )
    }

    /// A map path `<dir>/<id>.json` starts on map `<id>` and resolves the maps
    /// teletransporters lead to in the same directory.
    fn from_values(map_path: Option<String>, headless_ticks: Option<String>) -> Self {
        let headless_ticks = headless_ticks.and_then(|raw| match raw.trim().parse::<u32>() {
            Ok(0) | Err(_) => {
                warn!(env_var = HEADLESS_TICKS_ENV_VAR, value = %raw, "invalid_headless_ticks");
                None
            }
            Ok(ticks) => Some(ticks),
        });

        let map_path = map_path.filter(|raw| !raw.trim().is_empty()).map(PathBuf::from);
        let start = map_path.as_deref().and_then(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            Some((dir, stem))
        });
        let (map_dir, start_map) = match (start, map_path) {
            (Some((dir, stem)), _) => (Some(dir), stem),
            (None, Some(path)) => {
                warn!(env_var = MAP_ENV_VAR, value = %path.display(), "invalid_map_path");
                (None, DEFAULT_MAP_ID.to_string())
            }
            (None, None) => (None, DEFAULT_MAP_ID.to_string()),
        };

        Self {
            map_dir,
            start_map,
            headless_ticks,
        }
    }
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Questline Startup ===");
    build_wiring(StartupSettings::from_env())
}

pub(crate) fn build_wiring(settings: StartupSettings) -> Result<AppWiring, String> {
    let mut loader: Box<dyn MapLoader> = match &settings.map_dir {
        Some(dir) => Box::new(MapDirectory::new(dir.clone())),
        None => Box::new(BuiltinMaps::default()),
    };
    let map = loader.load_map(&settings.start_map)?;
    info!(
        map = %settings.start_map,
        map_dir = settings
            .map_dir
            .as_ref()
            .map_or_else(|| "<built-in>".to_string(), |dir| dir.display().to_string()),
        headless_ticks = settings.headless_ticks,
        "startup_map_ready"
    );

    let game = Game::new(map, starting_state(), logged_collaborators());
    Ok(AppWiring {
        config: LoopConfig::default(),
        game,
        loader,
        headless_ticks: settings.headless_ticks,
    })
}

/// Equipment of a fresh savegame: a sword, some bombs and a boomerang.
pub(crate) fn starting_state() -> GameState {
    let mut equipment = Equipment::default();
    equipment.set_ability("sword", 1);
    equipment.set_ability("lift", 1);
    equipment.set_item("bombs", 1, Some(10));
    equipment.obtain(&Treasure::new("bombs", 5));
    equipment.set_item("boomerang", 1, None);
    equipment.assign_item(0, Some("bombs".to_string()));
    equipment.assign_item(1, Some("boomerang".to_string()));
    equipment.add_money(20);
    GameState::new(equipment, Savegame::default())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_built_in_village() {
        let settings = StartupSettings::from_values(None, None);
        assert_eq!(
            settings,
            StartupSettings {
                map_dir: None,
                start_map: "village".to_string(),
                headless_ticks: None,
            }
        );
    }

    #[test]
    fn invalid_headless_ticks_are_ignored() {
        for raw in ["abc", "-3", "0", ""] {
            let settings = StartupSettings::from_values(None, Some(raw.to_string()));
            assert_eq!(settings.headless_ticks, None, "{raw}");
        }
        let settings = StartupSettings::from_values(None, Some("250".to_string()));
        assert_eq!(settings.headless_ticks, Some(250));
    }

    #[test]
    fn map_path_selects_directory_and_start_map() {
        let settings = StartupSettings::from_values(Some("content/maps/cave.json".to_string()), None);
        assert_eq!(settings.map_dir, Some(PathBuf::from("content/maps")));
        assert_eq!(settings.start_map, "cave");

        let bare = StartupSettings::from_values(Some("village.json".to_string()), None);
        assert_eq!(bare.map_dir, Some(PathBuf::from(".")));
        assert_eq!(bare.start_map, "village");
    }

    #[test]
    fn starting_state_equips_both_slots() {
        let state = starting_state();
        assert!(state.equipment.has_ability("sword"));
        assert_eq!(state.equipment.item_amount("bombs"), 5);
        assert_eq!(state.equipment.assigned_item(0), Some("bombs"));
        assert_eq!(state.equipment.assigned_item(1), Some("boomerang"));
        assert_eq!(state.equipment.money(), 20);
    }

    #[test]
    fn missing_map_file_fails_startup() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("castle.json");
        let settings = StartupSettings::from_values(Some(path.display().to_string()), None);
        let error = build_wiring(settings).err().expect("no castle map");
        assert!(error.starts_with("read map"), "{error}");
    }

    #[test]
    fn built_in_start_map_wires_a_game() {
        let wiring = build_wiring(StartupSettings::from_values(None, Some("5".to_string())))
            .expect("village wiring");
        assert_eq!(wiring.game.map().store().map_id(), "village");
        assert_eq!(wiring.headless_ticks, Some(5));
    }
}
