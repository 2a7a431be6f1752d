//! Map runtime of a top-down action adventure: tile obstacle grids, the
//! entity registry, collision dispatch, the hero state machine, and a
//! windowed or headless loop driving it all in fixed 10 ms ticks.

pub mod app;
pub mod clock;
pub mod entities;
pub mod game;
pub mod game_over;
pub mod geometry;
pub mod hero;
pub mod map;
pub mod movement;
pub mod render;

pub use app::{
    run_app, run_app_with_metrics, run_headless, AppError, CommandEvent, HeadlessSummary,
    LoopConfig, LoopMetricsSnapshot, MapLoader, MetricsHandle, ScriptedCommand, SLOW_FRAME_ENV_VAR,
};
pub use entities::{Entity, EntityId, EntityKind, EntityStore, EntityType, MapEntities};
pub use game::{
    Collaborators, Command, DialogBox, Equipment, Game, GameState, MapChange, Savegame,
    ScriptHooks, SoundPlayer, Treasure, TICK_MS,
};
pub use game_over::{GameOverChoice, GameOverPhase, GameOverSequence};
pub use geometry::{Layer, Point, Rect};
pub use hero::Hero;
pub use map::{Camera, Ground, MapData, MapDataError, TilePattern, TilePatternError, Tileset};
pub use render::{Color, RecordingTarget, RenderTarget, Surface};
