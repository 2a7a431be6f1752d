//! Game-wide state and the collaborators the map runtime talks to.
//!
//! The registry never reaches for globals: every update receives a
//! [`Services`] bundle borrowing the game state, the command state and the
//! external collaborators (dialog box, sound player, script hooks).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::GameClock;
use crate::entities::kinds::SIDE_DESTINATION;
use crate::entities::{EntityType, MapEntities};
use crate::game_over::{GameOverChoice, GameOverOutcome, GameOverSequence};
use crate::map::Camera;
use crate::render::RenderTarget;

/// Length of one fixed simulation step.
pub const TICK_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Action,
    Attack,
    Item1,
    Item2,
    Pause,
    Right,
    Up,
    Left,
    Down,
}

impl Command {
    pub fn direction4(self) -> Option<u8> {
        match self {
            Command::Right => Some(0),
            Command::Up => Some(1),
            Command::Left => Some(2),
            Command::Down => Some(3),
            _ => None,
        }
    }

    pub fn is_direction(self) -> bool {
        self.direction4().is_some()
    }
}

/// Which commands are currently held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameCommands {
    pressed: HashSet<Command>,
}

impl GameCommands {
    pub fn is_pressed(&self, command: Command) -> bool {
        self.pressed.contains(&command)
    }

    /// Returns true on the press edge.
    pub fn press(&mut self, command: Command) -> bool {
        self.pressed.insert(command)
    }

    /// Returns true on the release edge.
    pub fn release(&mut self, command: Command) -> bool {
        self.pressed.remove(&command)
    }

    /// Direction8 formed by the held arrows; opposite arrows cancel out.
    pub fn wanted_direction8(&self) -> Option<u8> {
        let horizontal = i32::from(self.is_pressed(Command::Right)) - i32::from(self.is_pressed(Command::Left));
        let vertical = i32::from(self.is_pressed(Command::Up)) - i32::from(self.is_pressed(Command::Down));
        match (horizontal, vertical) {
            (1, 0) => Some(0),
            (1, 1) => Some(1),
            (0, 1) => Some(2),
            (-1, 1) => Some(3),
            (-1, 0) => Some(4),
            (-1, -1) => Some(5),
            (0, -1) => Some(6),
            (1, -1) => Some(7),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionKeyEffect {
    #[default]
    None,
    Look,
    Lift,
    Grab,
    Throw,
    Swim,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwordKeyEffect {
    #[default]
    None,
    Sword,
}

/// What the action and sword keys currently do, as shown by the HUD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeysEffect {
    pub action: ActionKeyEffect,
    pub sword: SwordKeyEffect,
}

fn default_variant() -> u32 {
    1
}

/// An item given to the hero, optionally remembered in the savegame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasure {
    pub item: String,
    #[serde(default = "default_variant")]
    pub variant: u32,
    #[serde(default)]
    pub savegame_variable: Option<String>,
}

impl Treasure {
    pub fn new(item: impl Into<String>, variant: u32) -> Self {
        Self {
            item: item.into(),
            variant,
            savegame_variable: None,
        }
    }

    pub fn with_savegame_variable(mut self, variable: impl Into<String>) -> Self {
        self.savegame_variable = Some(variable.into());
        self
    }

    pub fn dialog_id(&self) -> String {
        format!("_treasure.{}.{}", self.item, self.variant)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemState {
    pub variant: u32,
    pub amount: u32,
    /// Items without a maximum have no counter.
    pub max_amount: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equipment {
    money: u32,
    max_money: u32,
    life: i32,
    max_life: i32,
    abilities: HashMap<String, u32>,
    items: HashMap<String, ItemState>,
    slots: [Option<String>; 2],
}

impl Default for Equipment {
    fn default() -> Self {
        Self::new(12)
    }
}

impl Equipment {
    pub fn new(max_life: i32) -> Self {
        Self {
            money: 0,
            max_money: 999,
            life: max_life,
            max_life,
            abilities: HashMap::new(),
            items: HashMap::new(),
            slots: [None, None],
        }
    }

    pub fn money(&self) -> u32 {
        self.money
    }

    pub fn add_money(&mut self, amount: u32) {
        self.money = self.money.saturating_add(amount).min(self.max_money);
    }

    pub fn remove_money(&mut self, amount: u32) {
        self.money = self.money.saturating_sub(amount);
    }

    pub fn life(&self) -> i32 {
        self.life
    }

    pub fn max_life(&self) -> i32 {
        self.max_life
    }

    pub fn add_life(&mut self, amount: i32) {
        self.life = (self.life + amount).min(self.max_life);
    }

    pub fn remove_life(&mut self, amount: i32) {
        self.life = (self.life - amount).max(0);
    }

    pub fn ability(&self, name: &str) -> u32 {
        self.abilities.get(name).copied().unwrap_or(0)
    }

    pub fn has_ability(&self, name: &str) -> bool {
        self.ability(name) > 0
    }

    pub fn set_ability(&mut self, name: impl Into<String>, level: u32) {
        self.abilities.insert(name.into(), level);
    }

    pub fn item(&self, name: &str) -> Option<&ItemState> {
        self.items.get(name)
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.items.get(name).is_some_and(|item| item.variant > 0)
    }

    /// Declares an item and its counter; `max_amount` None for items without one.
    pub fn set_item(&mut self, name: impl Into<String>, variant: u32, max_amount: Option<u32>) {
        let item = self.items.entry(name.into()).or_default();
        item.variant = variant;
        item.max_amount = max_amount;
        if let Some(max) = max_amount {
            item.amount = item.amount.min(max);
        }
    }

    pub fn item_amount(&self, name: &str) -> u32 {
        self.items.get(name).map_or(0, |item| item.amount)
    }

    pub fn add_amount(&mut self, name: &str, amount: u32) {
        if let Some(item) = self.items.get_mut(name) {
            let max = item.max_amount.unwrap_or(u32::MAX);
            item.amount = item.amount.saturating_add(amount).min(max);
        }
    }

    pub fn remove_amount(&mut self, name: &str, amount: u32) {
        if let Some(item) = self.items.get_mut(name) {
            item.amount = item.amount.saturating_sub(amount);
        }
    }

    /// Whether buying or finding more of `name` would be wasted.
    pub fn is_amount_full(&self, name: &str) -> bool {
        self.items
            .get(name)
            .and_then(|item| item.max_amount.map(|max| item.amount >= max))
            .unwrap_or(false)
    }

    /// Item assigned to slot 0 (item 1) or 1 (item 2).
    pub fn assigned_item(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|item| item.as_deref())
    }

    pub fn assign_item(&mut self, slot: usize, item: Option<String>) {
        if let Some(current) = self.slots.get_mut(slot) {
            *current = item;
        }
    }

    /// Gives a treasure: the item takes the treasure's variant, and items with
    /// a counter gain `variant` units.
    pub fn obtain(&mut self, treasure: &Treasure) {
        let item = self.items.entry(treasure.item.clone()).or_default();
        if item.max_amount.is_some() {
            if item.variant == 0 {
                item.variant = 1;
            }
            let max = item.max_amount.unwrap_or(u32::MAX);
            item.amount = item.amount.saturating_add(treasure.variant).min(max);
        } else {
            item.variant = treasure.variant;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Savegame {
    booleans: HashSet<String>,
}

impl Savegame {
    pub fn get_boolean(&self, variable: &str) -> bool {
        self.booleans.contains(variable)
    }

    pub fn set_boolean(&mut self, variable: impl Into<String>, value: bool) {
        let variable = variable.into();
        if value {
            self.booleans.insert(variable);
        } else {
            self.booleans.remove(&variable);
        }
    }
}

/// A request to leave the current map, issued by a teletransporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapChange {
    pub map_id: String,
    pub destination: String,
    /// Scrolling direction for side transitions.
    pub transition_direction: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub equipment: Equipment,
    pub savegame: Savegame,
    pub keys_effect: KeysEffect,
    crystal_state: bool,
    pending_map_change: Option<MapChange>,
}

impl GameState {
    pub fn new(equipment: Equipment, savegame: Savegame) -> Self {
        Self {
            equipment,
            savegame,
            ..Self::default()
        }
    }

    pub fn crystal_state(&self) -> bool {
        self.crystal_state
    }

    /// Flips the crystal state and returns the new value.
    pub fn toggle_crystal_state(&mut self) -> bool {
        self.crystal_state = !self.crystal_state;
        self.crystal_state
    }

    pub fn request_map_change(&mut self, change: MapChange) {
        self.pending_map_change = Some(change);
    }

    pub fn pending_map_change(&self) -> Option<&MapChange> {
        self.pending_map_change.as_ref()
    }

    pub fn take_map_change(&mut self) -> Option<MapChange> {
        self.pending_map_change.take()
    }
}

/// Text box showing dialogs by id. Rendering the text is left to the host.
pub trait DialogBox {
    fn start_dialog(&mut self, _dialog_id: &str) {}
    /// Value substituted in the text of `dialog_id`, such as a price.
    fn set_variable(&mut self, _dialog_id: &str, _value: String) {}
    fn is_enabled(&self) -> bool {
        false
    }
    /// Answer chosen in the last question dialog (0 is the first answer).
    fn last_answer(&self) -> Option<usize> {
        None
    }
}

pub trait SoundPlayer {
    fn play_sound(&mut self, _sound_id: &str) {}
}

/// Notifications forwarded to the scripting layer.
pub trait ScriptHooks {
    fn on_map_started(&mut self, _map_id: &str) {}
    fn on_map_opening_transition_finished(&mut self, _map_id: &str) {}
    fn on_tileset_changed(&mut self, _tileset_id: &str) {}
    fn on_entity_removed(&mut self, _name: &str, _entity_type: EntityType) {}
    fn on_switch_activated(&mut self, _name: &str) {}
    fn on_switch_inactivated(&mut self, _name: &str) {}
    fn on_switch_left(&mut self, _name: &str) {}
    fn on_sensor_activated(&mut self, _name: &str) {}
    fn on_sensor_left(&mut self, _name: &str) {}
    fn on_enemy_dead(&mut self, _name: &str) {}
    /// Returning false cancels the purchase.
    fn on_shop_item_buying(&mut self, _name: &str) -> bool {
        true
    }
    fn on_shop_item_bought(&mut self, _name: &str) {}
    fn on_treasure_obtained(&mut self, _treasure: &Treasure) {}
    fn on_teletransporter_activated(&mut self, _name: &str) {}
    fn on_separator_crossed(&mut self, _name: &str, _direction4: u8) {}
    fn on_game_over_started(&mut self) {}
    fn on_game_over_finished(&mut self) {}
    /// Returning true means the script handled the command and the engine
    /// ignores it.
    fn on_command_pressed(&mut self, _command: Command) -> bool {
        false
    }
}

/// Collaborators that ignore everything.
#[derive(Debug, Default)]
pub struct NoopCollaborator;

impl DialogBox for NoopCollaborator {}
impl SoundPlayer for NoopCollaborator {}
impl ScriptHooks for NoopCollaborator {}

/// Borrowed view of everything an update may touch outside the map.
pub struct Services<'a> {
    pub now: u64,
    pub state: &'a mut GameState,
    pub commands: &'a GameCommands,
    pub dialogs: &'a mut dyn DialogBox,
    pub sounds: &'a mut dyn SoundPlayer,
    pub hooks: &'a mut dyn ScriptHooks,
}

impl Services<'_> {
    pub fn play_sound(&mut self, sound_id: &str) {
        debug!(sound = sound_id, "sound_played");
        self.sounds.play_sound(sound_id);
    }

    pub fn start_dialog(&mut self, dialog_id: &str) {
        debug!(dialog = dialog_id, "dialog_started");
        self.dialogs.start_dialog(dialog_id);
    }

    pub fn is_pressed(&self, command: Command) -> bool {
        self.commands.is_pressed(command)
    }
}

pub struct Collaborators {
    pub dialogs: Box<dyn DialogBox>,
    pub sounds: Box<dyn SoundPlayer>,
    pub hooks: Box<dyn ScriptHooks>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            dialogs: Box::new(NoopCollaborator),
            sounds: Box::new(NoopCollaborator),
            hooks: Box::new(NoopCollaborator),
        }
    }
}

impl Collaborators {
    fn services<'a>(
        &'a mut self,
        now: u64,
        state: &'a mut GameState,
        commands: &'a GameCommands,
    ) -> Services<'a> {
        Services {
            now,
            state,
            commands,
            dialogs: self.dialogs.as_mut(),
            sounds: self.sounds.as_mut(),
            hooks: self.hooks.as_mut(),
        }
    }
}

/// One running map with its game state, driven by fixed ticks.
pub struct Game {
    clock: GameClock,
    map: MapEntities,
    state: GameState,
    commands: GameCommands,
    camera: Camera,
    collaborators: Collaborators,
    suspended: bool,
    started: bool,
    game_over: Option<GameOverSequence>,
    quit_requested: bool,
}

impl Game {
    pub fn new(map: MapEntities, state: GameState, collaborators: Collaborators) -> Self {
        let camera = Camera::new(map.store().size());
        Self {
            clock: GameClock::default(),
            map,
            state,
            commands: GameCommands::default(),
            camera,
            collaborators,
            suspended: false,
            started: false,
            game_over: None,
            quit_requested: false,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn map(&self) -> &MapEntities {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapEntities {
        &mut self.map
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn commands(&self) -> &GameCommands {
        &self.commands
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn game_over(&self) -> Option<&GameOverSequence> {
        self.game_over.as_ref()
    }

    /// Set when the player picks "quit" on the game-over menu.
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Starts the map: builds tile caches and fires the start notifications.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let now = self.clock.now();
        let mut services = self
            .collaborators
            .services(now, &mut self.state, &self.commands);
        self.map.notify_map_started(&mut services);
        self.camera.update(self.map.hero().base().center(), now);
        self.map.notify_map_opening_transition_finished(&mut services);
        info!(
            map = %self.map.store().map_id(),
            entity_count = self.map.store().entity_count(),
            "map_started"
        );
    }

    /// Advances the clock by one tick and updates the map.
    pub fn tick(&mut self) {
        self.clock.advance(TICK_MS);
        self.update();
    }

    pub fn update(&mut self) {
        let now = self.clock.now();
        let suspend = self.collaborators.dialogs.is_enabled() || self.game_over.is_some();
        if suspend != self.suspended {
            self.suspended = suspend;
            self.map.set_suspended(suspend, now);
        }

        let mut services = self
            .collaborators
            .services(now, &mut self.state, &self.commands);
        self.map.update(&mut services);
        self.camera.update(self.map.hero().base().center(), now);

        if let Some(change) = self.state.pending_map_change() {
            debug!(
                map = %change.map_id,
                destination = %change.destination,
                "map_change_requested"
            );
        }
        self.update_game_over(now);
    }

    fn update_game_over(&mut self, now: u64) {
        let Some(sequence) = self.game_over.as_mut() else {
            if self.state.equipment.life() <= 0
                && self.map.hero().state().can_start_gameover_sequence()
            {
                self.start_game_over(now);
            }
            return;
        };
        let outcome = sequence.update(
            now,
            &mut self.state.equipment,
            self.collaborators.sounds.as_mut(),
        );
        self.finish_game_over(outcome, now);
    }

    fn start_game_over(&mut self, now: u64) {
        let mut services = self
            .collaborators
            .services(now, &mut self.state, &self.commands);
        let (hero, store) = self.map.parts_mut();
        hero.freeze(store, &mut services);
        services.hooks.on_game_over_started();
        self.game_over = Some(GameOverSequence::new(now));
        self.suspended = true;
        self.map.set_suspended(true, now);
        info!(map = %self.map.store().map_id(), "game_over_started");
    }

    fn finish_game_over(&mut self, outcome: GameOverOutcome, now: u64) {
        match outcome {
            GameOverOutcome::Running => return,
            GameOverOutcome::Chosen(GameOverChoice::Quit) => {
                info!("game_over_quit");
                self.quit_requested = true;
            }
            GameOverOutcome::Chosen(GameOverChoice::Continue) => {
                if !self.map.place_hero_on_destination(None) {
                    warn!(map = %self.map.store().map_id(), "map_has_no_default_destination");
                }
                info!(life = self.state.equipment.life(), "game_over_continue");
            }
            GameOverOutcome::Revived => {
                info!(life = self.state.equipment.life(), "hero_back_from_death");
            }
        }
        self.game_over = None;
        self.suspended = false;
        self.map.set_suspended(false, now);
        let mut services = self
            .collaborators
            .services(now, &mut self.state, &self.commands);
        let (hero, store) = self.map.parts_mut();
        hero.unfreeze(store, &mut services);
        services.hooks.on_game_over_finished();
        self.camera.update(self.map.hero().base().center(), now);
    }

    pub fn notify_command_pressed(&mut self, command: Command) {
        if !self.commands.press(command) {
            return;
        }
        if self.collaborators.hooks.on_command_pressed(command) {
            debug!(?command, "command_handled_by_script");
            return;
        }
        let now = self.clock.now();
        if let Some(sequence) = self.game_over.as_mut() {
            let outcome = sequence.notify_command_pressed(
                command,
                &mut self.state.equipment,
                self.collaborators.sounds.as_mut(),
            );
            self.finish_game_over(outcome, now);
            return;
        }
        if self.suspended {
            return;
        }
        let mut services = self
            .collaborators
            .services(now, &mut self.state, &self.commands);
        self.map.notify_command_pressed(command, &mut services);
    }

    pub fn notify_command_released(&mut self, command: Command) {
        self.commands.release(command);
    }

    pub fn take_map_change(&mut self) -> Option<MapChange> {
        self.state.take_map_change()
    }

    /// Replaces the running map with `map`, placing the hero as `change`
    /// asks, and starts it. The game state and held commands carry over.
    pub fn change_map(&mut self, mut map: MapEntities, change: &MapChange) {
        let previous = self.map.hero().base();
        let (previous_xy, previous_layer) = (previous.xy(), previous.layer());
        match side_of_destination(&change.destination) {
            Some(side) => {
                let along = if side % 2 == 0 {
                    previous_xy.y
                } else {
                    previous_xy.x
                };
                map.place_hero_on_side(side, along, previous_layer);
            }
            None => {
                if !map.place_hero_on_destination(Some(&change.destination)) {
                    warn!(
                        map = %change.map_id,
                        destination = %change.destination,
                        "destination_not_found"
                    );
                    map.place_hero_on_destination(None);
                }
            }
        }
        info!(
            from = %self.map.store().map_id(),
            to = %change.map_id,
            destination = %change.destination,
            "map_changed"
        );
        self.camera = Camera::new(map.store().size());
        self.map = map;
        self.suspended = false;
        self.started = false;
        self.start();
    }

    pub fn draw(&mut self, target: &mut dyn RenderTarget) {
        let now = self.clock.now();
        self.map.draw(target, self.camera.position(), now);
        if let Some(sequence) = &self.game_over {
            sequence.draw(target);
        }
    }
}

/// Side number of a "_side0" .. "_side3" destination.
fn side_of_destination(destination: &str) -> Option<u8> {
    let side = destination.strip_prefix(SIDE_DESTINATION)?.parse::<u8>().ok()?;
    (side < 4).then_some(side)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::map::{Ground, TilePattern, Tileset};

    /// Floor, wall, water, empty and diagonal 8x8 patterns plus animated lava.
    pub fn test_tileset() -> Tileset {
        let mut tileset = Tileset::new("test", [0, 0, 0, 255]);
        for (id, ground) in [
            ("floor", Ground::Traversable),
            ("wall", Ground::Wall),
            ("water", Ground::DeepWater),
            ("empty", Ground::Empty),
            ("diagonal", Ground::WallTopRight),
        ] {
            tileset.add_pattern(TilePattern::new(id, ground, 8, 8, [10, 10, 10, 255]).expect("pattern"));
        }
        tileset.add_pattern(
            TilePattern::animated("lava", Ground::Lava, 16, 16, vec![[255, 0, 0, 255], [200, 0, 0, 255]])
                .expect("animated pattern"),
        );
        tileset
    }

    #[derive(Debug, Default)]
    pub struct RecordingDialogs {
        pub started: Vec<String>,
        pub variables: Vec<(String, String)>,
        pub enabled: bool,
        pub answer: Option<usize>,
    }

    impl DialogBox for RecordingDialogs {
        fn start_dialog(&mut self, dialog_id: &str) {
            self.started.push(dialog_id.to_string());
            self.enabled = true;
        }

        fn set_variable(&mut self, dialog_id: &str, value: String) {
            self.variables.push((dialog_id.to_string(), value));
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn last_answer(&self) -> Option<usize> {
            self.answer
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingSounds {
        pub played: Vec<String>,
    }

    impl SoundPlayer for RecordingSounds {
        fn play_sound(&mut self, sound_id: &str) {
            self.played.push(sound_id.to_string());
        }
    }

    #[derive(Debug)]
    pub struct RecordingHooks {
        pub events: Vec<String>,
        pub allow_buying: bool,
    }

    impl Default for RecordingHooks {
        fn default() -> Self {
            Self {
                events: Vec::new(),
                allow_buying: true,
            }
        }
    }

    impl ScriptHooks for RecordingHooks {
        fn on_map_started(&mut self, map_id: &str) {
            self.events.push(format!("map_started:{map_id}"));
        }

        fn on_tileset_changed(&mut self, tileset_id: &str) {
            self.events.push(format!("tileset_changed:{tileset_id}"));
        }

        fn on_entity_removed(&mut self, name: &str, _entity_type: EntityType) {
            self.events.push(format!("removed:{name}"));
        }

        fn on_switch_activated(&mut self, name: &str) {
            self.events.push(format!("switch_activated:{name}"));
        }

        fn on_switch_inactivated(&mut self, name: &str) {
            self.events.push(format!("switch_inactivated:{name}"));
        }

        fn on_sensor_activated(&mut self, name: &str) {
            self.events.push(format!("sensor_activated:{name}"));
        }

        fn on_sensor_left(&mut self, name: &str) {
            self.events.push(format!("sensor_left:{name}"));
        }

        fn on_enemy_dead(&mut self, name: &str) {
            self.events.push(format!("enemy_dead:{name}"));
        }

        fn on_shop_item_buying(&mut self, name: &str) -> bool {
            self.events.push(format!("buying:{name}"));
            self.allow_buying
        }

        fn on_shop_item_bought(&mut self, name: &str) {
            self.events.push(format!("bought:{name}"));
        }

        fn on_treasure_obtained(&mut self, treasure: &Treasure) {
            self.events
                .push(format!("treasure:{}:{}", treasure.item, treasure.variant));
        }

        fn on_teletransporter_activated(&mut self, name: &str) {
            self.events.push(format!("teletransporter:{name}"));
        }

        fn on_separator_crossed(&mut self, name: &str, direction4: u8) {
            self.events.push(format!("separator:{name}:{direction4}"));
        }

        fn on_game_over_started(&mut self) {
            self.events.push("game_over_started".to_string());
        }

        fn on_game_over_finished(&mut self) {
            self.events.push("game_over_finished".to_string());
        }
    }

    /// Owns the collaborators a test hands to the map as [`Services`].
    #[derive(Debug, Default)]
    pub struct Fixture {
        pub now: u64,
        pub state: GameState,
        pub commands: GameCommands,
        pub dialogs: RecordingDialogs,
        pub sounds: RecordingSounds,
        pub hooks: RecordingHooks,
    }

    impl Fixture {
        pub fn services(&mut self) -> Services<'_> {
            Services {
                now: self.now,
                state: &mut self.state,
                commands: &self.commands,
                dialogs: &mut self.dialogs,
                sounds: &mut self.sounds,
                hooks: &mut self.hooks,
            }
        }

        pub fn has_event(&self, event: &str) -> bool {
            self.hooks.events.iter().any(|recorded| recorded == event)
        }
    }
}
