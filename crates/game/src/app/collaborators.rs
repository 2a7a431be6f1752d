use engine::{Collaborators, Command, DialogBox, EntityType, ScriptHooks, SoundPlayer, Treasure};
use tracing::{debug, info};

/// Dialog box without a text layer: every dialog closes as soon as it opens
/// and questions get the first answer.
#[derive(Debug, Default)]
pub(crate) struct LoggedDialogs {
    last_dialog: Option<String>,
}

impl DialogBox for LoggedDialogs {
    fn start_dialog(&mut self, dialog_id: &str) {
        info!(dialog = dialog_id, "dialog_shown");
        self.last_dialog = Some(dialog_id.to_string());
    }

    fn set_variable(&mut self, dialog_id: &str, value: String) {
        debug!(dialog = dialog_id, value = %value, "dialog_variable_set");
    }

    fn last_answer(&self) -> Option<usize> {
        self.last_dialog.as_ref().map(|_| 0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoggedSounds;

impl SoundPlayer for LoggedSounds {
    fn play_sound(&mut self, sound_id: &str) {
        debug!(sound = sound_id, "sound_requested");
    }
}

/// Script layer stand-in that reports map events to the log.
#[derive(Debug, Default)]
pub(crate) struct LoggedHooks;

impl ScriptHooks for LoggedHooks {
    fn on_map_started(&mut self, map_id: &str) {
        info!(map = map_id, "script_map_started");
    }

    fn on_tileset_changed(&mut self, tileset_id: &str) {
        info!(tileset = tileset_id, "script_tileset_changed");
    }

    fn on_entity_removed(&mut self, name: &str, entity_type: EntityType) {
        debug!(name, entity_type = ?entity_type, "script_entity_removed");
    }

    fn on_switch_activated(&mut self, name: &str) {
        info!(name, "script_switch_activated");
    }

    fn on_switch_inactivated(&mut self, name: &str) {
        info!(name, "script_switch_inactivated");
    }

    fn on_sensor_activated(&mut self, name: &str) {
        info!(name, "script_sensor_activated");
    }

    fn on_enemy_dead(&mut self, name: &str) {
        info!(name, "script_enemy_dead");
    }

    fn on_shop_item_bought(&mut self, name: &str) {
        info!(name, "script_shop_item_bought");
    }

    fn on_treasure_obtained(&mut self, treasure: &Treasure) {
        info!(item = %treasure.item, variant = treasure.variant, "script_treasure_obtained");
    }

    fn on_teletransporter_activated(&mut self, name: &str) {
        debug!(name, "script_teletransporter_activated");
    }

    fn on_separator_crossed(&mut self, name: &str, direction4: u8) {
        debug!(name, direction4, "script_separator_crossed");
    }

    fn on_game_over_started(&mut self) {
        info!("script_game_over_started");
    }

    fn on_game_over_finished(&mut self) {
        info!("script_game_over_finished");
    }

    fn on_command_pressed(&mut self, command: Command) -> bool {
        debug!(command = ?command, "script_command_pressed");
        false
    }
}

pub(crate) fn logged_collaborators() -> Collaborators {
    Collaborators {
        dialogs: Box::new(LoggedDialogs::default()),
        sounds: Box::new(LoggedSounds),
        hooks: Box::new(LoggedHooks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogs_close_at_once_and_answer_first_choice() {
        let mut dialogs = LoggedDialogs::default();
        assert!(!dialogs.is_enabled());
        assert_eq!(dialogs.last_answer(), None);

        dialogs.start_dialog("shop.question");
        assert!(!dialogs.is_enabled());
        assert_eq!(dialogs.last_answer(), Some(0));
    }

    #[test]
    fn hooks_never_swallow_commands() {
        let mut hooks = LoggedHooks;
        assert!(!hooks.on_command_pressed(Command::Action));
        assert!(hooks.on_shop_item_buying("bomb_bag"));
    }
}
