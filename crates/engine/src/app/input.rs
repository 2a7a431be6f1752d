use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::game::Command;

/// Keyboard layout: arrows move, space acts, C swings the sword, X and V use
/// the two item slots, D pauses.
pub fn command_for_key(key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::ArrowRight => Some(Command::Right),
        KeyCode::ArrowUp => Some(Command::Up),
        KeyCode::ArrowLeft => Some(Command::Left),
        KeyCode::ArrowDown => Some(Command::Down),
        KeyCode::Space => Some(Command::Action),
        KeyCode::KeyC => Some(Command::Attack),
        KeyCode::KeyX => Some(Command::Item1),
        KeyCode::KeyV => Some(Command::Item2),
        KeyCode::KeyD => Some(Command::Pause),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    Pressed(Command),
    Released(Command),
}

/// Turns key events into command press/release edges, delivered at the
/// next simulation tick.
#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    held: Vec<Command>,
    pending: Vec<CommandEvent>,
    quit_requested: bool,
}

impl InputCollector {
    pub(crate) fn handle_key_event(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        self.handle_key(code, event.state);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, state: ElementState) {
        if code == KeyCode::Escape {
            if state == ElementState::Pressed {
                self.quit_requested = true;
            }
            return;
        }
        let Some(command) = command_for_key(code) else {
            return;
        };
        match state {
            ElementState::Pressed => {
                // key repeat re-sends presses for held keys
                if !self.held.contains(&command) {
                    self.held.push(command);
                    self.pending.push(CommandEvent::Pressed(command));
                }
            }
            ElementState::Released => {
                if let Some(index) = self.held.iter().position(|held| *held == command) {
                    self.held.swap_remove(index);
                    self.pending.push(CommandEvent::Released(command));
                }
            }
        }
    }

    /// Releases everything held, e.g. when the window loses focus.
    pub(crate) fn release_all(&mut self) {
        for command in self.held.drain(..) {
            self.pending.push(CommandEvent::Released(command));
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<CommandEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_produces_a_single_press_edge() {
        let mut input = InputCollector::default();
        input.handle_key(KeyCode::ArrowLeft, ElementState::Pressed);
        input.handle_key(KeyCode::ArrowLeft, ElementState::Pressed);
        assert_eq!(input.take_events(), vec![CommandEvent::Pressed(Command::Left)]);
        assert!(input.take_events().is_empty());

        input.handle_key(KeyCode::ArrowLeft, ElementState::Released);
        assert_eq!(input.take_events(), vec![CommandEvent::Released(Command::Left)]);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut input = InputCollector::default();
        input.handle_key(KeyCode::KeyC, ElementState::Released);
        assert!(input.take_events().is_empty());
    }

    #[test]
    fn focus_loss_releases_held_commands() {
        let mut input = InputCollector::default();
        input.handle_key(KeyCode::Space, ElementState::Pressed);
        input.handle_key(KeyCode::ArrowUp, ElementState::Pressed);
        input.take_events();

        input.release_all();
        let events = input.take_events();
        assert_eq!(events.len(), 2);
        assert!(events.contains(&CommandEvent::Released(Command::Action)));
        assert!(events.contains(&CommandEvent::Released(Command::Up)));
    }

    #[test]
    fn escape_requests_quit_without_a_command() {
        let mut input = InputCollector::default();
        input.handle_key(KeyCode::Escape, ElementState::Pressed);
        assert!(input.quit_requested());
        assert!(input.take_events().is_empty());
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(command_for_key(KeyCode::KeyQ), None);
        assert_eq!(command_for_key(KeyCode::KeyX), Some(Command::Item1));
    }
}
