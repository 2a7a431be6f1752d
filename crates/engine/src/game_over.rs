//! Sequence shown once the hero runs out of life: a short pause, the dying
//! screen, then either a revival by the `get_back_from_death` ability or a
//! continue/quit menu.

use tracing::{debug, info};

use crate::game::{Command, Equipment, SoundPlayer};
use crate::geometry::Rect;
use crate::render::{Color, RenderTarget};

pub const GAME_OVER_START_DELAY_MS: u64 = 500;
pub const DYING_DURATION_MS: u64 = 2000;
pub const REVIVAL_DELAY_MS: u64 = 1000;
/// Life given back on revival or when the player continues.
pub const RESTORED_LIFE: i32 = 28;
pub const BACK_FROM_DEATH_ABILITY: &str = "get_back_from_death";

const DYING_COLOR: Color = [150, 0, 0, 255];
const MENU_COLOR: Color = [0, 0, 0, 255];
const OPTION_COLOR: Color = [90, 90, 90, 255];
const CURSOR_COLOR: Color = [240, 200, 60, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverChoice {
    Continue,
    Quit,
}

impl GameOverChoice {
    pub const ALL: [GameOverChoice; 2] = [GameOverChoice::Continue, GameOverChoice::Quit];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverPhase {
    Waiting { until: u64 },
    Dying { until: u64 },
    SavedByFairy { until: u64 },
    Menu { cursor: usize },
}

/// What the game must do after a step of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverOutcome {
    Running,
    /// The hero gets up where it fell.
    Revived,
    Chosen(GameOverChoice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOverSequence {
    phase: GameOverPhase,
}

impl GameOverSequence {
    pub fn new(now: u64) -> Self {
        Self {
            phase: GameOverPhase::Waiting {
                until: now + GAME_OVER_START_DELAY_MS,
            },
        }
    }

    pub fn phase(&self) -> GameOverPhase {
        self.phase
    }

    pub fn update(
        &mut self,
        now: u64,
        equipment: &mut Equipment,
        sounds: &mut dyn SoundPlayer,
    ) -> GameOverOutcome {
        match self.phase {
            GameOverPhase::Waiting { until } if now >= until => {
                sounds.play_sound("hero_dying");
                self.phase = GameOverPhase::Dying {
                    until: now + DYING_DURATION_MS,
                };
            }
            GameOverPhase::Dying { until } if now >= until => {
                let level = equipment.ability(BACK_FROM_DEATH_ABILITY);
                if level > 0 {
                    equipment.set_ability(BACK_FROM_DEATH_ABILITY, level - 1);
                    info!(remaining = level - 1, "saved_by_fairy");
                    self.phase = GameOverPhase::SavedByFairy {
                        until: now + REVIVAL_DELAY_MS,
                    };
                } else {
                    self.phase = GameOverPhase::Menu { cursor: 0 };
                }
            }
            GameOverPhase::SavedByFairy { until } if now >= until => {
                equipment.add_life(RESTORED_LIFE);
                return GameOverOutcome::Revived;
            }
            _ => {}
        }
        GameOverOutcome::Running
    }

    /// Menu input: arrows move the cursor, action or attack confirms.
    pub fn notify_command_pressed(
        &mut self,
        command: Command,
        equipment: &mut Equipment,
        sounds: &mut dyn SoundPlayer,
    ) -> GameOverOutcome {
        let GameOverPhase::Menu { cursor } = &mut self.phase else {
            return GameOverOutcome::Running;
        };
        let count = GameOverChoice::ALL.len();
        match command {
            Command::Down => {
                *cursor = (*cursor + 1) % count;
                sounds.play_sound("cursor");
            }
            Command::Up => {
                *cursor = (*cursor + count - 1) % count;
                sounds.play_sound("cursor");
            }
            Command::Action | Command::Attack => {
                sounds.play_sound("danger");
                equipment.add_life(RESTORED_LIFE);
                let choice = GameOverChoice::ALL[*cursor];
                debug!(?choice, "game_over_choice");
                return GameOverOutcome::Chosen(choice);
            }
            _ => {}
        }
        GameOverOutcome::Running
    }

    pub fn draw(&self, target: &mut dyn RenderTarget) {
        let (width, height) = target.size();
        let screen = Rect::new(0, 0, width as i32, height as i32);
        match self.phase {
            GameOverPhase::Dying { .. } => target.fill_rect(screen, DYING_COLOR),
            GameOverPhase::Menu { cursor } => {
                target.fill_rect(screen, MENU_COLOR);
                for index in 0..GameOverChoice::ALL.len() {
                    let row = Rect::new(screen.width / 2 - 40, 100 + index as i32 * 24, 80, 16);
                    target.fill_rect(row, OPTION_COLOR);
                    if index == cursor {
                        target.fill_rect(Rect::new(row.x - 16, row.y + 4, 8, 8), CURSOR_COLOR);
                    }
                }
            }
            GameOverPhase::Waiting { .. } | GameOverPhase::SavedByFairy { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::RecordingSounds;
    use crate::render::{DrawCall, RecordingTarget};

    fn dying_sequence(equipment: &mut Equipment, sounds: &mut RecordingSounds) -> GameOverSequence {
        let mut sequence = GameOverSequence::new(0);
        assert_eq!(sequence.update(499, equipment, sounds), GameOverOutcome::Running);
        sequence.update(500, equipment, sounds);
        assert_eq!(sequence.phase(), GameOverPhase::Dying { until: 2_500 });
        sequence
    }

    #[test]
    fn menu_appears_after_the_dying_screen() {
        let mut equipment = Equipment::new(12);
        equipment.remove_life(12);
        let mut sounds = RecordingSounds::default();
        let mut sequence = dying_sequence(&mut equipment, &mut sounds);

        sequence.update(2_500, &mut equipment, &mut sounds);
        assert_eq!(sequence.phase(), GameOverPhase::Menu { cursor: 0 });
        assert_eq!(sounds.played, vec!["hero_dying".to_string()]);

        let outcome = sequence.notify_command_pressed(Command::Up, &mut equipment, &mut sounds);
        assert_eq!(outcome, GameOverOutcome::Running);
        assert_eq!(sequence.phase(), GameOverPhase::Menu { cursor: 1 });

        let outcome = sequence.notify_command_pressed(Command::Attack, &mut equipment, &mut sounds);
        assert_eq!(outcome, GameOverOutcome::Chosen(GameOverChoice::Quit));
        assert_eq!(equipment.life(), 12);
    }

    #[test]
    fn fairy_ability_revives_once() {
        let mut equipment = Equipment::new(40);
        equipment.remove_life(40);
        equipment.set_ability(BACK_FROM_DEATH_ABILITY, 1);
        let mut sounds = RecordingSounds::default();
        let mut sequence = dying_sequence(&mut equipment, &mut sounds);

        sequence.update(2_500, &mut equipment, &mut sounds);
        assert_eq!(sequence.phase(), GameOverPhase::SavedByFairy { until: 3_500 });
        assert!(!equipment.has_ability(BACK_FROM_DEATH_ABILITY));
        assert_eq!(equipment.life(), 0);

        assert_eq!(
            sequence.update(3_500, &mut equipment, &mut sounds),
            GameOverOutcome::Revived
        );
        assert_eq!(equipment.life(), RESTORED_LIFE);
    }

    #[test]
    fn commands_are_ignored_before_the_menu() {
        let mut equipment = Equipment::default();
        let mut sounds = RecordingSounds::default();
        let mut sequence = GameOverSequence::new(0);
        let outcome = sequence.notify_command_pressed(Command::Action, &mut equipment, &mut sounds);
        assert_eq!(outcome, GameOverOutcome::Running);
        assert!(sounds.played.is_empty());
    }

    #[test]
    fn menu_draws_options_and_cursor() {
        let sequence = GameOverSequence {
            phase: GameOverPhase::Menu { cursor: 1 },
        };
        let mut target = RecordingTarget::new(320, 240);
        sequence.draw(&mut target);
        let calls = target.take_calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[3],
            DrawCall::Fill {
                rect: Rect::new(104, 128, 8, 8),
                color: CURSOR_COLOR
            }
        );
    }
}
