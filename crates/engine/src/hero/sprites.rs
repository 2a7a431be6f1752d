use crate::entities::{EntityBase, Sprite};
use crate::geometry::{direction4_to_xy, Point, Rect};

use super::state::HeroState;

pub const TUNIC: &str = "tunic";
pub const SWORD: &str = "sword";
pub const SHADOW: &str = "shadow";

const TUNIC_COLOR: [u8; 4] = [40, 150, 60, 255];
const SWORD_COLOR: [u8; 4] = [230, 230, 250, 255];
const SHADOW_COLOR: [u8; 4] = [20, 20, 20, 160];

pub(crate) fn create(base: &mut EntityBase) {
    let mut shadow = Sprite::new(SHADOW, 16, 8, Point::new(8, 4), SHADOW_COLOR);
    shadow.set_visible(false);
    base.add_sprite(shadow);
    base.add_sprite(Sprite::new(TUNIC, 16, 24, Point::new(8, 21), TUNIC_COLOR).with_frames(4, 100, true));
    let mut sword = Sprite::new(SWORD, 16, 16, Point::new(8, 13), SWORD_COLOR);
    sword.set_visible(false);
    base.add_sprite(sword);
}

/// Tunic animation shown for a state.
pub fn animation_for(state: &HeroState, moving: bool) -> &'static str {
    match state {
        HeroState::Free { .. } | HeroState::Swimming { .. } | HeroState::SwordLoading { .. } => {
            match (state, moving) {
                (HeroState::Swimming { .. }, _) => "swimming",
                (HeroState::SwordLoading { .. }, true) => "sword_loading_walking",
                (HeroState::SwordLoading { .. }, false) => "sword_loading_stopped",
                (_, true) => "walking",
                _ => "stopped",
            }
        }
        HeroState::Carrying { .. } if moving => "carrying_walking",
        HeroState::Carrying { .. } => "carrying_stopped",
        HeroState::Lifting { .. } => "lifting",
        HeroState::Pushing { .. } => "pushing",
        HeroState::Grabbing { pulling: true, .. } => "pulling",
        HeroState::Grabbing { .. } => "grabbing",
        HeroState::Plunging { .. } => "plunging",
        HeroState::Falling { .. } => "falling",
        HeroState::Hurt { .. } => "hurt",
        HeroState::SpinAttack { .. } => "spin_attack",
        HeroState::SwordSwinging { .. } => "sword",
        HeroState::SwordTapping { .. } => "sword_tapping",
        HeroState::Jumping { .. } => "jumping",
        HeroState::UsingInventoryItem { .. } => "using_item",
        HeroState::Treasure { .. } => "brandish",
        HeroState::Victory { .. } => "victory",
        HeroState::Running { .. } => "running",
        HeroState::ConveyorBelt { .. } | HeroState::BackToSolidGround | HeroState::Freezed => {
            "stopped"
        }
    }
}

/// Syncs sprite animations, directions and visibility with the state.
pub(crate) fn sync(base: &mut EntityBase, state: &HeroState, moving: bool) {
    let direction4 = base.direction();
    let animation = animation_for(state, moving);
    if let Some(tunic) = base.sprite_mut(TUNIC) {
        tunic.set_animation(animation);
        tunic.set_direction(direction4);
    }
    let sword_visible = state.is_sword_visible();
    if let Some(sword) = base.sprite_mut(SWORD) {
        sword.set_visible(sword_visible);
        sword.set_direction(direction4);
        sword.set_animation(animation);
    }
    let jumping = state.is_jumping();
    if let Some(shadow) = base.sprite_mut(SHADOW) {
        shadow.set_visible(jumping);
    }
}

/// Area the sword hits while the state is cutting, if any.
pub fn sword_area(base: &EntityBase, state: &HeroState) -> Option<Rect> {
    if !state.is_cutting_with_sword() {
        return None;
    }
    let bbox = base.bounding_box();
    if matches!(state, HeroState::SpinAttack { .. }) {
        let center = bbox.center();
        return Some(Rect::new(center.x - 24, center.y - 24, 48, 48));
    }
    let (dx, dy) = direction4_to_xy(base.direction());
    Some(bbox.translated(dx * bbox.width, dy * bbox.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Layer;

    #[test]
    fn sword_area_sits_in_front_of_the_hero() {
        let mut base =
            EntityBase::at_origin("hero", Layer::Low, Point::new(40, 45), 16, 16, Point::new(8, 13));
        base.set_direction(1);
        let swinging = HeroState::SwordSwinging { end_date: 0 };
        assert_eq!(sword_area(&base, &swinging), Some(Rect::new(32, 16, 16, 16)));
        assert_eq!(
            sword_area(&base, &HeroState::SpinAttack { end_date: 0 }),
            Some(Rect::new(16, 16, 48, 48))
        );
        assert_eq!(sword_area(&base, &HeroState::free()), None);
    }

    #[test]
    fn sword_sprite_follows_the_state() {
        let mut base =
            EntityBase::at_origin("hero", Layer::Low, Point::new(40, 45), 16, 16, Point::new(8, 13));
        create(&mut base);
        sync(&mut base, &HeroState::SwordSwinging { end_date: 0 }, false);
        assert!(base.sprite(SWORD).is_some_and(Sprite::is_visible));
        sync(&mut base, &HeroState::free(), true);
        assert!(!base.sprite(SWORD).is_some_and(Sprite::is_visible));
        assert_eq!(base.sprite(TUNIC).map(Sprite::animation), Some("walking"));
    }
}
