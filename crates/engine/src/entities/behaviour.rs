//! Per-frame update of one registry entity: sprites, movement, ground, then
//! the timers of its kind.

use tracing::debug;

use crate::game::Services;
use crate::hero::Hero;
use crate::map::Ground;
use crate::movement::{Movement, MovementOutcome, MovementTarget};

use super::base::EntityId;
use super::kinds::{
    CarriedPhase, Entity, EntityKind, ARROW_STUCK_DURATION_MS, BOOMERANG_SPEED,
};
use super::registry::EntityStore;

/// Delay between a thrown item breaking and its removal.
const BROKEN_ITEM_REMOVAL_DELAY_MS: u64 = 300;

pub(crate) fn update_entity(
    store: &mut EntityStore,
    hero: &mut Hero,
    id: EntityId,
    services: &mut Services<'_>,
) {
    let now = services.now;
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    if entity.is_being_removed() {
        return;
    }
    if entity.base().is_waiting_enabled() {
        if hero.base().overlaps(&entity.bounding_box()) {
            return;
        }
        entity.base_mut().set_enabled(true);
    }
    if !entity.is_enabled() {
        return;
    }
    entity.base_mut().update_sprites(now);
    let immobilized = matches!(entity.kind(), EntityKind::Enemy(data) if data.is_immobilized(now));

    let outcome = if immobilized {
        MovementOutcome::default()
    } else {
        refresh_target(store, hero, id);
        update_movement(store, hero, id, now)
    };
    if store.ground_observers().contains(&id) {
        update_ground(store, id, services);
    }
    update_kind(store, hero, id, outcome, services);
}

/// Points a target movement at the current center of what it follows.
fn refresh_target(store: &mut EntityStore, hero: &Hero, id: EntityId) {
    let Some(entity) = store.entity(id) else {
        return;
    };
    let Some(target) = entity.base().movement().and_then(Movement::tracked_target) else {
        return;
    };
    let center = match target {
        MovementTarget::Point(_) => return,
        MovementTarget::Hero => hero.base().center(),
        MovementTarget::Entity(followed) => match store.entity(followed) {
            Some(followed) => followed.base().center(),
            None => return,
        },
    };
    let (width, height) = entity.base().size();
    let destination = center.translated(-width / 2, -height / 2);
    if let Some(movement) = store
        .entity_mut(id)
        .and_then(|entity| entity.base_mut().movement_mut())
    {
        movement.set_destination(destination);
    }
}

fn update_movement(store: &mut EntityStore, hero: &Hero, id: EntityId, now: u64) -> MovementOutcome {
    let Some(mut movement) = store
        .entity_mut(id)
        .and_then(|entity| entity.base_mut().take_movement())
    else {
        return MovementOutcome::default();
    };
    let Some(entity) = store.entity(id) else {
        return MovementOutcome::default();
    };
    let layer = entity.layer();
    let mut bbox = entity.bounding_box();
    let outcome = movement.update(now, &mut bbox, |candidate| {
        store.test_collision_with_obstacles(layer, candidate, entity, Some(hero))
    });
    if let Some(entity) = store.entity_mut(id) {
        entity.base_mut().set_bounding_box(bbox);
        entity.base_mut().restore_movement(movement);
    }
    outcome
}

fn update_ground(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let Some(entity) = store.entity(id) else {
        return;
    };
    let ground = store.ground_at(entity.layer(), entity.base().ground_point());
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    if !entity.base_mut().set_ground_below(ground) {
        return;
    }
    if matches!(entity.kind(), EntityKind::Bomb(_)) {
        if let Some(sound) = swallowing_sound(ground) {
            debug!(entity = %entity.name(), ?ground, "bomb_swallowed");
            services.play_sound(sound);
            store.remove_entity(id);
        }
    }
}

/// Sound of an object disappearing into `ground`, if that ground swallows it.
fn swallowing_sound(ground: Ground) -> Option<&'static str> {
    match ground {
        Ground::DeepWater => Some("splash"),
        Ground::Lava => Some("lava"),
        Ground::Hole => Some("jump"),
        _ => None,
    }
}

fn update_kind(
    store: &mut EntityStore,
    hero: &Hero,
    id: EntityId,
    outcome: MovementOutcome,
    services: &mut Services<'_>,
) {
    let now = services.now;
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    let (base, kind) = entity.parts_mut();
    let movement_finished = base.movement().map_or(true, Movement::is_finished);
    match kind {
        EntityKind::Bomb(data) => {
            if !data.exploded && now >= data.explosion_date {
                data.exploded = true;
                let (layer, center) = (base.layer(), base.center());
                debug!(entity = %base.name(), "bomb_exploded");
                store.remove_entity(id);
                store.add_entity(Entity::explosion(layer, center, now));
                services.play_sound("explosion");
            }
        }
        EntityKind::Explosion(data) => {
            if now >= data.end_date {
                store.remove_entity(id);
            }
        }
        EntityKind::Arrow(data) => match data.stuck_until {
            Some(until) => {
                if now >= until {
                    store.remove_entity(id);
                }
            }
            None => {
                if outcome.obstacle_reached || movement_finished {
                    data.stuck_until = Some(now + ARROW_STUCK_DURATION_MS);
                    base.clear_movement();
                    services.play_sound("arrow_hit");
                }
            }
        },
        EntityKind::Boomerang(data) => {
            if !data.going_back {
                if outcome.obstacle_reached || movement_finished {
                    data.going_back = true;
                    base.set_movement(Movement::target(MovementTarget::Hero, BOOMERANG_SPEED, true));
                    if outcome.obstacle_reached {
                        services.play_sound("sword_tapping");
                    }
                }
            } else if movement_finished || base.overlaps(&hero.base().bounding_box()) {
                store.remove_entity(id);
            }
        }
        EntityKind::CarriedItem(data) => match data.phase {
            CarriedPhase::Carried => {}
            CarriedPhase::Thrown => {
                if outcome.obstacle_reached || movement_finished {
                    base.clear_movement();
                    match swallowing_sound(base.ground_below()) {
                        Some(sound) => {
                            services.play_sound(sound);
                            store.remove_entity(id);
                        }
                        None => {
                            data.phase = CarriedPhase::Broken {
                                remove_date: now + BROKEN_ITEM_REMOVAL_DELAY_MS,
                            };
                            services.play_sound(data.destruction_sound);
                        }
                    }
                }
            }
            CarriedPhase::Broken { remove_date } => {
                if now >= remove_date {
                    store.remove_entity(id);
                }
            }
        },
        EntityKind::Block(_) => {
            if base.movement().is_some() && movement_finished {
                base.clear_movement();
            }
        }
        _ => {}
    }
}

/// Breaks a thrown item where it is, as when it hits an enemy.
pub(crate) fn break_carried_item(entity: &mut Entity, now: u64) -> Option<&'static str> {
    let (base, kind) = entity.parts_mut();
    let EntityKind::CarriedItem(data) = kind else {
        return None;
    };
    if data.phase != CarriedPhase::Thrown {
        return None;
    }
    base.clear_movement();
    data.phase = CarriedPhase::Broken {
        remove_date: now + BROKEN_ITEM_REMOVAL_DELAY_MS,
    };
    Some(data.destruction_sound)
}
