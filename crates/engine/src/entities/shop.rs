//! Shop item interaction: description, price question, then the purchase.

use tracing::{debug, info};

use crate::game::Services;
use crate::hero::Hero;

use super::base::EntityId;
use super::kinds::{EntityKind, EntityType};
use super::registry::EntityStore;

pub const QUESTION_DIALOG: &str = "_shop.question";
pub const NOT_ENOUGH_MONEY_DIALOG: &str = "_shop.not_enough_money";
pub const AMOUNT_FULL_DIALOG: &str = "_shop.amount_full";

/// The hero pressed the action key while facing the shop item `id`.
pub(crate) fn notify_action(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    let EntityKind::ShopItem(data) = entity.kind_mut() else {
        return;
    };
    data.is_looking_item = true;
    let dialog_id = data.dialog_id.clone();
    services.start_dialog(&dialog_id);
}

/// Moves every shop item's conversation forward once its dialog has closed.
pub(crate) fn update_dialogs(store: &mut EntityStore, hero: &mut Hero, services: &mut Services<'_>) {
    if services.dialogs.is_enabled() {
        return;
    }
    for id in store.get_entities_by_type(EntityType::ShopItem) {
        let Some(entity) = store.entity_mut(id) else {
            continue;
        };
        let EntityKind::ShopItem(data) = entity.kind_mut() else {
            continue;
        };
        if data.is_looking_item {
            data.is_looking_item = false;
            data.is_asking_question = true;
            services
                .dialogs
                .set_variable(QUESTION_DIALOG, data.price.to_string());
            services.start_dialog(QUESTION_DIALOG);
            return;
        }
        if data.is_asking_question {
            data.is_asking_question = false;
            if services.dialogs.last_answer() == Some(0) {
                buy(store, hero, id, services);
            }
            return;
        }
    }
}

fn buy(store: &mut EntityStore, hero: &mut Hero, id: EntityId, services: &mut Services<'_>) {
    let Some(entity) = store.entity(id) else {
        return;
    };
    let EntityKind::ShopItem(data) = entity.kind() else {
        return;
    };
    let name = entity.name().to_string();
    let (treasure, price) = (data.treasure.clone(), data.price);
    let equipment = &services.state.equipment;

    if equipment.money() < price {
        debug!(item = %name, price, money = equipment.money(), "shop_not_enough_money");
        services.play_sound("wrong");
        services.start_dialog(NOT_ENOUGH_MONEY_DIALOG);
        return;
    }
    if equipment.is_amount_full(&treasure.item) {
        services.play_sound("wrong");
        services.start_dialog(AMOUNT_FULL_DIALOG);
        return;
    }
    if !services.hooks.on_shop_item_buying(&name) {
        debug!(item = %name, "shop_purchase_vetoed");
        return;
    }

    services.state.equipment.remove_money(price);
    info!(item = %name, treasure = %treasure.item, price, "shop_item_bought");
    hero.start_treasure(treasure, store, services);
    store.remove_entity(id);
    services.hooks.on_shop_item_bought(&name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;
    use crate::game::testing::{test_tileset, Fixture};
    use crate::game::Treasure;
    use crate::geometry::{Layer, Point};

    fn shop() -> (EntityStore, EntityId) {
        let mut store = EntityStore::new("shop_test", 160, 160, test_tileset());
        let id = store
            .add_entity(Entity::shop_item(
                "shield_for_sale",
                Layer::Low,
                Point::new(32, 32),
                Treasure::new("shield", 1).with_savegame_variable("shield_bought"),
                50,
                "shop.shield",
            ))
            .expect("shop item handle");
        (store, id)
    }

    /// Closes the current dialog with `answer` and lets the shop react.
    fn close_dialog(
        fixture: &mut Fixture,
        store: &mut EntityStore,
        hero: &mut Hero,
        answer: Option<usize>,
    ) {
        fixture.dialogs.enabled = false;
        fixture.dialogs.answer = answer;
        let mut services = fixture.services();
        update_dialogs(store, hero, &mut services);
    }

    #[test]
    fn not_enough_money_keeps_the_item_and_the_money() {
        let (mut store, id) = shop();
        let mut hero = Hero::new();
        let mut fixture = Fixture::default();
        fixture.state.equipment.add_money(30);

        notify_action(&mut store, id, &mut fixture.services());
        assert_eq!(fixture.dialogs.started, vec!["shop.shield".to_string()]);

        close_dialog(&mut fixture, &mut store, &mut hero, None);
        assert_eq!(fixture.dialogs.started.last().map(String::as_str), Some(QUESTION_DIALOG));
        assert_eq!(
            fixture.dialogs.variables,
            vec![(QUESTION_DIALOG.to_string(), "50".to_string())]
        );

        close_dialog(&mut fixture, &mut store, &mut hero, Some(0));
        assert_eq!(
            fixture.dialogs.started.last().map(String::as_str),
            Some(NOT_ENOUGH_MONEY_DIALOG)
        );
        assert_eq!(fixture.sounds.played, vec!["wrong".to_string()]);
        assert_eq!(fixture.state.equipment.money(), 30);
        assert!(store.entity(id).is_some_and(|entity| !entity.is_being_removed()));
    }

    #[test]
    fn purchase_pays_and_brandishes_the_treasure() {
        let (mut store, id) = shop();
        let mut hero = Hero::new();
        let mut fixture = Fixture::default();
        fixture.state.equipment.add_money(80);

        notify_action(&mut store, id, &mut fixture.services());
        close_dialog(&mut fixture, &mut store, &mut hero, None);
        close_dialog(&mut fixture, &mut store, &mut hero, Some(0));

        assert_eq!(fixture.state.equipment.money(), 30);
        assert!(hero.state().is_brandishing_treasure());
        assert_eq!(fixture.dialogs.started.last().map(String::as_str), Some("_treasure.shield.1"));
        assert!(fixture.state.savegame.get_boolean("shield_bought"));
        assert!(store.entity(id).is_some_and(|entity| entity.is_being_removed()));
        assert!(fixture.has_event("bought:shield_for_sale"));
    }

    #[test]
    fn declining_the_question_buys_nothing() {
        let (mut store, id) = shop();
        let mut hero = Hero::new();
        let mut fixture = Fixture::default();
        fixture.state.equipment.add_money(80);

        notify_action(&mut store, id, &mut fixture.services());
        close_dialog(&mut fixture, &mut store, &mut hero, None);
        close_dialog(&mut fixture, &mut store, &mut hero, Some(1));

        assert_eq!(fixture.state.equipment.money(), 80);
        assert!(hero.state().is_free());
        assert!(!fixture.has_event("buying:shield_for_sale"));
    }

    #[test]
    fn script_veto_cancels_the_purchase() {
        let (mut store, id) = shop();
        let mut hero = Hero::new();
        let mut fixture = Fixture::default();
        fixture.state.equipment.add_money(80);
        fixture.hooks.allow_buying = false;

        notify_action(&mut store, id, &mut fixture.services());
        close_dialog(&mut fixture, &mut store, &mut hero, None);
        close_dialog(&mut fixture, &mut store, &mut hero, Some(0));

        assert_eq!(fixture.state.equipment.money(), 80);
        assert!(fixture.has_event("buying:shield_for_sale"));
        assert!(store.entity(id).is_some_and(|entity| !entity.is_being_removed()));
    }
}
