use std::collections::HashMap;

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::game::{Command, Services};
use crate::geometry::{Layer, Point, Rect};
use crate::hero::Hero;
use crate::map::{Ground, ObstacleGrid, Tileset};
use crate::render::{RenderTarget, Surface};

use super::base::{EntityBase, EntityId};
use super::kinds::{CrystalBlockData, Entity, EntityKind, EntityType};
use super::obstacles::ObstacleRules;
use super::{behaviour, collisions, shop};

/// Name the hero answers to; never given to another entity.
pub const HERO_NAME: &str = "hero";

#[derive(Debug, Clone, PartialEq, Eq)]
struct TileInstance {
    footprint: Rect,
    pattern: String,
}

/// Part of a tile lying in an animated 8x8 cell, repainted every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AnimatedPiece {
    tile: usize,
    area: Rect,
}

/// Owner of every map entity except the hero, with the indexes the update,
/// draw and collision passes walk.
#[derive(Debug)]
pub struct EntityStore {
    map_id: String,
    width: i32,
    height: i32,
    grid: ObstacleGrid,
    tileset: Tileset,
    tiles: [Vec<TileInstance>; Layer::COUNT],
    entities: SlotMap<EntityId, Entity>,
    order: Vec<EntityId>,
    named: HashMap<String, EntityId>,
    detectors: Vec<EntityId>,
    obstacles: [Vec<EntityId>; Layer::COUNT],
    ground_observers: Vec<EntityId>,
    ground_modifiers: [Vec<EntityId>; Layer::COUNT],
    draw_first: [Vec<EntityId>; Layer::COUNT],
    y_order: [Vec<EntityId>; Layer::COUNT],
    stairs: Vec<EntityId>,
    crystal_blocks: Vec<EntityId>,
    separators: Vec<EntityId>,
    boomerang: Option<EntityId>,
    default_destination: Option<EntityId>,
    pending_removal: Vec<EntityId>,
    tile_caches: [Option<Surface>; Layer::COUNT],
    animated_pieces: [Vec<AnimatedPiece>; Layer::COUNT],
    suspended: bool,
}

impl EntityStore {
    pub fn new(map_id: impl Into<String>, width: i32, height: i32, tileset: Tileset) -> Self {
        Self {
            map_id: map_id.into(),
            width,
            height,
            grid: ObstacleGrid::new(width, height),
            tileset,
            tiles: Default::default(),
            entities: SlotMap::with_key(),
            order: Vec::new(),
            named: HashMap::new(),
            detectors: Vec::new(),
            obstacles: Default::default(),
            ground_observers: Vec::new(),
            ground_modifiers: Default::default(),
            draw_first: Default::default(),
            y_order: Default::default(),
            stairs: Vec::new(),
            crystal_blocks: Vec::new(),
            separators: Vec::new(),
            boomerang: None,
            default_destination: None,
            pending_removal: Vec::new(),
            tile_caches: Default::default(),
            animated_pieces: Default::default(),
            suspended: false,
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn grid(&self) -> &ObstacleGrid {
        &self.grid
    }

    pub fn tileset(&self) -> &Tileset {
        &self.tileset
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entities in insertion order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Adds an entity. Tiles are painted into the grid and get no handle.
    ///
    /// Panics on a tile with an unknown pattern or on a second boomerang.
    pub fn add_entity(&mut self, mut entity: Entity) -> Option<EntityId> {
        if let EntityKind::Tile { pattern } = entity.kind() {
            let pattern = pattern.clone();
            self.add_tile(entity.layer(), entity.bounding_box(), pattern);
            return None;
        }

        if entity.entity_type() == EntityType::Boomerang && self.boomerang.is_some() {
            panic!("map '{}' already has a boomerang", self.map_id);
        }

        let name = self.unique_name(entity.name());
        if name != entity.name() {
            debug!(wanted = %entity.name(), name = %name, "entity_renamed");
        }
        entity.base_mut().set_name(name.clone());
        if self.suspended {
            entity.base_mut().set_suspended(true, 0);
        }

        let id = self.entities.insert_with_key(|id| {
            entity.set_id(id);
            entity
        });
        self.order.push(id);
        if !name.is_empty() {
            self.named.insert(name, id);
        }
        self.index(id);
        Some(id)
    }

    fn add_tile(&mut self, layer: Layer, footprint: Rect, pattern_id: String) {
        let Some(pattern) = self.tileset.pattern(&pattern_id) else {
            panic!(
                "tile pattern '{pattern_id}' is not in tileset '{}'",
                self.tileset.id()
            );
        };
        self.grid.stamp(layer, footprint, pattern.ground());
        self.tiles[layer.index()].push(TileInstance {
            footprint,
            pattern: pattern_id,
        });
    }

    /// "x" stays "x" when free, otherwise becomes "x_2", "x_3", ...
    fn unique_name(&self, wanted: &str) -> String {
        if wanted.is_empty() {
            return String::new();
        }
        let is_taken = |name: &str| name == HERO_NAME || self.named.contains_key(name);
        if !is_taken(wanted) {
            return wanted.to_string();
        }
        (2..)
            .map(|suffix| format!("{wanted}_{suffix}"))
            .find(|candidate| !is_taken(candidate))
            .unwrap_or_default()
    }

    fn index(&mut self, id: EntityId) {
        let entity = &self.entities[id];
        let layer = entity.layer().index();
        let independent = entity.has_layer_independent_collisions();

        if entity.is_detector() {
            self.detectors.push(id);
        }
        if entity.can_be_obstacle() {
            if independent {
                for list in &mut self.obstacles {
                    list.push(id);
                }
            } else {
                self.obstacles[layer].push(id);
            }
        }
        if entity.is_ground_observer() {
            self.ground_observers.push(id);
        }
        if entity.is_ground_modifier() {
            self.ground_modifiers[layer].push(id);
        }
        if entity.can_be_drawn() {
            if entity.is_drawn_in_y_order() {
                self.y_order[layer].push(id);
            } else {
                self.draw_first[layer].push(id);
            }
        }
        match entity.kind() {
            EntityKind::Stairs(_) => self.stairs.push(id),
            EntityKind::CrystalBlock(_) => self.crystal_blocks.push(id),
            EntityKind::Separator(_) => self.separators.push(id),
            EntityKind::Boomerang(_) => self.boomerang = Some(id),
            EntityKind::Destination(data) => {
                let replaces = match self.default_destination {
                    None => true,
                    Some(current) => {
                        data.is_default
                            && !matches!(
                                self.entities[current].kind(),
                                EntityKind::Destination(existing) if existing.is_default
                            )
                    }
                };
                if replaces {
                    self.default_destination = Some(id);
                }
            }
            _ => {}
        }
    }

    fn unindex(&mut self, id: EntityId) {
        let without = |list: &mut Vec<EntityId>| list.retain(|other| *other != id);
        without(&mut self.order);
        without(&mut self.detectors);
        without(&mut self.ground_observers);
        without(&mut self.stairs);
        without(&mut self.crystal_blocks);
        without(&mut self.separators);
        for layer in 0..Layer::COUNT {
            without(&mut self.obstacles[layer]);
            without(&mut self.ground_modifiers[layer]);
            without(&mut self.draw_first[layer]);
            without(&mut self.y_order[layer]);
        }
        if self.boomerang == Some(id) {
            self.boomerang = None;
        }
        if self.default_destination == Some(id) {
            self.default_destination = None;
        }
    }

    /// Marks an entity for removal at the end of the current update.
    /// Removing twice, or removing an unknown handle, does nothing.
    pub fn remove_entity(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        if entity.is_being_removed() {
            return;
        }
        entity.base_mut().mark_being_removed();
        entity.base_mut().clear_movement();
        self.pending_removal.push(id);
        if self.boomerang == Some(id) {
            self.boomerang = None;
        }
        debug!(entity = %entity.name(), kind = ?entity.entity_type(), "entity_removal_marked");
    }

    /// Unlinks every entity marked since the last call.
    pub fn remove_marked_entities(&mut self, services: &mut Services<'_>) {
        if self.pending_removal.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending_removal);
        pending.sort();
        pending.dedup();
        for id in pending {
            self.unindex(id);
            let Some(entity) = self.entities.remove(id) else {
                continue;
            };
            if !entity.name().is_empty() && self.named.get(entity.name()) == Some(&id) {
                self.named.remove(entity.name());
            }
            services
                .hooks
                .on_entity_removed(entity.name(), entity.entity_type());
        }
    }

    /// Live entity named `name`; None if unknown or being removed.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        let id = *self.named.get(name)?;
        let entity = self.entities.get(id)?;
        (!entity.is_being_removed()).then_some(id)
    }

    /// Entity named `name`. Panics when there is none.
    pub fn get_entity(&self, name: &str) -> EntityId {
        self.find_entity(name)
            .unwrap_or_else(|| panic!("no entity named '{name}' on map '{}'", self.map_id))
    }

    fn live_ids(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order.iter().filter_map(|id| {
            let entity = self.entities.get(*id)?;
            (!entity.is_being_removed()).then_some((*id, entity))
        })
    }

    pub fn get_entities_with_prefix(&self, prefix: &str) -> Vec<EntityId> {
        self.live_ids()
            .filter(|(_, entity)| !entity.name().is_empty() && entity.base().has_prefix(prefix))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn has_entity_with_prefix(&self, prefix: &str) -> bool {
        self.live_ids()
            .any(|(_, entity)| !entity.name().is_empty() && entity.base().has_prefix(prefix))
    }

    pub fn remove_entities_with_prefix(&mut self, prefix: &str) {
        for id in self.get_entities_with_prefix(prefix) {
            self.remove_entity(id);
        }
    }

    pub fn get_entities_by_type(&self, entity_type: EntityType) -> Vec<EntityId> {
        self.live_ids()
            .filter(|(_, entity)| entity.entity_type() == entity_type)
            .map(|(id, _)| id)
            .collect()
    }

    /// Grid ground at pixel (x,y); pixels outside the map read as `Empty`.
    pub fn get_obstacle_tile(&self, layer: Layer, x: i32, y: i32) -> Ground {
        if !self.is_inside_map(x, y) {
            return Ground::Empty;
        }
        self.grid.get_obstacle(layer, x, y)
    }

    fn is_inside_map(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Grid ground with `Empty` cells resolved to the layer below.
    fn resolved_ground(&self, layer: Layer, x: i32, y: i32) -> Ground {
        let mut current = Some(layer);
        while let Some(layer) = current {
            let ground = self.get_obstacle_tile(layer, x, y);
            if ground != Ground::Empty {
                return ground;
            }
            current = layer.below();
        }
        Ground::Traversable
    }

    /// Ground under `point`: the topmost enabled ground modifier covering
    /// it, otherwise the grid.
    pub fn ground_at(&self, layer: Layer, point: Point) -> Ground {
        self.modifier_ground_at(layer, point)
            .unwrap_or_else(|| self.resolved_ground(layer, point.x, point.y))
    }

    fn modifier_ground_at(&self, layer: Layer, point: Point) -> Option<Ground> {
        self.ground_modifiers[layer.index()]
            .iter()
            .rev()
            .filter_map(|id| self.entities.get(*id))
            .find(|entity| {
                entity.is_enabled()
                    && !entity.is_being_removed()
                    && entity.bounding_box().contains_point(point)
            })
            .and_then(Entity::modified_ground)
    }

    fn is_pixel_obstacle(&self, layer: Layer, x: i32, y: i32, mover: &dyn ObstacleRules) -> bool {
        // a diagonal modifier blocks its whole box through the obstacle list
        if let Some(ground) = self.modifier_ground_at(layer, Point::new(x, y)) {
            return mover.is_ground_obstacle(ground);
        }
        let ground = self.resolved_ground(layer, x, y);
        match ground.diagonal() {
            Some((corner, open_ground)) => {
                corner.covers(x & 7, y & 7) || mover.is_ground_obstacle(open_ground)
            }
            None => mover.is_ground_obstacle(ground),
        }
    }

    /// Whether `rect` on `layer` collides with the map border, the ground or
    /// an obstacle entity, as seen by `mover`. `hero` is tested when the
    /// mover is not the hero itself.
    pub fn test_collision_with_obstacles(
        &self,
        layer: Layer,
        rect: &Rect,
        mover: &dyn ObstacleRules,
        hero: Option<&Hero>,
    ) -> bool {
        if rect.x < 0 || rect.y < 0 || rect.right() > self.width || rect.bottom() > self.height {
            return true;
        }

        let xs = lattice(rect.x, rect.right());
        let ys = lattice(rect.y, rect.bottom());
        for &y in &ys {
            for &x in &xs {
                if self.is_pixel_obstacle(layer, x, y, mover) {
                    return true;
                }
            }
        }

        let mover_id = mover.mover_id();
        let blocked_by_entity = self.obstacles[layer.index()].iter().any(|id| {
            if Some(*id) == mover_id {
                return false;
            }
            let Some(entity) = self.entities.get(*id) else {
                return false;
            };
            entity.is_enabled()
                && !entity.is_being_removed()
                && entity.bounding_box().overlaps(rect)
                && entity.is_obstacle_for(mover)
        });
        if blocked_by_entity {
            return true;
        }

        match hero {
            Some(hero) if mover.obstacle_rules_type() != EntityType::Hero => {
                hero.base().layer() == layer
                    && hero.base().overlaps(rect)
                    && mover.is_hero_obstacle(hero)
            }
            _ => false,
        }
    }

    /// Whether a raised crystal block overlaps `rect` on `layer`.
    pub fn overlaps_raised_blocks(&self, layer: Layer, rect: &Rect) -> bool {
        self.crystal_blocks.iter().any(|id| {
            self.entities.get(*id).is_some_and(|entity| {
                entity.layer() == layer
                    && entity.bounding_box().overlaps(rect)
                    && matches!(entity.kind(), EntityKind::CrystalBlock(data) if data.is_raised())
            })
        })
    }

    /// Moves a first-drawn entity to the end of its layer's draw list.
    ///
    /// Panics for entities that are not drawn or drawn in y order.
    pub fn bring_to_front(&mut self, id: EntityId) {
        let layer = self.first_drawn_layer(id, "bring_to_front");
        let list = &mut self.draw_first[layer];
        list.retain(|other| *other != id);
        list.push(id);
    }

    pub fn bring_to_back(&mut self, id: EntityId) {
        let layer = self.first_drawn_layer(id, "bring_to_back");
        let list = &mut self.draw_first[layer];
        list.retain(|other| *other != id);
        list.insert(0, id);
    }

    fn first_drawn_layer(&self, id: EntityId, operation: &str) -> usize {
        let Some(entity) = self.entities.get(id) else {
            panic!("{operation}: unknown entity on map '{}'", self.map_id);
        };
        if !entity.can_be_drawn() || entity.is_drawn_in_y_order() {
            panic!(
                "{operation}: entity '{}' ({:?}) is not in the first-drawn list",
                entity.name(),
                entity.entity_type()
            );
        }
        entity.layer().index()
    }

    /// Moves an entity to another layer, keeping every index in sync.
    pub fn set_entity_layer(&mut self, id: EntityId, layer: Layer) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let old = entity.layer();
        if old == layer {
            return;
        }
        let independent = entity.has_layer_independent_collisions();
        let (old_index, new_index) = (old.index(), layer.index());
        let move_between = |lists: &mut [Vec<EntityId>; Layer::COUNT]| {
            if let Some(position) = lists[old_index].iter().position(|other| *other == id) {
                lists[old_index].remove(position);
                lists[new_index].push(id);
            }
        };
        if !independent {
            move_between(&mut self.obstacles);
        }
        move_between(&mut self.ground_modifiers);
        move_between(&mut self.draw_first);
        move_between(&mut self.y_order);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.base_mut().set_layer(layer);
        }
    }

    pub fn is_boomerang_present(&self) -> bool {
        self.boomerang.is_some()
    }

    pub fn remove_boomerang(&mut self) {
        if let Some(id) = self.boomerang {
            self.remove_entity(id);
        }
    }

    pub fn remove_arrows(&mut self) {
        for id in self.get_entities_by_type(EntityType::Arrow) {
            self.remove_entity(id);
        }
    }

    pub fn get_default_destination(&self) -> Option<EntityId> {
        self.default_destination
    }

    /// Suspends or resumes every entity, shifting their dates on resume.
    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        self.suspended = suspended;
        for entity in self.entities.values_mut() {
            let shift = entity.base_mut().set_suspended(suspended, now);
            entity.shift_dates(shift);
        }
    }

    pub(crate) fn detectors(&self) -> &[EntityId] {
        &self.detectors
    }

    pub(crate) fn ground_observers(&self) -> &[EntityId] {
        &self.ground_observers
    }

    /// Raises or lowers every crystal block for the given crystal state.
    pub(crate) fn apply_crystal_state(&mut self, crystal_state: bool) {
        for id in &self.crystal_blocks {
            if let Some(EntityKind::CrystalBlock(data)) = self.entities.get_mut(*id).map(Entity::kind_mut) {
                data.raised = CrystalBlockData::raised_for(data.subtype, crystal_state);
            }
        }
    }

    /// Bucket sort of each layer's y-ordered entities by bounding-box bottom.
    /// The sort is stable, so equal bottoms keep insertion order.
    fn sort_y_order(&mut self) {
        let entities = &self.entities;
        for list in &mut self.y_order {
            list.sort_by_key(|id| entities.get(*id).map_or(i32::MAX, |entity| entity.bounding_box().bottom()));
        }
    }

    /// Paints the non-animated tiles of each layer into a cache surface and
    /// clears the 8x8 cells touched by an animated tile. Every tile part in
    /// those cells is kept, in paint order, to be redrawn each frame.
    fn rebuild_tile_caches(&mut self) {
        for layer in Layer::ALL {
            let tiles = &self.tiles[layer.index()];
            let mut surface = Surface::new(self.width.max(0) as u32, self.height.max(0) as u32);
            for tile in tiles {
                match self.tileset.pattern(&tile.pattern) {
                    Some(pattern) if !pattern.is_animated() => {
                        surface.fill_rect(tile.footprint, pattern.color_at(0));
                    }
                    Some(_) => {}
                    None => warn!(
                        pattern = %tile.pattern,
                        tileset = %self.tileset.id(),
                        "tile_pattern_missing"
                    ),
                }
            }

            let cells = self.animated_cells(tiles);
            for cell in &cells {
                surface.clear_rect(*cell);
            }
            let mut pieces = Vec::new();
            for (index, tile) in tiles.iter().enumerate() {
                pieces.extend(cells.iter().filter_map(|cell| {
                    tile.footprint
                        .intersection(cell)
                        .map(|area| AnimatedPiece { tile: index, area })
                }));
            }

            self.tile_caches[layer.index()] = Some(surface);
            self.animated_pieces[layer.index()] = pieces;
        }
        debug!(map = %self.map_id, tileset = %self.tileset.id(), "tile_caches_built");
    }

    /// Map cells covered by at least one animated tile, each listed once.
    fn animated_cells(&self, tiles: &[TileInstance]) -> Vec<Rect> {
        let columns = (self.width.max(0) + 7) / 8;
        let rows = (self.height.max(0) + 7) / 8;
        let mut marked = vec![false; (columns * rows) as usize];
        let mut cells = Vec::new();
        let animated = tiles.iter().filter(|tile| {
            self.tileset
                .pattern(&tile.pattern)
                .is_some_and(|pattern| pattern.is_animated())
        });
        for tile in animated {
            let footprint = tile.footprint;
            let (first_column, last_column) = (footprint.x.max(0) >> 3, (footprint.right() - 1) >> 3);
            let (first_row, last_row) = (footprint.y.max(0) >> 3, (footprint.bottom() - 1) >> 3);
            for row in first_row..=last_row.min(rows - 1) {
                for column in first_column..=last_column.min(columns - 1) {
                    let index = (row * columns + column) as usize;
                    if !marked[index] {
                        marked[index] = true;
                        cells.push(Rect::new(column * 8, row * 8, 8, 8));
                    }
                }
            }
        }
        cells
    }

    pub fn has_tile_caches(&self) -> bool {
        self.tile_caches.iter().all(Option::is_some)
    }

    fn draw_layer_tiles(&self, target: &mut dyn RenderTarget, layer: Layer, camera: Point, now: u64) {
        let (screen_width, screen_height) = target.size();
        if let Some(cache) = &self.tile_caches[layer.index()] {
            let source = Rect::new(camera.x, camera.y, screen_width as i32, screen_height as i32);
            target.blit(cache, source, Point::new(0, 0));
        }
        let tiles = &self.tiles[layer.index()];
        for piece in &self.animated_pieces[layer.index()] {
            let Some(pattern) = tiles
                .get(piece.tile)
                .and_then(|tile| self.tileset.pattern(&tile.pattern))
            else {
                continue;
            };
            target.fill_rect(piece.area.translated(-camera.x, -camera.y), pattern.color_at(now));
        }
    }

    fn draw_entity(&self, target: &mut dyn RenderTarget, entity: &Entity, camera: Point, now: u64) {
        if !entity.is_enabled() || !entity.base().is_visible() {
            return;
        }
        if let EntityKind::DynamicTile { pattern, .. } = entity.kind() {
            if let Some(pattern) = self.tileset.pattern(pattern) {
                target.fill_rect(
                    entity.bounding_box().translated(-camera.x, -camera.y),
                    pattern.color_at(now),
                );
            }
            return;
        }
        draw_sprites(target, entity.base(), camera);
    }
}

/// Draws the visible sprites of `base` relative to `camera`.
pub(crate) fn draw_sprites(target: &mut dyn RenderTarget, base: &EntityBase, camera: Point) {
    let xy = base.xy();
    for sprite in base.sprites().iter().filter(|sprite| sprite.is_visible()) {
        target.fill_rect(
            sprite.rect_at(xy).translated(-camera.x, -camera.y),
            sprite.color(),
        );
    }
}

/// Coordinates tested along one side: every 8 px from `start`, plus the far edge.
fn lattice(start: i32, end: i32) -> Vec<i32> {
    let last = end - 1;
    let mut points: Vec<i32> = (start..end).step_by(8).collect();
    if points.last() != Some(&last) && last >= start {
        points.push(last);
    }
    points
}

/// The entities of one map plus the hero, which lives outside the arena.
#[derive(Debug)]
pub struct MapEntities {
    hero: Hero,
    store: EntityStore,
}

impl MapEntities {
    pub fn new(map_id: impl Into<String>, width: i32, height: i32, tileset: Tileset) -> Self {
        Self {
            hero: Hero::new(),
            store: EntityStore::new(map_id, width, height, tileset),
        }
    }

    pub fn hero(&self) -> &Hero {
        &self.hero
    }

    pub fn hero_mut(&mut self) -> &mut Hero {
        &mut self.hero
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn parts_mut(&mut self) -> (&mut Hero, &mut EntityStore) {
        (&mut self.hero, &mut self.store)
    }

    pub fn add_entity(&mut self, entity: Entity) -> Option<EntityId> {
        self.store.add_entity(entity)
    }

    pub fn remove_entity(&mut self, id: EntityId) {
        if self.hero.base().facing_entity() == Some(id) {
            self.hero.base_mut().set_facing_entity(None);
        }
        self.store.remove_entity(id);
    }

    /// Puts the hero on the named destination, or on the default one.
    /// Returns false when no such destination exists.
    pub fn place_hero_on_destination(&mut self, name: Option<&str>) -> bool {
        let id = match name {
            Some(name) => self.store.find_entity(name),
            None => self.store.get_default_destination(),
        };
        let Some(destination) = id.and_then(|id| self.store.entity(id)) else {
            return false;
        };
        let EntityKind::Destination(data) = destination.kind() else {
            warn!(entity = %destination.name(), "destination_not_a_destination");
            return false;
        };
        let direction4 = data.direction4.unwrap_or(self.hero.base().direction());
        self.hero
            .place(destination.base().xy(), destination.layer(), direction4);
        true
    }

    /// Places the hero on the map side `side` (0 east, 1 north, 2 west,
    /// 3 south), keeping the coordinate `along` that side.
    pub fn place_hero_on_side(&mut self, side: u8, along: i32, layer: Layer) {
        let (width, height) = self.store.size();
        let origin = self.hero.base().origin();
        let (hero_width, hero_height) = self.hero.base().size();
        let xy = match side % 4 {
            0 => Point::new(width - hero_width + origin.x, along),
            1 => Point::new(along, origin.y),
            2 => Point::new(origin.x, along),
            _ => Point::new(along, height - hero_height + origin.y),
        };
        self.hero.place(xy, layer, (side + 2) % 4);
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        self.hero.set_suspended(suspended, now);
        self.store.set_suspended(suspended, now);
    }

    pub fn notify_map_started(&mut self, services: &mut Services<'_>) {
        self.store.rebuild_tile_caches();
        self.store.apply_crystal_state(services.state.crystal_state());
        let hero_box = self.hero.base().bounding_box();
        for entity in self.store.entities.values_mut() {
            let (base, kind) = entity.parts_mut();
            if let EntityKind::Teletransporter(data) = kind {
                // the hero may arrive standing on a teletransporter
                if base.bounding_box().overlaps(&hero_box) {
                    data.transporting_hero = true;
                }
            }
        }
        services.hooks.on_map_started(&self.store.map_id);
    }

    pub fn notify_map_opening_transition_finished(&mut self, services: &mut Services<'_>) {
        debug!(map = %self.store.map_id, "map_opening_transition_finished");
        services
            .hooks
            .on_map_opening_transition_finished(&self.store.map_id);
    }

    pub fn notify_tileset_changed(&mut self, tileset: Tileset, services: &mut Services<'_>) {
        self.store.tileset = tileset;
        self.store.rebuild_tile_caches();
        services.hooks.on_tileset_changed(self.store.tileset.id());
    }

    pub fn notify_command_pressed(&mut self, command: Command, services: &mut Services<'_>) {
        self.hero
            .notify_command_pressed(command, &mut self.store, services);
    }

    /// One simulation step: hero, y-order sort, entities, collisions, removal.
    pub fn update(&mut self, services: &mut Services<'_>) {
        self.hero.update(&mut self.store, services);
        if self.store.suspended {
            shop::update_dialogs(&mut self.store, &mut self.hero, services);
            return;
        }

        self.store.sort_y_order();
        let ids = self.store.order.clone();
        for id in ids {
            behaviour::update_entity(&mut self.store, &mut self.hero, id, services);
        }
        shop::update_dialogs(&mut self.store, &mut self.hero, services);
        collisions::check_collisions(&mut self.store, &mut self.hero, services);

        let facing_removed = self
            .hero
            .base()
            .facing_entity()
            .is_some_and(|id| self.store.entity(id).map_or(true, Entity::is_being_removed));
        if facing_removed {
            self.hero.base_mut().set_facing_entity(None);
        }
        self.store.remove_marked_entities(services);
    }

    /// Draws the three layers back to front; `camera` is the top-left of the
    /// visible area in map coordinates.
    pub fn draw(&self, target: &mut dyn RenderTarget, camera: Point, now: u64) {
        let (screen_width, screen_height) = target.size();
        target.fill_rect(
            Rect::new(0, 0, screen_width as i32, screen_height as i32),
            self.store.tileset.background(),
        );
        let store = &self.store;
        for layer in Layer::ALL {
            store.draw_layer_tiles(target, layer, camera, now);
            for id in &store.draw_first[layer.index()] {
                if let Some(entity) = store.entities.get(*id) {
                    store.draw_entity(target, entity, camera, now);
                }
            }

            let hero_here = self.hero.base().layer() == layer;
            let hero_bottom = self.hero.base().bounding_box().bottom();
            let mut hero_drawn = !hero_here;
            for id in &store.y_order[layer.index()] {
                let Some(entity) = store.entities.get(*id) else {
                    continue;
                };
                if !hero_drawn && entity.bounding_box().bottom() > hero_bottom {
                    self.hero.draw(target, camera);
                    hero_drawn = true;
                }
                store.draw_entity(target, entity, camera, now);
            }
            if !hero_drawn {
                self.hero.draw(target, camera);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::kinds::{CrystalBlockSubtype, SwitchSubtype};
    use crate::game::testing::{test_tileset, Fixture};
    use crate::map::{TilePattern, TILE_ANIMATION_FRAME_DELAY_MS};
    use crate::render::{DrawCall, RecordingTarget};

    fn store() -> EntityStore {
        EntityStore::new("test_map", 64, 64, test_tileset())
    }

    struct Walker;

    impl ObstacleRules for Walker {
        fn obstacle_rules_type(&self) -> EntityType {
            EntityType::Enemy
        }
    }

    #[test]
    fn duplicate_names_get_numeric_suffixes() {
        let mut store = store();
        let first = store
            .add_entity(Entity::sensor("x", Layer::Low, Rect::new(0, 0, 8, 8)))
            .expect("sensor id");
        let second = store
            .add_entity(Entity::sensor("x", Layer::Low, Rect::new(0, 0, 8, 8)))
            .expect("sensor id");
        let third = store
            .add_entity(Entity::sensor("x", Layer::Low, Rect::new(0, 0, 8, 8)))
            .expect("sensor id");
        let hero_named = store
            .add_entity(Entity::sensor(HERO_NAME, Layer::Low, Rect::new(0, 0, 8, 8)))
            .expect("sensor id");
        let name_of = |id| store.entity(id).map(|entity| entity.name().to_string());
        assert_eq!(name_of(first).as_deref(), Some("x"));
        assert_eq!(name_of(second).as_deref(), Some("x_2"));
        assert_eq!(name_of(third).as_deref(), Some("x_3"));
        assert_eq!(name_of(hero_named).as_deref(), Some("hero_2"));
    }

    #[test]
    fn removal_is_deferred_and_idempotent() {
        let mut fixture = Fixture::default();
        let mut store = store();
        let id = store
            .add_entity(Entity::sensor("trap", Layer::Low, Rect::new(0, 0, 16, 16)))
            .expect("sensor id");
        store.remove_entity(id);
        store.remove_entity(id);
        assert!(store.entity(id).is_some());
        assert_eq!(store.find_entity("trap"), None);

        store.remove_marked_entities(&mut fixture.services());
        assert!(store.entity(id).is_none());
        assert!(store.get_entities_by_type(EntityType::Sensor).is_empty());
        assert!(store.detectors().is_empty());
        assert_eq!(
            fixture.hooks.events,
            vec!["removed:trap".to_string()],
            "removal notified once"
        );
    }

    #[test]
    fn update_unlinks_removed_entities_from_every_index() {
        let mut fixture = Fixture::default();
        let mut map = MapEntities::new("test_map", 64, 64, test_tileset());
        let block = map
            .add_entity(Entity::block("block", Layer::Low, Point::new(24, 29), true, false, None))
            .expect("block id");
        let belt = map
            .add_entity(Entity::conveyor_belt("belt", Layer::Low, Point::new(40, 45), 0))
            .expect("belt id");
        let bomb = map
            .add_entity(Entity::bomb("bomb", Layer::Low, Point::new(8, 13), 0))
            .expect("bomb id");
        map.hero_mut().place(Point::new(56, 61), Layer::Low, 3);
        {
            let store = map.store();
            assert!(store.obstacles[0].contains(&block));
            assert!(store.y_order[0].contains(&block));
            assert!(store.draw_first[0].contains(&belt));
            assert!(store.detectors.contains(&belt));
            assert!(store.ground_observers.contains(&bomb));
        }

        for id in [block, belt, bomb] {
            map.store_mut().remove_entity(id);
        }
        fixture.now = 10;
        map.update(&mut fixture.services());

        let store = map.store();
        for id in [block, belt, bomb] {
            assert!(store.entity(id).is_none());
            assert!(!store.ids().contains(&id));
        }
        assert!(store.obstacles.iter().all(Vec::is_empty));
        assert!(store.y_order.iter().all(Vec::is_empty));
        assert!(store.draw_first.iter().all(Vec::is_empty));
        assert!(store.detectors.is_empty());
        assert!(store.ground_observers.is_empty());
        assert_eq!(store.entity_count(), 0);
        for name in ["block", "belt", "bomb"] {
            assert!(fixture.has_event(&format!("removed:{name}")), "{name}");
        }
    }

    #[test]
    #[should_panic(expected = "no entity named 'ghost'")]
    fn strict_lookup_of_missing_name_is_fatal() {
        store().get_entity("ghost");
    }

    #[test]
    fn prefix_queries_skip_removed_entities() {
        let mut store = store();
        let a = store
            .add_entity(Entity::sensor("door_a", Layer::Low, Rect::new(0, 0, 8, 8)))
            .expect("sensor id");
        store.add_entity(Entity::sensor("door_b", Layer::Low, Rect::new(0, 0, 8, 8)));
        store.add_entity(Entity::sensor("key", Layer::Low, Rect::new(0, 0, 8, 8)));
        assert_eq!(store.get_entities_with_prefix("door").len(), 2);
        store.remove_entity(a);
        assert_eq!(store.get_entities_with_prefix("door").len(), 1);
        store.remove_entities_with_prefix("door");
        assert!(!store.has_entity_with_prefix("door"));
        assert!(store.has_entity_with_prefix("ke"));
    }

    #[test]
    fn y_order_sort_is_stable() {
        let mut store = store();
        let low = store
            .add_entity(Entity::bomb("a", Layer::Low, Point::new(20, 40), 0))
            .expect("bomb id");
        let tie_first = store
            .add_entity(Entity::bomb("b", Layer::Low, Point::new(8, 20), 0))
            .expect("bomb id");
        let tie_second = store
            .add_entity(Entity::bomb("c", Layer::Low, Point::new(40, 20), 0))
            .expect("bomb id");
        store.sort_y_order();
        assert_eq!(store.y_order[0], vec![tie_first, tie_second, low]);
    }

    #[test]
    fn bring_to_front_reorders_first_drawn_entities() {
        let mut store = store();
        let first = store
            .add_entity(Entity::conveyor_belt("a", Layer::Low, Point::new(8, 13), 0))
            .expect("belt id");
        let second = store
            .add_entity(Entity::conveyor_belt("b", Layer::Low, Point::new(24, 13), 0))
            .expect("belt id");
        store.bring_to_front(first);
        assert_eq!(store.draw_first[0], vec![second, first]);
        store.bring_to_back(first);
        assert_eq!(store.draw_first[0], vec![first, second]);
    }

    #[test]
    #[should_panic(expected = "not in the first-drawn list")]
    fn bring_to_front_rejects_y_ordered_entities() {
        let mut store = store();
        let bomb = store
            .add_entity(Entity::bomb("bomb", Layer::Low, Point::new(8, 13), 0))
            .expect("bomb id");
        store.bring_to_front(bomb);
    }

    #[test]
    fn static_tiles_stack_bottom_to_top() {
        let mut store = store();
        store.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 8, 8), "water"));
        store.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 8, 8), "wall"));
        store.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 8, 8), "empty"));
        assert_eq!(store.get_obstacle_tile(Layer::Low, 3, 3), Ground::Wall);
        assert_eq!(store.get_obstacle_tile(Layer::Low, 12, 3), Ground::Traversable);
        assert_eq!(store.get_obstacle_tile(Layer::Low, -1, 3), Ground::Empty);
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn empty_cells_fall_through_to_the_layer_below() {
        let mut store = store();
        store.add_entity(Entity::tile(Layer::Low, Rect::new(16, 16, 8, 8), "water"));
        store.grid.set_cell(Layer::Intermediate, 2, 2, Ground::Empty);
        assert_eq!(store.ground_at(Layer::Intermediate, Point::new(18, 18)), Ground::DeepWater);
    }

    #[test]
    fn obstacle_test_covers_border_ground_and_entities() {
        let mut store = store();
        store.add_entity(Entity::tile(Layer::Low, Rect::new(32, 0, 8, 8), "wall"));
        let walker = Walker;
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(-1, 0, 8, 8), &walker, None));
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(60, 0, 8, 8), &walker, None));
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(26, 0, 8, 8), &walker, None));
        assert!(!store.test_collision_with_obstacles(Layer::Low, &Rect::new(16, 0, 8, 8), &walker, None));

        let switch = store
            .add_entity(Entity::switch(
                "solid",
                Layer::Low,
                Point::new(16, 16),
                SwitchSubtype::Solid,
                false,
                false,
            ))
            .expect("switch id");
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(20, 20, 8, 8), &walker, None));
        assert!(!store.test_collision_with_obstacles(
            Layer::Intermediate,
            &Rect::new(20, 20, 8, 8),
            &walker,
            None
        ));
        store
            .entity_mut(switch)
            .expect("switch")
            .base_mut()
            .set_enabled(false);
        assert!(!store.test_collision_with_obstacles(Layer::Low, &Rect::new(20, 20, 8, 8), &walker, None));
    }

    #[test]
    fn dynamic_tile_ground_blocks_like_a_static_tile() {
        let mut store = store();
        store.add_entity(Entity::tile(Layer::Low, Rect::new(0, 32, 16, 16), "water"));
        let pool = store
            .add_entity(Entity::dynamic_tile(
                "pool",
                Layer::Low,
                Rect::new(32, 32, 16, 16),
                "water",
                Ground::DeepWater,
            ))
            .expect("dynamic tile id");
        let walker = Walker;
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(4, 36, 8, 8), &walker, None));
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(36, 36, 8, 8), &walker, None));
        assert_eq!(store.ground_at(Layer::Low, Point::new(40, 40)), Ground::DeepWater);

        store
            .entity_mut(pool)
            .expect("pool")
            .base_mut()
            .set_enabled(false);
        assert!(!store.test_collision_with_obstacles(Layer::Low, &Rect::new(36, 36, 8, 8), &walker, None));
    }

    #[test]
    fn diagonal_cells_block_only_their_wall_triangle() {
        let mut store = store();
        store.add_entity(Entity::tile(Layer::Low, Rect::new(0, 8, 8, 8), "diagonal"));
        let walker = Walker;
        // top-right triangle of the cell at (0,8)
        assert!(store.test_collision_with_obstacles(Layer::Low, &Rect::new(6, 9, 1, 1), &walker, None));
        assert!(!store.test_collision_with_obstacles(Layer::Low, &Rect::new(1, 14, 1, 1), &walker, None));
    }

    #[test]
    fn layer_independent_obstacles_block_every_layer() {
        let mut store = store();
        store.add_entity(Entity::stairs("stairs", Layer::Low, Point::new(16, 16), 1));
        let walker = Walker;
        for layer in Layer::ALL {
            assert!(store.test_collision_with_obstacles(layer, &Rect::new(16, 16, 8, 8), &walker, None));
        }
    }

    #[test]
    fn set_entity_layer_moves_draw_and_obstacle_indexes() {
        let mut store = store();
        let block = store
            .add_entity(Entity::block("block", Layer::Low, Point::new(24, 29), true, false, None))
            .expect("block id");
        store.set_entity_layer(block, Layer::High);
        assert!(store.obstacles[0].is_empty());
        assert_eq!(store.obstacles[2], vec![block]);
        assert_eq!(store.y_order[2], vec![block]);
        assert_eq!(store.entity(block).map(Entity::layer), Some(Layer::High));
    }

    #[test]
    fn raised_block_overlap_follows_crystal_state() {
        let mut store = store();
        store.add_entity(Entity::crystal_block(
            "orange",
            Layer::Low,
            Rect::new(16, 16, 16, 16),
            CrystalBlockSubtype::Orange,
            false,
        ));
        assert!(store.overlaps_raised_blocks(Layer::Low, &Rect::new(20, 20, 4, 4)));
        assert!(!store.overlaps_raised_blocks(Layer::High, &Rect::new(20, 20, 4, 4)));
    }

    #[test]
    fn default_destination_prefers_the_flagged_one() {
        let mut store = store();
        store.add_entity(Entity::destination("a", Layer::Low, Point::new(8, 13), None, false));
        let flagged = store
            .add_entity(Entity::destination("b", Layer::Low, Point::new(24, 13), Some(3), true))
            .expect("destination id");
        store.add_entity(Entity::destination("c", Layer::Low, Point::new(40, 13), None, false));
        assert_eq!(store.get_default_destination(), Some(flagged));
    }

    #[test]
    fn boomerang_slot_is_cleared_on_removal() {
        let mut store = store();
        let boomerang = store
            .add_entity(Entity::boomerang(Layer::Low, Point::new(20, 20)))
            .expect("boomerang id");
        assert!(store.is_boomerang_present());
        store.remove_entity(boomerang);
        assert!(!store.is_boomerang_present());
    }

    #[test]
    fn suspension_shifts_entity_dates() {
        let mut store = store();
        let bomb = store
            .add_entity(Entity::bomb("bomb", Layer::Low, Point::new(8, 13), 0))
            .expect("bomb id");
        store.set_suspended(true, 1_000);
        store.set_suspended(false, 1_400);
        let EntityKind::Bomb(data) = store.entity(bomb).expect("bomb").kind() else {
            panic!("bomb kind");
        };
        assert_eq!(data.explosion_date(), 6_400);
    }

    #[test]
    fn draw_composes_tiles_then_entities_then_hero() {
        let mut fixture = Fixture::default();
        let mut map = MapEntities::new("test_map", 64, 64, test_tileset());
        map.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 16, 16), "lava"));
        map.add_entity(Entity::tile(Layer::Low, Rect::new(16, 0, 8, 8), "wall"));
        map.add_entity(Entity::conveyor_belt("belt", Layer::Low, Point::new(40, 45), 0));
        map.hero_mut().place(Point::new(40, 29), Layer::Low, 3);
        map.notify_map_started(&mut fixture.services());
        assert!(map.store().has_tile_caches());
        assert!(fixture.has_event("map_started:test_map"));

        let mut target = RecordingTarget::new(64, 64);
        map.draw(&mut target, Point::new(0, 0), 0);
        let calls = target.take_calls();
        assert!(matches!(calls[0], DrawCall::Fill { color: [0, 0, 0, 255], .. }));
        assert!(matches!(calls[1], DrawCall::Blit { .. }));
        assert_eq!(
            calls[2],
            DrawCall::Fill {
                rect: Rect::new(0, 0, 8, 8),
                color: [255, 0, 0, 255]
            }
        );
        let belt_index = calls
            .iter()
            .position(|call| matches!(call, DrawCall::Fill { rect, .. } if *rect == Rect::new(32, 32, 16, 16)))
            .expect("belt drawn");
        // calls[0] is the background fill, which covers the hero too
        let hero_index = calls
            .iter()
            .skip(1)
            .position(|call| matches!(call, DrawCall::Fill { rect, .. } if rect.contains_point(Point::new(40, 24))))
            .map(|index| index + 1)
            .expect("hero drawn");
        assert!(belt_index < hero_index);
    }

    #[test]
    fn animated_tile_shows_over_the_static_tile_beneath_it() {
        let mut fixture = Fixture::default();
        let mut tileset = test_tileset();
        tileset.add_pattern(TilePattern::new("grass", Ground::Grass, 8, 8, [0, 200, 0, 255]).expect("pattern"));
        let mut map = MapEntities::new("test_map", 64, 64, tileset);
        map.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 32, 32), "grass"));
        map.add_entity(Entity::tile(Layer::Low, Rect::new(0, 0, 16, 16), "lava"));
        map.add_entity(Entity::tile(Layer::Low, Rect::new(8, 8, 8, 8), "wall"));
        map.hero_mut().place(Point::new(48, 61), Layer::Low, 3);
        map.notify_map_started(&mut fixture.services());

        let mut surface = Surface::new(64, 64);
        map.draw(&mut surface, Point::new(0, 0), 0);
        assert_eq!(surface.pixel(4, 4), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(12, 12), Some([10, 10, 10, 255]), "later tile stays on top");
        assert_eq!(surface.pixel(20, 20), Some([0, 200, 0, 255]));

        map.draw(&mut surface, Point::new(0, 0), TILE_ANIMATION_FRAME_DELAY_MS);
        assert_eq!(surface.pixel(4, 4), Some([200, 0, 0, 255]));
    }

    #[test]
    fn tileset_change_rebuilds_caches() {
        let mut fixture = Fixture::default();
        let mut map = MapEntities::new("test_map", 64, 64, test_tileset());
        map.notify_map_started(&mut fixture.services());
        let mut replacement = test_tileset();
        replacement.add_pattern(TilePattern::new("extra", Ground::Grass, 8, 8, [1, 1, 1, 255]).expect("pattern"));
        map.notify_tileset_changed(replacement, &mut fixture.services());
        assert_eq!(map.store().tileset().pattern_count(), 7);
        assert!(fixture.has_event("tileset_changed:test"));
    }
}
