use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{MapData, MapEntities, MapLoader};
use tracing::{debug, info};

pub(crate) type MapLoadResult<T> = Result<T, String>;

const VILLAGE_JSON: &str = include_str!("../../maps/village.json");
const CAVE_JSON: &str = include_str!("../../maps/cave.json");

pub(crate) const DEFAULT_MAP_ID: &str = "village";

pub(crate) fn parse_map_json(raw: &str) -> MapLoadResult<MapData> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, MapData>(&mut deserializer) {
        Ok(data) => Ok(data),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse map json: {source}"))
            } else {
                Err(format!("parse map json at {path}: {source}"))
            }
        }
    }
}

pub(crate) fn build_map(data: &MapData) -> MapLoadResult<MapEntities> {
    let map = data
        .build()
        .map_err(|error| format!("build map '{}': {error}", data.id))?;
    info!(
        map = %data.id,
        width = data.width,
        height = data.height,
        entity_count = map.store().entity_count(),
        "map_loaded"
    );
    Ok(map)
}

pub(crate) fn load_map_file(path: &Path) -> MapLoadResult<MapData> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read map '{}': {error}", path.display()))?;
    parse_map_json(&raw).map_err(|error| format!("{}: {error}", path.display()))
}

/// Maps compiled into the binary.
#[derive(Debug)]
pub(crate) struct BuiltinMaps {
    sources: HashMap<&'static str, &'static str>,
}

impl Default for BuiltinMaps {
    fn default() -> Self {
        Self {
            sources: HashMap::from([("village", VILLAGE_JSON), ("cave", CAVE_JSON)]),
        }
    }
}

impl MapLoader for BuiltinMaps {
    fn load_map(&mut self, map_id: &str) -> MapLoadResult<MapEntities> {
        let Some(raw) = self.sources.get(map_id) else {
            return Err(format!("no built-in map named '{map_id}'"));
        };
        let data = parse_map_json(raw)?;
        build_map(&data)
    }
}

/// Maps read from `<dir>/<map_id>.json`.
#[derive(Debug)]
pub(crate) struct MapDirectory {
    dir: PathBuf,
}

impl MapDirectory {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn path_of(&self, map_id: &str) -> PathBuf {
        self.dir.join(format!("{map_id}.json"))
    }
}

impl MapLoader for MapDirectory {
    fn load_map(&mut self, map_id: &str) -> MapLoadResult<MapEntities> {
        let path = self.path_of(map_id);
        debug!(map = map_id, path = %path.display(), "map_file_resolved");
        let data = load_map_file(&path)?;
        if data.id != map_id {
            return Err(format!(
                "validation failed at id: expected {map_id}, got {}",
                data.id
            ));
        }
        build_map(&data)
    }
}
