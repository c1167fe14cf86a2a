use std::collections::HashMap;

use anyhow::anyhow;
use arcstr::ArcStr;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat};
use serde::Deserialize;

use crate::coords::CHUNK_SIZE;
use crate::side_effect::{SideEffect, SideEffectDefaults};
use crate::util::intern_str;

pub const AIR: &str = "minecraft:air";

#[derive(Debug, Default, Deserialize)]
struct RawBlockKind {
    #[serde(default)]
    air: bool,
    #[serde(default)]
    block_entity: Option<String>,
    #[serde(default)]
    connects: bool,
    #[serde(default)]
    light: u8,
    #[serde(default)]
    poi: bool,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Behaviour of one block kind in the reference in-memory world.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockKind {
    pub name: ArcStr,
    pub air: bool,
    /// Block entity type created for this kind, if it has one.
    pub block_entity: Option<ArcStr>,
    /// Shape depends on horizontal neighbours (fences, panes).
    pub connects: bool,
    /// Block light emitted, `0..=15`.
    pub light: u8,
    /// Counts as a point of interest.
    pub poi: bool,
}

impl BlockKind {
    /// A plain solid block with no special behaviour.
    pub fn solid(name: ArcStr) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct BlockKinds(HashMap<ArcStr, BlockKind>);

impl BlockKinds {
    fn from_raw(raw: HashMap<String, RawBlockKind>) -> anyhow::Result<BlockKinds> {
        let mut kinds = HashMap::new();
        for (name, raw_kind) in raw.into_iter() {
            if raw_kind.light > 15 {
                return Err(anyhow!(
                    "blocks.{:?}.light must be in 0..=15, got {}",
                    name,
                    raw_kind.light
                ));
            }
            let name = intern_str(name);
            let kind = BlockKind {
                name: name.clone(),
                air: raw_kind.air,
                block_entity: raw_kind.block_entity.map(intern_str),
                connects: raw_kind.connects,
                light: raw_kind.light,
                poi: raw_kind.poi,
            };
            for alias in raw_kind.aliases.into_iter() {
                let alias = intern_str(alias);
                kinds.insert(
                    alias.clone(),
                    BlockKind {
                        name: alias,
                        ..kind.clone()
                    },
                );
            }
            kinds.insert(name, kind);
        }
        if !kinds.get(AIR).is_some_and(|kind| kind.air) {
            return Err(anyhow!("blocks.{:?} must be configured with air = true", AIR));
        }
        Ok(BlockKinds(kinds))
    }

    pub fn get(&self, name: &str) -> Option<&BlockKind> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockKind> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub struct WorldSettings {
    pub min_y: i32,
    pub height: u32,
}

impl WorldSettings {
    fn validate(self) -> anyhow::Result<Self> {
        if self.min_y.rem_euclid(CHUNK_SIZE as i32) != 0 {
            return Err(anyhow!("world.min_y must be a multiple of {}", CHUNK_SIZE));
        }
        if self.height == 0 || self.height % CHUNK_SIZE != 0 {
            return Err(anyhow!(
                "world.height must be a positive multiple of {}",
                CHUNK_SIZE
            ));
        }
        Ok(self)
    }

    pub fn section_count(&self) -> usize {
        (self.height / CHUNK_SIZE) as usize
    }
}

#[derive(Debug)]
pub struct Settings {
    pub side_effects: SideEffectDefaults,
    pub world: WorldSettings,
    pub blocks: BlockKinds,
}

impl Settings {
    pub fn config_builder() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(
            include_str!("settings_default.toml"),
            FileFormat::Toml,
        ))
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Settings> {
        let raw_side_effects: HashMap<String, bool> = config.get("side_effects")?;
        let mut side_effects = SideEffectDefaults::default();
        for (name, enabled) in raw_side_effects.into_iter() {
            let effect: SideEffect = name.parse()?;
            side_effects = side_effects.with(effect, enabled);
        }
        Ok(Settings {
            side_effects,
            world: config.get::<WorldSettings>("world")?.validate()?,
            blocks: BlockKinds::from_raw(config.get("blocks")?)?,
        })
    }

    /// Settings from the built-in defaults alone.
    pub fn load_default() -> anyhow::Result<Settings> {
        Self::from_config(&Self::config_builder().build()?)
    }
}
