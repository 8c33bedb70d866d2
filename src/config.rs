use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sandbox::CloneStrategy;

fn default_extent() -> i32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_avatars() -> u32 {
    7
}

fn default_max_reshuffles() -> u32 {
    10
}

/// Table setup for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    /// Tiles must satisfy `|x| < extent` and `|y| < extent`.
    #[serde(default = "default_extent")]
    pub extent: i32,
    #[serde(default)]
    pub clone_strategy: CloneStrategy,
    #[serde(default = "default_true")]
    pub river: bool,
    #[serde(default = "default_true")]
    pub inns_cathedrals: bool,
    #[serde(default = "default_avatars")]
    pub avatars: u32,
    #[serde(default = "default_true")]
    pub shuffle_unplaceable: bool,
    #[serde(default = "default_max_reshuffles")]
    pub max_reshuffles: u32,
    #[serde(default)]
    pub seed: u64,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            extent: default_extent(),
            clone_strategy: CloneStrategy::default(),
            river: true,
            inns_cathedrals: true,
            avatars: default_avatars(),
            shuffle_unplaceable: true,
            max_reshuffles: default_max_reshuffles(),
            seed: 0,
        }
    }
}

impl GameOptions {
    /// Avatars each player starts with; the inns & cathedrals set adds one.
    pub fn avatars_per_player(&self) -> u32 {
        if self.inns_cathedrals {
            self.avatars + 1
        } else {
            self.avatars
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse game options")
    }
}

pub struct OptionsLoader {
    base_dir: PathBuf,
}

impl OptionsLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<GameOptions> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        let options: GameOptions = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_every_default() {
        let options = GameOptions::from_yaml_str("{}").unwrap();
        assert_eq!(options, GameOptions::default());
        assert_eq!(options.avatars_per_player(), 8);
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let options = GameOptions::from_yaml_str(
            "extent: 5\nclone_strategy: eager\ninns_cathedrals: false\nseed: 99\n",
        )
        .unwrap();
        assert_eq!(options.extent, 5);
        assert_eq!(options.clone_strategy, CloneStrategy::Eager);
        assert_eq!(options.avatars_per_player(), 7);
        assert_eq!(options.seed, 99);
        assert!(options.river);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(GameOptions::from_yaml_str("clone_strategy: pickle\n").is_err());
    }
}
