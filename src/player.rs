use serde::Serialize;

use crate::feature::{FeatureId, FeatureView, SegmentId};
use crate::world::World;

/// A seat at the table. Claims are held as segment handles so they keep
/// pointing at the right feature through any number of merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) colour: u8,
    pub(crate) claimed: Vec<SegmentId>,
    pub(crate) completed: Vec<FeatureId>,
    pub(crate) score: u32,
}

impl Player {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            name: format!("Player {index}"),
            colour: (index % 255) as u8 + 1,
            claimed: Vec::new(),
            completed: Vec::new(),
            score: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn colour(&self) -> u8 {
        self.colour
    }

    /// Segments currently holding one of this player's avatars.
    pub fn claimed(&self) -> &[SegmentId] {
        &self.claimed
    }

    pub fn completed(&self) -> &[FeatureId] {
        &self.completed
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Live features behind this player's claims, one entry per claim.
    pub fn features<'w>(&self, world: &'w World) -> Vec<FeatureView<'w>> {
        self.claimed
            .iter()
            .filter_map(|segment| world.feature_of(*segment))
            .collect()
    }
}
