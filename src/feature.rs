//! Segments, features and the per-variant scoring/completion rules.
//!
//! Features and segments live in the world's arenas and refer to each other
//! by id. A segment's `feature` handle is the only thing a merge rewrites.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::tile::WHOLE_TILE;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub(crate) u32);

impl SegmentId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub(crate) u32);

impl FeatureId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureKind {
    City,
    Road,
    Farm,
    Cloister,
    River,
}

impl FeatureKind {
    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::City => "City",
            FeatureKind::Road => "Road",
            FeatureKind::Farm => "Farm",
            FeatureKind::Cloister => "Cloister",
            FeatureKind::River => "River",
        }
    }

    /// Whether features of this kind join across tile boundaries.
    pub fn merges(self) -> bool {
        !matches!(self, FeatureKind::Cloister)
    }

    pub fn ownable(self) -> bool {
        !matches!(self, FeatureKind::River)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A boundary in normalised form: the same physical edge yields the same key
/// from either side.
pub type EdgeKey = (i32, i32, u8);

/// The key of the edge facing `edge` across the boundary of cell `(x, y)`.
pub fn swap_edge(kind: FeatureKind, x: i32, y: i32, edge: u8) -> EdgeKey {
    if kind == FeatureKind::Farm {
        match edge / 2 {
            0 => (x, y + 1, 5 - edge),
            1 => (x + 1, y, 9 - edge),
            2 => (x, y - 1, 5 - edge),
            _ => (x - 1, y, 9 - edge),
        }
    } else {
        match edge {
            0 => (x, y + 1, 2),
            1 => (x + 1, y, 3),
            2 => (x, y - 1, 0),
            _ => (x - 1, y, 1),
        }
    }
}

/// Farms keep half-edges 0-3 and swap 4-7; everything else keeps 0-1 and
/// swaps 2-3. The whole-tile marker has no boundary.
pub fn normalise_edge(kind: FeatureKind, x: i32, y: i32, edge: u8) -> Option<EdgeKey> {
    if edge == WHOLE_TILE {
        return None;
    }
    let keep = if kind == FeatureKind::Farm { 4 } else { 2 };
    Some(if edge >= keep {
        swap_edge(kind, x, y, edge)
    } else {
        (x, y, edge)
    })
}

#[derive(Debug, Clone)]
pub enum SegmentKind {
    City { pennant: bool, cathedral: bool },
    Road { inn: bool },
    /// City segments on the same tile bordering this farm wedge.
    Farm { cities: Vec<SegmentId> },
    Cloister,
    River,
}

impl SegmentKind {
    pub fn feature_kind(&self) -> FeatureKind {
        match self {
            SegmentKind::City { .. } => FeatureKind::City,
            SegmentKind::Road { .. } => FeatureKind::Road,
            SegmentKind::Farm { .. } => FeatureKind::Farm,
            SegmentKind::Cloister => FeatureKind::Cloister,
            SegmentKind::River => FeatureKind::River,
        }
    }
}

/// The part of a feature contributed by one tile.
#[derive(Debug, Clone)]
pub struct Segment {
    pub(crate) kind: SegmentKind,
    pub(crate) tile: (i32, i32),
    pub(crate) edges: Vec<u8>,
    pub(crate) feature: FeatureId,
}

impl Segment {
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn tile(&self) -> (i32, i32) {
        self.tile
    }

    pub fn edges(&self) -> &[u8] {
        &self.edges
    }

    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    pub fn has_pennant(&self) -> bool {
        matches!(self.kind, SegmentKind::City { pennant: true, .. })
    }

    fn identity(&self) -> (FeatureKind, (i32, i32), &[u8]) {
        (self.kind.feature_kind(), self.tile, &self.edges)
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub player: usize,
    pub strength: u32,
}

impl Avatar {
    pub fn new(player: usize) -> Self {
        Self {
            player,
            strength: 1,
        }
    }

    pub fn with_strength(player: usize, strength: u32) -> Self {
        Self { player, strength }
    }
}

/// Arena record of one live region.
#[derive(Debug, Clone)]
pub struct Feature {
    pub(crate) kind: FeatureKind,
    pub(crate) segments: Vec<SegmentId>,
    pub(crate) tiles: Vec<(i32, i32)>,
    pub(crate) avatars: Vec<Avatar>,
    pub(crate) owners: Vec<usize>,
    pub(crate) cleared: bool,
}

impl Feature {
    pub(crate) fn new(kind: FeatureKind, segment: SegmentId, tile: (i32, i32)) -> Self {
        Self {
            kind,
            segments: vec![segment],
            tiles: vec![tile],
            avatars: Vec::new(),
            owners: Vec::new(),
            cleared: false,
        }
    }

    pub(crate) fn add_avatar(&mut self, avatar: Avatar) {
        self.avatars.push(avatar);
        self.update_owners();
    }

    /// Owners are every player whose summed strength is maximal.
    pub(crate) fn update_owners(&mut self) {
        let mut strength: BTreeMap<usize, u32> = BTreeMap::new();
        for avatar in &self.avatars {
            *strength.entry(avatar.player).or_default() += avatar.strength;
        }
        let best = strength.values().copied().max();
        self.owners = strength
            .into_iter()
            .filter(|(_, total)| Some(*total) == best)
            .map(|(player, _)| player)
            .collect();
    }

    /// Take over `other`'s segments, tiles and avatars. The caller repoints
    /// the segments and drops `other` from the arena.
    pub(crate) fn absorb(&mut self, other: Feature) {
        self.segments.extend(other.segments);
        self.tiles.extend(other.tiles);
        self.tiles.sort_unstable();
        self.tiles.dedup();
        self.avatars.extend(other.avatars);
        self.update_owners();
    }
}

/// Read-only view of a live feature, resolving its segments through the world.
#[derive(Clone, Copy)]
pub struct FeatureView<'w> {
    world: &'w World,
    id: FeatureId,
    feature: &'w Feature,
}

impl<'w> FeatureView<'w> {
    pub(crate) fn new(world: &'w World, id: FeatureId, feature: &'w Feature) -> Self {
        Self { world, id, feature }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn kind(&self) -> FeatureKind {
        self.feature.kind
    }

    pub fn name(&self) -> &'static str {
        self.feature.kind.name()
    }

    pub fn segments(&self) -> &'w [SegmentId] {
        &self.feature.segments
    }

    pub fn tiles(&self) -> &'w [(i32, i32)] {
        &self.feature.tiles
    }

    pub fn avatars(&self) -> &'w [Avatar] {
        &self.feature.avatars
    }

    pub fn owners(&self) -> &'w [usize] {
        &self.feature.owners
    }

    pub fn is_cleared(&self) -> bool {
        self.feature.cleared
    }

    fn members(&self) -> impl Iterator<Item = &'w Segment> + 'w {
        let world = self.world;
        self.feature
            .segments
            .iter()
            .map(move |id| world.segment(*id).expect("feature segment should exist"))
    }

    /// Open boundary edges: every normalised edge that occurs an odd number
    /// of times across the member segments.
    pub fn edges(&self) -> BTreeSet<EdgeKey> {
        let kind = self.feature.kind;
        let mut open = BTreeSet::new();
        for segment in self.members() {
            let (x, y) = segment.tile;
            for &edge in &segment.edges {
                if let Some(key) = normalise_edge(kind, x, y, edge) {
                    if !open.remove(&key) {
                        open.insert(key);
                    }
                }
            }
        }
        open
    }

    pub fn is_complete(&self) -> bool {
        match self.feature.kind {
            FeatureKind::City | FeatureKind::Road | FeatureKind::River => self.edges().is_empty(),
            FeatureKind::Cloister => self.cloister_neighbourhood() == 9,
            FeatureKind::Farm => false,
        }
    }

    /// Unowned, claimable and still in play.
    pub fn can_own(&self) -> bool {
        self.feature.kind.ownable() && self.feature.owners.is_empty() && !self.feature.cleared
    }

    pub fn score(&self) -> u32 {
        match self.feature.kind {
            FeatureKind::City => {
                let mut plain = BTreeSet::new();
                let mut pennants = BTreeSet::new();
                let mut cathedral = false;
                for segment in self.members() {
                    if let SegmentKind::City {
                        pennant,
                        cathedral: c,
                    } = segment.kind
                    {
                        if pennant {
                            pennants.insert(segment.tile);
                        } else {
                            plain.insert(segment.tile);
                        }
                        cathedral |= c;
                    }
                }
                let base = (plain.len() + 2 * pennants.len()) as u32;
                match (self.is_complete(), cathedral) {
                    (true, true) => base * 3,
                    (true, false) => base * 2,
                    (false, _) => base,
                }
            }
            FeatureKind::Road => {
                let tiles: BTreeSet<(i32, i32)> = self.members().map(|s| s.tile).collect();
                let inn = self
                    .members()
                    .any(|s| matches!(s.kind, SegmentKind::Road { inn: true }));
                tiles.len() as u32 * if inn { 2 } else { 1 }
            }
            FeatureKind::Cloister => self.cloister_neighbourhood(),
            FeatureKind::Farm => 3 * self.cities(Some(true)).len() as u32,
            FeatureKind::River => 0,
        }
    }

    fn cloister_neighbourhood(&self) -> u32 {
        let Some(&(x, y)) = self.feature.tiles.first() else {
            return 0;
        };
        let mut occupied = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if self.world.tile(x + dx, y + dy).is_some() {
                    occupied += 1;
                }
            }
        }
        occupied
    }

    /// City features bordering this farm, optionally filtered by completion.
    /// Empty for every other kind.
    pub fn cities(&self, complete: Option<bool>) -> Vec<FeatureId> {
        let mut cities = BTreeSet::new();
        for segment in self.members() {
            if let SegmentKind::Farm { cities: bordering } = &segment.kind {
                for city in bordering {
                    if let Some(city) = self.world.segment(*city) {
                        cities.insert(city.feature);
                    }
                }
            }
        }
        cities
            .into_iter()
            .filter(|id| match complete {
                None => true,
                Some(wanted) => self
                    .world
                    .feature(*id)
                    .is_some_and(|city| city.is_complete() == wanted),
            })
            .collect()
    }

    /// Mean tile position, truncated towards zero.
    pub fn centre(&self) -> (i32, i32) {
        let tiles = &self.feature.tiles;
        if tiles.is_empty() {
            return (0, 0);
        }
        let n = tiles.len() as f64;
        let x: f64 = tiles.iter().map(|t| t.0 as f64).sum::<f64>() / n;
        let y: f64 = tiles.iter().map(|t| t.1 as f64).sum::<f64>() / n;
        (x as i32, y as i32)
    }

    /// One-line summary, e.g. `Unowned City @ (0, 0): 2 points (1 tiles)`.
    pub fn desc(&self, owner: bool, location: bool) -> String {
        let mut out = String::new();
        if owner {
            match self.feature.owners.as_slice() {
                [] => out.push_str("Unowned "),
                [single] => {
                    let name = self
                        .world
                        .player(*single)
                        .map(|p| p.name().to_string())
                        .unwrap_or_else(|| format!("Player {single}"));
                    out.push_str(&name);
                    out.push(' ');
                }
                _ => out.push_str("Contested "),
            }
        }
        out.push_str(self.name());
        if location {
            let (x, y) = self.centre();
            out.push_str(&format!(" @ ({x}, {y})"));
        }
        out.push_str(&format!(
            ": {} points ({} tiles)",
            self.score(),
            self.feature.tiles.len()
        ));
        out
    }
}

impl fmt::Debug for FeatureView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureView")
            .field("id", &self.id)
            .field("kind", &self.feature.kind)
            .field("segments", &self.feature.segments)
            .field("owners", &self.feature.owners)
            .finish()
    }
}
