use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::GameOptions;
use crate::error::GameError;
use crate::feature::{
    swap_edge, Avatar, EdgeKey, Feature, FeatureId, FeatureKind, FeatureView, Segment, SegmentId,
    SegmentKind,
};
use crate::player::Player;
use crate::sandbox::{CloneStrategy, CowMap};
use crate::tile::{EdgeKind, FeatureTemplate, Tile, TileCatalog, EAST, NORTH, SOUTH, WEST};

/// `(x, y, rotation)` where rotation is the number of quarter turns to apply.
pub type Placement = (i32, i32, usize);

#[derive(Debug, Clone)]
pub struct PlacedTile {
    pub(crate) tile: Tile,
    pub(crate) segments: Vec<SegmentId>,
}

impl PlacedTile {
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }
}

/// A feature cleared by one of the sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub feature: FeatureId,
    pub kind: FeatureKind,
    pub owners: Vec<usize>,
    pub score: u32,
}

/// The table: placed tiles, the segment and feature arenas, and the players.
pub struct World {
    options: GameOptions,
    catalog: Rc<TileCatalog>,
    tiles: CowMap<(i32, i32), PlacedTile>,
    segments: CowMap<SegmentId, Segment>,
    features: CowMap<FeatureId, Feature>,
    players: Vec<Player>,
    next_segment: u32,
    next_feature: u32,
}

/// The cell across side `direction` and the side of it that faces back.
fn adjacent(x: i32, y: i32, direction: usize) -> (i32, i32, usize) {
    match direction {
        NORTH => (x, y + 1, SOUTH),
        EAST => (x + 1, y, WEST),
        SOUTH => (x, y - 1, NORTH),
        _ => (x - 1, y, EAST),
    }
}

fn river_directions(tile: &Tile) -> impl Iterator<Item = usize> + '_ {
    (0..4).filter(move |&d| tile.edge(d) == EdgeKind::River)
}

impl World {
    pub fn new(options: GameOptions, players: usize) -> Self {
        Self::with_catalog(options, players, Rc::new(TileCatalog::new()))
    }

    pub fn with_catalog(options: GameOptions, players: usize, catalog: Rc<TileCatalog>) -> Self {
        Self {
            options,
            catalog,
            tiles: CowMap::new(),
            segments: CowMap::new(),
            features: CowMap::new(),
            players: (0..players).map(Player::new).collect(),
            next_segment: 0,
            next_feature: 0,
        }
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Rc<TileCatalog> {
        &self.catalog
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tiles.get(&(x, y)).map(|placed| &placed.tile)
    }

    pub fn placed(&self, x: i32, y: i32) -> Option<&PlacedTile> {
        self.tiles.get(&(x, y))
    }

    pub fn tiles(&self) -> impl Iterator<Item = (&(i32, i32), &PlacedTile)> + '_ {
        self.tiles.iter()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn feature(&self, id: FeatureId) -> Option<FeatureView<'_>> {
        self.features
            .get(&id)
            .map(|feature| FeatureView::new(self, id, feature))
    }

    /// The feature a segment currently belongs to.
    pub fn feature_of(&self, segment: SegmentId) -> Option<FeatureView<'_>> {
        self.feature(self.segment(segment)?.feature)
    }

    /// Every feature in the arena, cleared ones included, in id order.
    pub fn features(&self) -> Vec<FeatureView<'_>> {
        self.features
            .iter()
            .map(|(id, feature)| FeatureView::new(self, *id, feature))
            .collect()
    }

    /// Features still in play, skipping cleared ones.
    pub fn live_features(&self) -> Vec<FeatureView<'_>> {
        self.features()
            .into_iter()
            .filter(|feature| !feature.is_cleared())
            .collect()
    }

    /// Arena size, cleared features included.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Distinct features with a segment on the tile at `(x, y)`.
    pub fn features_at(&self, x: i32, y: i32, kind: Option<FeatureKind>) -> Vec<FeatureView<'_>> {
        let Some(placed) = self.tiles.get(&(x, y)) else {
            return Vec::new();
        };
        let ids: BTreeSet<FeatureId> = placed
            .segments
            .iter()
            .filter_map(|id| self.segments.get(id))
            .map(|segment| segment.feature)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.feature(id))
            .filter(|feature| kind.map_or(true, |kind| feature.kind() == kind))
            .collect()
    }

    pub fn open_edges(&self, id: FeatureId) -> BTreeSet<EdgeKey> {
        self.feature(id)
            .map(|feature| feature.edges())
            .unwrap_or_default()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, index: usize) -> Option<&Player> {
        self.players.get(index)
    }

    pub fn player_mut(&mut self, index: usize) -> Option<&mut Player> {
        self.players.get_mut(index)
    }

    pub fn available_avatars(&self, player: usize) -> u32 {
        self.players.get(player).map_or(0, |p| {
            self.options
                .avatars_per_player()
                .saturating_sub(p.claimed.len() as u32)
        })
    }

    pub fn can_place(&self, tile: &Tile, x: i32, y: i32) -> bool {
        let extent = self.options.extent.unsigned_abs();
        if x.unsigned_abs() >= extent || y.unsigned_abs() >= extent {
            return false;
        }
        if self.tiles.contains_key(&(x, y)) {
            return false;
        }
        for direction in 0..4 {
            let (nx, ny, facing) = adjacent(x, y, direction);
            if let Some(neighbour) = self.tile(nx, ny) {
                if tile.edge(direction) != neighbour.edge(facing) {
                    return false;
                }
            }
        }
        if self.options.river && !self.tiles.is_empty() && tile.has_edge(EdgeKind::River) {
            return self.river_continues(tile, x, y);
        }
        true
    }

    /// Every tile after the first must share a side with a placed tile.
    fn touches_board(&self, x: i32, y: i32) -> bool {
        self.tiles.is_empty()
            || (0..4).any(|direction| {
                let (nx, ny, _) = adjacent(x, y, direction);
                self.tiles.contains_key(&(nx, ny))
            })
    }

    /// The river must connect to an existing river edge and, following the
    /// chain from the origin tile, may flow in at most two directions.
    fn river_continues(&self, tile: &Tile, x: i32, y: i32) -> bool {
        let connected = river_directions(tile).any(|direction| {
            let (nx, ny, facing) = adjacent(x, y, direction);
            self.tile(nx, ny)
                .is_some_and(|neighbour| neighbour.edge(facing) == EdgeKind::River)
        });
        if !connected {
            return false;
        }

        let Some(origin) = self.tile(0, 0) else {
            return true;
        };
        let mut directions: Vec<usize> = river_directions(origin).collect();
        if directions.is_empty() {
            return true;
        }
        let mut at = (0, 0);
        let mut entry = 0;
        for _ in 0..=self.tiles.len() {
            let heading = directions[directions.len() - 1];
            let (nx, ny, facing) = adjacent(at.0, at.1, heading);
            entry = facing;
            match self.tile(nx, ny) {
                Some(next) => {
                    at = (nx, ny);
                    directions.extend(river_directions(next).filter(|&d| d != facing));
                }
                None => break,
            }
        }

        let distinct: BTreeSet<usize> = directions
            .into_iter()
            .chain(river_directions(tile).filter(|&d| d != entry))
            .collect();
        distinct.len() <= 2
    }

    /// Every legal `(x, y, rotation)` for `tile`, sorted and deduplicated.
    /// Only rotations below the tile's symmetry degree are tried.
    pub fn possible_placements(&self, tile: &Tile) -> Vec<Placement> {
        if self.tiles.is_empty() {
            return vec![(0, 0, 0)];
        }
        let mut frontier = BTreeSet::new();
        for &(x, y) in self.tiles.keys().iter() {
            for direction in 0..4 {
                let (nx, ny, _) = adjacent(x, y, direction);
                if !self.tiles.contains_key(&(nx, ny)) {
                    frontier.insert((nx, ny));
                }
            }
        }
        let rotations: Vec<Tile> = (0..tile.symmetry() as usize)
            .map(|steps| tile.rotate(steps))
            .collect();
        let mut result = BTreeSet::new();
        for (x, y) in frontier {
            for (steps, rotated) in rotations.iter().enumerate() {
                if self.can_place(rotated, x, y) {
                    result.insert((x, y, steps));
                }
            }
        }
        result.into_iter().collect()
    }

    /// Whether any tile in `tiles`, in any orientation, fits at `(x, y)`.
    pub fn tile_exists<'t>(&self, x: i32, y: i32, tiles: impl IntoIterator<Item = &'t Tile>) -> bool {
        let distinct: HashSet<&Tile> = tiles.into_iter().collect();
        distinct.into_iter().any(|tile| {
            (0..tile.symmetry() as usize).any(|steps| self.can_place(&tile.rotate(steps), x, y))
        })
    }

    /// Anchor `tile` at `(x, y)`, build its segments and join them to the
    /// matching features across each open edge.
    ///
    /// Returns the features touching the new tile once merging is done.
    pub fn place(&mut self, tile: Tile, x: i32, y: i32) -> Result<Vec<FeatureId>, GameError> {
        if tile.is_placed() {
            return Err(GameError::TileAlreadyPlaced);
        }
        if !self.can_place(&tile, x, y) || !self.touches_board(x, y) {
            return Err(GameError::IllegalPlacement { x, y });
        }
        let mut tile = tile;
        tile.anchor(x, y);

        let templates = self.catalog.templates(&tile);
        let mut city_segments = Vec::new();
        let mut tile_segments = Vec::with_capacity(templates.len());
        let mut created = Vec::with_capacity(templates.len());
        for template in templates.iter() {
            let (kind, edges) = match template {
                FeatureTemplate::Road { edges, inn } => {
                    (SegmentKind::Road { inn: *inn }, edges.clone())
                }
                FeatureTemplate::River { edges } => (SegmentKind::River, edges.clone()),
                FeatureTemplate::Cloister => (SegmentKind::Cloister, Vec::new()),
                FeatureTemplate::City {
                    edges,
                    pennant,
                    cathedral,
                } => (
                    SegmentKind::City {
                        pennant: *pennant,
                        cathedral: *cathedral,
                    },
                    edges.clone(),
                ),
                FeatureTemplate::Farm { edges, cities } => (
                    SegmentKind::Farm {
                        cities: cities
                            .iter()
                            .filter_map(|index| city_segments.get(*index).copied())
                            .collect(),
                    },
                    edges.clone(),
                ),
            };
            let segment = SegmentId(self.next_segment);
            let feature = FeatureId(self.next_feature);
            self.next_segment += 1;
            self.next_feature += 1;

            let feature_kind = kind.feature_kind();
            if feature_kind == FeatureKind::City {
                city_segments.push(segment);
            }
            self.segments.insert(
                segment,
                Segment {
                    kind,
                    tile: (x, y),
                    edges,
                    feature,
                },
            );
            self.features
                .insert(feature, Feature::new(feature_kind, segment, (x, y)));
            tile_segments.push(segment);
            created.push(feature);
        }
        self.tiles.insert(
            (x, y),
            PlacedTile {
                tile,
                segments: tile_segments,
            },
        );

        for &id in &created {
            let to_merge: BTreeSet<FeatureId> = {
                let Some(feature) = self.feature(id) else {
                    continue;
                };
                let kind = feature.kind();
                if !kind.merges() {
                    continue;
                }
                let edges = feature.edges();
                let mut found = BTreeSet::new();
                for &(ex, ey, edge) in &edges {
                    let (nx, ny) = if (ex, ey) == (x, y) {
                        let (nx, ny, _) = swap_edge(kind, ex, ey, edge);
                        (nx, ny)
                    } else {
                        (ex, ey)
                    };
                    for other in self.features_at(nx, ny, Some(kind)) {
                        if !other.edges().is_disjoint(&edges) {
                            found.insert(other.id());
                        }
                    }
                }
                found
            };
            let mut current = id;
            for other in to_merge {
                current = self.merge(current, other);
            }
        }

        let touching: Vec<FeatureId> = self
            .features_at(x, y, None)
            .iter()
            .map(|feature| feature.id())
            .collect();
        debug!(x, y, features = touching.len(), "placed tile");
        Ok(touching)
    }

    /// Join two disjoint features that touch along at least one open edge.
    /// The one with more segments survives, so only the smaller side's
    /// segments are repointed. Returns the survivor.
    fn merge(&mut self, a: FeatureId, b: FeatureId) -> FeatureId {
        let (survivor, consumed) = {
            let keep = self.feature(a).expect("merged feature should exist");
            let gone = self.feature(b).expect("merged feature should exist");
            if gone.segments().len() > keep.segments().len() {
                (b, a)
            } else {
                (a, b)
            }
        };
        {
            let keep = self
                .feature(survivor)
                .expect("surviving feature should exist");
            let gone = self
                .feature(consumed)
                .expect("consumed feature should exist");
            let held: HashSet<&Segment> = keep
                .segments()
                .iter()
                .filter_map(|id| self.segment(*id))
                .collect();
            assert!(
                !gone
                    .segments()
                    .iter()
                    .filter_map(|id| self.segment(*id))
                    .any(|segment| held.contains(segment)),
                "merging already overlapping features {survivor:?} and {consumed:?}"
            );
            assert!(
                !keep.edges().is_disjoint(&gone.edges()),
                "edges of {survivor:?} and {consumed:?} do not meet"
            );
        }

        let other = self
            .features
            .remove(&consumed)
            .expect("consumed feature should exist");
        for id in &other.segments {
            if let Some(segment) = self.segments.get_mut(id) {
                segment.feature = survivor;
            }
        }
        debug!(
            ?survivor,
            ?consumed,
            kind = %other.kind,
            segments = other.segments.len(),
            "merged features"
        );
        self.features
            .get_mut(&survivor)
            .expect("surviving feature should exist")
            .absorb(other);
        survivor
    }

    /// Add an avatar to a feature. False when the feature is unknown or
    /// cannot currently be owned.
    pub fn claim(&mut self, feature: FeatureId, avatar: Avatar) -> bool {
        if !self.feature(feature).is_some_and(|f| f.can_own()) {
            return false;
        }
        match self.features.get_mut(&feature) {
            Some(target) => {
                target.add_avatar(avatar);
                true
            }
            None => false,
        }
    }

    /// Spend one of `player`'s avatars on `feature`, recording the claim
    /// against the feature's newest segment.
    pub fn place_avatar(&mut self, feature: FeatureId, player: usize) -> Result<(), GameError> {
        if player >= self.players.len() {
            return Err(GameError::UnknownPlayer(player));
        }
        if self.available_avatars(player) == 0 {
            return Err(GameError::NoAvatarsLeft(player));
        }
        let anchor = {
            let view = self
                .feature(feature)
                .ok_or(GameError::UnknownFeature(feature))?;
            *view
                .segments()
                .last()
                .expect("feature should have a segment")
        };
        if !self.claim(feature, Avatar::new(player)) {
            return Err(GameError::NotOwnable(feature));
        }
        self.players[player].claimed.push(anchor);
        debug!(player, ?feature, "avatar placed");
        Ok(())
    }

    /// Clear and score every newly complete feature. Owners score it and
    /// record it as completed; every player gets their avatars on it back.
    pub fn complete_features(&mut self) -> Vec<Completion> {
        let done: Vec<(FeatureId, u32)> = self
            .features()
            .into_iter()
            .filter(|feature| !feature.is_cleared() && feature.is_complete())
            .map(|feature| (feature.id(), feature.score()))
            .collect();

        let mut completions = Vec::with_capacity(done.len());
        for (id, score) in done {
            let Some(feature) = self.features.get_mut(&id) else {
                continue;
            };
            feature.cleared = true;
            let kind = feature.kind;
            let owners = feature.owners.clone();

            for &owner in &owners {
                if let Some(player) = self.players.get_mut(owner) {
                    player.score += score;
                    player.completed.push(id);
                }
            }
            self.release_claims(id);
            info!(?id, %kind, score, ?owners, "feature completed");
            completions.push(Completion {
                feature: id,
                kind,
                owners,
                score,
            });
        }
        completions
    }

    /// End-of-game sweep: every still-claimed feature scores its current
    /// value once for its owners, then all claims are released.
    pub fn final_scoring(&mut self) -> Vec<Completion> {
        let claimed: BTreeSet<FeatureId> = self
            .players
            .iter()
            .flat_map(|player| player.claimed.iter())
            .filter_map(|id| self.segments.get(id))
            .map(|segment| segment.feature)
            .collect();

        let mut completions = Vec::new();
        for id in claimed {
            let Some(score) = self
                .feature(id)
                .filter(|feature| !feature.is_cleared())
                .map(|feature| feature.score())
            else {
                continue;
            };
            let Some(feature) = self.features.get_mut(&id) else {
                continue;
            };
            feature.cleared = true;
            let kind = feature.kind;
            let owners = feature.owners.clone();
            for &owner in &owners {
                if let Some(player) = self.players.get_mut(owner) {
                    player.score += score;
                }
            }
            info!(?id, %kind, score, ?owners, "incomplete feature scored");
            completions.push(Completion {
                feature: id,
                kind,
                owners,
                score,
            });
        }
        for player in &mut self.players {
            player.claimed.clear();
        }
        completions
    }

    fn release_claims(&mut self, feature: FeatureId) {
        let segments = &self.segments;
        for player in &mut self.players {
            player.claimed.retain(|id| {
                segments
                    .get(id)
                    .map_or(true, |segment| segment.feature != feature)
            });
        }
    }

    /// An isolated copy of this world using the configured clone strategy.
    pub fn sandbox(&self) -> World {
        self.fork(self.options.clone_strategy)
    }

    pub fn fork(&self, strategy: CloneStrategy) -> World {
        World {
            options: self.options.clone(),
            catalog: Rc::clone(&self.catalog),
            tiles: self.tiles.fork(strategy),
            segments: self.segments.fork(strategy),
            features: self.features.fork(strategy),
            players: self.players.clone(),
            next_segment: self.next_segment,
            next_feature: self.next_feature,
        }
    }

    /// Objects this world holds privately rather than sharing with the world
    /// it was cloned from.
    pub fn private_entries(&self) -> usize {
        self.tiles.private_entries()
            + self.segments.private_entries()
            + self.features.private_entries()
    }

    pub fn shares_storage_with(&self, other: &World) -> bool {
        self.tiles.shares_base_with(&other.tiles)
            && self.segments.shares_base_with(&other.segments)
            && self.features.shares_base_with(&other.features)
    }
}

impl Clone for World {
    fn clone(&self) -> Self {
        self.sandbox()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(GameOptions::default(), 2)
    }
}
