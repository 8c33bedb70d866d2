//! Tile sets and the draw pile.

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::GameOptions;
use crate::error::GameError;
use crate::rng::{RngManager, RESHUFFLE_STREAM, RIVER_STREAM, STACK_STREAM};
use crate::tile::EdgeKind::{self, City as C, Empty as E, River as V, Road as R};
use crate::tile::{Centre, CityHint, Tile, TileCatalog, TileHint, WHOLE_TILE};
use crate::world::{Placement, World};

const W: u8 = WHOLE_TILE;

/// One line of a tile set: how many copies of which tile.
#[derive(Debug, Clone)]
pub struct TileSpec {
    pub count: usize,
    pub centre: Centre,
    pub edges: [EdgeKind; 4],
    pub hint: Option<TileHint>,
}

impl TileSpec {
    pub fn new(count: usize, centre: Centre, edges: [EdgeKind; 4]) -> Self {
        Self {
            count,
            centre,
            edges,
            hint: None,
        }
    }

    fn hint_mut(&mut self) -> &mut TileHint {
        self.hint.get_or_insert_with(TileHint::default)
    }

    pub fn roads(mut self, roads: &[&[u8]]) -> Self {
        self.hint_mut().roads = Some(roads.iter().map(|r| r.to_vec()).collect());
        self
    }

    pub fn cities(mut self, cities: &[(&[u8], bool)]) -> Self {
        self.hint_mut().cities = Some(
            cities
                .iter()
                .map(|(edges, pennant)| CityHint {
                    edges: edges.to_vec(),
                    pennant: *pennant,
                })
                .collect(),
        );
        self
    }

    pub fn farms(mut self, farms: &[&[u8]]) -> Self {
        self.hint_mut().farms = Some(farms.iter().map(|f| f.to_vec()).collect());
        self
    }

    pub fn build(&self, catalog: &TileCatalog) -> Tile {
        catalog.tile(self.centre, self.edges, self.hint.clone())
    }
}

fn expand(specs: &[TileSpec], catalog: &TileCatalog) -> Vec<Tile> {
    specs
        .iter()
        .flat_map(|spec| std::iter::repeat_with(|| spec.build(catalog)).take(spec.count))
        .collect()
}

/// Base game, less the starting tile.
pub fn standard_set() -> Vec<TileSpec> {
    let city = Centre::CITY;
    let pennant = Centre::CITY | Centre::PENNANT;
    vec![
        TileSpec::new(2, Centre::CLOISTER, [E, E, R, E]),
        TileSpec::new(4, Centre::CLOISTER, [E, E, E, E]),
        TileSpec::new(1, pennant, [C, C, C, C]),
        TileSpec::new(3, Centre::EMPTY, [R, C, R, E]),
        TileSpec::new(5, Centre::EMPTY, [C, E, E, E]),
        TileSpec::new(2, pennant, [E, C, E, C]),
        TileSpec::new(1, city, [C, E, C, E]),
        TileSpec::new(3, Centre::EMPTY, [E, C, E, C]),
        TileSpec::new(2, Centre::EMPTY, [E, C, C, E]),
        TileSpec::new(3, Centre::EMPTY, [C, R, R, E]),
        TileSpec::new(3, Centre::EMPTY, [R, C, E, R]),
        TileSpec::new(3, Centre::EMPTY, [R, C, R, R]),
        TileSpec::new(2, pennant, [C, E, E, C]),
        TileSpec::new(3, city, [C, E, E, C]),
        TileSpec::new(2, pennant, [C, R, R, C]).farms(&[&[2, 5], &[3, 4]]),
        TileSpec::new(3, city, [C, R, R, C]).farms(&[&[2, 5], &[3, 4]]),
        TileSpec::new(1, pennant, [C, C, E, C]),
        TileSpec::new(3, city, [C, C, E, C]),
        TileSpec::new(2, pennant, [C, C, R, C]),
        TileSpec::new(1, city, [C, C, R, C]),
        TileSpec::new(8, Centre::EMPTY, [R, E, R, E]),
        TileSpec::new(9, Centre::EMPTY, [E, E, R, R]),
        TileSpec::new(4, Centre::EMPTY, [E, R, R, R]),
        TileSpec::new(1, Centre::EMPTY, [R, R, R, R]),
    ]
}

/// River expansion, less its source and lake.
pub fn river_set() -> Vec<TileSpec> {
    vec![
        TileSpec::new(2, Centre::EMPTY, [V, V, E, E]),
        TileSpec::new(2, Centre::EMPTY, [V, E, V, E]),
        TileSpec::new(1, Centre::CITY, [C, C, V, V]).farms(&[&[4, 7], &[5, 6]]),
        TileSpec::new(1, Centre::EMPTY, [V, V, R, R]).farms(&[&[1, 2], &[3, 4, 7, 0], &[5, 6]]),
        TileSpec::new(1, Centre::EMPTY, [V, R, V, R]),
        TileSpec::new(1, Centre::EMPTY, [V, C, V, C]),
        TileSpec::new(1, Centre::CLOISTER, [E, V, R, V]),
        TileSpec::new(1, Centre::EMPTY, [C, V, R, V]).farms(&[&[2], &[3, 4], &[5, 6], &[7]]),
    ]
}

/// Inns & cathedrals expansion.
pub fn inns_cathedrals_set() -> Vec<TileSpec> {
    let city = Centre::CITY;
    vec![
        TileSpec::new(1, Centre::CLOISTER, [E, R, E, R]).roads(&[&[1], &[3]]),
        TileSpec::new(2, city | Centre::CATHEDRAL, [C, C, C, C]),
        TileSpec::new(1, Centre::EMPTY, [C, C, C, C]).farms(&[&[W]]),
        TileSpec::new(1, Centre::EMPTY, [C, C, E, C]).farms(&[&[4, 5, W]]),
        TileSpec::new(1, Centre::EMPTY, [C, R, C, R])
            .farms(&[&[2], &[3], &[6], &[7]])
            .roads(&[&[1], &[3]]),
        TileSpec::new(1, Centre::EMPTY, [C, E, C, C])
            .cities(&[(&[2][..], false), (&[0, 3][..], true)])
            .farms(&[&[2, 3, W]]),
        TileSpec::new(1, Centre::EMPTY, [C, E, R, E]).farms(&[&[2, 3, 4], &[5, 6, 7]]),
        TileSpec::new(1, city, [C, R, E, C]).farms(&[&[2], &[3, 4, 5]]),
        TileSpec::new(1, city | Centre::PENNANT, [R, C, R, C])
            .farms(&[&[0], &[1], &[4], &[5]])
            .roads(&[&[0], &[2]]),
        TileSpec::new(1, city | Centre::INN, [C, E, R, C]).farms(&[&[2, 3, 4], &[5]]),
        TileSpec::new(1, Centre::INN, [C, E, R, R]),
        TileSpec::new(1, city | Centre::PENNANT | Centre::INN, [C, R, R, C]),
        TileSpec::new(1, Centre::INN, [E, R, R, R]),
        TileSpec::new(1, Centre::INN, [E, R, E, R]),
        TileSpec::new(1, Centre::INN, [E, E, R, R]),
        TileSpec::new(1, Centre::EMPTY, [R, R, R, R])
            .farms(&[&[0, 3, 4, 7], &[1, 2], &[5, 6]])
            .roads(&[&[0, 1], &[2, 3]]),
    ]
}

/// Source and lake of the river share one pattern.
pub fn river_terminal() -> TileSpec {
    TileSpec::new(1, Centre::EMPTY, [V, E, E, E])
}

pub fn standard_start() -> TileSpec {
    TileSpec::new(1, Centre::EMPTY, [R, C, R, E])
}

#[derive(Debug, Clone)]
pub struct DrawnTile {
    pub tile: Tile,
    pub placements: Vec<Placement>,
}

/// The face-down pile; the front is the next tile drawn.
#[derive(Debug, Clone, Default)]
pub struct TileStack {
    tiles: VecDeque<Tile>,
}

/// Shuffle the selected sets into a stack. With the river the pile opens
/// with source, shuffled river and lake, then the shuffled land tiles;
/// otherwise it opens with the standard start tile.
pub fn generate_stack(
    options: &GameOptions,
    catalog: &TileCatalog,
    rng: &mut RngManager,
) -> TileStack {
    let mut rest = expand(&standard_set(), catalog);
    if options.inns_cathedrals {
        rest.extend(expand(&inns_cathedrals_set(), catalog));
    }
    rest.shuffle(&mut rng.stream(STACK_STREAM));

    let mut tiles = Vec::with_capacity(rest.len() + 12);
    if options.river {
        let mut river = expand(&river_set(), catalog);
        river.shuffle(&mut rng.stream(RIVER_STREAM));
        tiles.push(river_terminal().build(catalog));
        tiles.extend(river);
        tiles.push(river_terminal().build(catalog));
    } else {
        tiles.push(standard_start().build(catalog));
    }
    tiles.extend(rest);
    debug!(
        tiles = tiles.len(),
        river = options.river,
        inns_cathedrals = options.inns_cathedrals,
        "generated stack"
    );
    TileStack::new(tiles)
}

impl TileStack {
    pub fn new(tiles: impl IntoIterator<Item = Tile>) -> Self {
        Self {
            tiles: tiles.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn peek(&self) -> Option<&Tile> {
        self.tiles.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter()
    }

    /// Remaining copies of each tile, without revealing the order.
    pub fn counts(&self) -> HashMap<&Tile, usize> {
        let mut counts = HashMap::new();
        for tile in &self.tiles {
            *counts.entry(tile).or_insert(0) += 1;
        }
        counts
    }

    /// Draw the next tile that has somewhere to go.
    ///
    /// A tile with no legal placement is pushed back to a random position
    /// below the top and the next tile is drawn instead. Once the world's
    /// reshuffle budget is spent (or reshuffling is disabled) the tile is put
    /// back on top and `Unplaceable` is returned.
    pub fn draw(
        &mut self,
        world: &World,
        rng: &mut RngManager,
    ) -> Result<Option<DrawnTile>, GameError> {
        let Some(mut tile) = self.tiles.pop_front() else {
            return Ok(None);
        };
        let options = world.options();
        let mut attempts = 0;
        loop {
            let placements = world.possible_placements(&tile);
            if !placements.is_empty() {
                return Ok(Some(DrawnTile { tile, placements }));
            }
            attempts += 1;
            if !options.shuffle_unplaceable || attempts >= options.max_reshuffles {
                self.tiles.push_front(tile);
                return Err(GameError::Unplaceable { attempts });
            }
            let position = if self.tiles.is_empty() {
                0
            } else {
                rng.stream(RESHUFFLE_STREAM).gen_range(1..=self.tiles.len())
            };
            warn!(attempts, position, %tile, "reshuffling unplaceable tile");
            self.tiles.insert(position, tile);
            tile = self
                .tiles
                .pop_front()
                .expect("stack should hold the reshuffled tile");
        }
    }
}
