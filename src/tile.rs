//! Tiles, their rotation and symmetry, and the per-tile feature templates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub const NORTH: usize = 0;
pub const EAST: usize = 1;
pub const SOUTH: usize = 2;
pub const WEST: usize = 3;

/// Farm half-edge value meaning "the whole tile".
pub const WHOLE_TILE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Empty,
    Road,
    River,
    City,
}

impl EdgeKind {
    fn splits_farm(self) -> bool {
        matches!(self, EdgeKind::Road | EdgeKind::River)
    }
}

/// Attribute set of a tile's centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Centre(u8);

impl Centre {
    pub const EMPTY: Centre = Centre(0);
    pub const CITY: Centre = Centre(1);
    pub const PENNANT: Centre = Centre(1 << 1);
    pub const CLOISTER: Centre = Centre(1 << 2);
    pub const CATHEDRAL: Centre = Centre(1 << 3);
    pub const INN: Centre = Centre(1 << 4);
    pub const RIVER: Centre = Centre(1 << 5);

    const NAMES: [(Centre, &'static str); 6] = [
        (Centre::CITY, "City"),
        (Centre::PENNANT, "Pennant"),
        (Centre::CLOISTER, "Cloister"),
        (Centre::CATHEDRAL, "Cathedral"),
        (Centre::INN, "Inn"),
        (Centre::RIVER, "River"),
    ];

    pub const fn union(self, other: Centre) -> Centre {
        Centre(self.0 | other.0)
    }

    pub const fn contains(self, other: Centre) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Centre {
    type Output = Centre;

    fn bitor(self, rhs: Centre) -> Centre {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityHint {
    pub edges: Vec<u8>,
    pub pennant: bool,
}

/// Explicit segmentation for irregular tiles, overriding the automatic
/// road/city/farm grouping. Road and city entries use compass edges 0-3,
/// farm entries use the 8-point half-edge ring (plus [`WHOLE_TILE`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TileHint {
    pub roads: Option<Vec<Vec<u8>>>,
    pub cities: Option<Vec<CityHint>>,
    pub farms: Option<Vec<Vec<u8>>>,
}

impl TileHint {
    fn rotated(&self, steps: usize) -> TileHint {
        let quarter = |edges: &Vec<u8>| -> Vec<u8> {
            edges
                .iter()
                .map(|&e| ((e as usize + 4 - steps) % 4) as u8)
                .collect()
        };
        TileHint {
            roads: self
                .roads
                .as_ref()
                .map(|roads| roads.iter().map(quarter).collect()),
            cities: self.cities.as_ref().map(|cities| {
                cities
                    .iter()
                    .map(|city| CityHint {
                        edges: quarter(&city.edges),
                        pennant: city.pennant,
                    })
                    .collect()
            }),
            farms: self.farms.as_ref().map(|farms| {
                farms
                    .iter()
                    .map(|farm| {
                        farm.iter()
                            .map(|&h| {
                                if h == WHOLE_TILE {
                                    h
                                } else {
                                    ((h as usize + 8 - 2 * steps) % 8) as u8
                                }
                            })
                            .collect()
                    })
                    .collect()
            }),
        }
    }
}

/// Blueprint for one feature a tile contributes when it is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureTemplate {
    Road { edges: Vec<u8>, inn: bool },
    River { edges: Vec<u8> },
    Cloister,
    City { edges: Vec<u8>, pennant: bool, cathedral: bool },
    /// `cities` indexes the tile's city templates in build order.
    Farm { edges: Vec<u8>, cities: Vec<usize> },
}

/// A rotatable four-edge tile. Unplaced tiles float free; once placed the
/// position is fixed and the tile must not be rotated again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tile {
    edges: [EdgeKind; 4],
    centre: Centre,
    hint: Option<TileHint>,
    symmetry: u8,
    position: Option<(i32, i32)>,
}

impl Tile {
    pub fn new(centre: Centre, edges: [EdgeKind; 4]) -> Self {
        Self::with_symmetry(centre, edges, None, symmetry_of(&edges))
    }

    pub fn with_hint(mut self, hint: TileHint) -> Self {
        self.hint = Some(hint);
        self
    }

    fn with_symmetry(
        centre: Centre,
        edges: [EdgeKind; 4],
        hint: Option<TileHint>,
        symmetry: u8,
    ) -> Self {
        Self {
            edges,
            centre,
            hint,
            symmetry,
            position: None,
        }
    }

    pub fn edges(&self) -> [EdgeKind; 4] {
        self.edges
    }

    pub fn edge(&self, direction: usize) -> EdgeKind {
        self.edges[direction]
    }

    pub fn centre(&self) -> Centre {
        self.centre
    }

    pub fn hint(&self) -> Option<&TileHint> {
        self.hint.as_ref()
    }

    /// Number of rotation-distinct orientations: 1, 2 or 4.
    pub fn symmetry(&self) -> u8 {
        self.symmetry
    }

    pub fn position(&self) -> Option<(i32, i32)> {
        self.position
    }

    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }

    pub fn has_edge(&self, kind: EdgeKind) -> bool {
        self.edges.contains(&kind)
    }

    pub(crate) fn anchor(&mut self, x: i32, y: i32) {
        self.position = Some((x, y));
    }

    /// A new tile whose edge `i` is this tile's edge `i + steps`.
    ///
    /// Panics on a placed tile.
    pub fn rotate(&self, steps: usize) -> Tile {
        assert!(
            self.position.is_none(),
            "cannot rotate a tile placed at {:?}",
            self.position
        );
        let steps = steps % 4;
        let edges = std::array::from_fn(|i| self.edges[(i + steps) % 4]);
        let hint = self.hint.as_ref().map(|hint| hint.rotated(steps));
        Tile::with_symmetry(self.centre, edges, hint, self.symmetry)
    }

    fn edges_of(&self, kind: EdgeKind) -> Vec<u8> {
        (0..4u8)
            .filter(|&i| self.edges[i as usize] == kind)
            .collect()
    }

    /// Partition the tile into feature templates: roads, rivers, a cloister,
    /// cities, then farms (farms refer back to the city templates by index).
    pub fn build_features(&self) -> Vec<FeatureTemplate> {
        let mut templates = Vec::new();

        let inn = self.centre.contains(Centre::INN);
        let road_edges = self.edges_of(EdgeKind::Road);
        match self.hint.as_ref().and_then(|hint| hint.roads.as_ref()) {
            Some(roads) => {
                for edges in roads {
                    templates.push(FeatureTemplate::Road {
                        edges: edges.clone(),
                        inn,
                    });
                }
            }
            None if road_edges.len() == 2 => templates.push(FeatureTemplate::Road {
                edges: road_edges,
                inn,
            }),
            None => {
                for edge in road_edges {
                    templates.push(FeatureTemplate::Road {
                        edges: vec![edge],
                        inn,
                    });
                }
            }
        }

        let river_edges = self.edges_of(EdgeKind::River);
        if river_edges.len() == 2 {
            templates.push(FeatureTemplate::River { edges: river_edges });
        } else {
            for edge in river_edges {
                templates.push(FeatureTemplate::River { edges: vec![edge] });
            }
        }

        if self.centre.contains(Centre::CLOISTER) {
            templates.push(FeatureTemplate::Cloister);
        }

        let city_edges = self.edges_of(EdgeKind::City);
        let mut city_at: [Option<usize>; 4] = [None; 4];
        match self.hint.as_ref().and_then(|hint| hint.cities.as_ref()) {
            Some(cities) => {
                for (index, city) in cities.iter().enumerate() {
                    templates.push(FeatureTemplate::City {
                        edges: city.edges.clone(),
                        pennant: city.pennant,
                        cathedral: false,
                    });
                    for &edge in &city.edges {
                        city_at[edge as usize] = Some(index);
                    }
                }
            }
            None if city_edges.is_empty() => {}
            None if !self.centre.contains(Centre::CITY) => {
                for (index, &edge) in city_edges.iter().enumerate() {
                    templates.push(FeatureTemplate::City {
                        edges: vec![edge],
                        pennant: false,
                        cathedral: false,
                    });
                    city_at[edge as usize] = Some(index);
                }
            }
            None => {
                for &edge in &city_edges {
                    city_at[edge as usize] = Some(0);
                }
                templates.push(FeatureTemplate::City {
                    edges: city_edges.clone(),
                    pennant: self.centre.contains(Centre::PENNANT),
                    cathedral: self.centre.contains(Centre::CATHEDRAL),
                });
            }
        }

        let regions = match self.hint.as_ref().and_then(|hint| hint.farms.as_ref()) {
            Some(farms) => farms.clone(),
            None => self.farm_regions(&city_edges),
        };
        for edges in regions {
            let mut cities = Vec::new();
            for &half in &edges {
                if half == WHOLE_TILE {
                    cities.extend(city_at.iter().flatten().copied());
                } else {
                    let left = ((half as usize + 7) % 8) / 2;
                    let right = ((half as usize + 1) % 8) / 2;
                    cities.extend(city_at[left]);
                    cities.extend(city_at[right]);
                }
            }
            cities.sort_unstable();
            cities.dedup();
            templates.push(FeatureTemplate::Farm { edges, cities });
        }

        templates
    }

    /// Flood-fill the 8 boundary half-edges into farm regions.
    fn farm_regions(&self, city_edges: &[u8]) -> Vec<Vec<u8>> {
        // bit n set while half-edge n is unvisited
        let mut unvisited: u8 = (0..8u8)
            .filter(|half| !city_edges.contains(&(half / 2)))
            .fold(0, |mask, half| mask | 1 << half);
        let mut regions = Vec::new();
        while unvisited != 0 {
            let seed = unvisited.trailing_zeros() as u8;
            unvisited &= !(1 << seed);
            let mut region = Vec::new();
            let mut pending = vec![seed];
            while let Some(here) = pending.pop() {
                region.push(here);
                for next in self.farm_links(here) {
                    if unvisited & (1 << next) != 0 {
                        unvisited &= !(1 << next);
                        pending.push(next);
                    }
                }
            }
            region.sort_unstable();
            regions.push(region);
        }
        regions
    }

    /// Half-edges reachable from `here` without crossing a road, river or
    /// city centre. Even half-edges are the counter-clockwise half of a side.
    fn farm_links(&self, here: u8) -> Vec<u8> {
        let side = (here / 2) as usize;
        let left = (here + 7) % 8;
        let right = (here + 1) % 8;
        let across = if side % 2 == 0 { 5 - here } else { 9 - here };
        let split = self.edges[side].splits_farm();

        let mut links = Vec::with_capacity(3);
        if here % 2 == 0 {
            links.push(left);
            if !split {
                links.push(right);
            }
        } else {
            if !split {
                links.push(left);
            }
            links.push(right);
        }

        if !self.centre.contains(Centre::CITY) {
            let low = here.min(across);
            let passing_side = if low % 2 == 0 {
                ((low / 2) as usize + 3) % 4
            } else {
                ((low / 2) as usize + 1) % 4
            };
            if !self.edges[passing_side].splits_farm() {
                links.push(across);
            }
        }
        links
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = match self.position {
            Some((x, y)) => format!("({x}, {y})"),
            None => "unplaced".to_string(),
        };
        write!(
            f,
            "Tile {position} edges={:?} centre={}",
            self.edges,
            self.centre.names().join("|")
        )
    }
}

pub fn symmetry_of(edges: &[EdgeKind; 4]) -> u8 {
    let rotated =
        |steps: usize| -> [EdgeKind; 4] { std::array::from_fn(|i| edges[(i + steps) % 4]) };
    if *edges == rotated(1) {
        1
    } else if *edges == rotated(2) {
        2
    } else {
        4
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    edges: [EdgeKind; 4],
    centre: Centre,
    hint: Option<TileHint>,
}

/// Memoised symmetry degrees and feature templates.
///
/// Both are pure functions of the tile pattern, so one catalog can be shared
/// by a world and all of its sandboxes.
#[derive(Debug, Default)]
pub struct TileCatalog {
    symmetry: RefCell<HashMap<[EdgeKind; 4], u8>>,
    templates: RefCell<HashMap<TemplateKey, Rc<[FeatureTemplate]>>>,
}

impl TileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symmetry(&self, edges: [EdgeKind; 4]) -> u8 {
        *self
            .symmetry
            .borrow_mut()
            .entry(edges)
            .or_insert_with(|| symmetry_of(&edges))
    }

    /// Build a free tile, reusing the cached symmetry of its edge pattern.
    pub fn tile(&self, centre: Centre, edges: [EdgeKind; 4], hint: Option<TileHint>) -> Tile {
        Tile::with_symmetry(centre, edges, hint, self.symmetry(edges))
    }

    pub fn templates(&self, tile: &Tile) -> Rc<[FeatureTemplate]> {
        let key = TemplateKey {
            edges: tile.edges,
            centre: tile.centre,
            hint: tile.hint.clone(),
        };
        if let Some(cached) = self.templates.borrow().get(&key) {
            return Rc::clone(cached);
        }
        let built: Rc<[FeatureTemplate]> = tile.build_features().into();
        self.templates.borrow_mut().insert(key, Rc::clone(&built));
        built
    }

    pub fn cached_patterns(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn clear(&self) {
        self.symmetry.borrow_mut().clear();
        self.templates.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::EdgeKind::{City as C, Empty as E, River as V, Road as R};

    fn farms(templates: &[FeatureTemplate]) -> Vec<(Vec<u8>, Vec<usize>)> {
        templates
            .iter()
            .filter_map(|t| match t {
                FeatureTemplate::Farm { edges, cities } => Some((edges.clone(), cities.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn symmetry_degrees() {
        assert_eq!(Tile::new(Centre::CLOISTER, [E, E, E, E]).symmetry(), 1);
        assert_eq!(Tile::new(Centre::EMPTY, [R, E, R, E]).symmetry(), 2);
        assert_eq!(Tile::new(Centre::EMPTY, [C, R, E, R]).symmetry(), 4);
    }

    #[test]
    fn rotation_shifts_edges_and_hints() {
        let tile = Tile::new(Centre::EMPTY, [C, R, E, E]).with_hint(TileHint {
            roads: Some(vec![vec![1]]),
            cities: None,
            farms: Some(vec![vec![2, 5], vec![3, 4], vec![WHOLE_TILE]]),
        });
        let turned = tile.rotate(1);
        assert_eq!(turned.edges(), [R, E, E, C]);
        let hint = turned.hint().unwrap();
        assert_eq!(hint.roads, Some(vec![vec![0]]));
        assert_eq!(
            hint.farms,
            Some(vec![vec![0, 3], vec![1, 2], vec![WHOLE_TILE]])
        );
        assert_eq!(tile.edges(), [C, R, E, E], "receiver is untouched");
        assert_eq!(tile.rotate(4), tile);
    }

    #[test]
    #[should_panic(expected = "cannot rotate")]
    fn placed_tiles_do_not_rotate() {
        let mut tile = Tile::new(Centre::EMPTY, [R, E, R, E]);
        tile.anchor(0, 0);
        let _ = tile.rotate(1);
    }

    #[test]
    fn straight_road_splits_two_farms() {
        let templates = Tile::new(Centre::EMPTY, [E, R, E, R]).build_features();
        assert_eq!(
            templates[0],
            FeatureTemplate::Road {
                edges: vec![1, 3],
                inn: false
            }
        );
        let regions: Vec<Vec<u8>> = farms(&templates).into_iter().map(|(e, _)| e).collect();
        assert_eq!(regions, vec![vec![0, 1, 2, 7], vec![3, 4, 5, 6]]);
    }

    #[test]
    fn crossroads_make_four_roads_and_four_farms() {
        let templates = Tile::new(Centre::EMPTY, [R, R, R, R]).build_features();
        let roads = templates
            .iter()
            .filter(|t| matches!(t, FeatureTemplate::Road { .. }))
            .count();
        assert_eq!(roads, 4);
        let regions: Vec<Vec<u8>> = farms(&templates).into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            regions,
            vec![vec![0, 7], vec![1, 2], vec![3, 4], vec![5, 6]]
        );
    }

    #[test]
    fn city_centre_blocks_the_across_link() {
        let templates = Tile::new(Centre::CITY, [C, E, C, E]).build_features();
        assert_eq!(
            farms(&templates),
            vec![(vec![2, 3], vec![0]), (vec![6, 7], vec![0])]
        );
        let pennant = Tile::new(Centre::CITY | Centre::PENNANT, [E, C, E, C]).build_features();
        assert_eq!(farms(&pennant).len(), 2);
    }

    #[test]
    fn separate_cities_share_one_farm() {
        let templates = Tile::new(Centre::EMPTY, [C, E, C, E]).build_features();
        let cities = templates
            .iter()
            .filter(|t| matches!(t, FeatureTemplate::City { .. }))
            .count();
        assert_eq!(cities, 2);
        assert_eq!(farms(&templates), vec![(vec![2, 3, 6, 7], vec![0, 1])]);
    }

    #[test]
    fn farm_regions_cover_every_open_half_edge_once() {
        let blank = Tile::new(Centre::EMPTY, [E, E, E, E]);
        assert_eq!(blank.farm_regions(&[]), vec![(0..8).collect::<Vec<u8>>()]);
        assert!(blank.farm_regions(&[0, 1, 2, 3]).is_empty());

        let bend = Tile::new(Centre::EMPTY, [R, R, E, E]);
        let regions = bend.farm_regions(&[]);
        assert_eq!(regions, vec![vec![0, 3, 4, 5, 6, 7], vec![1, 2]]);
        let mut seen: Vec<u8> = regions.concat();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn centre_attributes_flow_into_templates() {
        let templates =
            Tile::new(Centre::CITY | Centre::CATHEDRAL | Centre::PENNANT, [C, C, C, C])
                .build_features();
        assert_eq!(
            templates,
            vec![FeatureTemplate::City {
                edges: vec![0, 1, 2, 3],
                pennant: true,
                cathedral: true
            }]
        );

        let cloister = Tile::new(Centre::CLOISTER | Centre::INN, [E, E, R, E]).build_features();
        assert!(cloister.contains(&FeatureTemplate::Cloister));
        assert!(cloister.contains(&FeatureTemplate::Road {
            edges: vec![2],
            inn: true
        }));
    }

    #[test]
    fn river_bend_keeps_inner_farm_separate() {
        let templates = Tile::new(Centre::EMPTY, [V, V, E, E]).build_features();
        assert_eq!(templates[0], FeatureTemplate::River { edges: vec![0, 1] });
        let regions: Vec<Vec<u8>> = farms(&templates).into_iter().map(|(e, _)| e).collect();
        assert_eq!(regions, vec![vec![0, 3, 4, 5, 6, 7], vec![1, 2]]);
    }

    #[test]
    fn hinted_cities_carry_pennants() {
        let tile = Tile::new(Centre::EMPTY, [C, E, C, C]).with_hint(TileHint {
            roads: None,
            cities: Some(vec![
                CityHint {
                    edges: vec![2],
                    pennant: false,
                },
                CityHint {
                    edges: vec![0, 3],
                    pennant: true,
                },
            ]),
            farms: Some(vec![vec![2, 3, WHOLE_TILE]]),
        });
        let templates = tile.build_features();
        assert_eq!(farms(&templates), vec![(vec![2, 3, WHOLE_TILE], vec![0, 1])]);
    }

    #[test]
    fn catalog_memoises_per_pattern() {
        let catalog = TileCatalog::new();
        let a = catalog.tile(Centre::EMPTY, [R, E, R, E], None);
        let b = catalog.tile(Centre::EMPTY, [E, R, E, R], None);
        assert_eq!(a.symmetry(), 2);
        let first = catalog.templates(&a);
        let again = catalog.templates(&a.clone());
        assert!(Rc::ptr_eq(&first, &again));
        catalog.templates(&b);
        assert_eq!(catalog.cached_patterns(), 2);

        let hinted = a.clone().with_hint(TileHint::default());
        catalog.templates(&hinted);
        assert_eq!(catalog.cached_patterns(), 3);

        catalog.clear();
        assert_eq!(catalog.cached_patterns(), 0);
    }
}
