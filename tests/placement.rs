use std::collections::BTreeSet;

use casonne::{
    Centre, EdgeKind::{self, City as C, Empty as E, River as V, Road as R},
    FeatureKind, GameError, GameOptions, SegmentId, Tile, World,
};

fn world() -> World {
    World::new(GameOptions::default(), 2)
}

fn start_tile() -> Tile {
    Tile::new(Centre::EMPTY, [R, C, R, E])
}

#[test]
fn first_placement_is_always_the_origin() {
    let world = world();
    let tiles = [
        Tile::new(Centre::CLOISTER, [E, E, E, E]),
        Tile::new(Centre::EMPTY, [R, E, R, E]),
        Tile::new(Centre::EMPTY, [C, R, R, E]),
        Tile::new(Centre::EMPTY, [V, E, E, E]),
    ];
    for tile in &tiles {
        assert_eq!(
            world.possible_placements(tile),
            vec![(0, 0, 0)],
            "symmetry {} tile",
            tile.symmetry()
        );
    }
}

#[test]
fn touching_sides_must_agree() {
    let kinds = [EdgeKind::Empty, EdgeKind::Road, EdgeKind::River, EdgeKind::City];
    for north in kinds {
        for south in kinds {
            let mut world = world();
            world
                .place(Tile::new(Centre::EMPTY, [north, E, E, E]), 0, 0)
                .unwrap();
            let candidate = Tile::new(Centre::EMPTY, [E, E, south, E]);
            assert_eq!(
                world.can_place(&candidate, 0, 1),
                north == south,
                "{north:?} below {south:?}"
            );
        }
    }
}

#[test]
fn city_cannot_face_a_road() {
    let mut world = world();
    world
        .place(Tile::new(Centre::EMPTY, [R, E, R, E]), 0, 0)
        .unwrap();
    let city_south = Tile::new(Centre::EMPTY, [E, E, C, E]);
    assert!(!world.can_place(&city_south, 0, 1));
    assert_eq!(
        world.place(city_south, 0, 1),
        Err(GameError::IllegalPlacement { x: 0, y: 1 })
    );
    assert_eq!(world.tile_count(), 1, "rejected placement leaves the board alone");
}

#[test]
fn straight_road_next_to_the_start_tile() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let straight = Tile::new(Centre::EMPTY, [R, E, R, E]);
    assert_eq!(
        world.possible_placements(&straight),
        vec![(-1, 0, 0), (0, -1, 0), (0, 1, 0)]
    );
}

#[test]
fn every_listed_placement_is_placeable() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let tile = Tile::new(Centre::EMPTY, [C, R, R, E]);
    let placements = world.possible_placements(&tile);
    assert!(!placements.is_empty());
    for (x, y, rotation) in placements {
        let mut sandbox = world.clone();
        sandbox.place(tile.rotate(rotation), x, y).unwrap();
    }
}

#[test]
fn placed_tiles_cannot_be_placed_again() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let anchored = world.tile(0, 0).cloned().unwrap();
    assert!(anchored.is_placed());
    assert_eq!(world.place(anchored, 5, 5), Err(GameError::TileAlreadyPlaced));
}

#[test]
fn disconnected_cells_are_rejected() {
    let mut world = world();
    let blank = Tile::new(Centre::EMPTY, [E, E, E, E]);
    world.place(blank.clone(), 0, 0).unwrap();

    let err = world.place(blank.clone(), 5, 5).unwrap_err();
    assert!(matches!(err, GameError::IllegalPlacement { x: 5, y: 5 }));
    assert_eq!(world.tile_count(), 1);
    assert!(world.tile(5, 5).is_none());
    assert!(!world.possible_placements(&blank).contains(&(5, 5, 0)));

    world.place(blank, 1, 0).unwrap();
    assert_eq!(world.tile_count(), 2);
}

#[test]
fn river_must_join_the_existing_river() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let source = Tile::new(Centre::EMPTY, [V, E, E, E]);
    assert!(!world.can_place(&source, -1, 0));
}

#[test]
fn river_may_not_turn_back_on_itself() {
    let mut world = world();
    let bend = Tile::new(Centre::EMPTY, [V, V, E, E]);
    world
        .place(Tile::new(Centre::EMPTY, [V, E, E, E]), 0, 0)
        .unwrap();
    // south to east
    world.place(bend.rotate(3), 0, 1).unwrap();

    let west_to_south = bend.rotate(2);
    let west_to_north = bend.rotate(1);
    let straight = Tile::new(Centre::EMPTY, [E, V, E, V]);
    assert!(!world.can_place(&west_to_south, 1, 1));
    assert!(world.can_place(&west_to_north, 1, 1));
    assert!(world.can_place(&straight, 1, 1));

    let placements = world.possible_placements(&bend);
    assert!(placements.contains(&(1, 1, 1)));
    assert!(!placements.contains(&(1, 1, 2)));
}

#[test]
fn tile_exists_checks_every_rotation() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let straight = Tile::new(Centre::EMPTY, [R, E, R, E]);
    let city_cap = Tile::new(Centre::EMPTY, [C, E, E, E]);
    assert!(!world.tile_exists(1, 0, [&straight]));
    assert!(world.tile_exists(0, 1, [&straight]));
    assert!(world.tile_exists(1, 0, [&straight, &city_cap, &straight]));
}

#[test]
fn merging_conserves_segments() {
    let mut world = world();
    let road = Tile::new(Centre::EMPTY, [E, R, E, R]);
    world.place(road.clone(), 0, 0).unwrap();
    let before = world.segment_count();
    world.place(road, 1, 0).unwrap();

    let mut seen: Vec<SegmentId> = Vec::new();
    for (x, y) in [(0, 0), (1, 0)] {
        for feature in world.features_at(x, y, None) {
            seen.extend(feature.segments());
        }
    }
    let distinct: BTreeSet<SegmentId> = seen.iter().copied().collect();
    assert_eq!(distinct.len(), before * 2);
    assert_eq!(distinct.len(), world.segment_count());
}

#[test]
fn placement_reports_the_features_on_the_new_tile() {
    let mut world = world();
    world.place(start_tile(), 0, 0).unwrap();
    let cap = Tile::new(Centre::EMPTY, [E, E, E, C]);
    let touching = world.place(cap, 1, 0).unwrap();

    let kinds: Vec<FeatureKind> = touching
        .iter()
        .map(|id| world.feature(*id).unwrap().kind())
        .collect();
    assert!(kinds.contains(&FeatureKind::City));
    assert!(kinds.contains(&FeatureKind::Farm));
    let city = touching
        .iter()
        .map(|id| world.feature(*id).unwrap())
        .find(|f| f.kind() == FeatureKind::City)
        .unwrap();
    assert_eq!(city.tiles(), &[(0, 0), (1, 0)]);
    assert!(city.is_complete());
}
