use casonne::{
    Avatar, Centre, CloneStrategy,
    EdgeKind::{City as C, Empty as E, Road as R},
    FeatureKind, GameOptions, Tile, World,
};

fn seeded_world() -> World {
    let mut world = World::new(GameOptions::default(), 2);
    world
        .place(Tile::new(Centre::EMPTY, [R, C, R, E]), 0, 0)
        .unwrap();
    world
        .place(Tile::new(Centre::EMPTY, [R, E, R, E]), 0, 1)
        .unwrap();
    let road = world.features_at(0, 1, Some(FeatureKind::Road))[0].id();
    world.place_avatar(road, 0).unwrap();
    world
}

fn strategies() -> [CloneStrategy; 2] {
    [CloneStrategy::Eager, CloneStrategy::CopyOnWrite]
}

#[test]
fn sandbox_work_leaves_the_original_untouched() {
    for strategy in strategies() {
        let world = seeded_world();
        let before = world.snapshot().to_json().unwrap();

        let mut sandbox = world.fork(strategy);
        assert_eq!(sandbox.snapshot().to_json().unwrap(), before);

        sandbox
            .place(Tile::new(Centre::EMPTY, [E, E, E, C]), 1, 0)
            .unwrap();
        let city = sandbox.features_at(1, 0, Some(FeatureKind::City))[0].id();
        sandbox.place_avatar(city, 1).unwrap();
        let completions = sandbox.complete_features();
        assert_eq!(completions.len(), 1);
        sandbox.final_scoring();

        assert_ne!(sandbox.snapshot().to_json().unwrap(), before);
        assert_eq!(
            world.snapshot().to_json().unwrap(),
            before,
            "{strategy:?} sandbox leaked into its source"
        );
        assert_eq!(world.player(1).unwrap().score(), 0);
    }
}

#[test]
fn original_writes_do_not_reach_the_sandbox() {
    for strategy in strategies() {
        let mut world = seeded_world();
        let sandbox = world.fork(strategy);
        let before = sandbox.snapshot();

        world
            .place(Tile::new(Centre::EMPTY, [R, E, R, E]), 0, -1)
            .unwrap();
        assert_eq!(sandbox.snapshot(), before, "{strategy:?}");
        assert!(sandbox.tile(0, -1).is_none());
    }
}

#[test]
fn strategies_differ_only_in_sharing() {
    let world = seeded_world();
    let eager = world.fork(CloneStrategy::Eager);
    let lazy = world.fork(CloneStrategy::CopyOnWrite);
    assert!(!eager.shares_storage_with(&world));
    assert!(lazy.shares_storage_with(&world));
    assert_eq!(eager.snapshot(), lazy.snapshot());
    assert_eq!(eager.private_entries(), 0);
    assert_eq!(lazy.private_entries(), 0);
}

#[test]
fn merges_in_a_sandbox_follow_the_cloned_graph() {
    for strategy in strategies() {
        let mut world = World::new(GameOptions::default(), 2);
        world
            .place(Tile::new(Centre::EMPTY, [C, E, E, E]), 0, 0)
            .unwrap();
        let lower = world.features_at(0, 0, Some(FeatureKind::City))[0].id();
        world.place_avatar(lower, 0).unwrap();
        for y in 0..3 {
            world
                .place(Tile::new(Centre::EMPTY, [E, E, E, E]), 1, y)
                .unwrap();
        }
        world
            .place(Tile::new(Centre::EMPTY, [E, E, C, E]), 0, 2)
            .unwrap();

        let mut sandbox = world.fork(strategy);
        sandbox
            .place(Tile::new(Centre::CITY, [C, E, C, E]), 0, 1)
            .unwrap();

        let claim = sandbox.player(0).unwrap().claimed()[0];
        let merged = sandbox.feature_of(claim).unwrap();
        assert_eq!(merged.tiles(), &[(0, 0), (0, 1), (0, 2)]);
        assert_eq!(merged.owners(), &[0]);
        assert!(merged.is_complete());

        let original = world.feature_of(claim).unwrap();
        assert_eq!(original.tiles(), &[(0, 0)]);
        assert!(!original.is_complete());

        for feature in sandbox.features() {
            for &segment in feature.segments() {
                assert_eq!(sandbox.segment(segment).unwrap().feature(), feature.id());
            }
        }
    }
}

#[test]
fn copy_on_write_copies_only_what_it_touches() {
    let mut world = World::new(GameOptions::default(), 2);
    let road = Tile::new(Centre::EMPTY, [E, R, E, R]);
    for x in 0..15 {
        world.place(road.clone(), x, 0).unwrap();
    }
    assert_eq!(world.private_entries(), 0);

    let mut sandbox = world.fork(CloneStrategy::CopyOnWrite);
    sandbox.place(road, 15, 0).unwrap();
    assert!(sandbox.private_entries() > 0);
    assert!(
        sandbox.private_entries() < 20,
        "sandbox copied {} entries",
        sandbox.private_entries()
    );
    assert_eq!(world.private_entries(), 0);

    let row = sandbox.features_at(15, 0, Some(FeatureKind::Road))[0];
    assert_eq!(row.tiles().len(), 16);
    assert_eq!(world.features_at(14, 0, Some(FeatureKind::Road))[0].tiles().len(), 15);
}

#[test]
fn original_folds_its_overlay_once_sandboxes_are_gone() {
    let mut world = seeded_world();
    let sandbox = world.clone();
    world
        .place(Tile::new(Centre::EMPTY, [R, E, R, E]), 0, -1)
        .unwrap();
    assert!(world.private_entries() > 0);

    drop(sandbox);
    world
        .place(Tile::new(Centre::CLOISTER, [E, E, E, E]), 1, 1)
        .unwrap();
    assert_eq!(world.private_entries(), 0);
    assert_eq!(world.tile_count(), 4);
}

#[test]
fn claims_made_in_a_sandbox_stay_there() {
    let world = seeded_world();
    let mut sandbox = world.clone();
    let farm = sandbox.features_at(0, 1, Some(FeatureKind::Farm))[0].id();
    assert!(sandbox.claim(farm, Avatar::new(1)));
    assert_eq!(sandbox.feature(farm).unwrap().owners(), &[1]);
    assert!(world.feature(farm).unwrap().owners().is_empty());
}
