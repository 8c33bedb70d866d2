//! Serialisable view of a world, for diagnostics and for comparing a world
//! before and after sandbox work.

use serde::Serialize;

use crate::feature::{Avatar, EdgeKey, FeatureKind, SegmentKind};
use crate::player::Player;
use crate::tile::EdgeKind;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSnapshot {
    pub x: i32,
    pub y: i32,
    pub edges: [EdgeKind; 4],
    pub centre: Vec<&'static str>,
    pub segments: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSnapshot {
    pub id: u32,
    pub kind: FeatureKind,
    pub tile: (i32, i32),
    pub edges: Vec<u8>,
    pub feature: u32,
    pub flags: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSnapshot {
    pub id: u32,
    pub kind: FeatureKind,
    pub segments: Vec<u32>,
    pub tiles: Vec<(i32, i32)>,
    pub avatars: Vec<Avatar>,
    pub owners: Vec<usize>,
    pub open_edges: Vec<EdgeKey>,
    pub complete: bool,
    pub cleared: bool,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSnapshot {
    pub tiles: Vec<TileSnapshot>,
    pub segments: Vec<SegmentSnapshot>,
    pub features: Vec<FeatureSnapshot>,
    pub players: Vec<Player>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let tiles = world
            .tiles()
            .map(|(&(x, y), placed)| TileSnapshot {
                x,
                y,
                edges: placed.tile().edges(),
                centre: placed.tile().centre().names(),
                segments: placed.segments().iter().map(|id| id.raw()).collect(),
            })
            .collect();

        let segments = world
            .tiles()
            .flat_map(|(_, placed)| placed.segments().iter().copied())
            .filter_map(|id| world.segment(id).map(|segment| (id, segment)))
            .map(|(id, segment)| SegmentSnapshot {
                id: id.raw(),
                kind: segment.kind().feature_kind(),
                tile: segment.tile(),
                edges: segment.edges().to_vec(),
                feature: segment.feature().raw(),
                flags: segment_flags(segment.kind()),
            })
            .collect();

        let features = world
            .features()
            .into_iter()
            .map(|feature| FeatureSnapshot {
                id: feature.id().raw(),
                kind: feature.kind(),
                segments: feature.segments().iter().map(|id| id.raw()).collect(),
                tiles: feature.tiles().to_vec(),
                avatars: feature.avatars().to_vec(),
                owners: feature.owners().to_vec(),
                open_edges: feature.edges().into_iter().collect(),
                complete: feature.is_complete(),
                cleared: feature.is_cleared(),
                score: feature.score(),
            })
            .collect();

        Self {
            tiles,
            segments,
            features,
            players: world.players().to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn segment_flags(kind: &SegmentKind) -> Vec<&'static str> {
    let mut flags = Vec::new();
    match kind {
        SegmentKind::City { pennant, cathedral } => {
            if *pennant {
                flags.push("pennant");
            }
            if *cathedral {
                flags.push("cathedral");
            }
        }
        SegmentKind::Road { inn: true } => flags.push("inn"),
        SegmentKind::Farm { cities } if !cities.is_empty() => flags.push("borders_city"),
        _ => {}
    }
    flags
}

impl World {
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self)
    }
}
