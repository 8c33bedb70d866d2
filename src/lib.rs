pub mod config;
pub mod error;
pub mod feature;
pub mod player;
pub mod rng;
pub mod sandbox;
pub mod snapshot;
pub mod stack;
pub mod tile;
pub mod world;

pub use config::{GameOptions, OptionsLoader};
pub use error::GameError;
pub use feature::{Avatar, EdgeKey, FeatureId, FeatureKind, FeatureView, SegmentId};
pub use player::Player;
pub use rng::RngManager;
pub use sandbox::{CloneStrategy, CowMap};
pub use snapshot::WorldSnapshot;
pub use stack::{generate_stack, DrawnTile, TileStack};
pub use tile::{Centre, EdgeKind, Tile, TileCatalog, TileHint};
pub use world::{Completion, Placement, World};
