//! Deterministic random streams.
//!
//! Each concern (stack shuffle, river shuffle, reshuffles of unplaceable
//! tiles) draws from its own named ChaCha8 stream seeded from the game seed,
//! so adding draws to one stream never perturbs another.

use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const STACK_STREAM: &str = "stack";
pub const RIVER_STREAM: &str = "river";
pub const RESHUFFLE_STREAM: &str = "reshuffle";

pub struct RngManager {
    master_seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master_seed: seed,
            streams: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    /// Get or create the stream called `name`.
    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let seed = derive_seed(self.master_seed, name);
        let inner = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(seed));
        SystemRng { inner }
    }
}

impl Default for RngManager {
    fn default() -> Self {
        Self::new(0)
    }
}

fn derive_seed(master: u64, name: &str) -> u64 {
    // FNV-1a over the stream name, then LCG mixing with the master seed.
    let mut tag: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        tag ^= byte as u64;
        tag = tag.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let mut seed = master;
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed ^= tag;
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for SystemRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
