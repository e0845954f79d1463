//! Where generation seeds come from. Production seeds follow the wall clock so
//! identical requests give different meshes; tests pin the seed.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait SeedSource: Send {
    fn next_seed(&mut self) -> u32;
}

/// Current unix time in seconds, truncated to 32 bits
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockSeed;

impl SeedSource for ClockSeed {
    fn next_seed(&mut self) -> u32 {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        (secs & 0xFFFF_FFFF) as u32
    }
}

/// Always the same seed
#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u32);

impl SeedSource for FixedSeed {
    fn next_seed(&mut self) -> u32 {
        self.0
    }
}
