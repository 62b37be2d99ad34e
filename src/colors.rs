//! Stable per-platform chart colors.
//!
//! A table is built fresh for each metrics retrieval. The first time a
//! platform name is seen it receives a generated color, later lookups return
//! the same color. Two platforms may end up with the same color; nothing
//! checks for that.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Channel band for generated colors. Keeps segments away from pure
/// black/white so they stay legible on the dashboard palette.
pub const CHANNEL_MIN: u8 = 64;
pub const CHANNEL_MAX: u8 = 191;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Platform name -> color, plus the colors in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformColorTable {
    #[serde(rename = "platforms")]
    by_platform: HashMap<String, Rgb>,
    colors: Vec<Rgb>,
}

impl PlatformColorTable {
    pub fn get(&self, platform_name: &str) -> Option<Rgb> {
        self.by_platform.get(platform_name).copied()
    }

    pub fn contains(&self, platform_name: &str) -> bool {
        self.by_platform.contains_key(platform_name)
    }

    /// Colors in the order platforms were first seen.
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

pub struct PlatformColorAssigner<R: Rng = StdRng> {
    rng: R,
    table: PlatformColorTable,
}

impl PlatformColorAssigner<StdRng> {
    /// Assigner seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible assigner; the same seed and call order yield the same colors.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Seeded when a seed is configured, entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        }
    }
}

impl Default for PlatformColorAssigner<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> PlatformColorAssigner<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            table: PlatformColorTable::default(),
        }
    }

    pub fn contains(&self, platform_name: &str) -> bool {
        self.table.contains(platform_name)
    }

    /// Returns the platform's color, generating and recording one on first use.
    pub fn assign(&mut self, platform_name: &str) -> Rgb {
        if let Some(existing) = self.table.get(platform_name) {
            return existing;
        }
        let color = self.generate();
        self.table
            .by_platform
            .insert(platform_name.to_string(), color);
        self.table.colors.push(color);
        color
    }

    pub fn table(&self) -> &PlatformColorTable {
        &self.table
    }

    pub fn into_table(self) -> PlatformColorTable {
        self.table
    }

    fn generate(&mut self) -> Rgb {
        Rgb {
            r: self.rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
            g: self.rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
            b: self.rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
        }
    }
}
