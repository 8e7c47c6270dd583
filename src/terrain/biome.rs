//! Biome classification and per-biome elevation curves

use serde::{Deserialize, Serialize};

use crate::voxel::block::{BlockId, DIRT, GRASS, MARSH, SAND, SANDSTONE, STONE};

/// Biome types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    Mountain,
    Plains,
    Desert,
    Forest,
    Ocean,
    River,
}

/// Fixed tuning values of one biome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeParams {
    pub weight: f64,
    /// Base elevation in [-1, 1], relative to sea level.
    pub height: f64,
    /// Cave seed points per chunk.
    pub caves: usize,
    /// River noise threshold; 1.0 never turns into a river.
    pub river: f64,
}

/// Blocks used to fill a column, top to bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub surface: BlockId,
    pub subsurface: BlockId,
    pub filler: BlockId,
    /// Replaces surface and subsurface below sea level.
    pub shore: BlockId,
}

const MOUNTAIN: BiomeParams = BiomeParams { weight: 1.0, height: 0.5, caves: 2, river: 0.85 };
const PLAINS: BiomeParams = BiomeParams { weight: 2.0, height: 0.09, caves: 1, river: 0.88 };
const DESERT: BiomeParams = BiomeParams { weight: 1.0, height: 0.04, caves: 1, river: 0.8 };
const FOREST: BiomeParams = BiomeParams { weight: 2.0, height: 0.03, caves: 1, river: 0.8 };
const OCEAN: BiomeParams = BiomeParams { weight: 1.0, height: -0.5, caves: 1, river: 1.0 };
const RIVER: BiomeParams = BiomeParams { weight: 2.0, height: -0.2, caves: 1, river: 0.8 };

impl Biome {
    pub const ALL: [Biome; 6] = [
        Biome::Mountain,
        Biome::Plains,
        Biome::Desert,
        Biome::Forest,
        Biome::Ocean,
        Biome::River,
    ];

    pub fn params(self) -> &'static BiomeParams {
        match self {
            Biome::Mountain => &MOUNTAIN,
            Biome::Plains => &PLAINS,
            Biome::Desert => &DESERT,
            Biome::Forest => &FOREST,
            Biome::Ocean => &OCEAN,
            Biome::River => &RIVER,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Biome::Mountain => "mountain",
            Biome::Plains => "plains",
            Biome::Desert => "desert",
            Biome::Forest => "forest",
            Biome::Ocean => "ocean",
            Biome::River => "river",
        }
    }

    /// Threshold roughness and moisture (both roughly in [-1, 1]) into a biome.
    ///
    /// Rivers are never produced here; they override the result later.
    pub fn classify(roughness: f64, moisture: f64) -> Biome {
        if roughness > 0.3 {
            Biome::Mountain
        } else if roughness < -0.3 {
            Biome::Ocean
        } else if moisture < -0.3 {
            Biome::Desert
        } else if moisture > 0.3 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Biome::Desert => Palette { surface: SAND, subsurface: SANDSTONE, filler: STONE, shore: DIRT },
            Biome::Ocean => Palette { surface: MARSH, subsurface: SAND, filler: STONE, shore: SAND },
            _ => Palette { surface: GRASS, subsurface: DIRT, filler: STONE, shore: SAND },
        }
    }

    /// Elevation contribution of this biome at a world column, before blending.
    ///
    /// `noise` samples coherent 2-D noise in [-1, 1].
    pub fn elevation<N>(self, noise: N, wx: f64, wy: f64) -> f64
    where
        N: Fn(f64, f64) -> f64,
    {
        let octaves = |scales: &[(f64, f64)]| {
            let total: f64 = scales.iter().map(|(_, w)| w).sum();
            scales.iter().map(|&(s, w)| noise(wx / s, wy / s) * w).sum::<f64>() / total
        };

        match self {
            Biome::Mountain => {
                let n = octaves(&[(160.0, 1.0), (80.0, 0.5), (40.0, 0.25), (20.0, 0.125)]);
                shape(n, 1.1) * 0.7 + MOUNTAIN.height
            }
            Biome::Plains => {
                let n = octaves(&[(70.0, 1.0), (35.0, 0.5)]);
                shape(n, 1.5) * 0.1 + PLAINS.height
            }
            Biome::Desert => {
                let dunes = 1.0 - noise(wx / 80.0, wy / 80.0).abs();
                let flat = shape(octaves(&[(30.0, 1.0), (15.0, 0.5)]), 2.5) * 0.2 + DESERT.height;
                flat.max((dunes * 0.2 * 2.0 + flat) / 3.0)
            }
            Biome::Forest => {
                let n = octaves(&[(80.0, 1.0), (40.0, 0.5), (20.0, 0.25)]);
                shape(n, 1.5) * 0.15 + FOREST.height
            }
            Biome::Ocean => {
                let n = octaves(&[(80.0, 1.0), (40.0, 0.5)]);
                shape(n, 1.5) * 0.4 + OCEAN.height
            }
            Biome::River => {
                let n = octaves(&[(40.0, 1.0), (20.0, 0.5), (10.0, 0.25)]);
                shape(n, 1.2) * 0.15 + RIVER.height
            }
        }
    }
}

/// Sign-preserving power curve.
pub fn shape(v: f64, exponent: f64) -> f64 {
    v.signum() * v.abs().powf(exponent)
}
