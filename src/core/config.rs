//! Engine configuration, loadable from JSON.
//!
//! Every section falls back to its defaults when omitted, so a config file
//! only needs to list the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::terrain::generator::TerrainParams;

/// Settings for the generation worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Side length of the square spiral scanned around the hot chunk.
    pub hot_diameter: i32,
    /// Chunks lit and sent per tick.
    pub chunks_per_tick: usize,
    /// Time between ticks in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            hot_diameter: 35,
            chunks_per_tick: 5,
            tick_interval_ms: 16,
        }
    }
}

/// Settings for the meshing worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingConfig {
    /// Shading tier, 0 (flat) through 3 (smooth corners with glints).
    pub quality: u8,
    /// Maximum number of meshing jobs in flight.
    pub max_concurrent: usize,
    /// Vertex count above which a mesh buffer is discarded.
    pub vertex_ceiling: usize,
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self {
            quality: 1,
            max_concurrent: 4,
            vertex_ceiling: crate::meshing::buffer::VERTEX_CEILING,
        }
    }
}

/// Settings for the consumer-side chunk registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Side length of the spiral of chunks kept hot around the player.
    pub interest_diameter: i32,
    /// Radius (in chunks) inside which hot chunks are shown.
    pub render_distance: f32,
    /// Mesh jobs admitted per tick.
    pub mesh_jobs_per_tick: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            interest_diameter: 39,
            render_distance: 8.0,
            mesh_jobs_per_tick: 10,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub terrain: TerrainParams,
    pub generation: GenerationConfig,
    pub meshing: MeshingConfig,
    pub streaming: StreamingConfig,
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        use crate::core::error::Error;

        if self.meshing.quality > 3 {
            return Err(Error::Config(format!(
                "meshing.quality must be 0..=3, got {}",
                self.meshing.quality
            )));
        }
        if self.meshing.max_concurrent == 0 {
            return Err(Error::Config("meshing.max_concurrent must be at least 1".into()));
        }
        let t = &self.terrain;
        if !(0.0 < t.sea_floor && t.sea_floor < t.sea_level && t.sea_level < t.terrain_cap && t.terrain_cap < 1.0) {
            return Err(Error::Config(
                "terrain levels must satisfy 0 < sea_floor < sea_level < terrain_cap < 1".into(),
            ));
        }
        if self.generation.hot_diameter < 1 || self.streaming.interest_diameter < 1 {
            return Err(Error::Config("spiral diameters must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.terrain.seed, 1018);
        assert_eq!(config.generation.chunks_per_tick, 5);
        assert_eq!(config.streaming.mesh_jobs_per_tick, 10);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");

        let mut config = EngineConfig::default();
        config.terrain.seed = 42;
        config.meshing.quality = 3;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "meshing": { "quality": 2 } }"#).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.meshing.quality, 2);
        assert_eq!(loaded.meshing.max_concurrent, 4);
        assert_eq!(loaded.terrain, TerrainParams::default());
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "meshing": { "quality": 9 } }"#).unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = Path::new("/definitely/not/here/engine.json");
        assert!(matches!(EngineConfig::load(path), Err(Error::Io(_))));
    }
}
