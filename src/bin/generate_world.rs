//! World generator binary: generates, lights and meshes a square region.
//!
//! Usage: cargo run --release --bin generate_world -- [OPTIONS]
//!
//! Options:
//!   --radius <CHUNKS>  Half side of the region, in chunks (default: 4)
//!   --seed <SEED>      Terrain seed (default: 1018)
//!   --quality <Q>      Meshing quality 0..=3 (default: 1)
//!   --config <PATH>    Engine config JSON; flags override its values
//!   --out <DIR>        Output directory (default: "worlds/<seed>")
//!   --jobs <N>         Parallel meshing threads (default: 4)
//!
//! Output structure:
//!   <out>/
//!     manifest.json           # Seed, biome census and per-chunk mesh stats

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use serde_json::json;

use cubeworld::core::config::EngineConfig;
use cubeworld::lighting::LightPropagator;
use cubeworld::meshing::{GreedyMesher, MeshTarget};
use cubeworld::terrain::generator::TerrainGenerator;
use cubeworld::voxel::chunk::ChunkCoord;
use cubeworld::voxel::map::ChunkMap;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => EngineConfig::load(&PathBuf::from(path)).expect("Failed to load config"),
        None => EngineConfig::default(),
    };
    if let Some(seed) = parse_u32_arg(&args, "--seed") {
        config.terrain.seed = seed;
    }
    if let Some(quality) = parse_u32_arg(&args, "--quality") {
        config.meshing.quality = quality.min(3) as u8;
    }
    let radius = parse_u32_arg(&args, "--radius").unwrap_or(4) as i32;
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);
    let output_dir = parse_str_arg(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("worlds/{}", config.terrain.seed)));
    config.validate().expect("Invalid configuration");

    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .expect("Failed to configure thread pool");

    let side = radius * 2 + 1;
    println!("=== Cubeworld Generator ===");
    println!("Seed:    {}", config.terrain.seed);
    println!("Region:  {} x {} chunks", side, side);
    println!("Quality: {}", config.meshing.quality);
    println!("Jobs:    {} parallel", jobs);
    println!("Output:  {}", output_dir.display());
    println!();

    // Phase 1: generate and light, nearest chunks first
    let terrain = TerrainGenerator::new(config.terrain.clone());
    let lights = LightPropagator::new();
    let mut map = ChunkMap::new();
    let coords = map.spiral(0, 0, side);

    let start = Instant::now();
    for (i, &coord) in coords.iter().enumerate() {
        lights
            .light_chunk(&terrain, &mut map, coord)
            .expect("Failed to light chunk");
        let done = i + 1;
        if done % 25 == 0 || done == coords.len() {
            eprintln!("  [{}/{}] lit", done, coords.len());
        }
    }
    let lit_elapsed = start.elapsed();
    println!(
        "Lighting: {} chunks in {:.2}s ({} in memory)",
        coords.len(),
        lit_elapsed.as_secs_f64(),
        map.len()
    );

    // Phase 2: mesh in parallel, one mesher per chunk
    let snapshots: Vec<_> = coords.iter().map(|&coord| map.padded(coord)).collect();
    let quality = config.meshing.quality;
    let ceiling = config.meshing.vertex_ceiling;

    let start = Instant::now();
    let meshes: Vec<_> = snapshots
        .par_iter()
        .map(|padded| {
            GreedyMesher::new(quality)
                .with_ceiling(ceiling)
                .tesselate(padded)
                .expect("Failed to mesh chunk")
        })
        .collect();
    let mesh_elapsed = start.elapsed();

    let total_triangles: usize = meshes.iter().map(|m| m.triangle_count()).sum();
    println!(
        "Meshing:  {} chunks in {:.2}s ({} triangles)",
        meshes.len(),
        mesh_elapsed.as_secs_f64(),
        total_triangles
    );

    // Phase 3: manifest
    let census: BTreeMap<String, usize> = map
        .biome_census()
        .into_iter()
        .map(|(biome, count)| (format!("{:?}", biome).to_lowercase(), count))
        .collect();
    for (biome, count) in &census {
        log::info!("{:>10}: {} chunks", biome, count);
    }

    let chunks: Vec<_> = meshes
        .iter()
        .map(|mesh| {
            let ChunkCoord { x, y } = mesh.coord;
            let targets: BTreeMap<_, _> = [MeshTarget::Opaque, MeshTarget::Transparent, MeshTarget::Unculled]
                .into_iter()
                .map(|target| {
                    let buffer = mesh.buffer(target);
                    (
                        format!("{:?}", target).to_lowercase(),
                        json!({
                            "vertices": buffer.vertex_count(),
                            "triangles": buffer.triangle_count(),
                        }),
                    )
                })
                .collect();
            json!({
                "x": x,
                "y": y,
                "biome": map.get(mesh.coord).and_then(|c| c.biome),
                "bounds": mesh.bounds,
                "targets": targets,
            })
        })
        .collect();

    let manifest = json!({
        "seed": config.terrain.seed,
        "quality": quality,
        "radius": radius,
        "biomes": census,
        "triangles": total_triangles,
        "config": config,
        "chunks": chunks,
    });

    std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    let manifest_path = output_dir.join("manifest.json");
    let manifest_str = serde_json::to_string_pretty(&manifest).expect("Failed to serialize manifest");
    std::fs::write(&manifest_path, manifest_str).expect("Failed to write manifest");

    println!();
    println!("Manifest: {}", manifest_path.display());
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    parse_str_arg(args, flag).and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    parse_str_arg(args, flag).and_then(|s| s.parse().ok())
}
