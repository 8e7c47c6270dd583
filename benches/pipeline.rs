use criterion::{criterion_group, criterion_main, Criterion, black_box};

use cubeworld::lighting::LightPropagator;
use cubeworld::meshing::GreedyMesher;
use cubeworld::terrain::generator::{TerrainGenerator, TerrainParams};
use cubeworld::voxel::chunk::ChunkCoord;
use cubeworld::voxel::map::ChunkMap;
use cubeworld::voxel::padded::PaddedChunk;

use glam::Vec3;

fn lit_map(coord: ChunkCoord) -> ChunkMap {
    let terrain = TerrainGenerator::new(TerrainParams::default());
    let mut map = ChunkMap::new();
    LightPropagator::new()
        .light_chunk(&terrain, &mut map, coord)
        .expect("lighting failed");
    map
}

fn bench_populate(c: &mut Criterion) {
    let terrain = TerrainGenerator::new(TerrainParams::default());

    c.bench_function("terrain_populate", |b| {
        b.iter(|| {
            let mut map = ChunkMap::new();
            terrain.populate(&mut map, black_box(ChunkCoord::new(2, 3))).expect("populate failed");
            map
        });
    });
}

fn bench_light_chunk(c: &mut Criterion) {
    let terrain = TerrainGenerator::new(TerrainParams::default());
    let lights = LightPropagator::new();
    let coord = ChunkCoord::new(2, 3);

    c.bench_function("light_chunk", |b| {
        b.iter(|| {
            let mut map = ChunkMap::new();
            lights.light_chunk(&terrain, &mut map, black_box(coord)).expect("lighting failed");
            map
        });
    });
}

fn bench_mesh(c: &mut Criterion) {
    let coord = ChunkCoord::new(2, 3);
    let map = lit_map(coord);
    let padded: PaddedChunk = map.padded(coord);

    for quality in [0u8, 3] {
        let mut mesher = GreedyMesher::new(quality);
        c.bench_function(&format!("greedy_mesh_q{}", quality), |b| {
            b.iter(|| mesher.tesselate(black_box(&padded)).expect("meshing failed"));
        });
    }
}

fn bench_hitscan(c: &mut Criterion) {
    let coord = ChunkCoord::new(0, 0);
    let map = lit_map(coord);
    let origin = Vec3::new(8.0, 8.0, 250.0);
    let direction = Vec3::new(0.3, 0.2, -1.0).normalize();

    c.bench_function("hitscan_down", |b| {
        b.iter(|| map.hitscan(black_box(origin), black_box(direction)).expect("hitscan failed"));
    });
}

criterion_group!(benches, bench_populate, bench_light_chunk, bench_mesh, bench_hitscan);
criterion_main!(benches);
