use criterion::{Criterion, black_box, criterion_group, criterion_main};

use solstice_backup::{BackupFile, RegionSnapshot};
use solstice_biomes::{BiomeId, BiomeRegistry};
use solstice_world::SampleGrid;

fn mixed_snapshot(reg: &BiomeRegistry) -> RegionSnapshot {
    let grid = SampleGrid::new(4, 4, -64, 320);
    let ids: Vec<BiomeId> = reg.iter().map(|(id, _)| id).take(12).collect();
    let samples = (0..grid.len()).map(|i| ids[(i * 7 / 5) % ids.len()]).collect();
    RegionSnapshot::new(grid, samples)
}

fn bench_encode(c: &mut Criterion) {
    let reg = BiomeRegistry::vanilla();
    let snap = mixed_snapshot(&reg);
    c.bench_function("encode_region_4x4x96", |b| {
        b.iter(|| {
            let file = BackupFile::from_snapshot(&reg, black_box(&snap)).unwrap();
            black_box(file.encode().unwrap());
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let reg = BiomeRegistry::vanilla();
    let bytes = BackupFile::from_snapshot(&reg, &mixed_snapshot(&reg))
        .unwrap()
        .encode()
        .unwrap();
    c.bench_function("decode_region_4x4x96", |b| {
        b.iter(|| {
            let file = BackupFile::decode(black_box(&bytes)).unwrap();
            black_box(file.to_snapshot(&reg, BiomeId(0)).unwrap());
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
