use criterion::{criterion_group, criterion_main, Bencher, BenchmarkId, Criterion, Throughput};
use hashindex::HashIndex;
use once_cell::sync::Lazy;
use rand::Rng;

const CAPACITY: [u32; 3] = [1031, 16411, 131101];
const TOTAL_KEYS: u64 = 10_000;
const TOTAL_OPERATIONS: u64 = 1_000;

static RANDOM_INDEXES: Lazy<Vec<u64>> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    let mut indexes = Vec::with_capacity(TOTAL_OPERATIONS as usize);
    for _i in 0..TOTAL_OPERATIONS {
        indexes.push(rng.gen_range(0, TOTAL_KEYS));
    }
    indexes
});

fn key_for(id: u64) -> [u8; 32] {
    let mut k = [0u8; 32];
    k[0..8].copy_from_slice(&id.to_le_bytes());
    k
}

fn value_for(id: u64) -> [u8; 12] {
    let mut v = [0u8; 12];
    v[0..8].copy_from_slice(&id.to_le_bytes());
    v
}

fn ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("ops");
    group.throughput(Throughput::Elements(TOTAL_OPERATIONS));

    for &capacity in CAPACITY.iter() {
        group.bench_with_input(
            BenchmarkId::new("random get", capacity),
            &capacity,
            |b, &capacity| random_get(b, capacity),
        );
        group.bench_with_input(
            BenchmarkId::new("insert", capacity),
            &capacity,
            |b, &capacity| insert(b, capacity),
        );
        group.bench_with_input(
            BenchmarkId::new("update in place", capacity),
            &capacity,
            |b, &capacity| rmw(b, capacity),
        );
        group.bench_with_input(
            BenchmarkId::new("delete then reinsert", capacity),
            &capacity,
            |b, &capacity| delete_reinsert(b, capacity),
        );
    }
    group.finish();
}

fn insert(b: &mut Bencher, capacity: u32) {
    let mut index = HashIndex::init(capacity, 32, 12).unwrap();
    b.iter(|| {
        for id in RANDOM_INDEXES.iter() {
            index.set(&key_for(*id), &value_for(*id)).unwrap();
        }
    });
}

fn random_get(b: &mut Bencher, capacity: u32) {
    let mut index = HashIndex::init(capacity, 32, 12).unwrap();
    for i in 0..TOTAL_KEYS {
        index.set(&key_for(i), &value_for(i)).unwrap();
    }
    b.iter(|| {
        for id in RANDOM_INDEXES.iter() {
            assert!(index.get(&key_for(*id)).unwrap().is_some());
        }
    });
}

fn rmw(b: &mut Bencher, capacity: u32) {
    let mut index = HashIndex::init(capacity, 32, 12).unwrap();
    for i in 0..TOTAL_KEYS {
        index.set(&key_for(i), &value_for(i)).unwrap();
    }
    b.iter(|| {
        for id in RANDOM_INDEXES.iter() {
            index.set(&key_for(*id), &value_for(id + 1)).unwrap();
        }
    });
}

fn delete_reinsert(b: &mut Bencher, capacity: u32) {
    let mut index = HashIndex::init(capacity, 32, 12).unwrap();
    for i in 0..TOTAL_KEYS {
        index.set(&key_for(i), &value_for(i)).unwrap();
    }
    b.iter(|| {
        for id in RANDOM_INDEXES.iter() {
            index.delete(&key_for(*id)).unwrap();
            index.set(&key_for(*id), &value_for(*id)).unwrap();
        }
    });
}

criterion_group!(benches, ops);
criterion_main!(benches);
