use block_storage::{BlockStorage, BlockStorageKind, ByteRange};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [64usize, 4096, 64 * 1024] {
        group.throughput(Throughput::Bytes((size * 64) as u64));
        for kind in BlockStorageKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &size, |b, &size| {
                let data = vec![0xAB; size];
                b.iter(|| {
                    let storage = kind.create().unwrap();
                    for _ in 0..64 {
                        storage.append(&data).unwrap();
                    }
                    storage.close().unwrap();
                });
            });
        }
    }
    group.finish();
}

fn bench_exact_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_growth");

    // Small appends from zero blocks: one reallocation per new block
    for block_size in [256usize, 4096] {
        group.bench_with_input(
            BenchmarkId::new("heap_small_appends", block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| {
                    let storage = BlockStorageKind::Heap.create_sized(block_size, 0).unwrap();
                    for i in 0..1000u32 {
                        storage.append(&i.to_le_bytes()).unwrap();
                    }
                });
            },
        );
    }

    group.bench_function("heap_reserved_up_front", |b| {
        b.iter(|| {
            let storage = BlockStorageKind::Heap.create_sized(256, 16).unwrap();
            for i in 0..1000u32 {
                storage.append(&i.to_le_bytes()).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    for kind in BlockStorageKind::ALL {
        let storage = kind.create_sized(4096, 256).unwrap();
        storage.append(&vec![7u8; 1024 * 1024]).unwrap();

        group.bench_function(BenchmarkId::new("read_4k", kind.as_str()), |b| {
            let mut buf = vec![0u8; 4096];
            let mut offset = 0;
            b.iter(|| {
                storage.read_into(offset, &mut buf).unwrap();
                offset = (offset + 4096) % (1024 * 1024);
            });
        });
    }

    let storage = Arc::new(BlockStorageKind::Heap.create_sized(4096, 256).unwrap());
    storage.append(&vec![7u8; 1024 * 1024]).unwrap();

    group.bench_function("4_threads_concurrent_reads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let storage = storage.clone();
                    thread::spawn(move || {
                        for i in 0..64 {
                            let start = ((t * 64 + i) * 4096) % (1024 * 1024);
                            storage.read(&ByteRange::new(start, 4096)).unwrap();
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_exact_growth, bench_reads);
criterion_main!(benches);
