//! Concurrent readers/writers stress tests

use block_storage::{BlockStorage, BlockStorageKind, ByteRange, FunctionalLockExt};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_10_concurrent_readers_2_writers() {
    for kind in BlockStorageKind::ALL {
        let storage = Arc::new(kind.create_sized(64, 1).unwrap());

        // Pre-populate 50 records of 8 bytes
        for i in 0..50u8 {
            storage.append(&[i; 8]).unwrap();
        }

        let handles: Vec<_> = (0..12)
            .map(|thread_id| {
                let storage = storage.clone();
                thread::spawn(move || {
                    if thread_id < 2 {
                        // Writer thread
                        for _ in 0..100 {
                            storage.append(&[0xF0 + thread_id as u8; 8]).unwrap();
                        }
                    } else {
                        // Reader thread
                        let mut rng = rand::thread_rng();
                        for _ in 0..1000 {
                            let idx = rng.gen_range(0..50usize);
                            let record = storage.read(&ByteRange::new(idx * 8, 8)).unwrap();
                            assert!(record.iter().all(|&b| b == idx as u8));
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(storage.size(), (50 + 200) * 8);
        assert_eq!(
            storage.allocated_blocks(),
            storage.converter().bytes_to_blocks(storage.size())
        );
    }
}

#[test]
fn test_concurrent_appends_never_interleave() {
    let storage = Arc::new(BlockStorageKind::Heap.create_sized(32, 0).unwrap());

    let handles: Vec<_> = (0..8u8)
        .map(|thread_id| {
            let storage = storage.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| storage.append(&[thread_id; 37]).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ranges = Vec::new();
    for (thread_id, h) in handles.into_iter().enumerate() {
        for range in h.join().unwrap() {
            ranges.push((thread_id as u8, range));
        }
    }

    assert_eq!(storage.size(), 8 * 50 * 37);
    for (thread_id, range) in ranges {
        let chunk = storage.read(&range).unwrap();
        assert!(chunk.iter().all(|&b| b == thread_id), "torn append at {}", range);
    }
}

#[test]
fn test_readers_hold_read_side_simultaneously() {
    let storage = Arc::new(BlockStorageKind::OffHeap.create().unwrap());
    storage.append(b"shared").unwrap();

    // Every reader waits at the barrier while holding the read side: if
    // readers were serialized, the barrier would never release.
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (storage, barrier) = (storage.clone(), barrier.clone());
            thread::spawn(move || {
                storage.lock().with_read(|| {
                    barrier.wait();
                    storage.read(&ByteRange::new(0, 6)).unwrap()
                })
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), b"shared");
    }
}

#[test]
fn test_writer_blocks_reader_until_released() {
    for kind in BlockStorageKind::ALL {
        let storage = Arc::new(kind.create_sized(256, 1).unwrap());
        let writer_holds_lock = Arc::new(Barrier::new(2));
        let released = Arc::new(AtomicBool::new(false));

        let writer = {
            let (storage, barrier, released) =
                (storage.clone(), writer_holds_lock.clone(), released.clone());
            thread::spawn(move || {
                let guard = storage.lock().write();
                barrier.wait();

                // Two halves with a pause in between: a reader slipping in
                // would see a torn write
                storage.append(&[0xAA; 512]).unwrap();
                thread::sleep(Duration::from_millis(50));
                storage.append(&[0xBB; 512]).unwrap();

                released.store(true, Ordering::SeqCst);
                drop(guard);
            })
        };

        writer_holds_lock.wait();
        let data = storage.read(&ByteRange::new(0, 1024)).unwrap();

        assert!(released.load(Ordering::SeqCst));
        assert!(data[..512].iter().all(|&b| b == 0xAA));
        assert!(data[512..].iter().all(|&b| b == 0xBB));
        writer.join().unwrap();
    }
}

#[test]
fn test_write_waits_for_prior_readers() {
    let storage = Arc::new(BlockStorageKind::Heap.create().unwrap());
    storage.append(b"before").unwrap();

    let reader_in = Arc::new(Barrier::new(2));
    let reads_done = Arc::new(AtomicUsize::new(0));

    let reader = {
        let (storage, barrier, reads_done) =
            (storage.clone(), reader_in.clone(), reads_done.clone());
        thread::spawn(move || {
            storage.lock().run_read(|| {
                barrier.wait();
                thread::sleep(Duration::from_millis(50));
                reads_done.fetch_add(1, Ordering::SeqCst);
            });
        })
    };

    reader_in.wait();
    storage.write_at(0, b"after!").unwrap();

    // The write could only start once the reader had released
    assert_eq!(reads_done.load(Ordering::SeqCst), 1);
    assert_eq!(storage.read(&ByteRange::new(0, 6)).unwrap(), b"after!");
    reader.join().unwrap();
}

#[test]
fn test_close_while_readers_active() {
    let storage = Arc::new(BlockStorageKind::MappedTempFile.create().unwrap());
    storage.append(&[1u8; 600]).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = storage.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    // Either the full record or a clean Closed error
                    if let Ok(data) = storage.read(&ByteRange::new(0, 600)) {
                        assert!(data.iter().all(|&b| b == 1));
                    }
                }
            })
        })
        .collect();

    storage.close().unwrap();
    for h in handles {
        h.join().unwrap();
    }
    assert!(storage.is_closed());
}
