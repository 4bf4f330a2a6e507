#![no_main]
use block_storage::{BlockStorage, BlockStorageKind, ByteRange};
use libfuzzer_sys::{arbitrary::{Arbitrary, Unstructured}, fuzz_target};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Arbitrary)]
struct ThreadOps {
    appends: Vec<Vec<u8>>,
    reads: Vec<(u16, u16)>,
}

// Concurrent appends and reads never tear or panic
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let threads: Vec<ThreadOps> = match u.arbitrary() {
        Ok(t) => t,
        Err(_) => return,
    };
    if threads.is_empty() {
        return;
    }

    let storage = Arc::new(BlockStorageKind::Heap.create_sized(64, 0).unwrap());

    let handles: Vec<_> = threads
        .into_iter()
        .take(4)
        .enumerate()
        .map(|(id, ops)| {
            let storage = storage.clone();
            thread::spawn(move || {
                for data in ops.appends.iter().take(16) {
                    let fill = vec![id as u8; data.len()];
                    let range = storage.append(&fill).unwrap();
                    assert_eq!(storage.read(&range).unwrap(), fill);
                }
                for &(offset, len) in ops.reads.iter().take(16) {
                    let _ = storage.read(&ByteRange::new(offset as usize, len as usize));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
});
