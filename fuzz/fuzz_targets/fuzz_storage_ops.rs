#![no_main]
use block_storage::{BlockStorage, BlockStorageKind, ByteRange, StorageError};
use libfuzzer_sys::{arbitrary::{Arbitrary, Unstructured}, fuzz_target};

#[derive(Debug, Arbitrary)]
enum StorageOp {
    Append(Vec<u8>),
    WriteAt { offset: u16, data: Vec<u8> },
    Read { offset: u16, len: u16 },
    ReadBlock(u8),
    Reserve(u8),
    Truncate(u16),
}

// Every operation either succeeds and matches the model, or fails cleanly
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let (kind_idx, block_size, ops): (u8, u8, Vec<StorageOp>) = match u.arbitrary() {
        Ok(parsed) => parsed,
        Err(_) => return,
    };

    let kind = BlockStorageKind::ALL[kind_idx as usize % 3];
    let storage = match kind.create_sized(block_size as usize + 1, 1) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut model: Vec<u8> = Vec::new();

    for op in ops.iter().take(64) {
        match op {
            StorageOp::Append(data) => {
                storage.append(data).unwrap();
                model.extend_from_slice(data);
            }
            StorageOp::WriteAt { offset, data } => {
                let offset = *offset as usize;
                match storage.write_at(offset, data) {
                    Ok(_) => {
                        let end = offset + data.len();
                        if end > model.len() {
                            model.resize(end, 0);
                        }
                        model[offset..end].copy_from_slice(data);
                    }
                    Err(StorageError::OutOfBounds { .. }) => assert!(offset > model.len()),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            StorageOp::Read { offset, len } => {
                let (offset, len) = (*offset as usize, *len as usize);
                match storage.read(&ByteRange::new(offset, len)) {
                    Ok(data) => assert_eq!(data, model[offset..offset + len]),
                    Err(_) => assert!(offset + len > model.len()),
                }
            }
            StorageOp::ReadBlock(index) => {
                let _ = storage.read_block(*index as usize);
            }
            StorageOp::Reserve(blocks) => {
                storage.reserve_blocks(*blocks as usize).unwrap();
            }
            StorageOp::Truncate(new_size) => {
                let new_size = *new_size as usize;
                if storage.truncate(new_size).is_ok() {
                    model.truncate(new_size);
                }
            }
        }
        assert_eq!(storage.size(), model.len());
        assert!(storage.capacity() >= storage.size());
    }

    storage.close().unwrap();
});
