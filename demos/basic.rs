//! Basic Block Storage Usage Example
//!
//! Demonstrates the core functionality:
//! - Creating storages on each substrate (heap, off-heap, temp file)
//! - Appending, overwriting and reading bytes
//! - Exact growth past the initial blocks
//! - Closing and temp file cleanup
//!
//! Run with: cargo run --example basic

use block_storage::{BlockStorage, BlockStorageBuilder, BlockStorageKind, ByteRange, Range};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Block Storage Basic Usage ===\n");

    for kind in BlockStorageKind::ALL {
        println!("--- {} ---", kind);

        // Defaults: 4 blocks of 256 bytes
        println!("1. Creating storage...");
        let storage = kind.create()?;
        println!(
            "   ✓ {} blocks of {} bytes ({} bytes capacity)",
            storage.allocated_blocks(),
            storage.block_size(),
            storage.capacity()
        );
        if let Some(path) = storage.backing_path() {
            println!("   Backing file: {}", path.display());
        }

        println!("2. Appending 300 bytes...");
        let record: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        let range = storage.append(&record)?;
        let span = storage.block_span(&range)?;
        println!(
            "   ✓ Stored at [{}, {}) across {} blocks, no growth needed",
            range.start(),
            range.end(),
            span.block_count
        );

        println!("3. Overwriting the first bytes...");
        storage.write_at(0, b"HEAD")?;
        let head = storage.read(&ByteRange::new(0, 4))?;
        println!("   Head: {}", String::from_utf8_lossy(&head));

        println!("4. Growing past the initial blocks...");
        storage.append(&[0xEE; 1000])?;
        let stats = storage.stats();
        println!(
            "   ✓ {} bytes in {} blocks (grew {} time(s), {:.1}% used)",
            stats.logical_size,
            stats.allocated_blocks,
            stats.grow_count,
            stats.utilization()
        );

        println!("5. Closing...");
        let path = storage.backing_path();
        storage.close()?;
        if let Some(path) = path {
            println!("   ✓ Temp file removed: {}", !path.exists());
        } else {
            println!("   ✓ Memory released");
        }
        println!();
    }

    // Larger blocks and an up-front reservation
    println!("--- builder ---");
    let storage = BlockStorageBuilder::new(BlockStorageKind::OffHeap)
        .block_size(4096)
        .initial_blocks(0)
        .build()?;
    storage.reserve_blocks(16)?;
    println!(
        "   ✓ Reserved {} blocks ({} bytes)",
        storage.allocated_blocks(),
        storage.capacity()
    );
    println!("   Stats: {}", storage.stats().to_json()?);

    println!("\n=== Example Complete ===");
    Ok(())
}
