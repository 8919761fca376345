#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

//! Dump the header and segment table of a bundle.
//!
//! Usage:
//!   GLOBESTORE_BUNDLE_PATH=/path/to/bundle cargo run --example dump_bundle \
//!       -p globestore-bundle
//!
//! Set `RUST_LOG=debug` to see header loading, `GLOBESTORE_DUMP_BYTES` to
//! change how much of the first segment is printed.

mod common;

use globestore_bundle::FileBundleReader;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = common::bundle_path();
    let reader = FileBundleReader::open(&path).expect("failed to open bundle");

    println!("Bundle: {}", reader.path().display());
    println!("  header:          {} bytes", reader.header_size());
    println!("  original dir:    {}", reader.orig_path().display());
    println!("  segment break:   {}", reader.segment_break());
    println!("  data size:       {}", reader.data_size());
    println!("  relative paths:  {}", reader.was_relative_paths());
    println!();

    println!("{:>5}  {:<16} {:>12}  {:>16}  original dir", "#", "file", "size", "first address");
    for (i, segment) in reader.segments().iter().enumerate() {
        println!(
            "{i:>5}  {:<16} {:>12}  {:>16}  {}",
            segment.name(),
            segment.data_size(),
            i as u64 * reader.segment_break(),
            segment.orig_path().display()
        );
    }

    let mut manifest = Vec::new();
    reader
        .append_manifest(&mut manifest, None)
        .expect("failed to build manifest");
    println!("\nManifest:");
    for entry in &manifest {
        println!(
            "  {} <- {} ({} bytes)",
            entry.orig_path.display(),
            entry.current_path.display(),
            entry.data_size
        );
    }

    let max = common::dump_bytes();
    if let Some(first) = reader.segments().first() {
        let len = first.data_size().min(max as u64) as usize;
        if len > 0 {
            println!("\nFirst {len} bytes of {}:", first.name());
            let bytes = reader.read_at_vec(0, len).expect("failed to read");
            common::hex_dump(&bytes, max);
        }
    }
}
