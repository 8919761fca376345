#![allow(dead_code)]

use std::path::PathBuf;

/// Read the bundle directory from `GLOBESTORE_BUNDLE_PATH`.
///
/// Panics with an informative message if the variable is unset or empty.
pub fn bundle_path() -> PathBuf {
    let path = std::env::var("GLOBESTORE_BUNDLE_PATH").expect(
        "GLOBESTORE_BUNDLE_PATH environment variable not set.\n\
         Set it to a bundle directory (one containing bundle.hdr), e.g.:\n\
         export GLOBESTORE_BUNDLE_PATH=\"/gevol/assets/imagery.kip/bundle\"",
    );
    assert!(!path.is_empty(), "GLOBESTORE_BUNDLE_PATH is empty");
    let p = PathBuf::from(&path);
    assert!(p.exists(), "GLOBESTORE_BUNDLE_PATH does not exist: {path}");
    p
}

/// Number of bytes to dump, from `GLOBESTORE_DUMP_BYTES` (default 64).
pub fn dump_bytes() -> usize {
    std::env::var("GLOBESTORE_DUMP_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64)
}

/// Print a hex dump of `bytes`, capped at `max_bytes`.
pub fn hex_dump(bytes: &[u8], max_bytes: usize) {
    let len = bytes.len().min(max_bytes);
    for (i, chunk) in bytes[..len].chunks(16).enumerate() {
        let offset = i * 16;
        let spaced = chunk
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|b| {
                if b.is_ascii_graphic() || *b == b' ' {
                    *b as char
                } else {
                    '.'
                }
            })
            .collect();
        println!("  {offset:08x}  {spaced:<48}  {ascii}");
    }
    if bytes.len() > max_bytes {
        println!("  ... ({} more bytes)", bytes.len() - max_bytes);
    }
}
