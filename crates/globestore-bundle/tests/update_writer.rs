#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

//! Extending existing bundles and importing legacy pack files.

use globestore_bundle::{
    BundleConfig, BundleError, FileBundleReader, FileBundleWriter, SegmentKind,
};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn update_writer_appends_new_segment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BundleConfig::default().with_segment_break(500);
    let mut writer = FileBundleWriter::create(dir.path(), &config).expect("create");
    let old = writer.write_append(b"existing record").expect("append");
    writer.close().expect("close");

    // The stored break wins over the configured one.
    let update_config = BundleConfig::default().with_segment_break(9999);
    let mut update = FileBundleWriter::open_update(dir.path(), &update_config).expect("update");
    assert_eq!(update.segment_break(), 500);
    assert_eq!(update.segment_count(), 2);
    assert_eq!(update.segments()[0].kind(), SegmentKind::Reader);
    assert_eq!(update.segments()[1].kind(), SegmentKind::Writer);

    // Old data stays readable but not writable.
    assert_eq!(update.read_at_vec(old, 15).expect("old data"), b"existing record");
    assert!(!update.is_writeable(old));
    assert!(matches!(
        update.write_at(old, b"X"),
        Err(BundleError::Internal(_))
    ));

    let new = update.write_append(b"new record").expect("append");
    assert_eq!(new, 500);
    update.close().expect("close");

    let reader = FileBundleReader::open(dir.path()).expect("open");
    assert_eq!(reader.segment_list(), vec!["bundle.0000", "bundle.0001"]);
    assert_eq!(reader.read_at_vec(old, 15).expect("old"), b"existing record");
    assert_eq!(reader.read_at_vec(new, 10).expect("new"), b"new record");
}

#[test]
fn update_requires_existing_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(FileBundleWriter::open_update(dir.path(), &BundleConfig::default()).is_err());
}

#[test]
fn pack_import_wraps_legacy_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("pack.0000"), vec![0xAA; 300]).expect("pack 0");
    fs::write(dir.path().join("pack.0001"), vec![0xBB; 200]).expect("pack 1");
    fs::write(dir.path().join("notes.txt"), b"ignored").expect("other file");

    let mut import = FileBundleWriter::import_pack(dir.path(), 400).expect("import");
    assert_eq!(import.segment_list(), vec!["pack.0000", "pack.0001"]);
    assert_eq!(import.data_size(), 500);
    assert!(matches!(
        import.write_append(b"nope"),
        Err(BundleError::Internal(_))
    ));

    // Linear offset 350 is 50 bytes into the second pack file.
    let pos = import.linear_to_bundle_position(350).expect("linear");
    assert_eq!(pos, 450);
    import.close().expect("close");

    let reader = FileBundleReader::open(dir.path()).expect("open imported bundle");
    assert_eq!(reader.read_at_vec(pos, 4).expect("read"), vec![0xBB; 4]);
    assert_eq!(reader.read_at_vec(0, 4).expect("read"), vec![0xAA; 4]);
}

#[test]
fn pack_import_rejects_bad_input() {
    let empty = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        FileBundleWriter::import_pack(empty.path(), 400),
        Err(BundleError::Config(_))
    ));

    let oversized = tempfile::tempdir().expect("tempdir");
    fs::write(oversized.path().join("pack.0000"), vec![0u8; 401]).expect("pack");
    let err = FileBundleWriter::import_pack(oversized.path(), 400).expect_err("too large");
    assert!(err.to_string().contains("segment break 400"));
}

#[test]
fn close_no_update_leaves_pack_directory_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("pack.0000"), vec![1u8; 10]).expect("pack");
    let mut import = FileBundleWriter::import_pack(dir.path(), 100).expect("import");
    import.close_no_update().expect("close");
    assert!(!dir.path().join(globestore_bundle::HEADER_FILE_NAME).exists());
}
