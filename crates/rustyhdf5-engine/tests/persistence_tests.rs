//! On-disk persistence of MemoryEngine file images.

use std::path::Path;

use rustyhdf5_engine::{
    Engine, EngineError, MemoryEngine, ObjectKind, OpenMode, ReadBuffer, Shape, TypeClass,
    WriteBuffer,
};

fn write_ints(engine: &MemoryEngine, group: rustyhdf5_engine::Hid, name: &str, data: &[i64]) {
    let space = engine
        .dataspace_create(&Shape::vector(data.len() as u64))
        .unwrap();
    let ds = engine
        .dataset_create(group, name, TypeClass::Integer, space)
        .unwrap();
    engine.dataset_write(ds, WriteBuffer::Integer(data)).unwrap();
    engine.dataset_close(ds).unwrap();
    engine.dataspace_close(space).unwrap();
}

#[test]
fn create_writes_an_empty_file_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.rh5");
    let engine = MemoryEngine::new();
    let file = engine.file_create(&path).unwrap();
    assert!(path.exists());
    engine.file_close(file).unwrap();

    let file = engine.file_open(&path, OpenMode::ReadOnly).unwrap();
    let root = engine.group_open_root(file).unwrap();
    assert_eq!(engine.link_count(root).unwrap(), 0);
    engine.group_close(root).unwrap();
    engine.file_close(file).unwrap();
}

#[test]
fn tree_survives_a_fresh_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.rh5");

    {
        let engine = MemoryEngine::new();
        let file = engine.file_create(&path).unwrap();
        let root = engine.group_open_root(file).unwrap();
        let params = engine.group_create(root, "params").unwrap();
        write_ints(&engine, params, "counts", &[1, 2, 3]);
        let ds = engine.object_open(params, "counts").unwrap();
        engine.attr_write_string(ds, "units", "items").unwrap();
        engine.object_close(ds).unwrap();
        engine.group_close(params).unwrap();
        engine.group_close(root).unwrap();
        engine.file_close(file).unwrap();
    }

    let engine = MemoryEngine::new();
    let file = engine.file_open(&path, OpenMode::ReadOnly).unwrap();
    let root = engine.group_open_root(file).unwrap();
    let params = engine.group_open(root, "params").unwrap();
    let ds = engine.object_open(params, "counts").unwrap();
    assert_eq!(engine.object_kind(ds).unwrap(), ObjectKind::Dataset);
    let mut out = vec![0i64; 3];
    engine.dataset_read(ds, ReadBuffer::Integer(&mut out)).unwrap();
    assert_eq!(out, vec![1, 2, 3]);
    assert_eq!(
        engine.attr_read_string(ds, "units").unwrap().as_deref(),
        Some("items")
    );
    engine.object_close(ds).unwrap();
    engine.group_close(params).unwrap();
    engine.group_close(root).unwrap();
    engine.file_close(file).unwrap();
}

#[test]
fn image_is_flushed_only_after_last_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.rh5");
    let engine = MemoryEngine::new();
    let file = engine.file_create(&path).unwrap();
    let root = engine.group_open_root(file).unwrap();
    write_ints(&engine, root, "n", &[23]);

    // file handle gone, root group still open: nothing flushed yet
    engine.file_close(file).unwrap();
    assert!(engine.is_file_open(&path));
    let reader = MemoryEngine::new();
    let f = reader.file_open(&path, OpenMode::ReadOnly).unwrap();
    let r = reader.group_open_root(f).unwrap();
    assert!(!reader.link_exists(r, "n").unwrap());
    reader.group_close(r).unwrap();
    reader.file_close(f).unwrap();

    engine.group_close(root).unwrap();
    assert!(!engine.is_file_open(&path));
    let f = reader.file_open(&path, OpenMode::ReadOnly).unwrap();
    let r = reader.group_open_root(f).unwrap();
    assert!(reader.link_exists(r, "n").unwrap());
    reader.group_close(r).unwrap();
    reader.file_close(f).unwrap();
}

#[test]
fn create_truncates_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trunc.rh5");
    let engine = MemoryEngine::new();

    let file = engine.file_create(&path).unwrap();
    let root = engine.group_open_root(file).unwrap();
    write_ints(&engine, root, "old", &[1]);
    engine.group_close(root).unwrap();
    engine.file_close(file).unwrap();

    let file = engine.file_create(&path).unwrap();
    let root = engine.group_open_root(file).unwrap();
    assert!(!engine.link_exists(root, "old").unwrap());
    engine.group_close(root).unwrap();
    engine.file_close(file).unwrap();
}

#[test]
fn open_rejects_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.bin");
    std::fs::write(&path, b"definitely not an image").unwrap();
    let engine = MemoryEngine::new();
    let err = engine.file_open(&path, OpenMode::ReadOnly).unwrap_err();
    assert!(matches!(err, EngineError::Corrupt(_)));
}

#[test]
fn open_missing_path_fails() {
    let engine = MemoryEngine::new();
    let err = engine
        .file_open(Path::new("/definitely/not/here.rh5"), OpenMode::ReadWrite)
        .unwrap_err();
    assert!(matches!(err, EngineError::FileNotFound(_)));
}
