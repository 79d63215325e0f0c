mod common;

use common::*;
use oshandle::{Error, MemoryMap};
use rstest::rstest;

#[rstest]
fn maps_repeating_pattern() {
    init_logger();
    let path = fixture("pattern.bin", &[0xAB; 4096]);
    let mut map = MemoryMap::new(&path).unwrap();
    assert_eq!(map.size(), 4096);
    assert!(!map.addr().is_null());
    assert!(map.bytes().iter().all(|&b| b == 0xAB));

    map.clear().unwrap();
    assert_eq!(map.size(), 0);
    assert!(map.addr().is_null());
    assert!(!map.is_mapped());
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4095)]
#[case(4096)]
#[case(4097)]
#[case(65536 + 3)]
fn size_matches_file_length(#[case] len: usize) {
    let contents: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let path = fixture("sized.bin", &contents);
    let map = MemoryMap::new(&path).unwrap();
    assert!(map.is_mapped());
    assert_eq!(map.size(), len);
    assert_eq!(map.bytes().len(), len);
    assert_eq!(map.bytes(), &contents[..]);
    assert_eq!(map.is_empty(), len == 0);
}

#[rstest]
fn empty_file_is_mapped_without_bytes() {
    let path = fixture("empty.bin", &[]);
    let mut map = MemoryMap::new(&path).unwrap();
    assert!(map.is_mapped());
    assert_eq!(map.size(), 0);
    assert!(map.bytes().is_empty());
    assert!(map.as_ref().is_empty());
    map.clear().unwrap();
    assert!(!map.is_mapped());
}

#[rstest]
fn missing_file_fails() {
    let path = fresh_path("missing.bin");
    let err = MemoryMap::new(&path).err().unwrap();
    assert!(matches!(err, Error::Open { .. }));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(err.diagnostic().message().contains(name));
}

#[rstest]
fn path_with_nul_fails_to_open() {
    let mut path = fresh_path("nul.bin").into_os_string();
    path.push("\0x");
    let mut map: MemoryMap = MemoryMap::default();
    let err = map.map(&path).err().unwrap();
    assert!(matches!(err, Error::Open { .. }));
    assert!(err.diagnostic().message().contains("NUL"));
    assert!(!map.is_mapped());
}

#[rstest]
fn directory_fails_to_open() {
    let dir = fresh_path("dir");
    std::fs::create_dir_all(&dir).unwrap();
    let err = MemoryMap::new(&dir).err().unwrap();
    assert!(matches!(err, Error::Open { .. }));
    let name = dir.file_name().unwrap().to_str().unwrap();
    assert!(err.diagnostic().message().contains(name));
}

#[rstest]
fn failed_map_leaves_handle_unmapped() {
    let path = fixture("before.bin", b"mapped once");
    let mut map = MemoryMap::new(&path).unwrap();
    assert!(map.is_mapped());

    let err = map.map(fresh_path("missing.bin")).err().unwrap();
    assert!(matches!(err, Error::Open { .. }));
    assert!(!map.is_mapped());
    assert!(map.addr().is_null());
    assert_eq!(map.size(), 0);
}

#[rstest]
fn remap_replaces_view() {
    let first = fixture("first.bin", b"first file");
    let second = fixture("second.bin", b"the second file, a bit longer");
    let mut map = MemoryMap::new(&first).unwrap();
    assert_eq!(map.bytes(), b"first file");

    map.map(&second).unwrap();
    assert_eq!(map.bytes(), b"the second file, a bit longer");
}

#[rstest]
fn clear_twice_is_noop() {
    let path = fixture("twice.bin", b"abc");
    let mut map = MemoryMap::new(&path).unwrap();
    map.clear().unwrap();
    map.clear().unwrap();

    let mut never_mapped: MemoryMap = MemoryMap::default();
    never_mapped.clear().unwrap();
    never_mapped.clear().unwrap();
}

#[rstest]
fn take_leaves_source_unmapped() {
    let path = fixture("take.bin", &[7u8; 100]);
    let mut src = MemoryMap::new(&path).unwrap();
    let addr = src.addr();

    let dst = core::mem::take(&mut src);
    assert!(!src.is_mapped());
    assert!(src.addr().is_null());
    assert_eq!(src.size(), 0);
    assert_eq!(dst.addr(), addr);
    assert_eq!(dst.bytes(), &[7u8; 100][..]);
}

#[rstest]
fn move_assignment_replaces_destination() {
    let mut dst = MemoryMap::new(fixture("old.bin", b"old")).unwrap();
    assert_eq!(dst.bytes(), b"old");
    let src = MemoryMap::new(fixture("new.bin", b"new contents")).unwrap();
    dst = src;
    assert_eq!(dst.bytes(), b"new contents");
}

#[rstest]
fn view_outlives_unlinked_file() {
    // the mapping keeps its own reference to the file
    let path = fixture("deleted.bin", b"still here");
    let map = MemoryMap::new(&path).unwrap();
    #[cfg(unix)]
    std::fs::remove_file(&path).unwrap();
    assert_eq!(map.bytes(), b"still here");
}

#[rstest]
fn distinct_maps_across_threads() {
    std::thread::scope(|s| {
        for i in 0..4u8 {
            s.spawn(move || {
                let path = fixture("thread.bin", &[i; 512]);
                let map = MemoryMap::new(&path).unwrap();
                assert!(map.bytes().iter().all(|&b| b == i));
            });
        }
    });
}

#[rstest]
fn shared_map_is_readable_from_many_threads() {
    let path = fixture("shared.bin", &[0x5A; 8192]);
    let map = MemoryMap::new(&path).unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| assert_eq!(map.bytes().iter().filter(|&&b| b == 0x5A).count(), 8192));
        }
    });
}
