//! Crate-level integration tests tying the allocator, page file, and CRC
//! helper together the way `buffer`/`btree` will use them in concert.

use super::*;
use std::path::PathBuf;

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("storage_crate_tests_{}_{}", std::process::id(), name));
    p
}

#[test]
fn allocated_page_round_trips_through_file_with_matching_crc() {
    let path = tmp_path("round_trip_crc");
    let _ = std::fs::remove_file(&path);

    let allocator = PageAllocator::default();
    let mut buf = allocator.apply(PAGE_SIZE).unwrap();
    buf[0..4].copy_from_slice(b"ABCD");
    let original_crc = crc32(&buf);

    let mut pf = PageFile::open(&path, PAGE_SIZE).unwrap();
    pf.write_page(common::PageId(0), &buf).unwrap();

    let mut read_back = vec![0u8; PAGE_SIZE];
    pf.read_page(common::PageId(0), &mut read_back).unwrap();
    assert_eq!(crc32(&read_back), original_crc);

    allocator.release(buf, PAGE_SIZE);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn pool_serves_pages_from_a_shared_file() {
    let path = tmp_path("pool_shared");
    let _ = std::fs::remove_file(&path);

    let pool = PageFilePool::new(&path, PAGE_SIZE, 2);
    {
        let mut handle = pool.acquire().unwrap();
        let buf = vec![9u8; PAGE_SIZE];
        handle.write_page(common::PageId(1), &buf).unwrap();
    }
    {
        let mut handle = pool.acquire().unwrap();
        let mut out = vec![0u8; PAGE_SIZE];
        handle.read_page(common::PageId(1), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 9));
    }
    let _ = std::fs::remove_file(&path);
}
