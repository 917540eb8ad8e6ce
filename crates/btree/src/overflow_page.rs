//! Multi-page spill for values too large to inline on a leaf (spec.md §4.3
//! step 3, §6 "OverflowPage").

use common::{DbError, DbResult, PageId};
use storage::{crc32, PageFile};

/// Bytes reserved ahead of the value payload in a written run: a `u32`
/// value length followed by a `u32` CRC, both little-endian.
const HEADER_LEN: usize = 8;

/// An in-memory view of a materialised overflow run: header plus value
/// bytes, padded to a whole number of pages by the caller before writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverflowPage {
    pub crc32: u32,
    pub page_count: u16,
    pub value: Vec<u8>,
}

impl OverflowPage {
    /// Build an overflow run for `value`, computing its CRC and the page
    /// count needed to hold it plus its header (`ceil((len + 8) /
    /// page_size)`, spec.md §8 property 6).
    pub fn build(value: Vec<u8>, page_size: usize) -> Self {
        let crc = crc32(&value);
        let page_count = (value.len() + HEADER_LEN).div_ceil(page_size).max(1) as u16;
        OverflowPage { crc32: crc, page_count, value }
    }

    /// Verify the stored CRC against the value bytes, surfacing a
    /// [`common::DbError::Corrupt`] on mismatch (spec.md §8 property 6).
    pub fn verify(&self) -> DbResult<()> {
        if crc32(&self.value) != self.crc32 {
            return Err(common::DbError::Corrupt);
        }
        Ok(())
    }

    /// Write this run to `page_count` consecutive pages starting at
    /// `start`, one `page_size` buffer per page: `PageFile` has no
    /// multi-page write primitive, so the header-plus-value blob is chunked
    /// by hand instead of going through `tree.rs`'s single-page-bounded
    /// `encode_page`.
    pub fn write_to(&self, file: &mut PageFile, start: PageId, page_size: usize) -> DbResult<()> {
        let mut buf = vec![0u8; self.page_count as usize * page_size];
        buf[0..4].copy_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.crc32.to_le_bytes());
        buf[HEADER_LEN..HEADER_LEN + self.value.len()].copy_from_slice(&self.value);
        for i in 0..self.page_count as u32 {
            let offset = i as usize * page_size;
            file.write_page(PageId(start.0 + i), &buf[offset..offset + page_size])?;
        }
        Ok(())
    }

    /// Read a run back from `page_count` consecutive pages starting at
    /// `start`. Does not call [`verify`](Self::verify); callers check the
    /// CRC themselves once the run is reassembled.
    pub fn read_from(file: &mut PageFile, start: PageId, page_count: u16, page_size: usize) -> DbResult<Self> {
        let mut buf = vec![0u8; page_count as usize * page_size];
        for i in 0..page_count as u32 {
            let offset = i as usize * page_size;
            let mut chunk = vec![0u8; page_size];
            file.read_page(PageId(start.0 + i), &mut chunk)?;
            buf[offset..offset + page_size].copy_from_slice(&chunk);
        }
        if buf.len() < HEADER_LEN {
            return Err(DbError::Corrupt);
        }
        let len = u32::from_le_bytes(buf[0..4].try_into().map_err(|_| DbError::Corrupt)?) as usize;
        let crc32 = u32::from_le_bytes(buf[4..8].try_into().map_err(|_| DbError::Corrupt)?);
        if HEADER_LEN + len > buf.len() {
            return Err(DbError::Corrupt);
        }
        let value = buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        Ok(OverflowPage { crc32, page_count, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        let page = OverflowPage::build(vec![0u8; 8193], 8192);
        assert_eq!(page.page_count, 2);
    }

    #[test]
    fn verify_detects_corruption() {
        let mut page = OverflowPage::build(vec![1, 2, 3], 8192);
        page.value[0] = 0xFF;
        assert!(page.verify().is_err());
    }

    #[test]
    fn verify_accepts_intact_value() {
        let page = OverflowPage::build(vec![5; 100], 8192);
        assert!(page.verify().is_ok());
    }

    #[test]
    fn write_then_read_round_trips_a_single_page_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = PageFile::open(dir.path().join("overflow.dat"), 256).unwrap();
        let page = OverflowPage::build(b"hello overflow".to_vec(), 256);
        page.write_to(&mut file, PageId(3), 256).unwrap();

        let read_back = OverflowPage::read_from(&mut file, PageId(3), page.page_count, 256).unwrap();
        read_back.verify().unwrap();
        assert_eq!(read_back.value, b"hello overflow");
    }

    #[test]
    fn write_then_read_round_trips_a_value_spanning_several_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = PageFile::open(dir.path().join("overflow.dat"), 64).unwrap();
        let value: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let page = OverflowPage::build(value.clone(), 64);
        assert!(page.page_count > 1);
        page.write_to(&mut file, PageId(1), 64).unwrap();

        let read_back = OverflowPage::read_from(&mut file, PageId(1), page.page_count, 64).unwrap();
        read_back.verify().unwrap();
        assert_eq!(read_back.value, value);
    }
}
