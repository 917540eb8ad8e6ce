//! CRC-32 over a page's data region (spec.md §3: "a CRC of the data
//! region") and over overflow-page value bytes (§4.3 step 3, §6
//! `OverflowPage` header).

/// Compute the CRC-32 checksum of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_zero_crc() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn same_input_same_crc() {
        let data = b"storage engine page bytes";
        assert_eq!(crc32(data), crc32(data));
    }

    #[test]
    fn different_input_different_crc() {
        assert_ne!(crc32(b"abc"), crc32(b"abd"));
    }
}
