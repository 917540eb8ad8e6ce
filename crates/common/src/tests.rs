use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.page_size, 8192);
    assert_eq!(cfg.max_page_file_count, 8);
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::RepeatedRecord;
    assert!(format!("{err}").contains("5002"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

#[test]
fn page_id_round_trips_through_offset() {
    let id = PageId(10);
    assert_eq!(id.offset(5), PageId(15));
    assert!(PAGE_NULL_POINTER.is_null());
}
