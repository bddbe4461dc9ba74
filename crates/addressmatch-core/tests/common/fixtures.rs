//! Test fixture loading utilities

use std::path::PathBuf;

use addressmatch_core::Record;

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// Path of the small restaurant listing used by the pipeline tests
#[allow(dead_code)]
pub fn restaurants_csv() -> PathBuf {
    fixture_path("restaurants.csv")
}

/// Records with the given ids and placeholder fields
#[allow(dead_code)]
pub fn records(ids: &[&str]) -> Vec<Record> {
    ids.iter()
        .map(|id| Record::new(*id, format!("restaurant {}", id), "1 high street", None))
        .collect()
}
