use std::fs;

use pretty_assertions::assert_eq;
use vintage_cache::{CacheConfig, CacheDir, ResultCache};
use vintage_core::{FeatureAggregate, VersionBucket};

fn result_cache(root: &std::path::Path) -> ResultCache {
    ResultCache::new(CacheDir::new(CacheConfig::with_root(root)).unwrap())
}

fn v(s: &str) -> VersionBucket {
    s.parse().unwrap()
}

#[test]
fn store_then_load_returns_equal_aggregate() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = result_cache(tmp.path());

    let mut agg = FeatureAggregate::new();
    agg.add(v("2.7"), "'argparse' module", 5);
    agg.add(v("3.4"), "'pathlib' module", 1);

    cache.store("samplepkg", "1.0", &agg).unwrap();
    assert_eq!(cache.load("samplepkg", "1.0"), Some(agg));

    let on_disk = fs::read_to_string(cache.entry_path("samplepkg", "1.0").unwrap()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(parsed["2.7"]["'argparse' module"], 5);
}

#[test]
fn empty_aggregate_is_a_valid_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = result_cache(tmp.path());

    cache
        .store("samplepkg", "2.0", &FeatureAggregate::new())
        .unwrap();
    assert_eq!(cache.load("samplepkg", "2.0"), Some(FeatureAggregate::new()));
}

#[test]
fn missing_and_corrupt_entries_are_misses() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = result_cache(tmp.path());
    assert_eq!(cache.load("samplepkg", "1.0"), None);

    let path = cache.entry_path("samplepkg", "1.0").unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    fs::write(&path, "{\"3.6\": {\"f-strings\": ").unwrap();
    assert_eq!(cache.load("samplepkg", "1.0"), None);

    fs::write(&path, "{\"3.6\": {\"f-strings\": 0}}").unwrap();
    assert_eq!(cache.load("samplepkg", "1.0"), None);

    fs::write(&path, "{\"not-a-version\": {}}").unwrap();
    assert_eq!(cache.load("samplepkg", "1.0"), None);
}

#[test]
fn store_overwrites_previous_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = result_cache(tmp.path());

    let mut first = FeatureAggregate::new();
    first.record(v("3.6"), "f-strings");
    cache.store("samplepkg", "1.0", &first).unwrap();

    let mut second = FeatureAggregate::new();
    second.record(v("3.8"), "walrus operator");
    cache.store("samplepkg", "1.0", &second).unwrap();

    assert_eq!(cache.load("samplepkg", "1.0"), Some(second));
}

#[test]
fn entries_whose_counts_overflow_are_misses() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = result_cache(tmp.path());
    let path = cache.entry_path("samplepkg", "1.0").unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    fs::write(&path, r#"{"3.8": {"a": 18446744073709551615, "b": 1}}"#).unwrap();
    assert_eq!(cache.load("samplepkg", "1.0"), None);
}
