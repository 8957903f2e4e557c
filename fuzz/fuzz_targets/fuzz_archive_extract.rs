// Run locally (from the repo root):
//   cargo +nightly fuzz run fuzz_archive_extract -- -runs=10000
#![no_main]

use std::io::Write;

use libfuzzer_sys::fuzz_target;
use vintage_archive::{Archive, ExtensionFilter};
use walkdir::WalkDir;

const MAX_ARCHIVE_SIZE: usize = 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_ARCHIVE_SIZE)];

    let mut tmp = tempfile::Builder::new()
        .prefix("fuzz_archive_extract")
        .tempfile()
        .expect("failed to create tempfile");
    tmp.write_all(data).expect("failed to write archive bytes");
    tmp.flush().expect("failed to flush archive bytes");

    let dest = tempfile::tempdir().expect("failed to create tempdir");
    let filter = ExtensionFilter::new(["py"]);

    // Malformed archives are expected to fail; escaping `dest` or writing
    // unfiltered files is not.
    if Archive::new(tmp.path())
        .extract_filtered(dest.path(), &filter)
        .is_err()
    {
        return;
    }
    for entry in WalkDir::new(dest.path()).follow_links(false) {
        let entry = entry.expect("extracted tree is readable");
        assert!(entry.path().starts_with(dest.path()));
        if entry.file_type().is_file() {
            assert!(filter.matches(entry.path()), "unfiltered {:?}", entry.path());
        }
        assert!(!entry.path_is_symlink(), "symlink {:?}", entry.path());
    }
});
