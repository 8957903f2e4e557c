use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use vintage_archive::ExtensionFilter;
use vintage_core::VersionBucket;
use vintage_detect::{aggregate, detect_tree, source_files, DetectOptions, Detector, DetectorError};

/// Reports the `#!`-prefixed lines of each file; panics on `boom.py` and
/// fails on `fail.py`.
struct EchoDetector;

impl Detector for EchoDetector {
    fn detect(&self, path: &Path) -> Result<String, DetectorError> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("boom.py") => panic!("detector exploded on {}", path.display()),
            Some("fail.py") => Err(DetectorError::Failed("exit status: 1".into())),
            _ => {
                let text = fs::read_to_string(path).map_err(|e| DetectorError::Spawn(e.to_string()))?;
                Ok(text
                    .lines()
                    .filter_map(|l| l.strip_prefix("#!"))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "pkg/a.py", "#!L1: 'argparse' module requires 2.7, 3.2\nimport argparse\n");
    write(root, "pkg/sub/b.PY", "#!L1: f-strings require !2, 3.6\n");
    write(root, "pkg/boom.py", "#!L1: f-strings require !2, 3.6\n");
    write(root, "pkg/fail.py", "");
    write(root, "pkg/notes.txt", "#!L1: f-strings require !2, 3.6\n");
    tmp
}

fn options(concurrency: usize) -> DetectOptions {
    DetectOptions {
        concurrency,
        filter: ExtensionFilter::new(["py"]),
    }
}

#[test]
fn source_files_are_filtered_and_sorted() {
    let tmp = fixture();
    let files: Vec<_> = source_files(tmp.path(), &ExtensionFilter::new(["py"]))
        .into_iter()
        .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
        .collect();
    let expected: Vec<std::path::PathBuf> = ["pkg/a.py", "pkg/boom.py", "pkg/fail.py", "pkg/sub/b.PY"]
        .iter()
        .map(Into::into)
        .collect();
    assert_eq!(files, expected);
}

#[test]
fn per_file_failures_do_not_abort_the_tree() {
    let tmp = fixture();
    for concurrency in [1, 4] {
        let detection = detect_tree(tmp.path(), &EchoDetector, &options(concurrency));

        assert_eq!(detection.reports.len(), 2, "concurrency {concurrency}");
        let mut failed: Vec<_> = detection
            .failures
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        failed.sort();
        assert_eq!(failed, ["boom.py", "fail.py"]);
        let boom = detection
            .failures
            .iter()
            .find(|f| f.path.ends_with("boom.py"))
            .unwrap();
        assert!(boom.message.contains("detector exploded"), "{}", boom.message);

        let agg = aggregate(&detection.reports);
        assert_eq!(agg.count(VersionBucket::new(2, 7), "'argparse' module"), 1);
        assert_eq!(agg.count(VersionBucket::new(3, 6), "f-strings"), 1);
        assert_eq!(agg.total(), 3);
    }
}

#[test]
fn parallel_and_sequential_detection_agree() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..32 {
        write(
            tmp.path(),
            &format!("m{i:02}.py"),
            &"#!L1: 'pathlib' module requires !2, 3.4\n".repeat(i + 1),
        );
    }
    let sequential = detect_tree(tmp.path(), &EchoDetector, &options(1));
    let parallel = detect_tree(tmp.path(), &EchoDetector, &options(8));
    assert_eq!(sequential, parallel);
    assert_eq!(
        aggregate(&parallel.reports).count(VersionBucket::new(3, 4), "'pathlib' module"),
        (1..=32).sum::<u64>()
    );
}
