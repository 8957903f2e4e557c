use std::io::Write;

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use flate2::{write::GzEncoder, Compression};
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

fn vintage() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vintage"));
    cmd.env_remove("VINTAGE_CONFIG_PATH")
        .env_remove("VINTAGE_CACHE_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Config pointing the detector at the fixture binary and the registry at `endpoint`.
fn write_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let detector = env!("CARGO_BIN_EXE_vintage-cli-test-detector");
    let config = dir.child("vintage.toml");
    config
        .write_str(&format!(
            r#"[detector]
program = '{detector}'
args = []
concurrency = 2

[logging]
level = "warn"

{extra}
"#
        ))
        .unwrap();
    config.path().to_path_buf()
}

fn sdist(files: &[(&str, String)]) -> Vec<u8> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    let mut gz = builder.into_inner().unwrap();
    gz.flush().unwrap();
    gz.finish().unwrap()
}

struct Registry {
    server: MockServer,
}

impl Registry {
    /// `samplepkg` with two major releases: 1.0 uses 2.7/3.2-era modules,
    /// 2.0 only f-strings.
    fn start() -> Self {
        let server = MockServer::start();
        let file = |version: &str, uploaded: &str| {
            json!([{
                "packagetype": "sdist",
                "url": server.url(format!("/files/samplepkg-{version}.tar.gz")),
                "filename": format!("samplepkg-{version}.tar.gz"),
                "upload_time_iso_8601": uploaded,
                "requires_python": null
            }])
        };
        let document = json!({
            "info": {"name": "samplepkg"},
            "releases": {
                "1.0": file("1.0", "2015-06-01T12:00:00Z"),
                "1.5": file("1.5", "2016-03-01T12:00:00Z"),
                "2.0": file("2.0", "2017-01-01T12:00:00Z"),
            }
        });
        server.mock(|when, then| {
            when.method(GET).path("/pypi/samplepkg/json");
            then.status(200).json_body(document);
        });
        server.mock(|when, then| {
            when.method(GET).path("/pypi/missing/json");
            then.status(404);
        });
        Self { server }
    }

    fn serve_release(&self, version: &str, source: &str) -> httpmock::Mock<'_> {
        let body = sdist(&[(
            &format!("samplepkg-{version}/samplepkg/core.py"),
            source.to_owned(),
        )]);
        self.server.mock(|when, then| {
            when.method(GET)
                .path(format!("/files/samplepkg-{version}.tar.gz"));
            then.status(200).body(body);
        })
    }

    fn config(&self, dir: &TempDir) -> std::path::PathBuf {
        self.config_with(dir, "")
    }

    /// Like [`Registry::config`], with extra `[registry]` keys.
    fn config_with(&self, dir: &TempDir, registry_keys: &str) -> std::path::PathBuf {
        write_config(
            dir,
            &format!(
                "[registry]\nendpoint = '{}'\npopularity_feed_url = '{}'\n{registry_keys}\n",
                self.server.url("/pypi"),
                self.server.url("/feed.json")
            ),
        )
    }
}

const RELEASE_1_0: &str = "\
#!L1: 'argparse' module requires 2.7, 3.2
#!L2: 'argparse' module requires 2.7, 3.2
#!L3: 'argparse' module requires 2.7, 3.2
#!L4: 'argparse' module requires 2.7, 3.2
#!L5: 'argparse' module requires 2.7, 3.2
#!L9: 'pathlib' module requires !2, 3.4
import argparse
";

const RELEASE_2_0: &str = "\
#!L1: f-strings require !2, 3.6
print(f'{__name__}')
";

#[test]
fn help_mentions_core_commands() {
    vintage().arg("--help").assert().success().stdout(
        predicate::str::contains("analyze")
            .and(predicate::str::contains("releases"))
            .and(predicate::str::contains("features")),
    );
}

#[test]
fn features_json_aggregates_a_local_tree() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "");
    let src = temp.child("src");
    src.child("pkg/a.py")
        .write_str(
            "#!L1: f-strings require !2, 3.6\n#!L2: f-strings require !2, 3.6\n#!|noise\n",
        )
        .unwrap();
    src.child("pkg/b.py")
        .write_str("#!L3 C0: 'argparse' module requires 2.7, 3.2\n")
        .unwrap();
    src.child("README.txt")
        .write_str("#!L1: f-strings require !2, 3.6\n")
        .unwrap();

    let output = vintage()
        .arg("--config")
        .arg(&config)
        .arg("features")
        .arg(src.path())
        .arg("--json")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["files_analyzed"], 2);
    assert_eq!(v["total_constructs"], 4);
    assert_eq!(v["aggregate"]["3.6"]["f-strings"], 2);
    assert_eq!(v["aggregate"]["2.7"]["'argparse' module"], 1);
    assert_eq!(v["aggregate"]["3.2"]["'argparse' module"], 1);
    assert_eq!(v["most_common"]["3.6"]["construct"], "f-strings");
    assert!(v["failures"].as_array().unwrap().is_empty());
}

#[test]
fn features_reports_files_the_detector_cannot_handle() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "");
    let src = temp.child("src");
    src.child("ok.py")
        .write_str("#!L1: f-strings require !2, 3.6\n")
        .unwrap();
    src.child("crash.py").write_str("#!crash\n").unwrap();

    vintage()
        .arg("--config")
        .arg(&config)
        .arg("features")
        .arg(src.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("files_analyzed: 1")
                .and(predicate::str::contains("most common: f-strings (1)"))
                .and(predicate::str::contains("crash.py"))
                .and(predicate::str::contains("simulated crash")),
        );
}

#[test]
fn analyze_json_end_to_end_uses_the_cache_on_rerun() {
    let registry = Registry::start();
    let v1 = registry.serve_release("1.0", RELEASE_1_0);
    let v2 = registry.serve_release("2.0", RELEASE_2_0);
    let temp = TempDir::new().unwrap();
    let config = registry.config(&temp);
    let cache = temp.child("cache");

    let run = || {
        vintage()
            .arg("--config")
            .arg(&config)
            .arg("analyze")
            .arg("samplepkg")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--json")
            .output()
            .unwrap()
    };

    let output = run();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let package = &v["packages"][0];
    assert_eq!(package["status"], "analyzed");
    assert_eq!(package["package"], "samplepkg");

    // 1.5 is not a major release.
    let releases = package["releases"].as_array().unwrap();
    assert_eq!(releases.len(), 2);
    assert_eq!(releases[0]["version"], "1.0");
    assert_eq!(releases[0]["status"], "signature");
    assert_eq!(releases[0]["upload_date"], "2015-06-01");
    assert_eq!(releases[0]["total_constructs"], 11);
    assert_eq!(releases[0]["signature"]["2.7"], 1.0);
    assert_eq!(releases[0]["signature"]["3.2"], 1.0);
    assert_eq!(releases[0]["signature"]["3.4"], 0.2);
    assert_eq!(releases[1]["signature"]["3.6"], 1.0);
    assert!(cache.child("results/samplepkg/1.0.json").path().is_file());

    let rerun = run();
    assert!(rerun.status.success());
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&rerun.stdout).unwrap(),
        v
    );
    v1.assert_hits(1);
    v2.assert_hits(1);
}

#[test]
fn artifact_downloads_send_the_configured_user_agent() {
    let registry = Registry::start();
    let downloads: Vec<_> = [("1.0", RELEASE_1_0), ("2.0", RELEASE_2_0)]
        .into_iter()
        .map(|(version, source)| {
            let body = sdist(&[(
                &format!("samplepkg-{version}/samplepkg/core.py"),
                source.to_owned(),
            )]);
            registry.server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/files/samplepkg-{version}.tar.gz"))
                    .header("user-agent", "vintage-e2e/1");
                then.status(200).body(body);
            })
        })
        .collect();
    let temp = TempDir::new().unwrap();
    let config = registry.config_with(&temp, "user_agent = 'vintage-e2e/1'");

    let output = vintage()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "samplepkg", "--json", "--cache-dir"])
        .arg(temp.child("cache").path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["packages"][0]["releases"][1]["status"], "signature");
    for download in &downloads {
        download.assert_hits(1);
    }
}

#[test]
fn debug_logging_reports_the_loaded_config() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "");
    let tree = temp.child("tree");
    tree.create_dir_all().unwrap();

    vintage()
        .env("RUST_LOG", "vintage.config=debug")
        .arg("--config")
        .arg(&config)
        .arg("features")
        .arg(tree.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded config"));
}

#[test]
fn analyze_human_output_and_release_filters() {
    let registry = Registry::start();
    registry.serve_release("1.0", RELEASE_1_0);
    registry.serve_release("1.5", RELEASE_2_0);
    let v2 = registry.serve_release("2.0", RELEASE_2_0);
    let temp = TempDir::new().unwrap();
    let config = registry.config(&temp);

    vintage()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "samplepkg", "--releases", "all", "--until", "2016-12-31"])
        .arg("--cache-dir")
        .arg(temp.child("cache").path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("samplepkg")
                .and(predicate::str::contains("2.7=1.00 3.2=1.00 3.4=0.20"))
                .and(predicate::str::contains("1.5"))
                .and(predicate::str::contains("3.6=1.00"))
                .and(predicate::str::contains("anomaly: 3.6 released 2016-12-23: f-strings"))
                .and(predicate::str::contains("2017-01-01").not()),
        );
    v2.assert_hits(0);
}

#[test]
fn analyze_exits_1_when_a_package_fails() {
    let registry = Registry::start();
    registry.serve_release("1.0", RELEASE_1_0);
    registry.serve_release("2.0", RELEASE_2_0);
    let temp = TempDir::new().unwrap();
    let config = registry.config(&temp);

    vintage()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "missing", "samplepkg"])
        .arg("--cache-dir")
        .arg(temp.child("cache").path())
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("missing: failed")
                .and(predicate::str::contains("3.6=1.00")),
        );
}

#[test]
fn analyze_top_reads_the_popularity_feed() {
    let registry = Registry::start();
    registry.serve_release("1.0", RELEASE_1_0);
    registry.serve_release("2.0", RELEASE_2_0);
    let feed = registry.server.mock(|when, then| {
        when.method(GET).path("/feed.json");
        then.status(200).json_body(json!({
            "last_update": "2024-01-01 00:00:00",
            "rows": [
                {"download_count": 100, "project": "samplepkg"},
                {"download_count": 50, "project": "missing"}
            ]
        }));
    });
    let temp = TempDir::new().unwrap();
    let config = registry.config(&temp);

    let output = vintage()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "--top", "1", "--json"])
        .arg("--cache-dir")
        .arg(temp.child("cache").path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    feed.assert();
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let packages = v["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0]["package"], "samplepkg");
}

#[test]
fn releases_lists_filtered_releases() {
    let registry = Registry::start();
    let temp = TempDir::new().unwrap();
    let config = registry.config(&temp);

    let output = vintage()
        .arg("--config")
        .arg(&config)
        .args(["releases", "samplepkg", "--releases", "all", "--until", "2016-12-31", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let versions: Vec<_> = v["releases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["version"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(versions, ["1.0", "1.5"]);
    assert_eq!(v["releases"][0]["newest_python"], "3.4");
    assert_eq!(v["releases"][1]["newest_python"], "3.5");
}

#[test]
fn fatal_errors_exit_2() {
    let temp = TempDir::new().unwrap();
    let bad = temp.child("bad.toml");
    bad.write_str("[detector]\nnot_a_key = 1\n").unwrap();

    vintage()
        .arg("--config")
        .arg(bad.path())
        .args(["features", "."])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse toml config"));

    let config = write_config(&temp, "");
    vintage()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "--top-by-size", "5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("size_feed_url"));

    vintage()
        .args(["releases", "samplepkg", "--until", "yesterday"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}
