use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::macros::format_description;
use time::Date;
use vintage_archive::ExtensionFilter;
use vintage_cache::{ArtifactCache, CacheConfig, CacheDir, HttpStore, ResultCache, SchemeStore};
use vintage_config::{init_tracing, VintageConfig};
use vintage_core::{FeatureAggregate, Release, ReleaseFilter, ReleaseSelection, VersionBucket};
use vintage_detect::{
    aggregate_parallel, default_concurrency, detect_tree, CommandDetector, DetectOptions,
};
use vintage_pipeline::{BatchReport, PackageOutcome, Pipeline, PipelineConfig, ReleaseOutcome};
use vintage_process::RunOptions;
use vintage_registry::{PypiRegistry, RankingFeed, Registry};
use vintage_signature::ReferenceVersionTable;

#[derive(Parser)]
#[command(
    name = "vintage",
    version,
    about = "Language-version signatures of PyPI packages across their release history"
)]
struct Cli {
    /// Configuration file (skips `vintage.toml` discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute signatures for packages from the registry
    Analyze(AnalyzeArgs),
    /// List the releases of a package that an analysis would use
    Releases(ReleasesArgs),
    /// Detect and aggregate constructs in a local source tree
    Features(FeaturesArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ReleaseKind {
    All,
    Major,
    Minor,
}

impl From<ReleaseKind> for ReleaseFilter {
    fn from(kind: ReleaseKind) -> Self {
        match kind {
            ReleaseKind::All => ReleaseFilter::All,
            ReleaseKind::Major => ReleaseFilter::Major,
            ReleaseKind::Minor => ReleaseFilter::Minor,
        }
    }
}

#[derive(Args)]
struct SelectionArgs {
    /// Which releases of each package to analyze
    #[arg(long, value_enum, default_value_t = ReleaseKind::Major)]
    releases: ReleaseKind,
    /// Ignore releases uploaded after this date (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    until: Option<Date>,
}

impl SelectionArgs {
    fn selection(&self) -> ReleaseSelection {
        ReleaseSelection {
            filter: self.releases.into(),
            uploaded_until: self.until,
        }
    }
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Package names
    #[arg(conflicts_with_all = ["top", "top_by_size"])]
    packages: Vec<String>,
    /// Analyze the N most downloaded packages
    #[arg(long, value_name = "N", conflicts_with = "top_by_size")]
    top: Option<usize>,
    /// Analyze the N largest packages (needs `registry.size_feed_url`)
    #[arg(long, value_name = "N")]
    top_by_size: Option<usize>,
    #[command(flatten)]
    selection: SelectionArgs,
    /// Discard extracted artifacts and download them again
    #[arg(long)]
    redownload: bool,
    /// Ignore cached results and run detection again
    #[arg(long)]
    recompute: bool,
    /// Detector worker threads
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Cache root (overrides `cache.root` and `VINTAGE_CACHE_DIR`)
    #[arg(long, value_name = "PATH")]
    cache_dir: Option<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReleasesArgs {
    package: String,
    #[command(flatten)]
    selection: SelectionArgs,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FeaturesArgs {
    /// Source tree to scan
    dir: PathBuf,
    /// Detector worker threads
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ReleaseListing {
    package: String,
    releases: Vec<ListedRelease>,
}

#[derive(Serialize)]
struct ListedRelease {
    #[serde(flatten)]
    release: Release,
    /// Newest language version already released when this release was uploaded.
    newest_python: Option<VersionBucket>,
}

#[derive(Serialize)]
struct MostCommon {
    construct: String,
    count: u64,
}

#[derive(Serialize)]
struct FeaturesReport {
    root: PathBuf,
    files_analyzed: usize,
    failures: Vec<FileFailure>,
    total_constructs: u64,
    aggregate: FeatureAggregate,
    most_common: BTreeMap<VersionBucket, MostCommon>,
}

#[derive(Serialize)]
struct FileFailure {
    path: PathBuf,
    message: String,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let (config, config_path) = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);
    if let Some(path) = &config_path {
        tracing::debug!(target: "vintage.config", path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Analyze(args) => {
            let names = package_names(&config, &args)?;
            let pipeline = build_pipeline(&config, &args)?;
            let batch = pipeline.run_batch(&names, &args.selection.selection());
            print_output(&batch, args.json)?;
            Ok(if batch.any_failed() { 1 } else { 0 })
        }
        Command::Releases(args) => {
            let registry = registry(&config);
            let package = registry
                .fetch_package(&args.package)
                .with_context(|| format!("failed to resolve {}", args.package))?;
            let selection = args.selection.selection();
            let reference = ReferenceVersionTable::python();
            let listing = ReleaseListing {
                releases: package
                    .select(&selection)
                    .map(|release| ListedRelease {
                        newest_python: reference
                            .released_by(release.upload_date())
                            .last()
                            .copied(),
                        release: release.clone(),
                    })
                    .collect(),
                package: package.name,
            };
            print_output(&listing, args.json)?;
            Ok(0)
        }
        Command::Features(args) => {
            if !args.dir.is_dir() {
                bail!("{} is not a directory", args.dir.display());
            }
            let detector = detector(&config);
            let options = detect_options(&config, args.jobs);
            let detection = detect_tree(&args.dir, &detector, &options);
            let aggregate = aggregate_parallel(&detection.reports);
            let most_common = aggregate
                .most_common_per_bucket()
                .into_iter()
                .map(|(bucket, (construct, count))| {
                    let construct = construct.to_owned();
                    (bucket, MostCommon { construct, count })
                })
                .collect();
            let report = FeaturesReport {
                root: args.dir,
                files_analyzed: detection.reports.len(),
                failures: detection
                    .failures
                    .into_iter()
                    .map(|f| FileFailure {
                        path: f.path,
                        message: f.message,
                    })
                    .collect(),
                total_constructs: aggregate.total(),
                aggregate,
                most_common,
            };
            print_output(&report, args.json)?;
            Ok(0)
        }
    }
}

/// The resolved configuration and the file it came from, if any.
fn load_config(explicit: Option<&Path>) -> Result<(VintageConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = VintageConfig::load_from_path(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }
    let cwd = std::env::current_dir().context("failed to determine the working directory")?;
    Ok(vintage_config::load_for_dir(&cwd)?)
}

fn registry_timeout(config: &VintageConfig) -> Option<Duration> {
    Some(Duration::from_millis(config.registry.timeout_ms)).filter(|t| !t.is_zero())
}

fn registry(config: &VintageConfig) -> PypiRegistry {
    PypiRegistry::new(
        &config.registry.endpoint,
        registry_timeout(config),
        &config.registry.user_agent,
    )
}

fn detector(config: &VintageConfig) -> CommandDetector {
    let section = &config.detector;
    let options = RunOptions {
        timeout: section.timeout_ms.map(Duration::from_millis),
        max_bytes: section.max_output_bytes,
        ..RunOptions::default()
    };
    CommandDetector::new(section.program.clone(), section.args.clone(), options)
}

fn detect_options(config: &VintageConfig, jobs: Option<usize>) -> DetectOptions {
    DetectOptions {
        concurrency: jobs
            .or(config.detector.concurrency)
            .unwrap_or_else(default_concurrency)
            .max(1),
        filter: ExtensionFilter::new(&config.detector.extensions),
    }
}

fn package_names(config: &VintageConfig, args: &AnalyzeArgs) -> Result<Vec<String>> {
    let registry = &config.registry;
    let feed = |url: &str, n: usize| {
        RankingFeed::new(url, registry_timeout(config), &registry.user_agent)
            .top(n)
            .with_context(|| format!("failed to load ranking feed {url}"))
    };

    let names = if let Some(n) = args.top {
        feed(&registry.popularity_feed_url, n)?
    } else if let Some(n) = args.top_by_size {
        let Some(url) = registry.size_feed_url.as_deref() else {
            bail!("--top-by-size needs `registry.size_feed_url` in the config file");
        };
        feed(url, n)?
    } else {
        args.packages.clone()
    };

    if names.is_empty() {
        bail!("no packages to analyze (pass package names, --top or --top-by-size)");
    }
    Ok(names)
}

fn build_pipeline(config: &VintageConfig, args: &AnalyzeArgs) -> Result<Pipeline> {
    let cache_config = match args.cache_dir.clone().or_else(|| config.cache.root.clone()) {
        Some(root) => CacheConfig::with_root(root),
        None => CacheConfig::from_env(),
    };
    let cache_dir = CacheDir::new(cache_config).context("failed to open cache directory")?;
    tracing::debug!(target: "vintage.cache", root = %cache_dir.root().display(), "using cache");

    let options = detect_options(config, args.jobs);
    let downloads = HttpStore::new(registry_timeout(config), &config.registry.user_agent);
    let artifacts = ArtifactCache::new(cache_dir.clone(), options.filter.clone())
        .with_store(Box::new(SchemeStore::new(downloads)));
    let pipeline_config = PipelineConfig {
        redownload: args.redownload,
        recompute: args.recompute,
        detect: options,
        min_releases: config.pipeline.min_releases,
    };

    Ok(Pipeline::new(
        pipeline_config,
        Box::new(registry(config)),
        artifacts,
        ResultCache::new(cache_dir),
        Arc::new(detector(config)),
        ReferenceVersionTable::python(),
    ))
}

fn parse_date(value: &str) -> std::result::Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn print_output<T: Serialize + 'static>(value: &T, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
        return Ok(());
    }

    let any = value as &dyn std::any::Any;
    if let Some(batch) = any.downcast_ref::<BatchReport>() {
        print_batch(batch);
    } else if let Some(listing) = any.downcast_ref::<ReleaseListing>() {
        println!("{} ({} releases)", listing.package, listing.releases.len());
        for listed in &listing.releases {
            let release = &listed.release;
            print!(
                "  {:<12} {}  {}",
                release.version,
                release.upload_date(),
                release.filename
            );
            if !release.requires_python.is_empty() {
                print!("  requires {}", release.requires_python);
            }
            if let Some(newest) = listed.newest_python {
                print!("  newest python {newest}");
            }
            println!();
        }
    } else if let Some(report) = any.downcast_ref::<FeaturesReport>() {
        println!("{}", report.root.display());
        println!("  files_analyzed: {}", report.files_analyzed);
        println!("  total_constructs: {}", report.total_constructs);
        for (bucket, constructs) in report.aggregate.iter() {
            let total: u64 = constructs.values().sum();
            print!("  {bucket:<6} {total:>6}");
            if let Some(top) = report.most_common.get(&bucket) {
                print!("  most common: {} ({})", top.construct, top.count);
            }
            println!();
        }
        for failure in &report.failures {
            println!("  failed: {}: {}", failure.path.display(), failure.message);
        }
    } else {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
    }
    Ok(())
}

fn print_batch(batch: &BatchReport) {
    for outcome in &batch.packages {
        let report = match outcome {
            PackageOutcome::Analyzed(report) => report,
            PackageOutcome::Failed { package, reason } => {
                println!("{package}: failed: {reason}");
                continue;
            }
        };
        println!("{}", report.package);
        for release in &report.releases {
            print!("  {:<12} {}  ", release.version, release.upload_date);
            match &release.outcome {
                ReleaseOutcome::Signature {
                    signature,
                    total_constructs,
                    anomalies,
                } => {
                    let shares: Vec<String> = signature
                        .iter()
                        .map(|(bucket, share)| format!("{bucket}={share:.2}"))
                        .collect();
                    println!("{} ({total_constructs} constructs)", shares.join(" "));
                    for anomaly in anomalies {
                        println!(
                            "      anomaly: {} released {}: {}",
                            anomaly.bucket,
                            anomaly.reference_date,
                            anomaly.constructs.join(", ")
                        );
                    }
                }
                ReleaseOutcome::NoSignal => println!("no signal"),
                ReleaseOutcome::Failed { reason } => println!("failed: {reason}"),
            }
        }
        for warning in &report.warnings {
            println!("  warning: {warning}");
        }
    }
}
