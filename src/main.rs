use clap::{Parser, Subcommand};
use repowarden::monitor::{FileTypeFilter, MonitorConfig, MonitorController};
use repowarden::registry::PypiRegistryClient;
use repowarden::{blob, config, logging, monitor, registry, rules, scanner, store, taint};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "repowarden", about = "Taint-aware supply-chain monitoring for a PyPI-shaped package registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Minimum log level to emit.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Whether to also stream logs to stdout/stderr.
    #[arg(long, global = true, default_value_t = true)]
    log_stream: bool,

    /// File to append logs to.
    #[arg(long, global = true, default_value = "./logs/repowarden.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor controller against a registry.
    Monitor {
        /// Which registry flavor to monitor.
        #[arg(long, default_value = "pypi")]
        register: String,

        /// Poll interval, e.g. "60s", "2m", "1h".
        #[arg(long, default_value = "60s")]
        interval: String,

        /// Root directory this crate's in-process store persists under.
        #[arg(long, default_value = "./store")]
        store_path: PathBuf,

        /// Rule directory or file.
        #[arg(long, default_value = "./rules")]
        rule: PathBuf,

        /// File-selection rules path.
        #[arg(long, default_value = "./file_rules.yml")]
        file_rule: PathBuf,

        /// Which artifact types to queue for analysis.
        #[arg(long, default_value = "tgz")]
        file_type: String,

        /// Minimum suspicion to trigger analysis; -1 disables, 0 analyzes everything.
        #[arg(long, default_value_t = -1)]
        analyze: i32,

        /// Levenshtein distance threshold for typosquatting detection.
        #[arg(long, default_value_t = 1)]
        levenshtein_distance: usize,

        /// Force re-analysis of already-analyzed artifacts.
        #[arg(long, default_value_t = false)]
        cover: bool,
    },
    /// Scan a single local file or directory without running the monitor.
    Scan {
        /// Path to a `.py` file, `.tar.gz`/`.whl` archive, or directory.
        #[arg(long)]
        file: PathBuf,

        /// File-selection rules path.
        #[arg(long)]
        file_rule: Option<PathBuf>,

        /// Rule directory or file.
        #[arg(long, default_value = "./rules")]
        rule: PathBuf,

        /// Write JSON results here instead of printing them.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_stream, Some(&cli.log_file));

    let exit_code = match cli.command {
        Commands::Monitor {
            register,
            interval,
            store_path,
            rule,
            file_rule,
            file_type,
            analyze,
            levenshtein_distance,
            cover,
        } => cmd_monitor(register, interval, store_path, rule, file_rule, file_type, analyze, levenshtein_distance, cover),
        Commands::Scan { file, file_rule, rule, output } => cmd_scan(file, file_rule, rule, output),
    };

    process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
fn cmd_monitor(
    register: String,
    interval: String,
    store_path: PathBuf,
    rule: PathBuf,
    file_rule: PathBuf,
    file_type: String,
    analyze: i32,
    levenshtein_distance: usize,
    cover: bool,
) -> i32 {
    if register != "pypi" {
        eprintln!("unsupported registry: {register}");
        return -2;
    }
    let Some(interval) = config::parse_interval(&interval) else {
        eprintln!("invalid --interval: {interval}");
        return -2;
    };
    let Some(file_type) = FileTypeFilter::parse(&file_type) else {
        eprintln!("invalid --file_type: {file_type}, expected tgz, whl, or *");
        return -2;
    };
    if !(-1..=10).contains(&analyze) {
        eprintln!("invalid --analyze: {analyze}, expected -1..=10");
        return -2;
    }

    let rules = match rules::load_rules(&rule) {
        Ok(r) => r,
        Err(e) => {
            log::error!("loading rules from {rule:?} failed: {e}");
            return -1;
        }
    };
    let file_rules = match rules::load_file_rules(Some(&file_rule)) {
        Ok(r) => r,
        Err(e) => {
            log::error!("loading file rules from {file_rule:?} failed: {e}");
            return -1;
        }
    };

    let store: Arc<dyn store::MetadataStore> = Arc::new(store::memory::InMemoryStore::new());
    let blob: Arc<dyn blob::BlobStore> = Arc::new(blob::FsBlobStore::new(store_path.join("blobs")));
    let registry: Arc<dyn registry::RegistryClient> = Arc::new(PypiRegistryClient::new("https://pypi.org"));

    let config = MonitorConfig {
        interval: Duration::from_secs(interval),
        analyze_threshold: analyze,
        file_type,
        levenshtein_distance,
        cover,
        scratch_dir: store_path.join("scratch"),
    };

    let controller = Arc::new(MonitorController::new(store, blob, registry, Arc::new(rules), Arc::new(file_rules), config));

    match controller.run() {
        Ok(()) => 0,
        Err(e) => {
            log::error!("monitor failed: {e}");
            -1
        }
    }
}

fn cmd_scan(file: PathBuf, file_rule: Option<PathBuf>, rule: PathBuf, output: Option<PathBuf>) -> i32 {
    if !file.exists() {
        eprintln!("no such path: {file:?}");
        return -1;
    }

    let rules = match rules::load_rules(&rule) {
        Ok(r) => r,
        Err(e) => {
            log::error!("loading rules from {rule:?} failed: {e}");
            return -1;
        }
    };
    let file_rules = match rules::load_file_rules(file_rule.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            log::error!("loading file rules failed: {e}");
            return -1;
        }
    };

    let scratch = std::env::temp_dir().join("repowarden-scan");
    let outcome = match scanner::scan(&file, &scratch, &rules, &file_rules) {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            eprintln!("scan of {file:?} produced no results (extraction or parse failure, see logs)");
            return -1;
        }
        Err(e) => {
            eprintln!("scan of {file:?} failed: {e}");
            return -1;
        }
    };

    for issues in outcome.issues.values() {
        for issue in issues {
            if issue.severity >= taint::SEVERITY_HIGH {
                log::error!("{}: {}", issue.rule_id, issue.message);
            }
        }
    }

    match output {
        Some(path) => {
            let json = match serde_json::to_string_pretty(&SerializableOutcome::from(&outcome)) {
                Ok(j) => j,
                Err(e) => {
                    eprintln!("failed to serialize results: {e}");
                    return -1;
                }
            };
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("failed to write {path:?}: {e}");
                return -1;
            }
        }
        None => {
            println!(
                "scanned {} file(s), {} line(s), {} issue(s) ({} low, {} medium, {} high)",
                outcome.metrics.files,
                outcome.metrics.lines,
                outcome.metrics.cnt,
                outcome.metrics.low,
                outcome.metrics.medium,
                outcome.metrics.high
            );
            for (path, issues) in &outcome.issues {
                for issue in issues {
                    println!("[{}] {}: {}", taint::rank_to_str(issue.severity), path.display(), issue.message);
                }
            }
        }
    }

    0
}

#[derive(serde::Serialize)]
struct SerializableOutcome {
    import_name: Vec<String>,
    scanned_files: Vec<String>,
    metrics: scanner::Metrics,
    issues: std::collections::HashMap<String, Vec<taint::Issue>>,
}

impl From<&scanner::ScanOutcome> for SerializableOutcome {
    fn from(o: &scanner::ScanOutcome) -> Self {
        SerializableOutcome {
            import_name: o.import_name.clone(),
            scanned_files: o.scanned_files.iter().map(|p| p.to_string_lossy().to_string()).collect(),
            metrics: o.metrics.clone(),
            issues: o.issues.iter().map(|(p, i)| (p.to_string_lossy().to_string(), i.clone())).collect(),
        }
    }
}
