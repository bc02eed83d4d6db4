use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use memstat_core::codec::{AnySnapshot, DecodeError, Family, Integrity, Section, peek_magic};
use memstat_core::collector::{RealFs, SessionConfig, SessionError, StatSession};
use memstat_core::filter::{FilterSpec, Selector};
use memstat_core::fmt::{format_bytes_binary, format_magic, hex_preview, truncate};
use memstat_core::present::{
    MemorySummary, NameTable, PresentedField, SectionTables, present_snapshot,
};

const DEFAULT_PATH: &str = "/sys/fs/cgroup/memory.stat_bin";
const PREVIEW_BYTES: usize = 32;
const NAME_WIDTH: usize = 32;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "memstat-dump",
    about = "Decode binary cgroup memory statistics",
    version
)]
struct Cli {
    /// Binary stat file (memory.stat_bin, memory.numa_stat_bin, memory.stat.ks).
    #[arg(default_value = DEFAULT_PATH)]
    path: PathBuf,

    /// Field selector `category.field[index]`. Repeat for more fields (max 16).
    #[arg(short, long = "filter", value_name = "SEL")]
    filters: Vec<Selector>,

    /// Select `vmstats.state[0]` .. `vmstats.state[N-1]` (N >= 1).
    #[arg(
        long,
        value_name = "N",
        conflicts_with = "filters",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    state_range: Option<u32>,

    /// Where to write the filter line. Defaults to the stat file itself.
    #[arg(long, value_name = "PATH")]
    control: Option<PathBuf>,

    /// Index-to-name table for the stat section (`name` or `index name` per line).
    #[arg(long, value_name = "FILE")]
    names: Option<PathBuf>,

    /// Index-to-name table for the event section.
    #[arg(long, value_name = "FILE")]
    event_names: Option<PathBuf>,

    /// Index-to-name table for the numa section.
    #[arg(long, value_name = "FILE")]
    numa_names: Option<PathBuf>,

    /// Output as JSON (one object per line in watch mode).
    #[arg(long)]
    json: bool,

    /// Re-read the file every SECS seconds until interrupted.
    #[arg(short, long, value_name = "SECS")]
    watch: Option<u64>,

    /// Stop after N snapshots in watch mode.
    #[arg(short = 'n', long, value_name = "N", requires = "watch")]
    count: Option<u64>,

    /// Consecutive decode failures tolerated in watch mode.
    #[arg(long, default_value = "3")]
    max_failures: u32,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn filter(&self) -> FilterSpec {
        match self.state_range {
            Some(n) => FilterSpec::state_range("vmstats", "state", n),
            None => FilterSpec::new(self.filters.clone()),
        }
    }

    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.path).with_filter(self.filter());
        if let Some(control) = &self.control {
            config = config.with_control_path(control);
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let tables = match load_tables(&cli) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let mut session = match StatSession::open(&RealFs::new(), cli.session_config()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    match cli.watch {
        None => {
            if let Err(e) = dump_once(&mut session, &cli, &tables, true) {
                report_error(&cli.path, &e, session.last_bytes());
                std::process::exit(1);
            }
        }
        Some(secs) => watch(&mut session, &cli, &tables, Duration::from_secs(secs.max(1))),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["memstat_dump", "memstat_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_tables(cli: &Cli) -> Result<SectionTables, String> {
    let mut tables = SectionTables::memcg_default();
    let overrides = [
        (Section::Stat, &cli.names),
        (Section::Event, &cli.event_names),
        (Section::Numa, &cli.numa_names),
    ];
    for (section, path) in overrides {
        if let Some(path) = path {
            *tables.table_mut(section) = load_table(path)?;
            debug!(section = section.as_str(), path = %path.display(), "name table loaded");
        }
    }
    Ok(tables)
}

fn load_table(path: &Path) -> Result<NameTable, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    NameTable::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

// ── Reading ──────────────────────────────────────────────────────────────────

fn dump_once(
    session: &mut StatSession<RealFs>,
    cli: &Cli,
    tables: &SectionTables,
    pretty: bool,
) -> Result<(), SessionError> {
    let snapshot = session.poll()?;
    let report = Report::new(&cli.path, session.filter_line(), &snapshot, tables);
    if cli.json {
        print_json(&report, pretty);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn watch(session: &mut StatSession<RealFs>, cli: &Cli, tables: &SectionTables, interval: Duration) {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut failures: u32 = 0;
    let mut printed: u64 = 0;
    info!(path = %cli.path.display(), interval_secs = interval.as_secs(), "watching");

    while running.load(Ordering::SeqCst) {
        match dump_once(session, cli, tables, false) {
            Ok(()) => {
                failures = 0;
                printed += 1;
            }
            Err(e) => {
                failures += 1;
                report_error(&cli.path, &e, session.last_bytes());
                if should_give_up(failures, cli.max_failures, &e) {
                    match e {
                        SessionError::Decode(_) => {
                            eprintln!("giving up after {} consecutive decode failures", failures)
                        }
                        _ => eprintln!("stopping: stat file is no longer readable"),
                    }
                    std::process::exit(1);
                }
            }
        }
        if cli.count.is_some_and(|n| printed >= n) {
            break;
        }

        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }
    debug!(polls = session.polls(), "watch stopped");
}

/// Decode failures are tolerated up to `max` in a row; anything else ends the watch.
fn should_give_up(failures: u32, max: u32, err: &SessionError) -> bool {
    match err {
        SessionError::Decode(_) => failures > max,
        SessionError::Io { .. } | SessionError::Filter(_) => true,
    }
}

fn report_error(path: &Path, err: &SessionError, bytes: &[u8]) {
    eprintln!("{}: {}", path.display(), err);
    if !matches!(err, SessionError::Decode(_)) {
        return;
    }
    match peek_magic(bytes) {
        Some(magic) => {
            let family = Family::from_magic(magic).map_or("unknown".to_string(), |f| f.to_string());
            eprintln!("magic: {} [{}]", format_magic(magic), family);
        }
        None => eprintln!("magic: <only {} bytes>", bytes.len()),
    }
    if let SessionError::Decode(DecodeError::ChecksumMismatch { .. }) = err {
        eprintln!("file length: {} bytes", bytes.len());
    }
    if !bytes.is_empty() {
        eprintln!(
            "first {} bytes:\n{}",
            bytes.len().min(PREVIEW_BYTES),
            hex_preview(bytes, PREVIEW_BYTES)
        );
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report<'a> {
    timestamp: String,
    path: String,
    family: Family,
    version: u8,
    known_version: bool,
    integrity: Integrity,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    fields: Vec<PresentedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<MemorySummary>,
}

impl<'a> Report<'a> {
    fn new(
        path: &Path,
        filter: Option<&'a str>,
        snapshot: &AnySnapshot,
        tables: &SectionTables,
    ) -> Self {
        let header = snapshot.header();
        let fields = present_snapshot(snapshot, tables);
        let summary = MemorySummary::from_fields(&fields);
        Self {
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            path: path.display().to_string(),
            family: header.family,
            version: header.version,
            known_version: header.is_known_version(),
            integrity: snapshot.integrity(),
            filter,
            fields,
            summary,
        }
    }
}

fn print_json(report: &Report<'_>, pretty: bool) {
    let encoded = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    match encoded {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("JSON encoding failed: {e}"),
    }
}

fn print_table(report: &Report<'_>) {
    print!("{}", render_table(report));
}

fn render_table(report: &Report<'_>) -> String {
    let mut out = String::new();
    let integrity = match report.integrity {
        Integrity::Verified => "checksum ok",
        Integrity::Unverified => "no checksum",
    };
    let version = if report.known_version {
        format!("v{}", report.version)
    } else {
        format!("v{} (unknown)", report.version)
    };
    out.push_str(&format!(
        "{}  {}  {}  {} fields  {}  {}\n",
        report.timestamp,
        report.path,
        report.family,
        report.fields.len(),
        version,
        integrity
    ));
    if let Some(filter) = report.filter {
        out.push_str(&format!("filter: {}\n", truncate(filter, 72)));
    }

    out.push_str(&format!(
        "{:<8} {:<width$} {:>16}\n",
        "SECTION",
        "NAME",
        "VALUE",
        width = NAME_WIDTH
    ));
    for field in &report.fields {
        out.push_str(&format!(
            "{:<8} {:<width$} {:>16}\n",
            field.section.as_str(),
            truncate(&field.name, NAME_WIDTH),
            field.display,
            width = NAME_WIDTH
        ));
    }

    if let Some(summary) = &report.summary {
        out.push_str(&format!(
            "\nanon {}  file {}  kernel {}  total {}\n",
            format_bytes_binary(summary.anon),
            format_bytes_binary(summary.file),
            format_bytes_binary(summary.kernel),
            format_bytes_binary(summary.total())
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstat_core::codec::{Checksum, NamedEntry, Snapshot, encode_snapshot};
    use tempfile::tempdir;

    fn write_named(path: &Path) {
        let snapshot = Snapshot::from_sections(
            vec![
                NamedEntry::new("anon", 1024 * 1024),
                NamedEntry::new("file", 2048),
                NamedEntry::new("kernel", 512),
            ],
            vec![NamedEntry::new("pgfault", 42)],
            vec![],
        )
        .unwrap();
        fs::write(path, encode_snapshot(&snapshot, Checksum::Trailer).unwrap()).unwrap();
    }

    #[test]
    fn cli_parses_filters_and_defaults() {
        let cli = Cli::parse_from([
            "memstat-dump",
            "-f",
            "vmstats.state[0]",
            "--filter",
            "vmstats.state[3]",
        ]);
        assert_eq!(cli.path, PathBuf::from(DEFAULT_PATH));
        assert_eq!(cli.filters.len(), 2);
        assert_eq!(cli.max_failures, 3);
        let config = cli.session_config();
        assert_eq!(config.control_path(), Path::new(DEFAULT_PATH));
        assert_eq!(
            config.filter.to_control_line(config.limits).unwrap(),
            "vmstats.state[0],vmstats.state[3]"
        );
    }

    #[test]
    fn cli_rejects_malformed_selector() {
        assert!(Cli::try_parse_from(["memstat-dump", "--filter", "vmstats.state"]).is_err());
    }

    #[test]
    fn cli_state_range_zero_rejected() {
        assert!(Cli::try_parse_from(["memstat-dump", "--state-range", "0"]).is_err());
        let cli = Cli::parse_from(["memstat-dump", "--state-range", "1"]);
        assert_eq!(cli.session_config().filter.selectors().len(), 1);
        assert!(Cli::parse_from(["memstat-dump"]).session_config().filter.is_all());
    }

    #[test]
    fn cli_count_requires_watch() {
        assert!(Cli::try_parse_from(["memstat-dump", "--count", "2"]).is_err());
        let cli = Cli::parse_from(["memstat-dump", "--watch", "1", "--count", "2"]);
        assert_eq!(cli.count, Some(2));
    }

    #[test]
    fn watch_failure_budget() {
        let decode = SessionError::Decode(DecodeError::BadMagic { found: 0 });
        for failures in 1..=3 {
            assert!(!should_give_up(failures, 3, &decode));
        }
        assert!(should_give_up(4, 3, &decode));
        assert!(should_give_up(1, 0, &decode));

        let io = SessionError::Io {
            path: PathBuf::from(DEFAULT_PATH),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(should_give_up(1, 3, &io));
    }

    #[test]
    fn cli_state_range() {
        let cli = Cli::parse_from(["memstat-dump", "--state-range", "16", "--control", "/ctl"]);
        let config = cli.session_config();
        assert_eq!(config.filter.selectors().len(), 16);
        assert_eq!(config.control_path(), Path::new("/ctl"));
    }

    #[test]
    fn table_shows_fields_and_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.stat_bin");
        write_named(&path);

        let mut session =
            StatSession::open(&RealFs::new(), SessionConfig::new(&path)).unwrap();
        let snapshot = session.poll().unwrap();
        let tables = SectionTables::memcg_default();
        let report = Report::new(&path, None, &snapshot, &tables);
        let table = render_table(&report);

        assert!(table.contains("named-value"));
        assert!(table.contains("checksum ok"));
        assert!(table.contains("1.00 MB"));
        assert!(table.contains("2.00 KB"));
        assert!(table.contains("512 B"));
        assert!(table.contains("pgfault"));
        assert!(table.contains("total 1.00 MB"));
    }

    #[test]
    fn json_report_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.stat_bin");
        write_named(&path);

        let mut session =
            StatSession::open(&RealFs::new(), SessionConfig::new(&path)).unwrap();
        let snapshot = session.poll().unwrap();
        let report = Report::new(&path, None, &snapshot, &SectionTables::memcg_default());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["family"], "named");
        assert_eq!(value["integrity"], "verified");
        assert_eq!(value["fields"].as_array().unwrap().len(), 4);
        assert_eq!(value["summary"]["anon"], 1024 * 1024);
        assert!(value.get("filter").is_none());
    }

    #[test]
    fn name_table_override() {
        let dir = tempdir().unwrap();
        let names = dir.path().join("stat.names");
        fs::write(&names, "# custom\n0 my_anon\n1 my_file\n").unwrap();

        let cli = Cli::parse_from(["memstat-dump", "--names", names.to_str().unwrap()]);
        let tables = load_tables(&cli).unwrap();
        assert_eq!(tables.table(Section::Stat).resolve(1), Some("my_file"));
        assert!(tables.table(Section::Event).resolve(0).is_some());
    }

    #[test]
    fn missing_name_table_is_error() {
        let cli = Cli::parse_from(["memstat-dump", "--names", "/nonexistent/names"]);
        assert!(load_tables(&cli).unwrap_err().contains("/nonexistent/names"));
    }
}
