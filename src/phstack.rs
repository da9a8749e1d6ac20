use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use jiff::Timestamp;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use phstack::config::{AppConfig, parse_hms};
use phstack::gps_data::GpsData;
use phstack::grouping::{GroupCollector, GroupingEngine, GroupingMode};
use phstack::item::ItemRecord;
use phstack::natural::CaseSensitivity;
use phstack::session::{CorrelationObserver, CorrelationOutcome, CorrelationSession};
use phstack::sort_settings::{CategorizationMode, CategoryKey, SortOrder, SortRole};
use phstack::timezone;
use phstack::undo::GpsUndoCommand;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("APP_GIT_HASH"), ")");

// --- Helper: Relative Time ---
fn format_relative_time(ts: Timestamp) -> String {
    let now = Timestamp::now();
    let zoned_ts = ts.to_zoned(jiff::tz::TimeZone::UTC);
    let raw_span = now.since(ts).unwrap_or_default();
    let total_secs = raw_span.total(jiff::Unit::Second).unwrap_or(0.0).abs();

    if total_secs < 60.0 {
        return format!("{:.0}s", total_secs);
    }

    let span = raw_span
        .round(jiff::SpanRound::new().largest(jiff::Unit::Year).smallest(jiff::Unit::Minute).relative(&zoned_ts))
        .unwrap_or_default();

    let units = [
        (span.get_years().abs() as i64, "y"),
        (span.get_months().abs() as i64, "mo"),
        (span.get_weeks().abs() as i64, "w"),
        (span.get_days().abs() as i64, "d"),
        (span.get_hours().abs() as i64, "h"),
        (span.get_minutes().abs(), "m"),
    ];
    let parts: Vec<String> = units
        .iter()
        .filter(|(n, _)| *n > 0)
        .take(2)
        .map(|(n, unit)| format!("{}{}", n, unit))
        .collect();

    if parts.is_empty() { "0s".to_string() } else { parts.join(" ") }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 { return format!("{} B", bytes); }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 { return format!("{:.1} KB", kb); }
    let mb = kb / 1024.0;
    format!("{:.1} MB", mb)
}

fn format_taken(taken: Option<NaiveDateTime>, relative: bool) -> String {
    match taken {
        Some(t) if relative => Timestamp::from_second(t.and_utc().timestamp())
            .map(format_relative_time)
            .unwrap_or_else(|_| t.to_string()),
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Sorts, stacks and geotags photo collections.", long_about = None)]
struct Cli {
    /// Config file (default: phstack.conf in the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print items in sorted, categorized order
    Sort {
        /// JSON array of items
        items: PathBuf,

        /// name, path, date, modified, size, rating, image-size, aspect-ratio,
        /// faces, similarity, manual-name, manual-date, download
        #[arg(long)]
        role: Option<String>,

        /// asc, desc or default
        #[arg(long)]
        order: Option<String>,

        /// none, folder, format or date
        #[arg(long)]
        categorize: Option<String>,

        #[arg(long)]
        ignore_case: bool,

        #[arg(long)]
        relative_times: bool,
    },

    /// Detect burst, RAW+JPEG and timelapse stacks
    Group {
        items: PathBuf,

        /// time, filename or timelapse
        #[arg(long, default_value = "time")]
        mode: String,

        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Geotag items from GPX tracks
    Correlate {
        items: PathBuf,

        #[arg(long = "gpx", required = true, value_name = "FILE")]
        gpx_files: Vec<PathBuf>,

        /// Camera clock offset, e.g. +00:01:30 when the camera runs ahead
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<String>,

        /// Camera time zone, e.g. +02:00
        #[arg(long, allow_hyphen_values = true)]
        time_zone: Option<String>,

        /// Match to the nearest point instead of interpolating
        #[arg(long)]
        direct: bool,

        /// Max gap for direct matching (HH:MM:SS)
        #[arg(long)]
        max_gap: Option<String>,

        /// Max gap to either neighbor when interpolating (HH:MM:SS)
        #[arg(long)]
        interpolation_limit: Option<String>,

        /// Write results here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_role(role: &str) -> Result<SortRole> {
    let role = match role.to_lowercase().as_str() {
        "name" => SortRole::ByName,
        "path" => SortRole::ByPath,
        "date" => SortRole::ByCreationDate,
        "modified" => SortRole::ByModificationDate,
        "size" => SortRole::ByFileSize,
        "rating" => SortRole::ByRating,
        "image-size" => SortRole::ByImageSize,
        "aspect-ratio" => SortRole::ByAspectRatio,
        "faces" => SortRole::ByFaces,
        "similarity" => SortRole::BySimilarity,
        "manual-name" => SortRole::ByManualOrderAndName,
        "manual-date" => SortRole::ByManualOrderAndDate,
        "download" => SortRole::ByDownloadState,
        other => bail!("Invalid role '{}'", other),
    };
    Ok(role)
}

fn parse_order(order: &str) -> Result<SortOrder> {
    match order.to_lowercase().as_str() {
        "asc" => Ok(SortOrder::Ascending),
        "desc" => Ok(SortOrder::Descending),
        "default" => Ok(SortOrder::Default),
        other => bail!("Invalid order '{}'. Use one of: asc, desc, default", other),
    }
}

fn parse_categorization(mode: &str) -> Result<CategorizationMode> {
    match mode.to_lowercase().as_str() {
        "none" => Ok(CategorizationMode::NoCategories),
        "folder" => Ok(CategorizationMode::ByFolder),
        "format" => Ok(CategorizationMode::ByFormat),
        "date" => Ok(CategorizationMode::ByDate),
        other => bail!("Invalid categorization '{}'. Use one of: none, folder, format, date", other),
    }
}

fn parse_grouping_mode(mode: &str) -> Result<GroupingMode> {
    match mode.to_lowercase().as_str() {
        "time" => Ok(GroupingMode::Time),
        "filename" => Ok(GroupingMode::Filename),
        "timelapse" => Ok(GroupingMode::Timelapse),
        other => bail!("Invalid mode '{}'. Use one of: time, filename, timelapse", other),
    }
}

/// `+HH:MM:SS` / `-HH:MM:SS`, sign optional.
fn parse_signed_hms(text: &str) -> Result<i64> {
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    Ok(sign * parse_hms("offset", rest)?)
}

fn load_items(path: &Path) -> Result<Vec<ItemRecord>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let items: Vec<ItemRecord> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse items in {}", path.display()))?;
    debug!("Loaded {} items from {}", items.len(), path.display());
    Ok(items)
}

fn category_label(key: &CategoryKey) -> String {
    match key {
        CategoryKey::All => String::new(),
        CategoryKey::Folder(folder) => folder.clone(),
        CategoryKey::Format(mime) => mime.clone(),
        CategoryKey::Date(Some(date)) => date.to_string(),
        CategoryKey::Date(None) => "(no date)".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_sort(
    cfg: &AppConfig,
    items_path: &Path,
    role: Option<String>,
    order: Option<String>,
    categorize: Option<String>,
    ignore_case: bool,
    relative_times: bool,
) -> Result<()> {
    let mut settings = cfg.sort.to_settings().context("Invalid [sort] config")?;
    if let Some(role) = role {
        settings.set_sort_role(parse_role(&role)?);
    }
    if let Some(order) = order {
        settings.set_sort_order(parse_order(&order)?);
    }
    if let Some(mode) = categorize {
        settings.set_categorization_mode(parse_categorization(&mode)?);
    }
    if ignore_case {
        settings.set_sort_case_sensitivity(CaseSensitivity::Insensitive);
        settings.set_categorization_case_sensitivity(CaseSensitivity::Insensitive);
    }

    let items = load_items(items_path)?;
    let categories = settings.categorize(&items);
    for category in categories {
        if category.key != CategoryKey::All {
            println!("\n== {} ({}) ==", category_label(&category.key), category.items.len());
        }
        for item in category.items {
            println!(
                "{:>8} | {:>10} | {:>19} | {} | {}",
                item.id,
                format_size(item.file_size),
                format_taken(item.taken, relative_times),
                "*".repeat(item.rating.clamp(0, 5) as usize),
                item.file_path()
            );
        }
    }
    Ok(())
}

fn run_group(cfg: &AppConfig, items_path: &Path, mode: &str, json: bool) -> Result<()> {
    let mode = parse_grouping_mode(mode)?;
    let items = load_items(items_path)?;
    let engine = GroupingEngine::new(cfg.grouping.clone());

    if json {
        let mut collector = GroupCollector::default();
        engine.apply(mode, &items, &mut collector);
        println!("{}", serde_json::to_string_pretty(&collector)?);
        return Ok(());
    }

    let groups = engine.group(mode, &items);
    for (g_idx, group) in groups.iter().enumerate() {
        println!("\nGroup {}/{} ({} items)", g_idx + 1, groups.len(), group.len());
        println!("  * {} ({})", group.leader.name, format_size(group.leader.file_size));
        for follower in &group.followers {
            println!("    {} ({})", follower.name, format_size(follower.file_size));
        }
    }
    info!("{} groups", groups.len());
    Ok(())
}

struct ProgressPrinter;

impl CorrelationObserver for ProgressPrinter {
    fn progress(&mut self, done: usize, total: usize) {
        eprint!("\rCorrelating images - {}/{}", done, total);
        io::stderr().flush().ok();
    }

    fn finished(&mut self, _outcome: &CorrelationOutcome) {
        eprintln!();
    }
}

#[derive(Serialize)]
struct CorrelatedItem<'a> {
    id: i64,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gps: Option<&'a GpsData>,
}

#[allow(clippy::too_many_arguments)]
fn run_correlate(
    cfg: &AppConfig,
    items_path: &Path,
    gpx_files: Vec<PathBuf>,
    offset: Option<String>,
    time_zone: Option<String>,
    direct: bool,
    max_gap: Option<String>,
    interpolation_limit: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut options = cfg.correlator.to_options().context("Invalid [correlator] config")?;
    if let Some(offset) = offset {
        options.seconds_offset = parse_signed_hms(&offset)?;
    }
    if let Some(tz) = time_zone {
        options.time_zone_offset = timezone::parse_offset(&tz)?;
    }
    if direct {
        options.interpolate = false;
    }
    if let Some(gap) = max_gap {
        options.max_gap_time = parse_hms("max_gap", &gap)?;
    }
    if let Some(limit) = interpolation_limit {
        options.interpolation_dst_time = parse_hms("interpolation_limit", &limit)?;
    }
    debug!("Correlation options: {:?}", options);

    let items = load_items(items_path)?;

    let mut session: CorrelationSession<i64> = CorrelationSession::new();
    session.load_track_files(gpx_files)?;
    if let Some(report) = session.wait_for_tracks() {
        if !report.errors.is_empty() {
            eprintln!("The following GPX files could not be loaded:");
            for line in &report.errors {
                eprintln!("  {}", line);
            }
        }
        if report.loaded == 0 {
            bail!("No GPX file could be loaded");
        }
    }

    let photos = items.iter().map(|item| (item.id, item.taken)).collect();
    session.start_correlation(photos, options)?;

    let mut store: HashMap<i64, GpsData> = HashMap::new();
    let mut undo_stack: Vec<GpsUndoCommand<i64>> = Vec::new();
    let outcome = session.run_to_completion(&mut store, &mut undo_stack, &mut ProgressPrinter);
    if let Some(outcome) = outcome {
        eprintln!("{}", outcome);
    }

    let results: Vec<CorrelatedItem> = items
        .iter()
        .map(|item| CorrelatedItem { id: item.id, name: &item.name, gps: store.get(&item.id) })
        .collect();
    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "phstack=info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let args = Cli::parse();

    let cfg = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load config")?;

    match args.command {
        Command::Sort { items, role, order, categorize, ignore_case, relative_times } => {
            run_sort(&cfg, &items, role, order, categorize, ignore_case, relative_times)
        }
        Command::Group { items, mode, json } => run_group(&cfg, &items, &mode, json),
        Command::Correlate {
            items,
            gpx_files,
            offset,
            time_zone,
            direct,
            max_gap,
            interpolation_limit,
            output,
        } => run_correlate(
            &cfg,
            &items,
            gpx_files,
            offset,
            time_zone,
            direct,
            max_gap,
            interpolation_limit,
            output,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_parse_signed_hms() {
        assert_eq!(parse_signed_hms("+00:01:30").unwrap(), 90);
        assert_eq!(parse_signed_hms("-00:01:30").unwrap(), -90);
        assert_eq!(parse_signed_hms("01:00:00").unwrap(), 3600);
        assert!(parse_signed_hms("+1:30").is_err());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("Rating").unwrap(), SortRole::ByRating);
        assert!(parse_role("colour").is_err());
    }

    #[test]
    fn test_relative_time_recent() {
        let ts = Timestamp::now();
        assert_eq!(format_relative_time(ts), "0s");
    }
}
