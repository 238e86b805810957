mod config;
mod db;
mod diagnostics;
mod fetch;
mod parser;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::diagnostics::{DiagnosticSink, DumpSink, NullSink};
use crate::fetch::Fetcher;
use crate::parser::document::Document;
use crate::parser::{DetailRecord, Extractor, SummaryRecord};

#[derive(Parser)]
#[command(name = "rt_scraper", about = "Rotten Tomatoes ratings from the command line")]
struct Cli {
    /// Debug logging, including every extraction strategy attempt
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Settings file (default: ./rt_scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write raw pages and strategy traces to this directory
    #[arg(long, global = true)]
    dump_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a movie, pick a result, show its ratings
    Search {
        /// Search terms (prompted for when omitted)
        query: Vec<String>,
        #[command(flatten)]
        show: ShowOpts,
    },
    /// Show ratings for one movie page
    Movie {
        url: String,
        #[command(flatten)]
        show: ShowOpts,
    },
    /// Extract from saved HTML files instead of the network
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Treat files as search/listing pages
        #[arg(long)]
        listing: bool,
        /// Page URL the files were saved from (listing links resolve against it)
        #[arg(long)]
        source_url: Option<String>,
    },
    /// Manage saved movie lists
    Lists {
        #[command(subcommand)]
        action: ListsCommand,
    },
}

/// What to do with a record once it is extracted.
#[derive(Args, Clone, Debug, Default)]
struct ShowOpts {
    /// Save the movie into this list
    #[arg(long)]
    save: Option<String>,
    /// Print the record as JSON
    #[arg(long)]
    json: bool,
    /// Open the movie page in the default browser
    #[arg(long)]
    open: bool,
    /// Search YouTube for the trailer in the default browser
    #[arg(long)]
    trailer: bool,
}

#[derive(Subcommand)]
enum ListsCommand {
    /// Create an empty list
    Create { name: String },
    /// All lists, or the movies in one
    Show { name: Option<String> },
    /// Remove the N-th movie (1-indexed) from a list
    Remove { name: String, index: usize },
}

struct App {
    settings: Settings,
    extractor: Extractor,
}

impl App {
    fn new(mut settings: Settings, dump_dir: Option<PathBuf>) -> Result<Self> {
        if dump_dir.is_some() {
            settings.dump_dir = dump_dir;
        }
        let base = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid base_url '{}'", settings.base_url))?;
        let extractor = Extractor::new(base, settings.heuristics.clone());
        Ok(App { settings, extractor })
    }

    /// Dump sink under `dump_dir/<sub>` when dumping is on, otherwise a null sink.
    /// A dump directory that cannot be created only costs the diagnostics.
    fn sink(&self, sub: &str) -> Box<dyn DiagnosticSink> {
        let Some(dir) = &self.settings.dump_dir else {
            return Box::new(NullSink);
        };
        match DumpSink::create(dir.join(sub)) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                warn!("Diagnostics disabled: {:#}", e);
                Box::new(NullSink)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info,rt_scraper=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(io::stderr)
        .init();

    let settings = Settings::load(cli.config.as_deref())?;
    let app = App::new(settings, cli.dump_dir)?;

    match cli.command {
        Commands::Search { query, show } => search(&app, query, &show).await,
        Commands::Movie { url, show } => show_movie(&app, &url, &show).await,
        Commands::Parse { files, listing, source_url } => parse_files(&app, &files, listing, source_url),
        Commands::Lists { action } => lists(&app, action),
    }
}

// ── Network commands ──

async fn search(app: &App, query: Vec<String>, show: &ShowOpts) -> Result<()> {
    let query = if query.is_empty() {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Enter movie title to search")
            .allow_empty(true)
            .interact_text()?
    } else {
        query.join(" ")
    };
    let query = query.trim();
    if query.is_empty() {
        println!("No search term given.");
        return Ok(());
    }

    let fetcher = Fetcher::new(&app.settings)?;
    println!("\nSearching for '{}'...", query);
    let url = fetcher.search_url(query)?;
    let doc = fetcher.fetch(url.as_str()).await?;

    let mut sink = app.sink("search");
    let results = app.extractor.listing(&doc, sink.as_mut());
    if results.is_empty() {
        println!("No results found. Try a different search term.");
        return Ok(());
    }

    println!("\nFound {} results:\n", results.len());
    print!("{}", format_results(&results));

    let Some(idx) = read_selection(results.len())? else {
        println!("Exiting...");
        return Ok(());
    };
    let picked = &results[idx];
    println!("\nFetching ratings for '{}'...", picked.title);
    show_movie(app, &picked.detail_url, show).await
}

async fn show_movie(app: &App, url: &str, show: &ShowOpts) -> Result<()> {
    let fetcher = Fetcher::new(&app.settings)?;
    let doc = fetcher.fetch(url).await?;

    let mut sink = app.sink("movie");
    let record = app.extractor.detail(&doc, url, sink.as_mut());
    info!("Extracted '{}' ({})", record.title, record.year);

    if show.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", format_record(&record));
    }

    if let Some(list) = &show.save {
        let conn = db::connect(&app.settings.db_path)?;
        db::save_movie(&conn, list, &record)?;
        println!("Saved '{}' to list '{}'", record.title, list);
    }
    if show.open {
        open_in_browser(&record.source_url);
    }
    if show.trailer {
        open_in_browser(trailer_url(&record)?.as_str());
    }
    Ok(())
}

/// YouTube search for "<title> <year> trailer"; a sentinel year is left out.
fn trailer_url(record: &DetailRecord) -> Result<Url, url::ParseError> {
    let mut terms = record.title.clone();
    if record.year.chars().all(|c| c.is_ascii_digit()) && !record.year.is_empty() {
        terms.push(' ');
        terms.push_str(&record.year);
    }
    terms.push_str(" trailer");

    let mut url = Url::parse("https://www.youtube.com/results")?;
    url.query_pairs_mut().append_pair("search_query", &terms);
    Ok(url)
}

/// Browser launch failures are reported, never fatal.
fn open_in_browser(url: &str) {
    match open::that(url) {
        Ok(()) => println!("Opened {}", url),
        Err(e) => warn!("Failed to open browser for {}: {}", url, e),
    }
}

// ── Offline parsing ──

fn parse_files(app: &App, files: &[PathBuf], listing: bool, source_url: Option<String>) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let extractor = match (&source_url, listing) {
        (Some(u), true) => Extractor::new(
            Url::parse(u).with_context(|| format!("Invalid --source-url '{}'", u))?,
            app.settings.heuristics.clone(),
        ),
        _ => app.extractor.clone(),
    };

    let t0 = Instant::now();
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    // Each worker parses its own Document; the extractor is only read.
    let outputs: Vec<Result<serde_json::Value>> = files
        .par_iter()
        .enumerate()
        .map(|(i, path)| {
            let out = parse_one(app, &extractor, i, path, listing, source_url.as_deref());
            pb.inc(1);
            out
        })
        .collect();
    pb.finish_and_clear();

    let mut errors = 0usize;
    for (path, out) in files.iter().zip(outputs) {
        match out {
            Ok(value) => println!("{}", serde_json::to_string(&value)?),
            Err(e) => {
                warn!("{}: {:#}", path.display(), e);
                errors += 1;
            }
        }
    }

    info!(
        "Parsed {} files ({} failed) in {}",
        files.len(),
        errors,
        format_duration(t0.elapsed())
    );
    if errors == files.len() {
        bail!("No file could be parsed");
    }
    Ok(())
}

/// `index` keeps dump directories apart when inputs share a file name.
fn parse_one(
    app: &App,
    extractor: &Extractor,
    index: usize,
    path: &Path,
    listing: bool,
    source_url: Option<&str>,
) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let doc = Document::parse(raw);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let mut sink = app.sink(&format!("{:04}_{}", index + 1, stem));
    let file = path.display().to_string();

    let value = if listing {
        let items = extractor.listing(&doc, sink.as_mut());
        serde_json::json!({ "file": file, "results": items })
    } else {
        let url = source_url.map(str::to_string).unwrap_or_else(|| file.clone());
        let record = extractor.detail(&doc, &url, sink.as_mut());
        serde_json::json!({ "file": file, "record": record })
    };
    Ok(value)
}

// ── Lists ──

fn lists(app: &App, action: ListsCommand) -> Result<()> {
    let conn = db::connect(&app.settings.db_path)?;
    match action {
        ListsCommand::Create { name } => {
            db::create_list(&conn, &name)?;
            println!("Created list '{}'", name.trim());
        }
        ListsCommand::Show { name: None } => {
            let lists = db::fetch_lists(&conn)?;
            if lists.is_empty() {
                println!("No lists yet. Create one with 'lists create <name>'.");
                return Ok(());
            }
            println!("{:>3} | {:<30} | {:>6}", "#", "List", "Movies");
            println!("{}", "-".repeat(45));
            for (i, l) in lists.iter().enumerate() {
                println!("{:>3} | {:<30} | {:>6}", i + 1, truncate(&l.name, 30), l.movies);
            }
        }
        ListsCommand::Show { name: Some(name) } => {
            let Some(movies) = db::fetch_list(&conn, &name)? else {
                bail!("No list named '{}'", name);
            };
            if movies.is_empty() {
                println!("'{}' is empty.", name);
                return Ok(());
            }
            println!("{:>3} | {:<40} | {:<4} | {:>6} | {:>8}", "#", "Title", "Year", "Critic", "Audience");
            println!("{}", "-".repeat(74));
            for (i, m) in movies.iter().enumerate() {
                println!(
                    "{:>3} | {:<40} | {:<4} | {:>6} | {:>8}",
                    i + 1,
                    truncate(&m.title, 40),
                    m.year,
                    percent(&m.critic_score),
                    percent(&m.audience_score)
                );
            }
            println!("\n{} movies in '{}'", movies.len(), name);
        }
        ListsCommand::Remove { name, index } => {
            let removed = db::remove_from_list(&conn, &name, index)?;
            println!("Removed '{}' from '{}'", removed.title, name);
        }
    }
    Ok(())
}

// ── Interaction ──

#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Quit,
    Pick(usize),
    Invalid,
}

/// 1-based menu input → 0-based index. `0` quits.
fn parse_selection(input: &str, len: usize) -> Selection {
    match input.trim().parse::<usize>() {
        Ok(0) => Selection::Quit,
        Ok(n) if n <= len => Selection::Pick(n - 1),
        _ => Selection::Invalid,
    }
}

/// Ask until a valid index or quit.
fn read_selection(len: usize) -> Result<Option<usize>> {
    let input = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Select a movie (1-{}) or 0 to quit", len))
        .validate_with(|input: &String| -> Result<(), String> {
            match parse_selection(input, len) {
                Selection::Invalid => Err(format!("Please enter a number between 0 and {}.", len)),
                _ => Ok(()),
            }
        })
        .interact_text()?;

    match parse_selection(&input, len) {
        Selection::Pick(i) => Ok(Some(i)),
        Selection::Quit | Selection::Invalid => Ok(None),
    }
}

// ── Formatting ──

fn format_results(results: &[SummaryRecord]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})\n", i + 1, r.title, r.year))
        .collect()
}

fn format_record(r: &DetailRecord) -> String {
    let heavy = "=".repeat(60);
    let light = "-".repeat(60);
    format!(
        "\n{heavy}\nTitle: {} ({})\n{light}\nTomatometer (Critics): {}\nPopcornmeter (Audience): {}\n{light}\nCritics Consensus:\n{}\n{light}\nMore info: {}\n{heavy}\n",
        r.title,
        r.year,
        percent(&r.critic_score),
        percent(&r.audience_score),
        r.consensus,
        r.source_url,
    )
}

/// Scores get a `%`; sentinels are shown as-is.
fn percent(score: &str) -> String {
    if !score.is_empty() && score.chars().all(|c| c.is_ascii_digit()) {
        format!("{}%", score)
    } else {
        score.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
