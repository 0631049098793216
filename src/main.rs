mod collaborator;
mod db;
mod error;
mod parser;
mod profile;
mod scheduler;
mod secondary;
mod session;
mod settings;
mod utils;
mod watcher;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};

use collaborator::{Action, Collaborator, CollaboratorRequest, HttpCollaborator};
use db::{ConfigStore, DraftRow};
use parser::extract::PrimaryExtract;
use scheduler::{ReparseScheduler, Timing};
use secondary::{ProfileApiClient, SecondarySource};
use session::{PassReport, SessionConfig};
use settings::Settings;
use utils::truncate;

#[derive(Parser)]
#[command(name = "profile_scraper", about = "Structured profile extraction from saved or live-captured pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction pass over a saved page and print the draft
    Parse {
        file: PathBuf,
        /// Profile address (default: the page's canonical URL)
        #[arg(short, long)]
        url: Option<String>,
        /// Skip saving the draft
        #[arg(long)]
        no_save: bool,
    },
    /// Extract every *.html page in a directory
    Batch {
        dir: PathBuf,
        /// Max pages to extract
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Re-parse a page file while a capture tool keeps rewriting it
    Watch {
        file: PathBuf,
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Extract a page and ask the collaborator to score it
    Score {
        file: PathBuf,
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Extract a page and ask the collaborator for a connection message
    Message {
        file: PathBuf,
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Read or write stored preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Recently saved drafts
    History {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print values for the given keys
    Get { keys: Vec<String> },
    /// Store key=value pairs
    Set { pairs: Vec<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Parse { file, url, no_save } => {
            let conn = open_db(&settings)?;
            let config = session_config(&settings, &conn)?;
            let (url, primary) = extract_file(&file, url, settings.viewport_height)?;
            let report = single_pass(&config, &url, primary).await;
            println!("{}", serde_json::to_string_pretty(&report.draft)?);
            print_report_summary(&report);
            if !no_save {
                db::save_drafts(&conn, &[draft_row(&report)])?;
            }
            Ok(())
        }
        Commands::Batch { dir, limit } => {
            let conn = open_db(&settings)?;
            let config = session_config(&settings, &conn)?;
            let mut files = html_files(&dir)?;
            if let Some(n) = limit {
                files.truncate(n);
            }
            if files.is_empty() {
                println!("No .html files in {}.", dir.display());
                return Ok(());
            }
            println!("Extracting {} pages...", files.len());
            let counts = process_files(&conn, &config, &files, settings.viewport_height).await?;
            counts.print();
            Ok(())
        }
        Commands::Watch { file, url } => {
            let conn = open_db(&settings)?;
            let mut config = session_config(&settings, &conn)?;
            config.collaborator = optional_collaborator(&settings)?;
            watch(&conn, &settings, config, &file, url).await
        }
        Commands::Score { file, url } => {
            let conn = open_db(&settings)?;
            let collab = HttpCollaborator::from_settings(settings.collaborator_url.as_deref())?;
            let config = session_config(&settings, &conn)?;
            let (url, primary) = extract_file(&file, url, settings.viewport_height)?;
            let report = single_pass(&config, &url, primary).await;
            let request = sender_request(&config, Action::ScoreProfile, report.draft);
            let card = collab.score_profile(request).await?;
            println!("Score: {}/100", card.score);
            for reason in &card.reasons {
                println!("  - {}", reason);
            }
            Ok(())
        }
        Commands::Message { file, url } => {
            let conn = open_db(&settings)?;
            let collab = HttpCollaborator::from_settings(settings.collaborator_url.as_deref())?;
            let config = session_config(&settings, &conn)?;
            if config.user_name.is_none() {
                bail!("User name not found. Set it with `config set userName=<name>`.");
            }
            let (url, primary) = extract_file(&file, url, settings.viewport_height)?;
            let report = single_pass(&config, &url, primary).await;
            let request = sender_request(&config, Action::GenerateMessage, report.draft);
            println!("{}", collab.generate_message(request).await?);
            Ok(())
        }
        Commands::Config { action } => {
            let conn = open_db(&settings)?;
            let store = ConfigStore::new(&conn);
            match action {
                ConfigAction::Get { keys } => {
                    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                    let values = store.get(&keys)?;
                    for key in &keys {
                        match values.get(*key) {
                            Some(v) => println!("{} = {}", key, v),
                            None => println!("{} is not set", key),
                        }
                    }
                }
                ConfigAction::Set { pairs } => {
                    let record = parse_pairs(&pairs)?;
                    let tier = store.set(&record)?;
                    println!("Saved {} key(s) to the {:?} tier.", record.len(), tier);
                }
            }
            Ok(())
        }
        Commands::History { limit } => {
            let conn = open_db(&settings)?;
            let rows = db::fetch_drafts(&conn, limit)?;
            if rows.is_empty() {
                println!("No drafts saved yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<20} | {:<22} | {:<5} | {:>3} | {:<30}",
                "#", "Subject", "Name", "Valid", "Exp", "Extracted"
            );
            println!("{}", "-".repeat(98));

            for (i, r) in rows.iter().enumerate() {
                let subject = truncate(r.subject_id.as_deref().unwrap_or("-"), 20);
                let name = truncate(r.draft.name.as_deref().unwrap_or("-"), 22);
                println!(
                    "{:>3} | {:<20} | {:<22} | {:<5} | {:>3} | {:<30}",
                    i + 1,
                    subject,
                    name,
                    if r.is_valid { "yes" } else { "no" },
                    r.draft.experience.len(),
                    r.extracted_at
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_db(settings: &Settings) -> anyhow::Result<rusqlite::Connection> {
    let conn = db::connect(&settings.database_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn session_config(settings: &Settings, conn: &rusqlite::Connection) -> anyhow::Result<SessionConfig> {
    let source = if settings.secondary_enabled {
        let client: Arc<dyn SecondarySource> = Arc::new(ProfileApiClient::new(
            &settings.secondary_root,
            settings.cookie.as_deref(),
        )?);
        Some(client)
    } else {
        None
    };

    let mut prefs = ConfigStore::new(conn).get(&["userName", "objective"])?;

    Ok(SessionConfig {
        attempt_limit: settings.attempt_limit,
        source,
        collaborator: None,
        user_name: prefs.remove("userName"),
        objective: prefs.remove("objective"),
    })
}

fn optional_collaborator(settings: &Settings) -> anyhow::Result<Option<Arc<dyn Collaborator>>> {
    match settings.collaborator_url.as_deref() {
        Some(url) => {
            let collab: Arc<dyn Collaborator> = Arc::new(HttpCollaborator::new(url)?);
            Ok(Some(collab))
        }
        None => Ok(None),
    }
}

fn sender_request(config: &SessionConfig, action: Action, draft: profile::ProfileDraft) -> CollaboratorRequest {
    CollaboratorRequest::new(action, draft)
        .with_sender(config.user_name.clone(), config.objective.clone())
}

/// Read and extract a page file. The subject address comes from `url` when
/// given, otherwise from the page itself.
fn extract_file(
    path: &Path,
    url: Option<String>,
    viewport_height: f32,
) -> anyhow::Result<(String, PrimaryExtract)> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (canonical, primary) = parser::process_page_with_url(&html, viewport_height);
    let url = url
        .or(canonical)
        .with_context(|| format!("No --url given and {} has no canonical URL", path.display()))?;
    Ok((url, primary))
}

async fn single_pass(config: &SessionConfig, url: &str, primary: PrimaryExtract) -> PassReport {
    let mut session = config.open(url);
    session.begin_attempt(Instant::now());
    session.run_pass(primary).await
}

fn draft_row(report: &PassReport) -> DraftRow {
    DraftRow {
        source_url: report.draft.source_url.clone(),
        subject_id: utils::subject_id_from_url(&report.draft.source_url),
        is_valid: report.is_valid,
        attempts: report.attempt,
        draft: report.draft.clone(),
        extracted_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn print_report_summary(report: &PassReport) {
    eprintln!(
        "valid: {} | secondary consulted: {} | backfilled: {:?}",
        report.is_valid, report.consulted_secondary, report.backfilled
    );
}

fn parse_pairs(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|p| match p.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            _ => bail!("Expected key=value, got {:?}", p),
        })
        .collect()
}

fn html_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "html") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

struct BatchCounts {
    pages: usize,
    valid: usize,
    backfilled: usize,
    failed: usize,
}

impl BatchCounts {
    fn print(&self) {
        println!(
            "Saved {} drafts ({} valid, {} backfilled), {} failed.",
            self.pages, self.valid, self.backfilled, self.failed,
        );
    }
}

async fn process_files(
    conn: &rusqlite::Connection,
    config: &SessionConfig,
    files: &[PathBuf],
    viewport_height: f32,
) -> anyhow::Result<BatchCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = BatchCounts {
        pages: 0,
        valid: 0,
        backfilled: 0,
        failed: 0,
    };

    for chunk in files.chunks(200) {
        let extracted: Vec<_> = chunk
            .par_iter()
            .map(|path| (path, extract_file(path, None, viewport_height)))
            .collect();

        let mut rows = Vec::new();
        for (path, result) in extracted {
            match result {
                Ok((url, primary)) => {
                    let report = single_pass(config, &url, primary).await;
                    counts.valid += report.is_valid as usize;
                    counts.backfilled += !report.backfilled.is_empty() as usize;
                    rows.push(draft_row(&report));
                }
                Err(e) => {
                    pb.suspend(|| eprintln!("{}: {:#}", path.display(), e));
                    counts.failed += 1;
                }
            }
            pb.inc(1);
        }

        counts.pages += db::save_drafts(conn, &rows)?;
    }

    pb.finish_and_clear();
    Ok(counts)
}

async fn watch(
    conn: &rusqlite::Connection,
    settings: &Settings,
    config: SessionConfig,
    file: &Path,
    url: Option<String>,
) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let url = url
        .or_else(|| watcher::observe(&html).canonical_url)
        .context("No --url given and the page has no canonical URL yet")?;

    let (feed, _) = broadcast::channel(64);
    let (nav_tx, nav_rx) = mpsc::channel(8);
    let (report_tx, mut report_rx) = mpsc::channel(8);

    let scheduler = ReparseScheduler::new(&url, config, Timing::from_settings(settings), feed.clone())
        .with_viewport_height(settings.viewport_height);
    let observer = tokio::spawn(
        watcher::FileWatcher::new(file, settings.poll_interval()).run(feed, nav_tx),
    );
    let driver = tokio::spawn(scheduler.run(watcher::FileSource::new(file), nav_rx, report_tx));

    println!("Watching {} for {} (Ctrl-C to stop)", file.display(), url);
    loop {
        tokio::select! {
            report = report_rx.recv() => match report {
                Some(report) => {
                    println!(
                        "pass {} | {} | valid: {} | about: {}",
                        report.attempt,
                        report.draft.name.as_deref().unwrap_or("-"),
                        report.is_valid,
                        truncate(report.draft.about.as_deref().unwrap_or("-"), 60),
                    );
                    if let Some(score) = &report.score {
                        match score {
                            Ok(card) => println!("  score: {}/100", card.score),
                            Err(e) => println!("  score unavailable: {}", e),
                        }
                    }
                    db::save_drafts(conn, &[draft_row(&report)])?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => observer.abort(),
        }
    }

    let scheduler = driver.await?;
    println!(
        "Stopped in state {:?} after {} attempt(s).",
        scheduler.state(),
        scheduler.session().attempts_made()
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_parse() {
        let record = parse_pairs(&["userName=Pat Lee".into(), "objective=a=b".into()]).unwrap();
        assert_eq!(record["userName"], "Pat Lee");
        assert_eq!(record["objective"], "a=b");
        assert!(parse_pairs(&["novalue".into()]).is_err());
        assert!(parse_pairs(&["=x".into()]).is_err());
    }

    #[test]
    fn extract_file_falls_back_to_canonical() {
        let (url, primary) =
            extract_file(Path::new("tests/fixtures/profile_full.html"), None, 900.0).unwrap();
        assert_eq!(url, "https://www.linkedin.com/in/jane-doe/");
        assert_eq!(primary.name.as_deref(), Some("Jane Doe"));

        let (url, _) = extract_file(
            Path::new("tests/fixtures/profile_full.html"),
            Some("https://www.linkedin.com/in/other/".into()),
            900.0,
        )
        .unwrap();
        assert_eq!(url, "https://www.linkedin.com/in/other/");
    }

    #[test]
    fn html_files_are_listed_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.html"), "").unwrap();
        std::fs::write(dir.path().join("a.html"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = html_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.html"));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_secs(75)), "1m 15s");
    }
}
