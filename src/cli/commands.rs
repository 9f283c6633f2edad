use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::config::AppConfig;
use crate::search::SearchWorker;
use crate::storage::NotesFile;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Args, Debug, Clone)]
pub struct TuiArgs {
    /// Notes file to open on start
    #[arg()]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Notes file to read
    pub file: PathBuf,
    /// Print every note as a JSON array of {title, body}
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub file: PathBuf,
    pub title: String,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Notes file to update; created when missing
    pub file: PathBuf,
    pub title: String,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Overwrite an existing note with the same title
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    pub file: PathBuf,
    pub title: String,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    pub file: PathBuf,
    /// Search text; several words are joined with spaces
    #[arg(required = true)]
    pub query: Vec<String>,
}

#[derive(Serialize)]
struct NoteJson<'a> {
    title: &'a str,
    body: &'a str,
}

pub fn run_tui(config: Arc<AppConfig>, args: TuiArgs) -> Result<()> {
    let mut app = App::new(config, args.file)?;
    app.run()
}

pub fn list_notes(config: &AppConfig, args: ListArgs) -> Result<()> {
    let file = NotesFile::new(&args.file, &config.storage);
    print!("{}", render_list(&file, args.json)?);
    Ok(())
}

pub fn show_note(config: &AppConfig, args: ShowArgs) -> Result<()> {
    let file = NotesFile::new(&args.file, &config.storage);
    println!("{}", render_body(&file, &args.title)?);
    Ok(())
}

pub fn add_note(config: &AppConfig, args: AddArgs) -> Result<()> {
    let body = match args.body.clone() {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let file = NotesFile::new(&args.file, &config.storage);
    println!("{}", apply_add(&file, &args.title, body, args.force)?);
    Ok(())
}

pub fn remove_note(config: &AppConfig, args: RemoveArgs) -> Result<()> {
    let file = NotesFile::new(&args.file, &config.storage);
    println!("{}", apply_remove(&file, &args.title)?);
    Ok(())
}

pub fn search_notes(config: &AppConfig, args: SearchArgs) -> Result<()> {
    let file = NotesFile::new(&args.file, &config.storage);
    println!("{}", run_search(&file, &args.query)?);
    Ok(())
}

fn render_list(file: &NotesFile, json: bool) -> Result<String> {
    let store = file.load()?;
    if json {
        let notes: Vec<NoteJson<'_>> = store
            .iter()
            .map(|(title, body)| NoteJson { title, body })
            .collect();
        let mut out = serde_json::to_string_pretty(&notes).context("encoding notes as json")?;
        out.push('\n');
        return Ok(out);
    }
    let mut out = String::new();
    for title in store.titles() {
        let _ = writeln!(&mut out, "{title}");
    }
    Ok(out)
}

fn render_body(file: &NotesFile, title: &str) -> Result<String> {
    let store = file.load()?;
    let body = store
        .get(title)
        .with_context(|| format!("reading note from {}", file.path().display()))?;
    Ok(body.to_string())
}

fn apply_add(file: &NotesFile, title: &str, body: String, force: bool) -> Result<String> {
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let mut store = file.load_or_default()?;
    let message = if force {
        match store.insert(title, body) {
            Some(_) => format!("Replaced note '{title}'"),
            None => format!("Added note '{title}'"),
        }
    } else {
        store
            .create(title)
            .context("use --force to overwrite the existing note")?;
        store.set_body(title, body)?;
        format!("Added note '{title}'")
    };
    file.save(&store)?;
    Ok(message)
}

fn apply_remove(file: &NotesFile, title: &str) -> Result<String> {
    let mut store = file.load()?;
    store
        .remove(title)
        .with_context(|| format!("removing note from {}", file.path().display()))?;
    file.save(&store)?;
    Ok(format!("Removed note '{title}' ({} left)", store.len()))
}

fn run_search(file: &NotesFile, query: &[String]) -> Result<String> {
    let raw_query = query.join(" ");
    let store = file.load()?;
    let worker = SearchWorker::new();
    let Some(ticket) = worker.dispatch(store.snapshot(), &raw_query)? else {
        bail!("search query cannot be empty");
    };
    let outcome = worker
        .wait(ticket, SEARCH_TIMEOUT)
        .context("search did not finish in time")?;
    tracing::debug!(
        hits = outcome.titles.len(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "search finished"
    );
    Ok(outcome.summary())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading note body from stdin")?;
    Ok(Some(buf))
}
