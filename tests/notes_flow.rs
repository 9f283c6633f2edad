use std::fs;
use std::time::Duration;

use anyhow::Result;
use flatnotes::config::StorageOptions;
use flatnotes::search::{search, SearchQuery, SearchWorker};
use flatnotes::storage::codec;
use flatnotes::{NoteError, NoteStore, NotesFile};
use tempfile::TempDir;

#[test]
fn notes_survive_save_and_reload_then_search() -> Result<()> {
    let temp = TempDir::new()?;
    let file = NotesFile::new(temp.path().join("notes.txt"), &StorageOptions::default());

    let mut store = NoteStore::new();
    store.insert("Recipe", "flour and sugar");
    store.insert("Shopping", "milk\neggs");
    store.create("Empty")?;
    store.insert("Journal", "");
    store.remove("Journal")?;
    file.save(&store)?;

    let reloaded = file.load()?;
    assert_eq!(reloaded, store);
    assert_eq!(
        reloaded.titles().collect::<Vec<_>>(),
        vec!["Recipe", "Shopping", "Empty"]
    );

    let worker = SearchWorker::new();
    let ticket = worker
        .dispatch(reloaded.snapshot(), "SUGAR")?
        .expect("non-empty query");
    let outcome = worker
        .wait(ticket, Duration::from_secs(5))
        .expect("search result");
    assert_eq!(outcome.summary(), "Found: Recipe");
    Ok(())
}

#[test]
fn saved_file_matches_flat_format() -> Result<()> {
    let temp = TempDir::new()?;
    let file = NotesFile::new(temp.path().join("notes.txt"), &StorageOptions::default());
    let mut store = NoteStore::new();
    store.insert("Shopping", "milk\neggs");
    file.save(&store)?;

    let raw = fs::read_to_string(file.path())?;
    assert_eq!(raw, "Shopping\nmilk\neggs\n--------------------\n");
    assert_eq!(codec::encode(&codec::decode(&raw)?), raw);
    Ok(())
}

#[test]
fn search_matches_titles_and_bodies() {
    let mut store = NoteStore::new();
    store.insert("Recipe", "x");
    store.insert("Errands", "pick up the RECeipt");
    let query = SearchQuery::parse("rec").expect("query");
    assert_eq!(search(&store.snapshot(), &query), vec!["Recipe", "Errands"]);
    assert!(SearchQuery::parse("").is_none());
}

#[test]
fn removing_missing_note_is_an_error() {
    let mut store = NoteStore::new();
    store.insert("Only", "one");
    assert!(matches!(
        store.remove("Other"),
        Err(NoteError::NotFound { .. })
    ));
    assert_eq!(store.len(), 1);
}
