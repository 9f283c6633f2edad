//! In-memory note collection keyed by title.
//!
//! Display order is insertion order. The store has no knowledge of how it is
//! rendered or persisted; the interface and the codec both sit on top of it.

use std::sync::Arc;

use indexmap::map::Iter as IndexIter;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("note '{title}' not found")]
    NotFound { title: String },
    #[error("a note titled '{title}' already exists")]
    DuplicateTitle { title: String },
    #[error("note title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteStore {
    notes: IndexMap<String, String>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.notes.contains_key(title)
    }

    /// Inserts or overwrites a note.
    ///
    /// An existing title keeps its position and has its body replaced; the
    /// previous body is returned. New titles are appended.
    pub fn insert(&mut self, title: impl Into<String>, body: impl Into<String>) -> Option<String> {
        self.notes.insert(title.into(), body.into())
    }

    /// Appends an empty note, refusing empty or already-used titles.
    /// Titles are kept exactly as given, surrounding spaces included.
    pub fn create(&mut self, title: &str) -> Result<(), NoteError> {
        if title.is_empty() {
            return Err(NoteError::EmptyTitle);
        }
        if self.notes.contains_key(title) {
            return Err(NoteError::DuplicateTitle {
                title: title.to_string(),
            });
        }
        self.notes.insert(title.to_string(), String::new());
        Ok(())
    }

    pub fn remove(&mut self, title: &str) -> Result<String, NoteError> {
        self.notes
            .shift_remove(title)
            .ok_or_else(|| not_found(title))
    }

    pub fn get(&self, title: &str) -> Result<&str, NoteError> {
        self.notes
            .get(title)
            .map(String::as_str)
            .ok_or_else(|| not_found(title))
    }

    pub fn set_body(&mut self, title: &str, body: impl Into<String>) -> Result<(), NoteError> {
        let slot = self.notes.get_mut(title).ok_or_else(|| not_found(title))?;
        *slot = body.into();
        Ok(())
    }

    /// Renames a note. The note moves to the end of the display order.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), NoteError> {
        if to.is_empty() {
            return Err(NoteError::EmptyTitle);
        }
        if !self.notes.contains_key(from) {
            return Err(not_found(from));
        }
        if from == to {
            return Ok(());
        }
        if self.notes.contains_key(to) {
            return Err(NoteError::DuplicateTitle {
                title: to.to_string(),
            });
        }
        let body = self.remove(from)?;
        self.notes.insert(to.to_string(), body);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.notes.iter(),
        }
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> + '_ {
        self.notes.keys().map(String::as_str)
    }

    pub fn position(&self, title: &str) -> Option<usize> {
        self.notes.get_index_of(title)
    }

    pub fn title_at(&self, index: usize) -> Option<&str> {
        self.notes.get_index(index).map(|(title, _)| title.as_str())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            notes: Arc::new(self.notes.clone()),
        }
    }
}

fn not_found(title: &str) -> NoteError {
    NoteError::NotFound {
        title: title.to_string(),
    }
}

impl FromIterator<(String, String)> for NoteStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut store = NoteStore::new();
        for (title, body) in iter {
            store.insert(title, body);
        }
        store
    }
}

impl<'a> IntoIterator for &'a NoteStore {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a> {
    inner: IndexIter<'a, String, String>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(title, body)| (title.as_str(), body.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Frozen copy of a store's contents, cheap to clone and safe to hand to
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    notes: Arc<IndexMap<String, String>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.notes
            .iter()
            .map(|(title, body)| (title.as_str(), body.as_str()))
    }
}

impl From<&NoteStore> for Snapshot {
    fn from(store: &NoteStore) -> Self {
        store.snapshot()
    }
}
