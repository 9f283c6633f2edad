use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::StorageOptions;
use crate::store::NoteStore;

pub mod codec;

pub use codec::{CodecError, SEPARATOR};

const TMP_EXTENSION: &str = "tmp";
const BACKUP_EXTENSION: &str = "bak";

/// A notes file on disk. Reads and writes are synchronous.
#[derive(Debug, Clone)]
pub struct NotesFile {
    path: PathBuf,
    backup_on_save: bool,
}

impl NotesFile {
    pub fn new(path: impl Into<PathBuf>, options: &StorageOptions) -> Self {
        Self {
            path: path.into(),
            backup_on_save: options.backup_on_save,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<NoteStore> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading notes file {}", self.path.display()))?;
        let raw = normalize_line_endings(&raw);
        let store = codec::decode(&raw)
            .with_context(|| format!("parsing notes file {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), notes = store.len(), "loaded notes");
        Ok(store)
    }

    /// Loads the file, or returns an empty store when it does not exist yet.
    pub fn load_or_default(&self) -> Result<NoteStore> {
        if self.exists() {
            self.load()
        } else {
            Ok(NoteStore::new())
        }
    }

    pub fn save(&self, store: &NoteStore) -> Result<()> {
        let fragile = codec::fragile_titles(store);
        if !fragile.is_empty() {
            tracing::warn!(
                ?fragile,
                "notes contain line breaks or separator lines that will not reload intact"
            );
        }
        let payload = codec::encode(store);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        if self.backup_on_save && self.exists() {
            let backup = self.sibling(BACKUP_EXTENSION);
            fs::copy(&self.path, &backup)
                .with_context(|| format!("backing up notes to {}", backup.display()))?;
        }

        let tmp_path = self.sibling(TMP_EXTENSION);
        fs::write(&tmp_path, payload.as_bytes())
            .with_context(|| format!("writing temporary notes file {}", tmp_path.display()))?;
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            remove_if_present(&tmp_path);
            return Err(err)
                .with_context(|| format!("replacing notes file {}", self.path.display()));
        }
        tracing::info!(path = %self.path.display(), notes = store.len(), "saved notes");
        Ok(())
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(extension);
        self.path.with_file_name(name)
    }
}

/// Files written on Windows use `\r\n`; the codec only knows `\n`.
fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(?err, path = %path.display(), "failed to remove temp file"),
    }
}
