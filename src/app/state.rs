use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::search::{SearchOutcome, SearchTicket};
use crate::store::{NoteError, NoteStore, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    List,
    Reader,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub input: String,
    pub pending: Option<SearchTicket>,
    pub summary: Option<String>,
    /// Query of the last delivered result, used for highlighting.
    pub highlight: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewNoteOverlay {
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct RenameNoteOverlay {
    pub original: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct DeleteNoteOverlay {
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Save,
    Open,
}

#[derive(Debug, Clone)]
pub struct FileOverlay {
    pub action: FileAction,
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    NewNote(NewNoteOverlay),
    RenameNote(RenameNoteOverlay),
    DeleteNote(DeleteNoteOverlay),
    File(FileOverlay),
    ConfirmQuit,
}

/// Editable copy of the displayed note's body.
///
/// Changes stay here until the selection moves or the notes are saved.
/// The cursor is a byte offset that always sits on a grapheme boundary.
#[derive(Debug, Clone)]
pub struct EditorState {
    title: String,
    buffer: String,
    cursor: usize,
    dirty: bool,
}

impl EditorState {
    fn new(title: String, buffer: String) -> Self {
        Self {
            title,
            buffer,
            cursor: 0,
            dirty: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.dirty = true;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) -> bool {
        let Some(prev) = self.step_back() else {
            return false;
        };
        self.buffer.replace_range(prev..self.cursor, "");
        self.cursor = prev;
        self.dirty = true;
        true
    }

    pub fn delete(&mut self) -> bool {
        let Some(next) = self.step_forward() else {
            return false;
        };
        self.buffer.replace_range(self.cursor..next, "");
        self.dirty = true;
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.jump(self.step_back())
    }

    pub fn move_right(&mut self) -> bool {
        self.jump(self.step_forward())
    }

    pub fn move_home(&mut self) -> bool {
        let (start, _) = line_containing(&self.buffer, self.cursor);
        self.jump(Some(start))
    }

    pub fn move_end(&mut self) -> bool {
        let (_, end) = line_containing(&self.buffer, self.cursor);
        self.jump(Some(end))
    }

    /// Moves to the same column on the previous line, or to the very start
    /// from the first line.
    pub fn move_up(&mut self) -> bool {
        let (start, _) = line_containing(&self.buffer, self.cursor);
        if start == 0 {
            return self.jump(Some(0));
        }
        let above = line_containing(&self.buffer, start - 1);
        self.jump(Some(offset_at_column(&self.buffer, above, self.column())))
    }

    /// Moves to the same column on the next line, or to the very end from
    /// the last line.
    pub fn move_down(&mut self) -> bool {
        let (_, end) = line_containing(&self.buffer, self.cursor);
        if end == self.buffer.len() {
            return self.jump(Some(end));
        }
        let below = line_containing(&self.buffer, end + 1);
        self.jump(Some(offset_at_column(&self.buffer, below, self.column())))
    }

    fn jump(&mut self, target: Option<usize>) -> bool {
        match target {
            Some(target) if target != self.cursor => {
                self.cursor = target;
                true
            }
            _ => false,
        }
    }

    fn step_back(&self) -> Option<usize> {
        self.buffer[..self.cursor]
            .grapheme_indices(true)
            .next_back()
            .map(|(idx, _)| idx)
    }

    fn step_forward(&self) -> Option<usize> {
        self.buffer[self.cursor..]
            .graphemes(true)
            .next()
            .map(|grapheme| self.cursor + grapheme.len())
    }

    /// Graphemes between the start of the cursor's line and the cursor.
    fn column(&self) -> usize {
        let (start, _) = line_containing(&self.buffer, self.cursor);
        self.buffer[start..self.cursor].graphemes(true).count()
    }
}

/// Everything the interface shows, independent of the terminal.
#[derive(Debug, Clone)]
pub struct AppState {
    pub focus: FocusPane,
    pub selected: usize,
    pub search: SearchState,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub wrap_enabled: bool,
    pub highlight_enabled: bool,
    store: NoteStore,
    editor: Option<EditorState>,
    current_file: Option<PathBuf>,
    modified: bool,
    last_saved_at: Option<OffsetDateTime>,
}

impl AppState {
    pub fn new(store: NoteStore, current_file: Option<PathBuf>) -> Self {
        let mut state = Self {
            focus: FocusPane::List,
            selected: 0,
            search: SearchState::default(),
            status_message: None,
            overlay: None,
            wrap_enabled: true,
            highlight_enabled: true,
            store,
            editor: None,
            current_file,
            modified: false,
            last_saved_at: None,
        };
        state.display_selected();
        state
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn selected_title(&self) -> Option<&str> {
        self.store.title_at(self.selected)
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.last_saved_at
    }

    /// True when the store or the open buffer differs from the last save/load.
    pub fn has_unsaved_changes(&self) -> bool {
        self.modified || self.editor_dirty()
    }

    pub fn editor(&self) -> Option<&EditorState> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorState> {
        self.editor.as_mut()
    }

    pub fn editor_dirty(&self) -> bool {
        self.editor
            .as_ref()
            .map(|editor| editor.is_dirty())
            .unwrap_or(false)
    }

    pub fn is_editing(&self) -> bool {
        self.focus == FocusPane::Reader && self.editor.is_some()
    }

    pub fn toggle_wrap(&mut self) -> bool {
        self.wrap_enabled = !self.wrap_enabled;
        self.wrap_enabled
    }

    pub fn focus_reader(&mut self) -> bool {
        if self.editor.is_none() {
            return false;
        }
        self.focus = FocusPane::Reader;
        true
    }

    pub fn focus_list(&mut self) {
        self.focus = FocusPane::List;
    }

    /// Commits the open buffer into the store.
    pub fn flush_editor(&mut self) -> Result<(), NoteError> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };
        if !editor.is_dirty() {
            return Ok(());
        }
        self.store.set_body(&editor.title, editor.buffer.clone())?;
        editor.mark_clean();
        self.modified = true;
        Ok(())
    }

    /// Selection change: the previous note's buffer is flushed before the
    /// newly selected note is displayed.
    pub fn select(&mut self, index: usize) -> Result<(), NoteError> {
        if self.store.is_empty() {
            return Ok(());
        }
        let index = index.min(self.store.len() - 1);
        if index == self.selected && self.editor.is_some() {
            return Ok(());
        }
        self.flush_editor()?;
        self.selected = index;
        self.display_selected();
        Ok(())
    }

    pub fn move_selection(&mut self, delta: isize) -> Result<(), NoteError> {
        if self.store.is_empty() {
            return Ok(());
        }
        let last = self.store.len() as isize - 1;
        let next = (self.selected as isize + delta).clamp(0, last);
        self.select(next as usize)
    }

    pub fn add_note(&mut self, title: &str) -> Result<(), NoteError> {
        self.store.create(title)?;
        self.modified = true;
        let index = self.store.len() - 1;
        if let Err(err) = self.select(index) {
            // the previous note vanished from under the buffer; show the new one anyway
            tracing::warn!(?err, "failed to flush buffer while selecting new note");
            self.selected = index;
            self.display_selected();
        }
        Ok(())
    }

    pub fn rename_selected(&mut self, new_title: &str) -> Result<(), NoteError> {
        let Some(original) = self.selected_title().map(str::to_string) else {
            return Ok(());
        };
        self.flush_editor()?;
        self.store.rename(&original, new_title)?;
        self.modified = true;
        self.selected = self.store.position(new_title).unwrap_or(0);
        self.display_selected();
        Ok(())
    }

    /// Removes the selected note. Its unsaved buffer is dropped with it.
    pub fn delete_selected(&mut self) -> Result<Option<String>, NoteError> {
        let Some(title) = self.selected_title().map(str::to_string) else {
            return Ok(None);
        };
        self.store.remove(&title)?;
        self.editor = None;
        self.modified = true;
        self.normalize_selection();
        self.display_selected();
        Ok(Some(title))
    }

    /// Replaces every note with freshly loaded ones; pending edits are dropped.
    pub fn replace_store(&mut self, store: NoteStore, path: PathBuf) {
        self.store = store;
        self.editor = None;
        self.selected = 0;
        self.focus = FocusPane::List;
        self.current_file = Some(path);
        self.modified = false;
        self.display_selected();
    }

    /// Flushes the open buffer and hands out the store for writing.
    pub fn prepare_save(&mut self) -> Result<&NoteStore, NoteError> {
        self.flush_editor()?;
        Ok(&self.store)
    }

    pub fn mark_saved(&mut self, path: PathBuf, at: OffsetDateTime) {
        self.current_file = Some(path);
        self.modified = false;
        self.last_saved_at = Some(at);
    }

    /// Snapshot for the search worker. The open buffer is deliberately not
    /// flushed, so unsaved edits are not searched.
    pub fn search_snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
        self.focus = FocusPane::List;
    }

    pub fn cancel_search(&mut self) {
        self.search.active = false;
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.search.input.push(ch);
    }

    pub fn pop_search_char(&mut self) {
        self.search.input.pop();
    }

    pub fn search_input(&self) -> &str {
        &self.search.input
    }

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn is_search_pending(&self) -> bool {
        self.search.pending.is_some()
    }

    pub fn search_dispatched(&mut self, ticket: SearchTicket) {
        self.search.active = false;
        self.search.pending = Some(ticket);
    }

    pub fn apply_search_outcome(&mut self, outcome: SearchOutcome) {
        if self.search.pending.is_some_and(|ticket| ticket != outcome.ticket) {
            tracing::debug!(ticket = outcome.ticket.id(), "ignoring result for older search");
            return;
        }
        self.search.pending = None;
        self.search.summary = Some(outcome.summary());
        self.search.highlight = Some(outcome.query);
    }

    pub fn search_summary(&self) -> Option<&str> {
        self.search.summary.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_new_note(&mut self) {
        self.overlay = Some(OverlayState::NewNote(NewNoteOverlay::default()));
    }

    pub fn open_rename_note(&mut self) -> bool {
        let Some(title) = self.selected_title().map(str::to_string) else {
            return false;
        };
        self.overlay = Some(OverlayState::RenameNote(RenameNoteOverlay {
            original: title.clone(),
            title,
        }));
        true
    }

    pub fn open_delete_note(&mut self) -> bool {
        let Some(title) = self.selected_title().map(str::to_string) else {
            return false;
        };
        self.overlay = Some(OverlayState::DeleteNote(DeleteNoteOverlay { title }));
        true
    }

    pub fn open_file_prompt(&mut self, action: FileAction, default_path: Option<&Path>) {
        let path = self
            .current_file
            .as_deref()
            .or(default_path)
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.overlay = Some(OverlayState::File(FileOverlay { action, path }));
    }

    pub fn open_confirm_quit(&mut self) {
        self.overlay = Some(OverlayState::ConfirmQuit);
    }

    /// Text field of the open prompt, if the overlay has one.
    pub fn overlay_input_mut(&mut self) -> Option<&mut String> {
        match self.overlay.as_mut()? {
            OverlayState::NewNote(draft) => Some(&mut draft.title),
            OverlayState::RenameNote(draft) => Some(&mut draft.title),
            OverlayState::File(prompt) => Some(&mut prompt.path),
            OverlayState::DeleteNote(_) | OverlayState::ConfirmQuit => None,
        }
    }

    fn display_selected(&mut self) {
        self.editor = self.store.title_at(self.selected).map(|title| {
            let body = self.store.get(title).unwrap_or_default().to_string();
            EditorState::new(title.to_string(), body)
        });
        if self.editor.is_none() {
            self.focus = FocusPane::List;
        }
    }

    fn normalize_selection(&mut self) {
        if self.store.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.store.len() {
            self.selected = self.store.len() - 1;
        }
    }
}

/// Byte range of the line holding `offset`, without its newline.
fn line_containing(text: &str, offset: usize) -> (usize, usize) {
    let start = text[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |idx| offset + idx);
    (start, end)
}

/// Offset of `column` within the line, clamped to the line's end.
fn offset_at_column(text: &str, (start, end): (usize, usize), column: usize) -> usize {
    text[start..end]
        .grapheme_indices(true)
        .nth(column)
        .map_or(end, |(idx, _)| start + idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchWorker;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn state_with(entries: &[(&str, &str)]) -> AppState {
        let store = entries
            .iter()
            .map(|(t, b)| (t.to_string(), b.to_string()))
            .collect();
        AppState::new(store, None)
    }

    fn type_text(state: &mut AppState, text: &str) {
        let editor = state.editor_mut().expect("editor open");
        for ch in text.chars() {
            if ch == '\n' {
                editor.insert_newline();
            } else {
                editor.insert_char(ch);
            }
        }
    }

    #[test]
    fn first_note_is_displayed_on_start() {
        let state = state_with(&[("a", "alpha"), ("b", "beta")]);
        assert_eq!(state.selected_title(), Some("a"));
        assert_eq!(state.editor().map(EditorState::buffer), Some("alpha"));
        assert!(!state.has_unsaved_changes());
    }

    #[test]
    fn edits_stay_pending_until_selection_changes() {
        let mut state = state_with(&[("a", ""), ("b", "beta")]);
        type_text(&mut state, "draft");
        assert_eq!(state.store().get("a").unwrap(), "");
        assert!(state.has_unsaved_changes());

        state.move_selection(1).unwrap();
        assert_eq!(state.store().get("a").unwrap(), "draft");
        assert_eq!(state.editor().map(EditorState::buffer), Some("beta"));
    }

    #[test]
    fn search_snapshot_does_not_see_pending_edits() {
        let mut state = state_with(&[("a", "")]);
        type_text(&mut state, "needle");
        let snapshot = state.search_snapshot();
        assert_eq!(snapshot.iter().next(), Some(("a", "")));
    }

    #[test]
    fn save_flushes_pending_buffer() {
        let mut state = state_with(&[("a", "old")]);
        state.editor_mut().unwrap().move_end();
        type_text(&mut state, " new");
        let store = state.prepare_save().unwrap();
        assert_eq!(store.get("a").unwrap(), "old new");

        state.mark_saved(PathBuf::from("notes.txt"), OffsetDateTime::now_utc());
        assert!(!state.has_unsaved_changes());
        assert_eq!(state.current_file(), Some(Path::new("notes.txt")));
    }

    #[test]
    fn add_note_appends_and_selects_after_flushing() {
        let mut state = state_with(&[("a", "")]);
        type_text(&mut state, "kept");
        state.add_note("b").unwrap();
        assert_eq!(state.selected_title(), Some("b"));
        assert_eq!(state.store().get("a").unwrap(), "kept");
        assert_eq!(state.store().titles().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn add_note_rejects_duplicates_without_touching_store() {
        let mut state = state_with(&[("a", "body")]);
        assert_matches!(state.add_note("a"), Err(NoteError::DuplicateTitle { .. }));
        assert_eq!(state.store().get("a").unwrap(), "body");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn delete_discards_buffer_and_selects_neighbour() {
        let mut state = state_with(&[("a", ""), ("b", "beta"), ("c", "gamma")]);
        state.select(2).unwrap();
        type_text(&mut state, "lost");
        assert_eq!(state.delete_selected().unwrap().as_deref(), Some("c"));
        assert_eq!(state.selected_title(), Some("b"));
        assert_eq!(state.editor().map(EditorState::buffer), Some("beta"));
        assert!(!state.store().contains("c"));
    }

    #[test]
    fn delete_with_empty_store_is_noop() {
        let mut state = state_with(&[]);
        assert_eq!(state.delete_selected().unwrap(), None);
        assert!(state.editor().is_none());
    }

    #[test]
    fn rename_keeps_pending_edits() {
        let mut state = state_with(&[("a", ""), ("b", "")]);
        type_text(&mut state, "text");
        state.rename_selected("z").unwrap();
        assert_eq!(state.selected_title(), Some("z"));
        assert_eq!(state.store().get("z").unwrap(), "text");
        assert_eq!(state.store().titles().collect::<Vec<_>>(), vec!["b", "z"]);
    }

    #[test]
    fn load_replaces_store_and_drops_buffer() {
        let mut state = state_with(&[("a", "")]);
        type_text(&mut state, "unsaved");
        let mut loaded = NoteStore::new();
        loaded.insert("x", "from disk");
        state.replace_store(loaded, PathBuf::from("other.txt"));

        assert_eq!(state.store().titles().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(state.editor().map(EditorState::buffer), Some("from disk"));
        assert!(!state.has_unsaved_changes());
    }

    #[test]
    fn stale_search_outcomes_do_not_replace_summary() {
        let mut state = state_with(&[("Recipe", "sugar"), ("Other", "")]);
        let worker = SearchWorker::new();
        let first = worker
            .dispatch(state.search_snapshot(), "sugar")
            .unwrap()
            .unwrap();
        let first_outcome = worker.wait(first, Duration::from_secs(5)).unwrap();
        let second = worker
            .dispatch(state.search_snapshot(), "other")
            .unwrap()
            .unwrap();
        state.search_dispatched(second);

        state.apply_search_outcome(first_outcome);
        assert_eq!(state.search_summary(), None);
        assert!(state.is_search_pending());

        let second_outcome = worker.wait(second, Duration::from_secs(5)).unwrap();
        state.apply_search_outcome(second_outcome);
        assert_eq!(state.search_summary(), Some("Found: Other"));
        assert_eq!(state.search.highlight.as_deref(), Some("other"));
    }

    #[test]
    fn editor_vertical_motion_uses_current_column() {
        let mut editor = EditorState::new("t".into(), "abcdef\nxy\nlonger line".to_string());
        for _ in 0..4 {
            editor.move_right();
        }
        // short line clamps to its end
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 9);
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 12);
        assert!(editor.move_up());
        assert_eq!(editor.cursor(), 9);
        assert!(editor.move_up());
        assert_eq!(editor.cursor(), 2);
    }

    #[test]
    fn editor_vertical_motion_stops_at_buffer_edges() {
        let mut editor = EditorState::new("t".into(), "ab\ncd".to_string());
        assert!(!editor.move_up());
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 3);
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 5);
        assert!(!editor.move_down());
        assert!(editor.move_up());
        assert_eq!(editor.cursor(), 2);
        assert!(editor.move_up());
        assert_eq!(editor.cursor(), 0);
    }

    #[test]
    fn editor_delete_and_motion_respect_graphemes() {
        let mut editor = EditorState::new("t".into(), "e\u{301}x".to_string());
        assert!(editor.move_right());
        assert_eq!(editor.cursor(), 3);
        assert!(editor.move_left());
        assert!(editor.delete());
        assert_eq!(editor.buffer(), "x");
        assert!(editor.move_end());
        assert!(!editor.delete());
        assert!(!editor.move_right());
    }

    #[test]
    fn editor_backspace_removes_whole_grapheme() {
        let mut editor = EditorState::new("t".into(), "cafe\u{301}".to_string());
        editor.move_end();
        assert!(editor.backspace());
        assert_eq!(editor.buffer(), "caf");
        assert!(editor.is_dirty());
    }
}
