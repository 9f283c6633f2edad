use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::search::SearchWorker;
use crate::storage::NotesFile;
use crate::store::{NoteError, NoteStore};
use crate::ui;

pub mod state;

pub use state::{AppState, EditorState, FileAction, FocusPane, OverlayState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    NewNote,
    RenameNote,
    DeleteNote,
    EnterEdit,
    StartSearch,
    Save,
    Open,
    ToggleWrap,
}

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    worker: SearchWorker,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    /// Builds the interface state, loading `initial_file` when given.
    pub fn new(config: Arc<AppConfig>, initial_file: Option<PathBuf>) -> Result<Self> {
        let (store, current_file) = match initial_file {
            Some(path) => {
                let store = NotesFile::new(&path, &config.storage)
                    .load_or_default()
                    .with_context(|| format!("loading initial notes from {}", path.display()))?;
                (store, Some(path))
            }
            None => (NoteStore::new(), None),
        };
        let mut state = AppState::new(store, current_file);
        state.wrap_enabled = config.ui.wrap;
        state.highlight_enabled = config.search.highlight;
        state.set_status_message(Some("a add • / search • s save • o open • q quit"));

        Ok(Self {
            tick_rate: config.ui.tick_rate(),
            config,
            state,
            worker: SearchWorker::new(),
            list_state: ListState::default(),
            should_quit: false,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        // in-flight searches are detached; superseding them lets them stop early
        self.worker.cancel();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw picks up the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if let Some(outcome) = self.worker.poll() {
            tracing::debug!(
                ticket = outcome.ticket.id(),
                hits = outcome.titles.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "search finished"
            );
            self.state.apply_search_outcome(outcome);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_editing() && self.handle_editor_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_search();
                    self.state.set_status_message(Some("Search canceled"));
                    return;
                }
                KeyCode::Enter => {
                    self.submit_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char();
                    return;
                }
                KeyCode::Char(ch) if !has_command_modifier(key) => {
                    self.state.push_search_char(ch);
                    return;
                }
                _ => {}
            }
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Save)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Enter | KeyCode::Tab => Some(Action::EnterEdit),
            KeyCode::Char('a') if !has_command_modifier(key) => Some(Action::NewNote),
            KeyCode::Char('r') if !has_command_modifier(key) => Some(Action::RenameNote),
            KeyCode::Char('d') if !has_command_modifier(key) => Some(Action::DeleteNote),
            KeyCode::Char('e') if !has_command_modifier(key) => Some(Action::EnterEdit),
            KeyCode::Char('s') if !has_command_modifier(key) => Some(Action::Save),
            KeyCode::Char('o') if !has_command_modifier(key) => Some(Action::Open),
            KeyCode::Char('/') if !has_command_modifier(key) => Some(Action::StartSearch),
            KeyCode::Char('W') => Some(Action::ToggleWrap),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.handle_quit(),
            Action::SelectNext => self.handle_move_selection(1),
            Action::SelectPrevious => self.handle_move_selection(-1),
            Action::NewNote => {
                self.state.open_new_note();
                self.state
                    .set_status_message(Some("New note: type a title • Enter create • Esc cancel"));
            }
            Action::RenameNote => {
                if self.state.open_rename_note() {
                    self.state.set_status_message(Some(
                        "Rename note: type new title • Enter save • Esc cancel",
                    ));
                } else {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::DeleteNote => {
                if self.state.open_delete_note() {
                    self.state
                        .set_status_message(Some("Delete note: Enter confirm • Esc cancel"));
                } else {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::EnterEdit => {
                if self.state.focus_reader() {
                    self.state
                        .set_status_message(Some("Editing: Esc back to list • Ctrl-s save"));
                } else {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::StartSearch => {
                self.state.begin_search();
                self.state
                    .set_status_message(Some("Search: type text • Enter run • Esc cancel"));
            }
            Action::Save => self.open_file_prompt(FileAction::Save),
            Action::Open => self.open_file_prompt(FileAction::Open),
            Action::ToggleWrap => {
                let message = if self.state.toggle_wrap() {
                    "Word wrap enabled"
                } else {
                    "Word wrap disabled"
                };
                self.state.set_status_message(Some(message));
            }
        }
    }

    fn handle_quit(&mut self) {
        if self.state.has_unsaved_changes() {
            self.state.open_confirm_quit();
            self.state.set_status_message(Some(
                "Unsaved changes: y/Enter quit anyway • Esc keep editing",
            ));
        } else {
            self.should_quit = true;
        }
    }

    fn handle_move_selection(&mut self, delta: isize) {
        if let Err(err) = self.state.move_selection(delta) {
            tracing::error!(?err, "failed to commit note before changing selection");
            self.state.set_status_message(Some(err.to_string()));
        }
    }

    fn open_file_prompt(&mut self, action: FileAction) {
        let default_path = self.config.storage.notes_file.clone();
        self.state.open_file_prompt(action, default_path.as_deref());
        let message = match action {
            FileAction::Save => "Save notes to: Enter confirm • Esc cancel",
            FileAction::Open => "Open notes from: Enter confirm • Esc cancel",
        };
        self.state.set_status_message(Some(message));
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let Some(overlay) = self.state.overlay() else {
            return false;
        };

        match overlay {
            OverlayState::DeleteNote(_) => match key.code {
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.state.close_overlay();
                    self.state.set_status_message(Some("Delete canceled"));
                }
                KeyCode::Enter | KeyCode::Char('y') => self.submit_delete_note(),
                _ => {}
            },
            OverlayState::ConfirmQuit => match key.code {
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.state.close_overlay();
                    self.state.set_status_message(None::<String>);
                }
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.state.close_overlay();
                    self.should_quit = true;
                }
                _ => {}
            },
            OverlayState::NewNote(_) | OverlayState::RenameNote(_) | OverlayState::File(_) => {
                let limit = match overlay {
                    OverlayState::File(_) => None,
                    _ => Some(self.config.ui.title_max_len),
                };
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled"));
                    }
                    KeyCode::Enter => self.submit_overlay(),
                    KeyCode::Backspace => {
                        if let Some(input) = self.state.overlay_input_mut() {
                            input.pop();
                        }
                    }
                    KeyCode::Char(ch) if !has_command_modifier(key) => {
                        if let Some(input) = self.state.overlay_input_mut() {
                            if limit.map_or(true, |max| input.chars().count() < max) {
                                input.push(ch);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        true
    }

    fn submit_overlay(&mut self) {
        match self.state.overlay().cloned() {
            Some(OverlayState::NewNote(draft)) => self.submit_new_note(&draft.title),
            Some(OverlayState::RenameNote(draft)) => self.submit_rename_note(&draft.title),
            Some(OverlayState::File(prompt)) => {
                let path = prompt.path.trim();
                if path.is_empty() {
                    self.state.set_status_message(Some("Path cannot be empty"));
                    return;
                }
                let path = PathBuf::from(path);
                match prompt.action {
                    FileAction::Save => self.save_to(path),
                    FileAction::Open => self.load_from(path),
                }
            }
            _ => {}
        }
    }

    fn submit_new_note(&mut self, title: &str) {
        if title.is_empty() {
            // an empty title behaves like cancelling the prompt
            self.state.close_overlay();
            self.state.set_status_message(None::<String>);
            return;
        }
        match self.state.add_note(title) {
            Ok(()) => {
                self.state.close_overlay();
                self.state.set_status_message(Some("Note created"));
            }
            Err(err @ NoteError::DuplicateTitle { .. }) => {
                self.state.set_status_message(Some(err.to_string()));
            }
            Err(err) => {
                tracing::error!(?err, "failed to create note");
                self.state.set_status_message(Some("Failed to create note"));
            }
        }
    }

    fn submit_rename_note(&mut self, title: &str) {
        if title.is_empty() {
            self.state.set_status_message(Some("Title cannot be empty"));
            return;
        }
        match self.state.rename_selected(title) {
            Ok(()) => {
                self.state.close_overlay();
                self.state.set_status_message(Some("Note renamed"));
            }
            Err(err @ NoteError::DuplicateTitle { .. }) => {
                self.state.set_status_message(Some(err.to_string()));
            }
            Err(err) => {
                tracing::error!(?err, "failed to rename note");
                self.state.set_status_message(Some("Failed to rename note"));
            }
        }
    }

    fn submit_delete_note(&mut self) {
        self.state.close_overlay();
        match self.state.delete_selected() {
            Ok(Some(title)) => {
                self.state
                    .set_status_message(Some(format!("Deleted '{title}'")));
            }
            Ok(None) => self.state.set_status_message(Some("No note selected")),
            Err(err) => {
                tracing::error!(?err, "failed to delete note");
                self.state.set_status_message(Some("Failed to delete note"));
            }
        }
    }

    fn save_to(&mut self, path: PathBuf) {
        let file = NotesFile::new(&path, &self.config.storage);
        let result = self
            .state
            .prepare_save()
            .map_err(anyhow::Error::from)
            .and_then(|store| file.save(store).map(|()| store.len()));
        match result {
            Ok(count) => {
                self.state.close_overlay();
                self.state.mark_saved(path, OffsetDateTime::now_utc());
                self.state
                    .set_status_message(Some(format!("Saved {count} note(s)")));
            }
            Err(err) => {
                tracing::error!(?err, path = %path.display(), "failed to save notes");
                self.state
                    .set_status_message(Some(format!("Save failed: {err:#}")));
            }
        }
    }

    fn load_from(&mut self, path: PathBuf) {
        match NotesFile::new(&path, &self.config.storage).load() {
            Ok(store) => {
                let count = store.len();
                self.state.close_overlay();
                self.state.replace_store(store, path);
                self.state
                    .set_status_message(Some(format!("Loaded {count} note(s)")));
            }
            Err(err) => {
                tracing::error!(?err, path = %path.display(), "failed to load notes");
                self.state
                    .set_status_message(Some(format!("Load failed: {err:#}")));
            }
        }
    }

    fn submit_search(&mut self) {
        let input = self.state.search_input().to_string();
        match self.worker.dispatch(self.state.search_snapshot(), &input) {
            Ok(Some(ticket)) => {
                self.state.search_dispatched(ticket);
                self.state.set_status_message(Some("Searching…"));
            }
            Ok(None) => {
                self.state.cancel_search();
                self.state.set_status_message(Some("Type something to search for"));
            }
            Err(err) => {
                tracing::error!(?err, "failed to start search");
                self.state.cancel_search();
                self.state.set_status_message(Some("Failed to start search"));
            }
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            self.open_file_prompt(FileAction::Save);
            return true;
        }

        match key.code {
            KeyCode::Esc => {
                self.state.focus_list();
                let message = if self.state.editor_dirty() {
                    "Back to list; changes are kept until you switch notes or save"
                } else {
                    "Back to list"
                };
                self.state.set_status_message(Some(message));
                true
            }
            KeyCode::Enter => self.with_editor(|editor| editor.insert_newline()),
            KeyCode::Backspace => self.with_editor(|editor| editor.backspace()),
            KeyCode::Delete => self.with_editor(|editor| editor.delete()),
            KeyCode::Tab => self.with_editor(|editor| editor.insert_char('\t')),
            KeyCode::Char(ch) if !has_command_modifier(key) => {
                self.with_editor(|editor| editor.insert_char(ch))
            }
            KeyCode::Left => self.with_editor(|editor| editor.move_left()),
            KeyCode::Right => self.with_editor(|editor| editor.move_right()),
            KeyCode::Up => self.with_editor(|editor| editor.move_up()),
            KeyCode::Down => self.with_editor(|editor| editor.move_down()),
            KeyCode::Home => self.with_editor(|editor| editor.move_home()),
            KeyCode::End => self.with_editor(|editor| editor.move_end()),
            _ => false,
        }
    }

    /// Runs `f` against the open editor. Always consumes the key.
    fn with_editor<F, R>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> R,
    {
        if let Some(editor) = self.state.editor_mut() {
            f(editor);
        }
        true
    }
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageOptions;
    use std::fs;
    use tempfile::TempDir;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn app_with_default(path: PathBuf) -> App {
        let config = AppConfig {
            storage: StorageOptions {
                notes_file: Some(path),
                backup_on_save: false,
            },
            ..AppConfig::default()
        };
        App::new(Arc::new(config), None).expect("app")
    }

    #[test]
    fn add_edit_and_save_through_keys() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("notes.txt");
        let mut app = app_with_default(path.clone());

        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "Shopping");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().selected_title(), Some("Shopping"));

        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "milk");
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "eggs");
        press(&mut app, KeyCode::Esc);
        assert!(app.state().has_unsaved_changes());

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(
            fs::read_to_string(&path)?,
            "Shopping\nmilk\neggs\n--------------------\n"
        );
        assert!(!app.state().has_unsaved_changes());
        assert!(app.state().overlay().is_none());
        Ok(())
    }

    #[test]
    fn duplicate_title_keeps_prompt_open() {
        let mut app = app_with_default(PathBuf::from("unused.txt"));
        for _ in 0..2 {
            press(&mut app, KeyCode::Char('a'));
            type_str(&mut app, "Todo");
            press(&mut app, KeyCode::Enter);
        }
        assert_eq!(app.state().len(), 1);
        assert!(matches!(app.state().overlay(), Some(OverlayState::NewNote(_))));
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("a note titled 'Todo' already exists")
        );
    }

    #[test]
    fn typed_title_is_kept_verbatim() {
        let mut app = app_with_default(PathBuf::from("unused.txt"));
        for title in ["Todo", "  Todo"] {
            press(&mut app, KeyCode::Char('a'));
            type_str(&mut app, title);
            press(&mut app, KeyCode::Enter);
        }
        assert_eq!(
            app.state().store().titles().collect::<Vec<_>>(),
            vec!["Todo", "  Todo"]
        );
        assert_eq!(app.state().selected_title(), Some("  Todo"));
        assert!(app.state().overlay().is_none());
    }

    #[test]
    fn open_failure_leaves_store_untouched() -> Result<()> {
        let temp = TempDir::new()?;
        let broken = temp.path().join("broken.txt");
        fs::write(&broken, "no newline")?;
        let mut app = app_with_default(broken);

        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "kept");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('o'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().store().titles().collect::<Vec<_>>(), vec!["kept"]);
        let status = app.state().status_message.clone().unwrap_or_default();
        assert!(status.starts_with("Load failed"), "{status}");
        Ok(())
    }

    #[test]
    fn quit_asks_for_confirmation_when_dirty() {
        let mut app = app_with_default(PathBuf::from("unused.txt"));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit());

        let mut app = app_with_default(PathBuf::from("unused.txt"));
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "x");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit());
        assert!(matches!(app.state().overlay(), Some(OverlayState::ConfirmQuit)));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.should_quit());
    }

    #[test]
    fn search_results_arrive_on_tick() {
        let mut app = app_with_default(PathBuf::from("unused.txt"));
        for title in ["Recipe", "Travel"] {
            press(&mut app, KeyCode::Char('a'));
            type_str(&mut app, title);
            press(&mut app, KeyCode::Enter);
        }
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "REC");
        press(&mut app, KeyCode::Enter);
        assert!(app.state().is_search_pending());

        let deadline = Instant::now() + Duration::from_secs(5);
        while app.state().is_search_pending() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            app.on_tick();
        }
        assert_eq!(app.state().search_summary(), Some("Found: Recipe"));
    }
}
