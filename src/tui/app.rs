//! Main TUI application.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use tracing::{info, warn};

use crate::config::Config;
use crate::device::DeviceControl;
use crate::model::{RecordId, RowPatch};
use crate::ops;
use crate::session::SessionStore;
use crate::store::{Store, StoreError};
use crate::sync::{LiveView, ToggleOutcome, toggle_connection};

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::{AppState, EditForm, PopupState, Screen};

/// Main TUI application.
pub struct App {
    store: Arc<dyn Store>,
    devices: Arc<dyn DeviceControl>,
    sessions: SessionStore,
    view: LiveView,
    state: AppState,
    config: Config,
    should_quit: bool,
}

impl App {
    pub fn new(store: Arc<dyn Store>, devices: Arc<dyn DeviceControl>, config: Config) -> Self {
        Self {
            view: LiveView::new(Arc::clone(&store)),
            sessions: SessionStore::new(config.session_path.clone()),
            state: AppState::new(config.feature_options.clone(), config.toast_ttl),
            store,
            devices,
            config,
            should_quit: false,
        }
    }

    /// Runs the TUI application.
    pub fn run(mut self) -> io::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let events = EventHandler::new(self.config.tick_rate)?;

        // The session check blocks; show the connecting screen meanwhile.
        terminal.draw(|frame| render(frame, &mut self.state, &self.view))?;
        self.restore_session();

        loop {
            self.tick();
            terminal.draw(|frame| render(frame, &mut self.state, &self.view))?;

            match events.next() {
                Ok(Event::Tick) | Ok(Event::Resize(..)) => {}
                Ok(Event::Key(key)) => {
                    let action = handle_key(&mut self.state, key);
                    self.handle_action(action);
                }
                Err(_) => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        self.view.teardown();
        Ok(())
    }

    /// Applies pending live changes and housekeeping before a redraw.
    fn tick(&mut self) {
        self.view.pump();
        if !self.view.status().is_loading() {
            let snapshot = self.view.snapshot();
            self.state.rows.marked.retain(|id| snapshot.contains(id));
        }
        self.state.expire_toast(Instant::now());
    }

    fn handle_action(&mut self, action: KeyAction) {
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::Login => self.login(),
            KeyAction::Logout => self.logout(),
            KeyAction::SelectTable(table) => self.select_table(&table),
            KeyAction::Refresh => self.refresh(),
            KeyAction::OpenEdit(id) => self.open_edit(&id),
            KeyAction::SaveEdit(id, patch) => self.save_edit(&id, &patch),
            KeyAction::Delete(id) => self.delete(&id),
            KeyAction::DeleteBatch(ids) => self.delete_batch(&ids),
            KeyAction::ToggleConnection(id) => self.toggle(&id),
        }
    }

    /// Re-authenticates with the saved token, or falls back to the login screen.
    fn restore_session(&mut self) {
        let token = match self.sessions.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.state.screen = Screen::Login;
                return;
            }
            Err(e) => {
                warn!(error = %e, path = %self.sessions.path().display(), "unreadable session file");
                self.forget_session();
                self.state.screen = Screen::Login;
                return;
            }
        };

        match self.store.authenticate(&token) {
            Ok(()) => {
                info!("session restored");
                self.enter_console();
            }
            Err(e) => {
                warn!(error = %e, "saved session rejected");
                self.forget_session();
                self.state.screen = Screen::Login;
                if !matches!(e, StoreError::Auth(_)) {
                    self.state.login.error = Some(e.to_string());
                }
            }
        }
    }

    fn login(&mut self) {
        let credentials = self.state.login.credentials();
        match self.store.signin(&credentials) {
            Ok(token) => {
                info!(user = %credentials.username, "signed in");
                if let Err(e) = self.sessions.save(&token) {
                    warn!(error = %e, "cannot persist session");
                    self.state.error(format!("Session not saved: {}", e));
                }
                self.state.login.error = None;
                self.state.login.reset_password();
                self.state.user = Some(credentials.username);
                self.enter_console();
            }
            Err(e) => {
                warn!(user = %credentials.username, error = %e, "sign-in failed");
                self.state.login.error = Some(e.to_string());
                self.state.login.reset_password();
            }
        }
    }

    fn logout(&mut self) {
        self.view.teardown();
        self.forget_session();
        self.state.reset_to_login();
        info!("signed out");
    }

    fn forget_session(&mut self) {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "cannot remove session file");
        }
    }

    /// Lists the tables and shows the first one.
    fn enter_console(&mut self) {
        self.state.screen = Screen::Console;
        match self.store.tables() {
            Ok(tables) => {
                self.state.tables.set_items(tables);
                self.state.tables.resolve_selection();
                if let Some(first) = self.state.tables.highlighted().map(str::to_string) {
                    self.select_table(&first);
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot list tables");
                self.state.error(format!("Cannot list tables: {}", e));
            }
        }
    }

    fn select_table(&mut self, table: &str) {
        self.state.reset_rows();
        self.state.tables.active = Some(table.to_string());
        self.view.select(table);
    }

    fn refresh(&mut self) {
        match self.view.table().map(str::to_string) {
            Some(table) => {
                self.state.tables.active = Some(table.clone());
                self.view.refresh();
                self.state.info(format!("Reloading {}", table));
            }
            None => self.state.info("No table selected"),
        }
    }

    /// Human label for a row: its hostname when it has one.
    fn label(&self, id: &RecordId) -> String {
        self.view
            .snapshot()
            .get(id)
            .and_then(|row| row.hostname.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn open_edit(&mut self, id: &RecordId) {
        match self.view.snapshot().get(id) {
            Some(row) => {
                let form = EditForm::new(row, &self.state.feature_options);
                self.state.popup = PopupState::Edit(form);
            }
            None => self.state.error(format!("{} no longer exists", id)),
        }
    }

    fn save_edit(&mut self, id: &RecordId, patch: &RowPatch) {
        let label = self.label(id);
        match ops::edit_row(self.store.as_ref(), id, patch) {
            Ok(()) => self.state.info(format!("Saved {}", label)),
            Err(e) => self.state.error(format!("Saving {} failed: {}", label, e)),
        }
    }

    fn delete(&mut self, id: &RecordId) {
        let label = self.label(id);
        match ops::delete_row(self.store.as_ref(), id) {
            Ok(()) => {
                self.state.rows.marked.remove(id);
                self.state.info(format!("Deleted {}", label));
            }
            Err(e) => self.state.error(format!("Deleting {} failed: {}", label, e)),
        }
    }

    fn delete_batch(&mut self, ids: &[RecordId]) {
        let outcome = ops::delete_rows(self.store.as_ref(), ids);
        if outcome.is_complete() {
            self.state.rows.marked.clear();
            self.state.info(format!("Deleted {} rows", outcome.deleted.len()));
        } else if let Some((id, e)) = outcome.failed.first() {
            self.state.error(format!(
                "Deleted {} of {} rows; {} failed: {}",
                outcome.deleted.len(),
                ids.len(),
                id,
                e
            ));
        }
    }

    fn toggle(&mut self, id: &RecordId) {
        match toggle_connection(&mut self.view, self.devices.as_ref(), id) {
            Ok(ToggleOutcome::Connected(id)) => {
                let label = self.label(&id);
                self.state.info(format!("Connected {}", label));
            }
            Ok(ToggleOutcome::Disconnected(id)) => {
                let label = self.label(&id);
                self.state.info(format!("Disconnected {}", label));
            }
            Err(e) => self.state.error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StoreDevices;
    use crate::store::{Credentials, MemoryStore, Op, SessionToken};
    use crate::tui::state::ToastKind;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        store: Arc<MemoryStore>,
        app: App,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::demo_devices());
        let dyn_store: Arc<dyn Store> = store.clone();
        let devices = Arc::new(StoreDevices::new(Arc::clone(&dyn_store), "devices"));
        let config = Config::default().with_session_path(dir.path().join("session.json"));
        let app = App::new(dyn_store, devices, config);
        Harness {
            store,
            app,
            _dir: dir,
        }
    }

    fn id(key: &str) -> RecordId {
        RecordId::new("devices", key)
    }

    /// Pumps until the view has settled on `n` rows.
    fn settle(app: &mut App, n: usize) {
        for _ in 0..200 {
            app.view.pump_timeout(Duration::from_millis(10));
            if app.view.snapshot().len() == n && !app.view.status().is_loading() {
                app.tick();
                return;
            }
        }
        panic!("view did not settle on {} rows: {:?}", n, app.view.status());
    }

    fn sign_in(app: &mut App, user: &str, password: &str) {
        app.state.screen = Screen::Login;
        app.state.login.username = user.into();
        app.state.login.password = password.into();
        app.handle_action(KeyAction::Login);
    }

    fn toast(app: &App) -> (ToastKind, String) {
        let t = app.state.toast.as_ref().expect("toast");
        (t.kind, t.text.clone())
    }

    #[test]
    fn test_login_failure_stays_on_login() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "wrong");
        assert_eq!(h.app.state.screen, Screen::Login);
        assert!(h.app.state.login.error.is_some());
        assert!(h.app.state.login.password.is_empty());
        assert_eq!(h.app.sessions.load().unwrap(), None);
    }

    #[test]
    fn test_login_opens_first_table_and_saves_session() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        assert_eq!(h.app.state.screen, Screen::Console);
        assert_eq!(h.app.state.user.as_deref(), Some("admin"));
        assert_eq!(h.app.state.tables.items, vec!["devices", "operators"]);
        assert_eq!(h.app.view.table(), Some("devices"));
        assert!(h.app.sessions.load().unwrap().is_some());
        settle(&mut h.app, 4);
    }

    #[test]
    fn test_restore_session() {
        let mut h = harness();
        h.app.restore_session();
        assert_eq!(h.app.state.screen, Screen::Login);

        let token = h
            .store
            .signin(&Credentials {
                username: "admin".into(),
                password: "admin".into(),
            })
            .unwrap();
        h.app.sessions.save(&token).unwrap();
        h.app.restore_session();
        assert_eq!(h.app.state.screen, Screen::Console);
    }

    #[test]
    fn test_rejected_session_is_forgotten() {
        let mut h = harness();
        h.app
            .sessions
            .save(&SessionToken("mem.99.nobody".into()))
            .unwrap();
        h.app.restore_session();
        assert_eq!(h.app.state.screen, Screen::Login);
        assert_eq!(h.app.state.login.error, None);
        assert_eq!(h.app.sessions.load().unwrap(), None);
    }

    #[test]
    fn test_connection_failure_on_startup_is_shown() {
        let mut h = harness();
        h.app
            .sessions
            .save(&SessionToken("mem.1.admin".into()))
            .unwrap();
        h.store.fail_next(Op::Authenticate, "server unreachable");
        h.app.restore_session();
        assert_eq!(h.app.state.screen, Screen::Login);
        assert!(
            h.app
                .state
                .login
                .error
                .as_deref()
                .is_some_and(|e| e.contains("server unreachable"))
        );
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        settle(&mut h.app, 4);
        h.app.handle_action(KeyAction::Logout);
        assert_eq!(h.app.state.screen, Screen::Login);
        assert_eq!(h.app.state.login.username, "admin");
        assert!(!h.app.view.is_active());
        assert_eq!(h.app.sessions.load().unwrap(), None);
    }

    #[test]
    fn test_toggle_switches_connected_device() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        settle(&mut h.app, 4);

        h.app.handle_action(KeyAction::ToggleConnection(id("d2")));
        assert_eq!(toast(&h.app), (ToastKind::Info, "Connected studio".into()));
        let snapshot = h.app.view.snapshot();
        assert!(snapshot.get(&id("d2")).unwrap().connected);
        assert!(!snapshot.get(&id("d1")).unwrap().connected);
    }

    #[test]
    fn test_edit_converges_through_change_stream() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        settle(&mut h.app, 4);

        h.app.handle_action(KeyAction::OpenEdit(id("d3")));
        let PopupState::Edit(form) = &h.app.state.popup else {
            panic!("edit popup not open");
        };
        let mut patch = form.patch.clone();
        patch.mark = "fixed".into();
        h.app.state.popup = PopupState::None;

        h.app.handle_action(KeyAction::SaveEdit(id("d3"), patch));
        assert_eq!(toast(&h.app).0, ToastKind::Info);
        for _ in 0..100 {
            h.app.view.pump_timeout(Duration::from_millis(10));
            if h.app.view.snapshot().get(&id("d3")).unwrap().mark.as_deref() == Some("fixed") {
                return;
            }
        }
        panic!("edit never reached the snapshot");
    }

    #[test]
    fn test_partial_batch_delete_keeps_marks() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        settle(&mut h.app, 4);

        h.store.fail_on(id("d3"));
        let ids = vec![id("d2"), id("d3")];
        h.app.state.rows.marked.extend(ids.iter().cloned());
        h.app.handle_action(KeyAction::DeleteBatch(ids));
        let (kind, text) = toast(&h.app);
        assert_eq!(kind, ToastKind::Error);
        assert!(text.contains("1 of 2"));

        settle(&mut h.app, 3);
        // The deleted row is pruned from the marks, the failed one stays.
        assert!(h.app.state.rows.marked.contains(&id("d3")));
        assert!(!h.app.state.rows.marked.contains(&id("d2")));
    }

    #[test]
    fn test_open_edit_of_missing_row() {
        let mut h = harness();
        sign_in(&mut h.app, "admin", "admin");
        settle(&mut h.app, 4);
        h.app.handle_action(KeyAction::OpenEdit(id("gone")));
        assert_eq!(h.app.state.popup, PopupState::None);
        assert_eq!(toast(&h.app).0, ToastKind::Error);
    }
}
