mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use gavel::{
    clock::Clock,
    config::{Config, ConfigStore, FileConfigStore},
    history::History,
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    session::MeetingSession,
    store::{FileHistoryStore, FileSessionStore},
    visibility,
};

const TICK_RATE_MS: u64 = 1000;

/// terminal meeting timer that walks an agenda and banks elapsed time
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Walks a meeting agenda item by item while a countdown/overrun timer runs \
                  for the active item. The in-progress session survives restarts; completed \
                  meetings are kept in a bounded history."
)]
pub struct Cli {
    /// write the saved meeting history as CSV to the given path and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// start with an empty agenda instead of the sample when nothing is stored
    #[clap(long)]
    no_sample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppScreen {
    Agenda,
    History,
}

/// In-flight rename of one agenda item.
#[derive(Debug)]
pub struct EditState {
    pub item_id: String,
    pub buffer: String,
}

#[derive(Debug)]
pub struct App {
    pub session: MeetingSession,
    pub history: History,
    pub clock: Clock,
    pub config: Config,
    pub screen: AppScreen,
    pub selected: usize,
    pub edit: Option<EditState>,
}

impl App {
    pub fn new(cli: &Cli, config: Config) -> Self {
        let mut clock = Clock::new();
        let now = clock.sample();

        let seed = if cli.no_sample || !config.seed_sample_on_empty {
            Vec::new()
        } else {
            gavel::agenda::sample_agenda()
        };
        let session = match FileSessionStore::new() {
            Some(store) => MeetingSession::load_or_seed(Box::new(store), now, seed),
            None => MeetingSession::in_memory(seed),
        };
        let history = match FileHistoryStore::new() {
            Some(store) => History::load(Box::new(store)),
            None => History::in_memory(),
        };

        clock.set_running(session.is_running());
        Self {
            session,
            history,
            clock,
            config,
            screen: AppScreen::Agenda,
            selected: 0,
            edit: None,
        }
    }

    /// Store-less app for unit tests.
    #[cfg(test)]
    pub fn headless() -> Self {
        Self {
            session: MeetingSession::in_memory(Vec::new()),
            history: History::in_memory(),
            clock: Clock::new(),
            config: Config::default(),
            screen: AppScreen::Agenda,
            selected: 0,
            edit: None,
        }
    }

    fn sync_clock(&mut self) {
        self.clock.set_running(self.session.is_running());
    }

    fn toggle_running(&mut self) {
        let now = self.clock.sample();
        if self.session.is_running() {
            self.session.pause(now);
        } else {
            self.session.start(now);
        }
        self.sync_clock();
    }

    fn advance(&mut self) {
        let now = self.clock.sample();
        self.session.advance(now);
    }

    fn previous(&mut self) {
        let now = self.clock.sample();
        self.session.previous(now);
        self.sync_clock();
    }

    fn reset(&mut self) {
        let now = self.clock.sample();
        self.session.reset(now);
        self.sync_clock();
    }

    fn add_item(&mut self) {
        let now = self.clock.sample();
        let estimate = self.config.default_estimate_minutes;
        let id = self.session.add_item("New item", estimate, now);
        self.selected = self.session.items().len().saturating_sub(1);
        self.edit = Some(EditState {
            item_id: id,
            buffer: String::new(),
        });
    }

    fn begin_rename(&mut self) {
        let Some(item) = self.session.items().get(self.selected) else {
            return;
        };
        self.edit = Some(EditState {
            item_id: item.id.clone(),
            buffer: item.name.clone(),
        });
    }

    fn commit_rename(&mut self) {
        let Some(edit) = self.edit.take() else {
            return;
        };
        let name = edit.buffer.trim().to_string();
        if name.is_empty() {
            // a committed item keeps a non-empty name; abandon the edit
            return;
        }
        let estimate = self
            .session
            .items()
            .iter()
            .find(|i| i.id == edit.item_id)
            .map(|i| i.estimated_minutes)
            .unwrap_or(self.config.default_estimate_minutes);
        let now = self.clock.sample();
        self.session.edit_item(&edit.item_id, name, estimate, now);
    }

    fn bump_estimate(&mut self, delta: f64) {
        let Some(item) = self.session.items().get(self.selected) else {
            return;
        };
        let id = item.id.clone();
        let name = item.name.clone();
        let estimate = (item.estimated_minutes + delta).max(1.0);
        let now = self.clock.sample();
        self.session.edit_item(&id, name, estimate, now);
    }

    fn delete_selected(&mut self) {
        let Some(item) = self.session.items().get(self.selected) else {
            return;
        };
        let id = item.id.clone();
        let now = self.clock.sample();
        self.session.delete_item(&id, now);
        self.clamp_selection();
    }

    fn move_selected(&mut self, down: bool) {
        let to = if down {
            self.selected + 1
        } else {
            self.selected.saturating_sub(1)
        };
        let now = self.clock.sample();
        let before = self.session.items().get(self.selected).map(|i| i.id.clone());
        self.session.reorder_item(self.selected, to, now);
        // follow the item if the move happened
        if let (Some(id), Some(item)) = (before, self.session.items().get(to)) {
            if item.id == id {
                self.selected = to;
            }
        }
    }

    fn save_meeting(&mut self) {
        let now = self.clock.sample();
        if self.history.archive(&mut self.session, now) {
            self.selected = 0;
            self.sync_clock();
            self.screen = AppScreen::History;
        }
    }

    fn select_next(&mut self) {
        if self.selected + 1 < self.session.items().len() {
            self.selected += 1;
        }
    }

    fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.session.items().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn on_focus(&mut self, visible: bool) {
        let now = self.clock.sample();
        if visible {
            visibility::on_show(&mut self.session, now);
        } else {
            visibility::on_hide(&mut self.session, now);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(path) = &cli.export_csv {
        return export_history(path);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = FileConfigStore::new().load();
    let mut app = App::new(&cli, config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = run(&mut terminal, &runner, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableFocusChange)?;
    terminal.show_cursor()?;

    result
}

fn export_history(path: &PathBuf) -> Result<(), Box<dyn Error>> {
    let history = match FileHistoryStore::new() {
        Some(store) => History::load(Box::new(store)),
        None => History::in_memory(),
    };
    history.export_csv(path)?;
    println!("exported {} meetings to {}", history.meetings().len(), path.display());
    Ok(())
}

fn run<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    runner: &Runner<E, T>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => {
                app.clock.on_tick();
            }
            AppEvent::Resize => {}
            AppEvent::Focus(visible) => {
                app.on_focus(visible);
            }
            AppEvent::Key(key) => {
                if !handle_key(app, key) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns false when the app should exit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return false;
    }

    if app.edit.is_some() {
        match key.code {
            KeyCode::Esc => {
                app.edit = None;
            }
            KeyCode::Enter => {
                app.commit_rename();
            }
            KeyCode::Backspace => {
                if let Some(edit) = &mut app.edit {
                    edit.buffer.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(edit) = &mut app.edit {
                    edit.buffer.push(c);
                }
            }
            _ => {}
        }
        return true;
    }

    match app.screen {
        AppScreen::Agenda => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return false,
            KeyCode::Char(' ') => app.toggle_running(),
            KeyCode::Char('n') | KeyCode::Enter => app.advance(),
            KeyCode::Char('b') => app.previous(),
            KeyCode::Char('r') => app.reset(),
            KeyCode::Char('a') => app.add_item(),
            KeyCode::Char('e') => app.begin_rename(),
            KeyCode::Char('d') => app.delete_selected(),
            KeyCode::Char('+') | KeyCode::Char('=') => app.bump_estimate(1.0),
            KeyCode::Char('-') => app.bump_estimate(-1.0),
            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
            KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
            KeyCode::Char('J') => app.move_selected(true),
            KeyCode::Char('K') => app.move_selected(false),
            KeyCode::Char('w') => app.save_meeting(),
            KeyCode::Char('h') => app.screen = AppScreen::History,
            _ => {}
        },
        AppScreen::History => match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc | KeyCode::Char('h') => app.screen = AppScreen::Agenda,
            _ => {}
        },
    }
    true
}
