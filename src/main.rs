mod ui;

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    cursor::Show,
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    any::Any,
    io::{self, stdin, Write},
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{mpsc::Sender, Arc},
    time::Duration,
};
use tracing::{debug, error, info, warn};

use typesprint::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, Difficulty, FileConfigStore, Mode, TestConfig},
    engine::TypingEngine,
    history::{HistoryDb, HistoryEntry, HistoryStore},
    logging,
    passage::{HttpPassageProvider, PassageProvider, PassageSource, StaticPassages},
    runtime::{spawn_passage_fetch, CrosstermEventSource, FixedTicker, Runner, SessionEvent},
    scoreboard::{
        DifficultyFilter, HttpScoreboard, LeaderboardPage, LeaderboardQuery, LocalLeaderboard,
        Scoreboard,
    },
    session::{SessionPhase, TestResult},
    sink::{ResultSink, SinkReport},
};

const HISTORY_LIMIT: usize = 50;
const LEADERBOARD_PAGE_SIZE: u32 = 10;

/// typing speed test with live wpm, local history and a shared leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type a passage against the clock. Live wpm and accuracy while you type, results saved to a local history and optionally submitted to a shared leaderboard."
)]
pub struct Cli {
    /// test length in seconds (defaults to the difficulty's recommendation)
    #[clap(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..))]
    duration: Option<u32>,

    /// passage difficulty
    #[clap(short = 'D', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// test (timed, recorded) or practice (untimed, not recorded)
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// player name used for leaderboard submissions
    #[clap(short = 'n', long)]
    name: Option<String>,

    /// base url of the shared scoreboard service
    #[clap(long)]
    scoreboard_url: Option<String>,

    /// url of a passage generator; the bundled passages are used when unset or unreachable
    #[clap(long)]
    passage_url: Option<String>,

    /// open the leaderboard screen
    #[clap(long)]
    leaderboard: bool,

    /// open the local history screen
    #[clap(long)]
    history: bool,

    /// write the local history as csv to PATH and exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Overlays the flags that were given on top of the persisted config.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
            config.duration = None;
        }
        if let Some(duration) = self.duration {
            config.duration = Some(duration);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }
        if let Some(url) = &self.scoreboard_url {
            config.scoreboard_url = Some(url.clone());
        }
        if let Some(url) = &self.passage_url {
            config.passage_url = Some(url.clone());
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// waiting on the passage
    Loading,
    Typing,
    Results,
    History,
    Leaderboard,
    Error,
}

/// Long-lived collaborators shared by every session.
pub struct Services {
    pub sink: ResultSink<HistoryDb>,
    pub provider: Option<Arc<dyn PassageProvider>>,
    pub fallback: Arc<StaticPassages>,
}

impl Services {
    fn build(config: &Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.passage_timeout_secs.max(1));

        let provider: Option<Arc<dyn PassageProvider>> = match &config.passage_url {
            Some(url) => Some(Arc::new(
                HttpPassageProvider::new(url.clone(), timeout)
                    .context("building passage client")?,
            )),
            None => None,
        };

        let scoreboard: Option<Box<dyn Scoreboard>> = match &config.scoreboard_url {
            Some(url) => Some(Box::new(
                HttpScoreboard::new(url, timeout).context("building scoreboard client")?,
            )),
            None => match LocalLeaderboard::new() {
                Ok(board) => Some(Box::new(board)),
                Err(e) => {
                    warn!(error = %e, "local leaderboard unavailable");
                    None
                }
            },
        };

        let history = HistoryDb::new().context("opening history database")?;
        let mut sink = ResultSink::new(history).with_name(config.player_name());
        if let Some(board) = scoreboard {
            sink = sink.with_scoreboard(board);
        }

        Ok(Self {
            sink,
            provider,
            fallback: Arc::new(StaticPassages::embedded()),
        })
    }
}

pub struct App {
    pub config: Config,
    pub test_config: TestConfig,
    pub engine: TypingEngine,
    pub state: AppState,
    pub session_id: u64,
    pub passage_source: Option<PassageSource>,
    pub report: Option<SinkReport>,
    pub history: Vec<HistoryEntry>,
    pub leaderboard_query: LeaderboardQuery,
    pub leaderboard: Option<LeaderboardPage>,
    pub notice: Option<String>,
    pub error: Option<String>,
    timer_started: bool,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let test_config = config.test_config()?;
        Ok(Self {
            engine: TypingEngine::new(test_config),
            config,
            test_config,
            state: AppState::Loading,
            session_id: 0,
            passage_source: None,
            report: None,
            history: Vec::new(),
            leaderboard_query: LeaderboardQuery::new(
                1,
                LEADERBOARD_PAGE_SIZE,
                DifficultyFilter::All,
            ),
            leaderboard: None,
            notice: None,
            error: None,
            timer_started: false,
        })
    }

    /// Starts a fresh session. With `passage` the text is reused, otherwise
    /// one is fetched in the background and the app shows the loading gate.
    pub fn start_session(
        &mut self,
        services: &mut Services,
        tx: &Sender<SessionEvent>,
        passage: Option<String>,
    ) {
        self.session_id += 1;
        self.engine = TypingEngine::new(self.test_config);
        self.report = None;
        self.error = None;
        self.timer_started = false;
        services.sink.begin_session();

        if let Some(text) = passage {
            if self.engine.load_passage(text) {
                self.state = AppState::Typing;
                return;
            }
        }

        self.state = AppState::Loading;
        self.passage_source = None;
        spawn_passage_fetch(
            tx.clone(),
            self.session_id,
            services.provider.clone(),
            services.fallback.clone(),
            self.test_config.difficulty,
        );
        debug!(session = self.session_id, "passage requested");
    }

    pub fn on_passage(&mut self, session: u64, text: String, source: PassageSource) {
        if session != self.session_id {
            debug!(session, current = self.session_id, "stale passage discarded");
            return;
        }
        if !self.engine.load_passage(text) {
            warn!(session, "passage rejected");
            return;
        }
        self.passage_source = Some(source);
        if self.state == AppState::Loading {
            self.state = AppState::Typing;
        }
    }

    pub fn on_tick(&mut self, services: &mut Services) {
        if let Some(result) = self.engine.on_tick() {
            self.complete(result, services);
        }
    }

    fn complete(&mut self, result: TestResult, services: &mut Services) {
        self.report = services.sink.deliver(&result, &self.test_config);
        self.state = AppState::Results;
    }

    /// Routes a key press. Returns true when the app should quit.
    pub fn on_key(
        &mut self,
        key: KeyEvent,
        services: &mut Services,
        tx: &Sender<SessionEvent>,
    ) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('c')) {
            return true;
        }

        match self.state {
            AppState::Loading => {}
            AppState::Typing => match key.code {
                KeyCode::Left => self.restart(services, tx),
                KeyCode::Right => self.start_session(services, tx, None),
                KeyCode::Backspace => {
                    if let Some(result) = self.engine.backspace() {
                        self.complete(result, services);
                    }
                }
                KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                    let was_ready = self.engine.phase() == SessionPhase::Ready;
                    let result = self.engine.type_char(c);
                    if was_ready && self.engine.phase() != SessionPhase::Ready {
                        self.timer_started = true;
                    }
                    if let Some(result) = result {
                        self.complete(result, services);
                    }
                }
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') | KeyCode::Left => self.restart(services, tx),
                KeyCode::Char('n') | KeyCode::Right => self.start_session(services, tx, None),
                KeyCode::Char('h') => self.open_history(services),
                KeyCode::Char('l') => self.open_leaderboard(services),
                _ => {}
            },
            AppState::History => {
                if matches!(key.code, KeyCode::Char('b') | KeyCode::Backspace) {
                    self.state = self.back_state();
                }
            }
            AppState::Leaderboard => match key.code {
                KeyCode::Char('b') | KeyCode::Backspace => self.state = self.back_state(),
                KeyCode::Left => {
                    if self.leaderboard_query.page > 1 {
                        self.leaderboard_query.page -= 1;
                        self.refresh_leaderboard(services);
                    }
                }
                KeyCode::Right => {
                    let last = self.leaderboard.as_ref().map_or(1, |p| p.total_pages.max(1));
                    if self.leaderboard_query.page < last {
                        self.leaderboard_query.page += 1;
                        self.refresh_leaderboard(services);
                    }
                }
                KeyCode::Char('d') => {
                    self.leaderboard_query.difficulty =
                        next_filter(self.leaderboard_query.difficulty);
                    self.leaderboard_query.page = 1;
                    self.refresh_leaderboard(services);
                }
                _ => {}
            },
            AppState::Error => {
                if key.code == KeyCode::Char('r') {
                    self.start_session(services, tx, None);
                }
            }
        }
        false
    }

    /// True once after the first keystroke of a session started its timer.
    pub fn take_timer_started(&mut self) -> bool {
        std::mem::take(&mut self.timer_started)
    }

    fn restart(&mut self, services: &mut Services, tx: &Sender<SessionEvent>) {
        let passage = (!self.engine.passage().is_empty()).then(|| self.engine.passage_text());
        self.start_session(services, tx, passage);
    }

    fn back_state(&self) -> AppState {
        if self.engine.result().is_some() {
            AppState::Results
        } else if self.engine.passage().is_empty() {
            AppState::Loading
        } else {
            AppState::Typing
        }
    }

    pub fn open_history(&mut self, services: &Services) {
        self.history = match services.sink.history().entries(Some(HISTORY_LIMIT)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to read history");
                self.notice = Some(e.to_string());
                Vec::new()
            }
        };
        self.state = AppState::History;
    }

    pub fn open_leaderboard(&mut self, services: &Services) {
        self.refresh_leaderboard(services);
        self.state = AppState::Leaderboard;
    }

    fn refresh_leaderboard(&mut self, services: &Services) {
        let Some(board) = services.sink.scoreboard() else {
            self.leaderboard = None;
            self.notice = Some("no scoreboard available".to_string());
            return;
        };
        match board.page(&self.leaderboard_query) {
            Ok(page) => {
                self.leaderboard = Some(page);
                self.notice = None;
            }
            Err(e) => {
                warn!(error = %e, "failed to load leaderboard");
                self.notice = Some(e.to_string());
            }
        }
    }

    /// A results screen needs a result; otherwise start over.
    pub fn guard(&mut self, services: &mut Services, tx: &Sender<SessionEvent>) {
        if self.state == AppState::Results && self.engine.result().is_none() {
            warn!("results screen without a result, starting a new session");
            self.start_session(services, tx, None);
        }
    }

    pub fn fail(&mut self, message: String) {
        error!(%message, "recovered from fault");
        self.error = Some(message);
        self.state = AppState::Error;
    }

    /// Applies one event. Returns true when the app should quit.
    pub fn handle_event(
        &mut self,
        event: SessionEvent,
        services: &mut Services,
        tx: &Sender<SessionEvent>,
    ) -> bool {
        let quit = match event {
            SessionEvent::Tick => {
                self.on_tick(services);
                false
            }
            SessionEvent::Resize => false,
            SessionEvent::Paste(text) => {
                debug!(chars = text.chars().count(), "paste ignored");
                false
            }
            SessionEvent::Passage {
                session,
                text,
                source,
            } => {
                self.on_passage(session, text, source);
                false
            }
            SessionEvent::Key(key) => self.on_key(key, services, tx),
        };
        self.guard(services, tx);
        quit
    }
}

fn next_filter(filter: DifficultyFilter) -> DifficultyFilter {
    match filter {
        DifficultyFilter::All => DifficultyFilter::Only(Difficulty::Easy),
        DifficultyFilter::Only(Difficulty::Easy) => DifficultyFilter::Only(Difficulty::Medium),
        DifficultyFilter::Only(Difficulty::Medium) => DifficultyFilter::Only(Difficulty::Hard),
        DifficultyFilter::Only(Difficulty::Hard) => DifficultyFilter::All,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected error".to_string()
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = match AppDirs::log_dir() {
        Some(dir) => logging::init(&dir).context("initializing logging")?,
        None => None,
    };
    logging::install_panic_hook();

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    config.test_config()?;

    if cli.save_config {
        store.save(&config).context("saving config")?;
        info!(path = %store.path().display(), "config saved");
    }

    if let Some(path) = &cli.export_history {
        let db = HistoryDb::new()?;
        let count = db.export_csv(path)?;
        println!("exported {count} results to {}", path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut services = Services::build(&config)?;
    let mut app = App::new(config)?;

    let mut stdout = io::stdout();
    let _guard = TerminalGuard::enter(&mut stdout)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    start_tui(&mut terminal, &mut app, &mut services, &cli)
}

/// Raw mode, alternate screen and bracketed paste for the lifetime of the
/// guard. Dropping it restores the terminal on every exit path.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut impl Write) -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(out, EnterAlternateScreen, EnableBracketedPaste)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = restore_terminal(&mut io::stdout()) {
            warn!(error = %e, "failed to restore terminal");
        }
    }
}

fn restore_terminal(out: &mut impl Write) -> io::Result<()> {
    let raw = disable_raw_mode();
    execute!(out, DisableBracketedPaste, LeaveAlternateScreen, Show)?;
    raw
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    services: &mut Services,
    cli: &Cli,
) -> anyhow::Result<()> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::every_second());
    let tx = runner.sender();

    app.start_session(services, &tx, None);
    if cli.leaderboard {
        app.open_leaderboard(services);
    } else if cli.history {
        app.open_history(services);
    }
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let event = runner.step();
        let step = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<bool> {
            let quit = app.handle_event(event, services, &tx);
            terminal.draw(|f| ui::draw(app, f))?;
            Ok(quit)
        }));

        match step {
            Ok(Ok(true)) => break,
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(e),
            Err(payload) => {
                app.fail(panic_message(payload.as_ref()));
                terminal.clear()?;
                terminal.draw(|f| ui::draw(app, f))?;
            }
        }

        if app.take_timer_started() {
            runner.reset_ticks();
        }
    }

    info!("exiting");
    Ok(())
}
