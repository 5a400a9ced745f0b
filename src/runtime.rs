use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::debug;

use crate::config::Difficulty;
use crate::passage::{resolve_passage, PassageProvider, PassageSource, StaticPassages};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Key(KeyEvent),
    /// Bracketed paste. Never fed to the engine.
    Paste(String),
    Resize,
    Tick,
    /// Passage fetched for the session with id `session`.
    Passage {
        session: u64,
        text: String,
        source: PassageSource,
    },
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait SessionEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError>;

    /// Handle for background workers posting into the same queue.
    fn sender(&self) -> Sender<SessionEvent>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let reader = tx.clone();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    reader.send(SessionEvent::Key(key))
                }
                Ok(CtEvent::Paste(text)) => reader.send(SessionEvent::Paste(text)),
                Ok(CtEvent::Resize(_, _)) => reader.send(SessionEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<SessionEvent> {
        self.tx.clone()
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl TestEventSource {
    /// Returns the source and a sender for scripting events.
    pub fn new() -> (Self, Sender<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: tx.clone(), rx }, tx)
    }
}

impl SessionEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<SessionEvent> {
        self.tx.clone()
    }
}

/// Runner that advances the application one event/tick at a time.
///
/// Ticks follow a fixed deadline, so a steady stream of key events does not
/// delay them.
pub struct Runner<E: SessionEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: SessionEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    pub fn sender(&self) -> Sender<SessionEvent> {
        self.event_source.sender()
    }

    /// Restarts the tick schedule from now. Called when the session timer
    /// starts so its first second is a whole interval.
    pub fn reset_ticks(&mut self) {
        self.next_tick = Instant::now() + self.ticker.interval();
    }

    /// Blocks until the next event or the tick deadline, whichever is first.
    pub fn step(&mut self) -> SessionEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.fire_tick(now);
        }

        match self.event_source.recv_timeout(self.next_tick - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.fire_tick(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(self.next_tick.saturating_duration_since(Instant::now()));
                self.fire_tick(Instant::now())
            }
        }
    }

    fn fire_tick(&mut self, now: Instant) -> SessionEvent {
        self.next_tick += self.ticker.interval();
        // fell behind by more than a period: don't burst
        if self.next_tick <= now {
            self.next_tick = now + self.ticker.interval();
        }
        SessionEvent::Tick
    }
}

/// Resolves a passage on a worker thread and posts it tagged with `session`.
pub fn spawn_passage_fetch(
    tx: Sender<SessionEvent>,
    session: u64,
    provider: Option<Arc<dyn PassageProvider>>,
    fallback: Arc<StaticPassages>,
    difficulty: Difficulty,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let (text, source) = resolve_passage(provider.as_deref(), &fallback, difficulty);
        if tx
            .send(SessionEvent::Passage {
                session,
                text,
                source,
            })
            .is_err()
        {
            debug!(session, "passage arrived after shutdown");
        }
    })
}
