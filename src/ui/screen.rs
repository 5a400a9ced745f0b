use ratatui::Frame;

use crate::{
    ui::{render_error, render_history, render_leaderboard, render_loading},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Shown until the session's passage arrives
pub struct LoadingScreen;

impl Screen for LoadingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_loading(app, f);
    }
}

/// Typing screen - renders the typing UI using the App widget
pub struct TypingScreen;

impl Screen for TypingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

/// Results screen - renders the results UI using the App widget
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_history(app, f);
    }
}

pub struct LeaderboardScreen;

impl Screen for LeaderboardScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_leaderboard(app, f);
    }
}

/// Replaces whatever failed with the error message and a retry hint
pub struct ErrorScreen;

impl Screen for ErrorScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_error(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Loading => Box::new(LoadingScreen),
        AppState::Typing => Box::new(TypingScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::History => Box::new(HistoryScreen),
        AppState::Leaderboard => Box::new(LeaderboardScreen),
        AppState::Error => Box::new(ErrorScreen),
    }
}
