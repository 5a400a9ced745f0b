use chrono::Utc;
use tracing::{debug, info};

use crate::config::TestConfig;
use crate::metrics;
use crate::session::{CharState, Latch, SessionPhase, SessionState, TestResult};
use crate::timer::Timer;

/// Measures one typing session against a passage.
///
/// Input arrives as whole "field value" snapshots through [`on_input`],
/// time arrives as one-second [`on_tick`] calls. Either path can complete
/// the session; the completion latch guarantees a single [`TestResult`].
///
/// [`on_input`]: TypingEngine::on_input
/// [`on_tick`]: TypingEngine::on_tick
#[derive(Debug)]
pub struct TypingEngine {
    config: TestConfig,
    state: SessionState,
    timer: Timer,
    phase: SessionPhase,
    completion: Latch,
    result: Option<TestResult>,
}

impl TypingEngine {
    pub fn new(config: TestConfig) -> Self {
        let timer = if config.is_practice() {
            Timer::count_up()
        } else {
            Timer::count_down(config.duration())
        };

        Self {
            config,
            state: SessionState {
                locked: true,
                ..SessionState::default()
            },
            timer,
            phase: SessionPhase::Initializing,
            completion: Latch::new(),
            result: None,
        }
    }

    /// Installs the passage and unlocks input. Returns false if the passage
    /// is empty or typing has already begun.
    pub fn load_passage(&mut self, passage: impl Into<String>) -> bool {
        if !matches!(self.phase, SessionPhase::Initializing | SessionPhase::Ready) {
            return false;
        }

        let passage: Vec<char> = passage.into().chars().collect();
        if passage.is_empty() {
            return false;
        }

        info!(
            chars = passage.len(),
            difficulty = %self.config.difficulty,
            mode = %self.config.mode,
            "passage loaded"
        );

        self.state = SessionState {
            passage,
            typed: Vec::new(),
            mistakes: 0,
            locked: false,
        };
        self.timer.reset(Some(self.base_time()));
        self.phase = SessionPhase::Ready;
        true
    }

    /// Applies a new input value. Returns the result if this input
    /// completed the passage.
    pub fn on_input(&mut self, value: &str) -> Option<TestResult> {
        if self.state.locked || self.phase == SessionPhase::Finished {
            return None;
        }

        let mut value: Vec<char> = value.chars().collect();
        let previous_len = self.state.typed.len();

        if value.len() > previous_len {
            for (idx, c) in value.iter().enumerate().skip(previous_len) {
                match self.state.passage.get(idx) {
                    Some(expected) if expected != c => self.state.mistakes += 1,
                    _ => {}
                }
            }
        }

        if self.phase == SessionPhase::Ready && !value.is_empty() {
            self.timer.start();
            self.phase = SessionPhase::Running;
            debug!("first keystroke, timer started");
        }

        value.truncate(self.state.passage.len());
        self.state.typed = value;

        if self.state.is_complete() {
            return self.finish();
        }
        None
    }

    /// Appends one character, as a keypress in the input field would.
    pub fn type_char(&mut self, c: char) -> Option<TestResult> {
        let mut value = self.typed_text();
        value.push(c);
        self.on_input(&value)
    }

    pub fn backspace(&mut self) -> Option<TestResult> {
        let mut value = self.typed_text();
        value.pop()?;
        self.on_input(&value)
    }

    /// Advances the timer by one second. In test mode the session
    /// completes when the countdown reaches zero.
    pub fn on_tick(&mut self) -> Option<TestResult> {
        if self.phase != SessionPhase::Running {
            return None;
        }
        let expired = self.timer.tick();
        if expired && !self.config.is_practice() {
            return self.finish();
        }
        None
    }

    fn finish(&mut self) -> Option<TestResult> {
        if !self.completion.trip() {
            return None;
        }

        let time_taken = self.elapsed_secs().max(1);
        let correct_chars = self.state.correct_chars();
        let total_chars = self.state.typed.len();

        let result = TestResult {
            wpm: metrics::wpm(correct_chars, time_taken as f64),
            accuracy: metrics::accuracy(total_chars, self.state.mistakes),
            mistakes: self.state.mistakes,
            total_chars,
            time_taken,
            date: Utc::now(),
            mode: self.config.mode,
        };

        self.state.locked = true;
        self.timer.pause();
        self.phase = SessionPhase::Finished;
        self.result = Some(result.clone());

        info!(
            wpm = result.wpm,
            accuracy = result.accuracy,
            mistakes = result.mistakes,
            time_taken = result.time_taken,
            "session finished"
        );
        Some(result)
    }

    fn base_time(&self) -> u32 {
        if self.config.is_practice() {
            0
        } else {
            self.config.duration()
        }
    }

    /// Seconds spent typing so far.
    pub fn elapsed_secs(&self) -> u32 {
        if self.config.is_practice() {
            self.timer.time()
        } else {
            self.config.duration().saturating_sub(self.timer.time())
        }
    }

    pub fn current_wpm(&self) -> u32 {
        metrics::wpm(self.state.correct_chars(), self.elapsed_secs() as f64)
    }

    pub fn current_accuracy(&self) -> u32 {
        metrics::accuracy(self.state.typed.len(), self.state.mistakes)
    }

    pub fn char_states(&self) -> Vec<CharState> {
        self.state
            .passage
            .iter()
            .enumerate()
            .map(|(idx, expected)| match self.state.typed.get(idx) {
                Some(c) if c == expected => CharState::Correct,
                Some(_) => CharState::Incorrect,
                None => CharState::Pending,
            })
            .collect()
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn passage(&self) -> &[char] {
        &self.state.passage
    }

    pub fn passage_text(&self) -> String {
        self.state.passage.iter().collect()
    }

    pub fn typed(&self) -> &[char] {
        &self.state.typed
    }

    pub fn typed_text(&self) -> String {
        self.state.typed.iter().collect()
    }

    pub fn mistakes(&self) -> usize {
        self.state.mistakes
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Difficulty, Mode};

    fn timed(duration: u32) -> TypingEngine {
        TypingEngine::new(TestConfig::new(duration, Difficulty::Medium, Mode::Test).unwrap())
    }

    fn practice() -> TypingEngine {
        TypingEngine::new(TestConfig::new(60, Difficulty::Easy, Mode::Practice).unwrap())
    }

    #[test]
    fn test_new_engine_is_locked() {
        let mut engine = timed(60);
        assert_eq!(engine.phase(), SessionPhase::Initializing);
        assert!(engine.is_locked());

        assert!(engine.on_input("a").is_none());
        assert!(engine.typed().is_empty());
        assert_eq!(engine.mistakes(), 0);
    }

    #[test]
    fn test_load_passage_unlocks() {
        let mut engine = timed(60);
        assert!(engine.load_passage("hello"));
        assert_eq!(engine.phase(), SessionPhase::Ready);
        assert!(!engine.is_locked());
        assert_eq!(engine.timer().time(), 60);
        assert_eq!(engine.passage_text(), "hello");
    }

    #[test]
    fn test_load_empty_passage_rejected() {
        let mut engine = timed(60);
        assert!(!engine.load_passage(""));
        assert_eq!(engine.phase(), SessionPhase::Initializing);
    }

    #[test]
    fn test_load_passage_after_start_rejected() {
        let mut engine = timed(60);
        engine.load_passage("hello");
        engine.type_char('h');
        assert!(!engine.load_passage("other"));
        assert_eq!(engine.passage_text(), "hello");
    }

    #[test]
    fn test_practice_timer_base_is_zero() {
        let mut engine = practice();
        engine.load_passage("abc");
        assert_eq!(engine.timer().time(), 0);
    }

    #[test]
    fn test_first_keystroke_starts_timer() {
        let mut engine = timed(60);
        engine.load_passage("hello");
        assert!(!engine.timer().is_running());

        engine.type_char('h');
        assert_eq!(engine.phase(), SessionPhase::Running);
        assert!(engine.timer().is_running());

        // ticks before the first keystroke don't count
        let mut idle = timed(60);
        idle.load_passage("hello");
        idle.on_tick();
        assert_eq!(idle.timer().time(), 60);
    }

    #[test]
    fn test_mistakes_counted_per_appended_char() {
        let mut engine = timed(60);
        engine.load_passage("hello");

        engine.type_char('h');
        engine.type_char('x');
        assert_eq!(engine.mistakes(), 1);

        // backspace never decrements
        engine.backspace();
        assert_eq!(engine.mistakes(), 1);
        assert_eq!(engine.typed_text(), "h");

        engine.type_char('e');
        assert_eq!(engine.mistakes(), 1);
    }

    #[test]
    fn test_multi_char_append_counts_each_mismatch() {
        let mut engine = timed(60);
        engine.load_passage("hello");
        engine.on_input("hxyl");
        assert_eq!(engine.mistakes(), 2);
    }

    #[test]
    fn test_typed_clamped_to_passage_length() {
        let mut engine = timed(60);
        engine.load_passage("hi");
        let result = engine.on_input("hi there");
        assert!(result.is_some());
        assert_eq!(engine.typed_text(), "hi");
        // chars beyond the passage are not mistakes
        assert_eq!(engine.mistakes(), 0);
    }

    #[test]
    fn test_completion_by_full_passage() {
        let mut engine = timed(60);
        engine.load_passage("hi");
        assert!(engine.type_char('h').is_none());
        let result = engine.type_char('i').expect("completing the passage emits a result");

        assert_eq!(result.total_chars, 2);
        assert_eq!(result.mistakes, 0);
        assert_eq!(result.accuracy, 100);
        assert_eq!(result.time_taken, 1);
        assert_eq!(result.mode, Mode::Test);
        assert!(engine.is_finished());
        assert!(engine.is_locked());
        assert_eq!(engine.result(), Some(&result));
    }

    #[test]
    fn test_completion_by_timeout() {
        let mut engine = timed(3);
        engine.load_passage("hello world");
        engine.type_char('h');
        engine.type_char('e');

        assert!(engine.on_tick().is_none());
        assert!(engine.on_tick().is_none());
        let result = engine.on_tick().expect("timeout emits a result");

        assert_eq!(result.time_taken, 3);
        assert_eq!(result.total_chars, 2);
        assert!(engine.is_finished());
    }

    #[test]
    fn test_input_ignored_after_finish() {
        let mut engine = timed(1);
        engine.load_passage("hello");
        engine.type_char('h');
        assert!(engine.on_tick().is_some());

        assert!(engine.type_char('e').is_none());
        assert_eq!(engine.typed_text(), "h");
        assert!(engine.on_tick().is_none());
    }

    #[test]
    fn test_single_result_when_both_triggers_race() {
        let mut engine = timed(1);
        engine.load_passage("ab");
        engine.type_char('a');

        let mut results = Vec::new();
        results.extend(engine.type_char('b'));
        results.extend(engine.on_tick());
        results.extend(engine.finish());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_finish_is_latched() {
        let mut engine = timed(60);
        engine.load_passage("abc");
        engine.type_char('a');
        assert!(engine.finish().is_some());
        assert!(engine.finish().is_none());
    }

    #[test]
    fn test_practice_never_times_out() {
        let mut engine = practice();
        engine.load_passage("hello");
        engine.type_char('h');

        for _ in 0..1_000 {
            assert!(engine.on_tick().is_none());
        }
        assert_eq!(engine.elapsed_secs(), 1_000);
        assert!(!engine.is_finished());
        assert!(engine.result().is_none());
    }

    #[test]
    fn test_practice_time_taken_is_elapsed() {
        let mut engine = practice();
        engine.load_passage("ab");
        engine.type_char('a');
        for _ in 0..12 {
            engine.on_tick();
        }
        let result = engine.type_char('b').unwrap();
        assert_eq!(result.time_taken, 12);
        assert_eq!(result.mode, Mode::Practice);
    }

    #[test]
    fn test_full_passage_in_thirty_seconds() {
        let passage = "the quick brown fox jumps over the lazy dog";
        let mut engine = timed(60);
        engine.load_passage(passage);

        let mut chars = passage.chars();
        engine.type_char(chars.next().unwrap());
        for _ in 0..30 {
            assert!(engine.on_tick().is_none());
        }

        let mut result = None;
        for c in chars {
            result = engine.type_char(c);
        }
        let result = result.unwrap();

        let expected_wpm = ((passage.len() as f64 / 5.0) / (30.0 / 60.0)).round() as u32;
        assert_eq!(result.time_taken, 30);
        assert_eq!(result.mistakes, 0);
        assert_eq!(result.accuracy, 100);
        assert_eq!(result.wpm, expected_wpm);
    }

    #[test]
    fn test_corrected_mistakes_still_hurt_accuracy() {
        let mut engine = timed(60);
        engine.load_passage("abcd");
        engine.type_char('a');
        engine.type_char('x');
        engine.backspace();
        engine.type_char('b');
        engine.type_char('c');
        let result = engine.type_char('d').unwrap();

        assert_eq!(result.mistakes, 1);
        assert_eq!(result.accuracy, 75);
    }

    #[test]
    fn test_invariants_hold_over_random_edits() {
        let passage = "pack my box with five dozen liquor jugs";
        let mut engine = practice();
        engine.load_passage(passage);

        let script = "pakc\x08\x08ck mz\x08y box wiht\x08\x08\x08ith five dozen liquor jugs!!";
        let mut last_mistakes = 0;
        for c in script.chars() {
            if c == '\x08' {
                engine.backspace();
            } else {
                engine.type_char(c);
            }
            assert!(engine.typed().len() <= engine.passage().len());
            assert!(engine.mistakes() >= last_mistakes);
            last_mistakes = engine.mistakes();
        }
    }

    #[test]
    fn test_char_states() {
        let mut engine = timed(60);
        engine.load_passage("abc");
        engine.type_char('a');
        engine.type_char('x');
        assert_eq!(
            engine.char_states(),
            vec![CharState::Correct, CharState::Incorrect, CharState::Pending]
        );
    }

    #[test]
    fn test_live_metrics() {
        let mut engine = timed(60);
        engine.load_passage("abcdefghij");
        assert_eq!(engine.current_wpm(), 0);
        assert_eq!(engine.current_accuracy(), 100);

        for c in "abcde".chars() {
            engine.type_char(c);
        }
        for _ in 0..6 {
            engine.on_tick();
        }
        // 5 chars = 1 word in 6s = 10 wpm
        assert_eq!(engine.elapsed_secs(), 6);
        assert_eq!(engine.current_wpm(), 10);
        assert_eq!(engine.current_accuracy(), 100);
    }

    #[test]
    fn test_backspace_on_empty_is_noop() {
        let mut engine = timed(60);
        engine.load_passage("abc");
        assert!(engine.backspace().is_none());
        assert_eq!(engine.phase(), SessionPhase::Ready);
    }
}
