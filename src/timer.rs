/// Which way the timer counts on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One-second resolution timer advanced by explicit ticks.
///
/// The timer owns no thread or interval; whoever owns it feeds `tick()`
/// from its event loop, so dropping the owner is the only teardown needed.
#[derive(Debug, Clone)]
pub struct Timer {
    initial: u32,
    time: u32,
    direction: Direction,
    running: bool,
    finished: bool,
}

impl Timer {
    pub fn new(initial: u32, direction: Direction) -> Self {
        Self {
            initial,
            time: initial,
            direction,
            running: false,
            finished: false,
        }
    }

    pub fn count_down(seconds: u32) -> Self {
        Self::new(seconds, Direction::Down)
    }

    pub fn count_up() -> Self {
        Self::new(0, Direction::Up)
    }

    /// Starts advancing. No-op if already running or finished.
    pub fn start(&mut self) {
        if !self.running && !self.finished {
            self.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Stops, clears `finished` and sets the value to `new_base`, or to the
    /// initial value when `None`.
    pub fn reset(&mut self, new_base: Option<u32>) {
        self.running = false;
        self.finished = false;
        self.time = new_base.unwrap_or(self.initial);
    }

    /// Applies one second. Returns true only on the tick that finishes a
    /// count-down.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.finished {
            return false;
        }
        match self.direction {
            Direction::Up => {
                self.time = self.time.saturating_add(1);
                false
            }
            Direction::Down => {
                if self.time <= 1 {
                    self.time = 0;
                    self.running = false;
                    self.finished = true;
                    true
                } else {
                    self.time -= 1;
                    false
                }
            }
        }
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_idle() {
        let timer = Timer::count_down(30);
        assert_eq!(timer.time(), 30);
        assert!(!timer.is_running());
        assert!(!timer.is_finished());
    }

    #[test]
    fn test_tick_without_start_does_nothing() {
        let mut timer = Timer::count_down(30);
        assert!(!timer.tick());
        assert_eq!(timer.time(), 30);
    }

    #[test]
    fn test_count_down_finishes_at_zero() {
        let mut timer = Timer::count_down(3);
        timer.start();

        assert!(!timer.tick());
        assert_eq!(timer.time(), 2);
        assert!(!timer.tick());
        assert_eq!(timer.time(), 1);
        assert!(timer.tick());
        assert_eq!(timer.time(), 0);
        assert!(timer.is_finished());
        assert!(!timer.is_running());

        // further ticks are inert
        assert!(!timer.tick());
        assert_eq!(timer.time(), 0);
    }

    #[test]
    fn test_count_up_is_unbounded() {
        let mut timer = Timer::count_up();
        timer.start();
        for _ in 0..500 {
            assert!(!timer.tick());
        }
        assert_eq!(timer.time(), 500);
        assert!(!timer.is_finished());
    }

    #[test]
    fn test_start_is_noop_when_finished() {
        let mut timer = Timer::count_down(1);
        timer.start();
        timer.tick();
        assert!(timer.is_finished());

        timer.start();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_pause_and_resume() {
        let mut timer = Timer::count_up();
        timer.start();
        timer.tick();
        timer.pause();
        timer.tick();
        assert_eq!(timer.time(), 1);

        timer.start();
        timer.tick();
        assert_eq!(timer.time(), 2);
    }

    #[test]
    fn test_reset_defaults_to_initial() {
        let mut timer = Timer::count_down(2);
        timer.start();
        timer.tick();
        timer.tick();
        assert!(timer.is_finished());

        timer.reset(None);
        assert_eq!(timer.time(), 2);
        assert!(!timer.is_finished());
        assert!(!timer.is_running());
    }

    #[test]
    fn test_reset_with_new_base() {
        let mut timer = Timer::count_down(60);
        timer.reset(Some(90));
        assert_eq!(timer.time(), 90);
    }
}
