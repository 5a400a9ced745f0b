/// Number of characters that make up one "word" for wpm purposes.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Words per minute from correctly typed characters over `seconds`.
///
/// A word is [`CHARS_PER_WORD`] characters, not a lexical word. Returns 0
/// for a non-positive duration.
pub fn wpm(correct_chars: usize, seconds: f64) -> u32 {
    if seconds <= 0.0 {
        return 0;
    }
    let words = correct_chars as f64 / CHARS_PER_WORD;
    let minutes = seconds / 60.0;
    (words / minutes).round() as u32
}

/// Accuracy percentage from total typed characters and counted mistakes.
///
/// Mistakes are append events, so a corrected typo still counts against
/// accuracy even though the final text no longer shows it.
pub fn accuracy(total_chars: usize, mistakes: usize) -> u32 {
    if total_chars == 0 {
        return 100;
    }
    let correct = total_chars as f64 - mistakes as f64;
    let pct = (correct / total_chars as f64) * 100.0;
    pct.round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wpm_one_minute() {
        // 25 chars = 5 words in one minute
        assert_eq!(wpm(25, 60.0), 5);
        assert_eq!(wpm(300, 60.0), 60);
    }

    #[test]
    fn test_wpm_half_minute() {
        assert_eq!(wpm(150, 30.0), 60);
    }

    #[test]
    fn test_wpm_non_positive_seconds() {
        assert_eq!(wpm(0, 0.0), 0);
        assert_eq!(wpm(0, -5.0), 0);
        assert_eq!(wpm(100, 0.0), 0);
    }

    #[test]
    fn test_wpm_rounds() {
        // 7 chars in 60s = 1.4 words
        assert_eq!(wpm(7, 60.0), 1);
        // 8 chars in 60s = 1.6 words
        assert_eq!(wpm(8, 60.0), 2);
    }

    #[test]
    fn test_accuracy_empty() {
        assert_eq!(accuracy(0, 0), 100);
    }

    #[test]
    fn test_accuracy_basic() {
        assert_eq!(accuracy(10, 3), 70);
        assert_eq!(accuracy(10, 0), 100);
        assert_eq!(accuracy(3, 1), 67);
    }

    #[test]
    fn test_accuracy_never_negative() {
        // more mistake events than surviving chars after heavy correcting
        assert_eq!(accuracy(2, 5), 0);
    }
}
