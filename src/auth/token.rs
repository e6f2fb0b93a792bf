//! Session token and failure-delay randomness
//!
//! Both draw from `rand::rng()`, a cryptographically secure generator, so
//! tokens are unguessable and the delay jitter cannot be predicted.

use rand::RngExt;
use std::time::Duration;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric session token of `len` characters
pub fn generate_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Pick a delay uniformly from the inclusive window `[min, max]`
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = u64::try_from((max - min).as_nanos()).unwrap_or(u64::MAX);
    min + Duration::from_nanos(rand::rng().random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_length_and_alphabet() {
        let token = generate_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token(32)).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_delay_within_window() {
        let min = Duration::from_millis(100);
        let max = Duration::from_millis(200);
        for _ in 0..200 {
            let delay = random_delay(min, max);
            assert!(delay >= min && delay <= max, "delay {:?} out of window", delay);
        }
    }

    #[test]
    fn test_delay_keeps_sub_millisecond_bounds() {
        let min = Duration::from_micros(100_500);
        let max = Duration::from_micros(100_900);
        for _ in 0..200 {
            let delay = random_delay(min, max);
            assert!(delay >= min && delay <= max, "delay {:?} out of window", delay);
        }
    }

    #[test]
    fn test_degenerate_window() {
        let d = Duration::from_millis(50);
        assert_eq!(random_delay(d, d), d);
        assert_eq!(random_delay(d, Duration::ZERO), d);
    }
}
