//! Utility functions

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of task and request identifiers
pub const ID_LENGTH: usize = 16;

/// Length of generated API keys
pub const API_KEY_LENGTH: usize = 32;

/// Random string over `[A-Za-z0-9]`
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// New task or request identifier
pub fn generate_id() -> String {
    random_alphanumeric(ID_LENGTH)
}

/// Parse "[HH:]MM:SS[.fff]" (or bare seconds) into seconds
///
/// Returns `None` for empty input, more than three components, or any
/// component that is not a non-negative number.
///
/// # Examples
///
/// ```
/// use media_dl::utils::parse_clock;
///
/// assert_eq!(parse_clock("1:02:03"), Some(3723.0));
/// assert_eq!(parse_clock("02:30.5"), Some(150.5));
/// assert_eq!(parse_clock("42"), Some(42.0));
/// assert_eq!(parse_clock("a:b"), None);
/// ```
pub fn parse_clock(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}
