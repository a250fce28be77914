//! Timeouts - Deadlines applied to provider operations

use std::future::Future;
use std::time::Duration;

pub use tokio::time::error::Elapsed;

/// Default deadline for a data source read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Per-operation deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn with_read(mut self, read: Duration) -> Self {
        self.read = read;
        self
    }
}

/// Run `future` under the read deadline
///
/// When the deadline fires the future is dropped, which abandons any
/// in-flight request it owns. The timer is released on every exit path.
pub async fn with_read_timeout<F, T>(timeouts: &Timeouts, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeouts.read, future).await
}

/// Parse a duration such as "30s", "5m", "1h" or "1h30m"
///
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            _ => return Err(format!("Invalid duration '{}': unknown unit '{}'", input, c)),
        };
        let amount: u64 = digits
            .parse()
            .map_err(|_| format!("Invalid duration '{}': missing number before '{}'", input, c))?;
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("Invalid duration '{}': too large", input))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(format!("Invalid duration '{}': missing unit", input));
    }
    Ok(Duration::from_secs(total))
}
