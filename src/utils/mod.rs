pub mod recover;
pub mod serde;

/// Return early from a `Result`-returning function with the given error if
/// the condition does not hold.
#[macro_export]
macro_rules! require {
    ($condition:expr, $err:expr) => {
        if !($condition) {
            return Err($err);
        }
    };
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
