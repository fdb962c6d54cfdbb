//! # Utility Functions Module
//!
//! Small helpers shared by the backends and the log output: argument vector
//! building and human-readable byte and percent formatting.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// # use build_assets::utils::to_string_vec;
/// let level = 3;
/// let args = to_string_vec(["-strip", "all", "-o", &level.to_string()]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds an argument vector from mixed expressions.
///
/// ```rust
/// # use build_assets::args;
/// let args = args!["--optimize", 3];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

const BYTE_UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];

/// Formats a byte count with decimal (SI) units and three significant
/// digits, e.g. `400 B`, `1 kB`, `1.34 MB`. Negative counts keep their sign.
pub fn pretty_bytes(bytes: i64) -> String {
    let sign = if bytes < 0 { "-" } else { "" };
    let magnitude = bytes.unsigned_abs() as f64;

    if magnitude < 1.0 {
        return format!("{}{} B", sign, magnitude as u64);
    }

    let mut exponent = 0;
    let mut value = magnitude;
    while value >= 1000.0 && exponent < BYTE_UNITS.len() - 1 {
        value /= 1000.0;
        exponent += 1;
    }
    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else {
        2
    };
    let formatted = trim_trailing_zeros(format!("{:.*}", decimals, value));

    format!("{}{} {}", sign, formatted, BYTE_UNITS[exponent])
}

/// Formats a percentage with one decimal, dropping a trailing `.0`:
/// `40.0` becomes `40`, `12.34` becomes `12.3`.
pub fn format_percent(percent: f64) -> String {
    let formatted = format!("{:.1}", percent);
    match formatted.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => formatted,
    }
}

fn trim_trailing_zeros(number: String) -> String {
    if !number.contains('.') {
        return number;
    }
    number.trim_end_matches('0').trim_end_matches('.').to_string()
}
