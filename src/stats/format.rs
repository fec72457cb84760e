const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
const BASE: f64 = 1024.0;

/// Formats a byte count with base-1024 units, rounded to two decimals.
///
/// The unit is `floor(log_1024(bytes))`, clamped to the largest unit. Trailing
/// zeros of the rounded value are dropped, keeping at least one decimal.
///
/// # Examples
///
/// ```
/// # use dockwatch::stats::format_bytes;
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(1073741824), "1.0 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_owned();
    }

    let mut exponent = 0;
    let mut scaled = bytes as f64;
    while scaled >= BASE && exponent < UNITS.len() - 1 {
        scaled /= BASE;
        exponent += 1;
    }

    if exponent == 0 {
        return format!("{bytes} B");
    }
    format!("{} {}", trim_decimals(scaled), UNITS[exponent])
}

/// Formats a percentage with two decimals, e.g. `"12.50"`.
pub fn format_percent(percent: f64) -> String {
    format!("{percent:.2}")
}

fn trim_decimals(value: f64) -> String {
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_owned()
    }
}
