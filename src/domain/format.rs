//! Human-readable number formatting for command output and exports.

/// `1234567.891` with 2 places -> `1,234,567.89`.
pub fn format_number(value: f64, decimal_places: usize) -> String {
    let raw = format!("{:.*}", decimal_places, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// `0.0123` -> `1.23%`.
pub fn format_percentage(value: f64, decimal_places: usize) -> String {
    format!("{:.*}%", decimal_places, value * 100.0)
}

/// Billions as `$1.23B`, millions as `$4.56M`, otherwise `$7.89`.
pub fn format_market_cap(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else {
        format!("${:.2}", value)
    }
}
