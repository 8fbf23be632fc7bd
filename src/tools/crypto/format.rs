//! en-US number formatting for price replies.

/// Insert thousands separators into a string of ASCII digits.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Group an already-rounded decimal string like "1234567.5".
fn group_decimal(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    match unsigned.split_once('.') {
        Some((int, frac)) => format!("{sign}{}.{frac}", group_thousands(int)),
        None => format!("{sign}{}", group_thousands(unsigned)),
    }
}

/// Drop trailing fractional zeros and a dangling decimal point.
fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// A plain number with grouping and at most three fraction digits,
/// e.g. `67234.5` → `67,234.5`.
pub fn format_price(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let fixed = format!("{value:.3}");
    let trimmed = trim_fraction(&fixed);
    if trimmed == "-0" {
        return "0".to_string();
    }
    group_decimal(trimmed)
}

/// Round to two significant digits below 10, to an integer otherwise.
fn compact_round(value: f64) -> f64 {
    if value >= 10.0 || value == 0.0 {
        return value.round();
    }
    let magnitude = value.log10().floor();
    let factor = 10f64.powf(1.0 - magnitude);
    (value * factor).round() / factor
}

const COMPACT_UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

/// Short compact currency notation, e.g. `1_234_000_000_000.0` → `$1.2T`.
pub fn format_compact_usd(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    // Index of the largest unit not exceeding the value; None below 1,000
    let mut unit = COMPACT_UNITS.iter().position(|(size, _)| abs >= *size);

    let mut scaled = match unit {
        Some(i) => compact_round(abs / COMPACT_UNITS[i].0),
        None => compact_round(abs),
    };

    // Rounding can carry into the next unit (999.96M → 1B)
    if scaled >= 1000.0 {
        let bigger = match unit {
            Some(0) => None,
            Some(i) => Some(i - 1),
            None => Some(COMPACT_UNITS.len() - 1),
        };
        if let Some(i) = bigger {
            unit = Some(i);
            scaled = compact_round(abs / COMPACT_UNITS[i].0);
        }
    }

    let suffix = unit.map(|i| COMPACT_UNITS[i].1).unwrap_or("");
    format!("{sign}${}{suffix}", group_decimal(&scaled.to_string()))
}
