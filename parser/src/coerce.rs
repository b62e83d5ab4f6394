//! Value coercions shared by the normalizers. All of them are total.

pub const BRAND_ICON_DIR: &str = "/img/brands";
pub const PLACEHOLDER_ICON: &str = "/img/placeholder.svg";

const TRUTHY: [&str; 6] = ["y", "yes", "x", "true", "1", "✓"];

pub fn truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// Loyalty points: plain number, else `<decimal>k` shorthand, else 0.
///
/// Negative values clamp to 0 and fractions round to the nearest point.
pub fn coerce_points(value: &str) -> u64 {
    let value = value.trim();
    let number = parse_finite(value).or_else(|| parse_thousands(value));
    number.map(round_non_negative).unwrap_or(0)
}

/// Non-negative finite number, 0 otherwise
pub fn coerce_amount(value: &str) -> f64 {
    match parse_finite(value.trim()) {
        Some(n) if n > 0.0 => n,
        _ => 0.0,
    }
}

/// Non-negative whole count, rounded
pub fn coerce_count(value: &str) -> u64 {
    parse_finite(value.trim())
        .map(round_non_negative)
        .unwrap_or(0)
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_thousands(value: &str) -> Option<f64> {
    let digits = value
        .strip_suffix('k')
        .or_else(|| value.strip_suffix('K'))?
        .trim_end();
    if !is_decimal(digits) {
        return None;
    }
    parse_finite(digits).map(|n| n * 1000.0)
}

fn is_decimal(s: &str) -> bool {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    match frac {
        Some(f) => !(whole.is_empty() && f.is_empty()) && all_digits(whole) && all_digits(f),
        None => !whole.is_empty() && all_digits(whole),
    }
}

fn round_non_negative(n: f64) -> u64 {
    if n <= 0.0 {
        0
    } else {
        n.round() as u64
    }
}

pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn brand_icon_path(slug: &str) -> String {
    if slug.is_empty() {
        PLACEHOLDER_ICON.to_string()
    } else {
        format!("{}/{}.svg", BRAND_ICON_DIR, slug)
    }
}

/// Split a combined name into `(first, last)`.
///
/// "Last, First" splits on the first comma; otherwise the final
/// whitespace-separated token is the last name.
pub fn split_name(full: &str) -> (String, String) {
    if let Some((last, first)) = full.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    let mut parts: Vec<&str> = full.split_whitespace().collect();
    match parts.pop() {
        Some(last) => (parts.join(" "), last.to_string()),
        None => (String::new(), String::new()),
    }
}
