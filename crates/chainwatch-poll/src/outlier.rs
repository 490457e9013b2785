//! Median absolute deviation (MAD) outlier detection.
//!
//! Flags entries whose distance from the median is more than `n_mads`
//! times the MAD. Unlike a standard-deviation test this makes no normality
//! assumption and is not dragged around by the outliers themselves.
//!
//! All arithmetic is exact on `u128` token amounts; nothing passes through
//! floating point.

/// Default sensitivity: flag values more than three MADs from the median.
pub const DEFAULT_N_MADS: u128 = 3;

/// Median and MAD of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispersion {
    pub median: u128,
    pub mad: u128,
}

/// Median of `values`. For an even count this is the floor of the mean of
/// the two middle elements. `None` for an empty series.
pub fn median(values: &[u128]) -> Option<u128> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(midpoint(sorted[mid - 1], sorted[mid]))
    }
}

/// Median and median absolute deviation of `values`.
pub fn median_absolute_deviation(values: &[u128]) -> Option<Dispersion> {
    let median = median(values)?;
    let deviations: Vec<u128> = values.iter().map(|v| v.abs_diff(median)).collect();
    let mad = self::median(&deviations)?;
    Some(Dispersion { median, mad })
}

/// Indices `i` with `|values[i] - median| > n_mads * MAD`, ascending.
///
/// When every value is equal the MAD is zero and nothing is flagged,
/// whatever `n_mads` is.
pub fn find_outliers(values: &[u128], n_mads: u128) -> Vec<usize> {
    let Some(Dispersion { median, mad }) = median_absolute_deviation(values) else {
        return Vec::new();
    };
    let limit = mad.saturating_mul(n_mads);

    values
        .iter()
        .enumerate()
        .filter(|&(_, v)| v.abs_diff(median) > limit)
        .map(|(i, _)| i)
        .collect()
}

/// Parse a token amount as exact integer base units.
///
/// Accepts `"1000000"`, coin strings such as `"1000000uluna"`, and decimal
/// share strings such as `"1000.000000000000000000"` (the fractional part is
/// dropped). Exponent forms (`"1e+22"`) and any other trailing text are
/// rejected, since their leading digits are not the amount.
pub fn parse_amount(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, rest) = trimmed.split_at(digits_end);
    let valid_suffix = match rest.strip_prefix('.') {
        Some(fraction) => fraction.chars().all(|c| c.is_ascii_digit()),
        None => is_denomination(rest),
    };
    if !valid_suffix {
        return None;
    }

    digits.parse().ok()
}

/// A coin denomination suffix such as `uluna`. Empty counts.
pub(crate) fn is_denomination(suffix: &str) -> bool {
    suffix.chars().all(|c| c.is_ascii_alphabetic())
}

fn midpoint(a: u128, b: u128) -> u128 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}
