//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 and clamp it to the u32 range, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_u32(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    let max = cast::<u32, f64>(u32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(0.0, max).round();
    cast::<f64, u32>(clamped).unwrap_or(0)
}

/// Floor a f64 and clamp it to the u32 range, returning 0 for NaN values.
#[must_use]
pub fn floor_f64_to_u32(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    let max = cast::<u32, f64>(u32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(0.0, max).floor();
    cast::<f64, u32>(clamped).unwrap_or(0)
}

/// Convert a count to u32, saturating on overflow.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Split `total` proportionally to `weights` using the largest remainder
/// method so the shares always sum to exactly `total`.
///
/// Returns `None` when every weight is zero.
#[must_use]
pub fn largest_remainder_shares(weights: &[u32], total: u32) -> Option<Vec<u32>> {
    let sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if sum == 0 {
        return None;
    }
    let sum_f = u64_to_f64(sum);
    let total_f = f64::from(total);
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (idx, weight) in weights.iter().enumerate() {
        let exact = f64::from(*weight) * total_f / sum_f;
        let floor = floor_f64_to_u32(exact);
        shares.push(floor);
        remainders.push((idx, exact - f64::from(floor)));
    }
    let assigned: u32 = shares.iter().sum();
    let mut missing = total.saturating_sub(assigned);
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for (idx, _) in remainders {
        if missing == 0 {
            break;
        }
        if weights[idx] == 0 {
            continue;
        }
        shares[idx] += 1;
        missing -= 1;
    }
    Some(shares)
}
