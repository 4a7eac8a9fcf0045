//! Shared primitive types used across the billing engine.

/// A consumer's unique account number. Records are keyed by it.
pub type ConsumerNumber = String;

/// Currency amount. Every computed boundary is rounded with [`round2`].
pub type Money = f64;

/// Cumulative meter units.
pub type Units = f64;

/// Milliseconds in one calendar day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Round a currency value to two decimal places.
pub fn round2(value: Money) -> Money {
    (value * 100.0).round() / 100.0
}

/// Ceiling of `ms / DAY_MS`, correct for negative spans too.
pub fn ceil_days(ms: i64) -> i64 {
    let whole = ms.div_euclid(DAY_MS);
    if ms.rem_euclid(DAY_MS) > 0 {
        whole + 1
    } else {
        whole
    }
}
