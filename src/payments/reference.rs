//! Payment reference generation
//!
//! References look like `PAY_20240122123456_K3J9QZ0A7B2M`: a fixed prefix,
//! the UTC creation second, and twelve random uppercase alphanumerics. They
//! sort roughly by creation time and need no coordination between threads.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;

pub const REFERENCE_PREFIX: &str = "PAY";
pub const RANDOM_SUFFIX_LEN: usize = 12;

pub fn generate() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();

    format!(
        "{}_{}_{}",
        REFERENCE_PREFIX,
        Utc::now().format("%Y%m%d%H%M%S"),
        suffix
    )
}
