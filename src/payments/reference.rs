//! Payment reference generation.

use chrono::{DateTime, Utc};

const PREFIX: &str = "DON";
const SUFFIX_LEN: usize = 10;

/// Build a reference from a timestamp and a random suffix.
///
/// Uniqueness is enforced by the ledger; this only makes collisions rare.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(SUFFIX_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", PREFIX, now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_shape() {
        let reference = generate_reference(Utc::now());
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DON");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
    }

    #[test]
    fn test_same_instant_references_differ() {
        let now = Utc::now();
        let references: HashSet<String> = (0..1000).map(|_| generate_reference(now)).collect();
        assert_eq!(references.len(), 1000);
    }
}
