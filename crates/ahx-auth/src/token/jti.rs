//! Token id generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;

/// Length of generated token ids.
pub const JTI_LENGTH: usize = 24;

/// Generates a token id: 24 characters drawn uniformly from `[0-9A-Za-z]`.
#[must_use]
pub fn generate_jti() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(JTI_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_jti_shape() {
        let jti = generate_jti();
        assert_eq!(jti.len(), JTI_LENGTH);
        assert!(jti.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_jti_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| generate_jti()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
