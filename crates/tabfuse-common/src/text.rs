//! Text normalisation used for comparisons.

/// Trims and collapses internal whitespace runs to a single space.
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised form used to compare identity values: whitespace-collapsed and lowercased.
pub fn normalize_identity(value: &str) -> String {
    normalize_text(value).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_text("  J \t Smith\n"), "J Smith");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn identity_ignores_case() {
        assert_eq!(normalize_identity("J@X.com "), normalize_identity("j@x.com"));
        assert_eq!(normalize_identity("J  Smith"), "j smith");
    }

    proptest! {
        #[test]
        fn normalisation_is_idempotent(value in "[a-zA-Z0-9@. \\t\\n]{0,40}") {
            let once = normalize_identity(&value);
            prop_assert_eq!(normalize_identity(&once), once);
        }
    }
}
