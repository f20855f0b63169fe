//! Document identifiers

use ulid::Ulid;

/// Generate a new sortable document id with a short type prefix (`fc_01H...`)
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_and_unique() {
        let a = new_id("fc");
        let b = new_id("fc");
        assert!(a.starts_with("fc_"));
        assert_ne!(a, b);
    }
}
