use uuid::Uuid;

/// Generates a correlation identifier: a random UUID in 32-char hex form.
#[must_use]
pub fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_shape() {
        let id = new_correlation_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_correlation_id());
    }
}
