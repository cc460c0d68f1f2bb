//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4 as the hyphenated string stored in TEXT id columns
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse UUID from string
pub fn parse(s: &str) -> std::result::Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_round_trips() {
        let id = generate_id();
        assert_eq!(parse(&id).unwrap().to_string(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not-a-uuid").is_err());
    }
}
