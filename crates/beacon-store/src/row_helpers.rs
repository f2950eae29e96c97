use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Parse a stored RFC 3339 timestamp back into a UTC instant.
pub fn parse_timestamp(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp: {e}"),
        })
}

/// Parse a JSON string column, returning CorruptRow on parse failure.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::session::SessionStatus;

    #[test]
    fn parse_enum_success() {
        let status: SessionStatus = parse_enum("active", "sessions", "status").unwrap();
        assert_eq!(status, SessionStatus::Active);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<SessionStatus, _> = parse_enum("INVALID", "sessions", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "sessions", column: "status", .. })
        ));
    }

    #[test]
    fn parse_timestamp_roundtrip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339(), "sessions", "started_at").unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn parse_timestamp_failure() {
        let result = parse_timestamp("yesterday", "sessions", "started_at");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { column: "started_at", .. })
        ));
    }

    #[test]
    fn parse_json_vec() {
        let ids: Vec<String> =
            parse_json(r#"["a","b"]"#, "outcome_attempts", "notification_ids").unwrap();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn parse_json_failure() {
        let result: Result<Vec<String>, _> =
            parse_json("not json", "outcome_attempts", "notification_ids");
        assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
    }
}
