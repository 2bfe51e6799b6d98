use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub(crate) fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// RFC 3339 with the UTC offset preserved; used for every timestamp we emit.
pub(crate) fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Lenient parse for timestamps received from the exam bank. Returns `None`
/// for anything that is not RFC 3339, which callers treat as "not set".
pub(crate) fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

pub(crate) fn unix_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}
