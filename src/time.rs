use chrono::{NaiveDate, Utc};

pub type Timestamp = chrono::DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

/// The calendar day a timestamp falls on, used as the key of the daily view aggregates.
pub fn day_of(timestamp: Timestamp) -> NaiveDate {
    timestamp.date_naive()
}
