use chrono::{Days, NaiveDate, NaiveTime};

use crate::models::request_params::HistoryRequest;

/// Daily resolution code.
const RESOLUTION_DAY: &str = "D";

/// Unix timestamp of 00:00 UTC on `date`. The upstream stamps daily bars at UTC
/// midnight (`2024-01-02T00:00:00.000Z`), so windows are cut on UTC days.
fn day_start(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp()
}

/// Builds the query string for a bars request.
///
/// The window is inclusive on both ends, so `to` is the last second of `end`.
pub fn construct_history_params(req: &HistoryRequest) -> Vec<(String, String)> {
    let to = req
        .end
        .checked_add_days(Days::new(1))
        .map(day_start)
        .map(|ts| ts - 1)
        .unwrap_or_else(|| day_start(req.end));

    vec![
        ("ticker".to_string(), req.symbol.clone()),
        ("type".to_string(), req.asset_class.as_query_value().to_string()),
        ("resolution".to_string(), RESOLUTION_DAY.to_string()),
        ("from".to_string(), day_start(req.start).to_string()),
        ("to".to_string(), to.to_string()),
    ]
}

/// Query string for the yearly ratio history.
pub fn construct_ratio_params() -> Vec<(String, String)> {
    vec![
        ("yearly".to_string(), "1".to_string()),
        ("isAll".to_string(), "true".to_string()),
    ]
}
