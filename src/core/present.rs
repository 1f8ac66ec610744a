//! Short labels the profile view shows for sync state and overlay entries.

use chrono::{DateTime, Utc};

use crate::core::feed::parser::parse_loose_date;

pub fn format_sync_label(last_update: Option<&str>) -> String {
    last_update
        .and_then(parse_loose_date)
        .map(|date| date.format("%m-%d").to_string())
        .unwrap_or_else(|| "--".to_string())
}

pub fn relative_time_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    if elapsed.num_hours() < 1 {
        return if minutes < 1 {
            "刚刚".to_string()
        } else {
            format!("{minutes}分钟前")
        };
    }
    if elapsed.num_hours() < 24 {
        return format!("{}小时前", elapsed.num_hours());
    }
    if elapsed.num_days() < 7 {
        return format!("{}天前", elapsed.num_days());
    }
    then.format("%m-%d").to_string()
}
