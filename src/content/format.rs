/// Display formatting for counts and timestamps
use chrono::{DateTime, Utc};

/// Compact view count: `999`, `15.4K`, `2.3M`
pub fn format_views(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        views.to_string()
    }
}

/// Relative age such as "3 days ago"
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds().max(0);

    let (amount, unit) = match seconds {
        s if s < 60 => return "just now".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 86_400 * 30 => (s / 86_400, "day"),
        s if s < 86_400 * 365 => (s / (86_400 * 30), "month"),
        s => (s / (86_400 * 365), "year"),
    };

    if amount == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", amount, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_views() {
        assert_eq!(format_views(0), "0");
        assert_eq!(format_views(999), "999");
        assert_eq!(format_views(1_500), "1.5K");
        assert_eq!(format_views(15_400), "15.4K");
        assert_eq!(format_views(2_300_000), "2.3M");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(time_ago(now - Duration::days(3), now), "3 days ago");
        assert_eq!(time_ago(now - Duration::days(400), now), "1 year ago");
        // Clock skew never yields a negative age
        assert_eq!(time_ago(now + Duration::minutes(5), now), "just now");
    }
}
