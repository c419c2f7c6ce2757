//! Shared utility functions for qr-cloud

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Cut `text` to at most `max` characters, marking the cut with `...`
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// `base` without trailing slashes, so paths can be appended with `/`
pub fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}
