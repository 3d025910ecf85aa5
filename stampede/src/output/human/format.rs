use std::time::Duration;

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// Rounds to whole seconds above 1s (`1m 30s` style), to milliseconds below.
pub(crate) fn format_elapsed(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        return format!("{}ms", d.as_millis());
    }
    let rounded = Duration::from_secs(d.as_secs() + u64::from(d.subsec_millis() >= 500));
    humantime::format_duration(rounded).to_string()
}
