use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if b >= GIB {
        return format!("{:.2}GiB", (b as f64) / (GIB as f64));
    }
    if b >= MIB {
        return format!("{:.2}MiB", (b as f64) / (MIB as f64));
    }
    if b >= KIB {
        return format!("{:.2}KiB", (b as f64) / (KIB as f64));
    }

    format!("{b}B")
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// A single rounded component in one of: ms, s, m.
pub(crate) fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 60_000 {
        let secs = d.as_secs();
        return format!("{}m{:02}s", secs / 60, secs % 60);
    }
    if ms >= 1_000 {
        return format!("{}s", (ms + 500) / 1_000);
    }
    format!("{ms}ms")
}

/// Trend values are milliseconds.
pub(crate) fn format_ms(v: f64) -> String {
    if !v.is_finite() {
        return "-".to_string();
    }
    if v >= 1_000.0 {
        return format!("{:.2}s", v / 1_000.0);
    }
    if v < 1.0 {
        return format!("{:.0}us", v * 1_000.0);
    }
    format!("{v:.2}ms")
}

pub(crate) fn format_pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_by_1024() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00MiB");
    }

    #[test]
    fn durations_render_one_component() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1_600)), "2s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
    }

    #[test]
    fn trend_values_are_milliseconds() {
        assert_eq!(format_ms(0.25), "250us");
        assert_eq!(format_ms(12.5), "12.50ms");
        assert_eq!(format_ms(2_500.0), "2.50s");
        assert_eq!(format_rate(f64::NAN), "0");
        assert_eq!(format_pct(0.5), "50.00%");
    }
}
