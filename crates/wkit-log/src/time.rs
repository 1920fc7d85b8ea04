use chrono::{FixedOffset, Offset, Utc};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders `YYYY-MM-DD HH:MM:SS` in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct LocalTimer {
    offset: FixedOffset,
    enabled: bool,
}

impl LocalTimer {
    /// Offsets outside +/-23 hours fall back to UTC.
    pub fn new(utc_offset_hours: i32, enabled: bool) -> Self {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset, enabled }
    }

    /// The UTC offset timestamps are rendered in.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn render(&self, now: chrono::DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        if !self.enabled {
            return Ok(());
        }
        write!(w, "{}", self.render(Utc::now()))
    }
}
