//! Wall-clock timestamps in Japan Standard Time

use chrono::{FixedOffset, Offset, Utc};
use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

const JST_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Renders `HH:MM:SS.mmm` at UTC+9
#[derive(Debug, Clone, Copy, Default)]
pub struct JstTimer;

impl JstTimer {
    pub fn offset() -> FixedOffset {
        // 9h is always within chrono's accepted range
        FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
    }
}

impl FormatTime for JstTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = Utc::now().with_timezone(&Self::offset());
        write!(w, "{}", now.format("%H:%M:%S%.3f"))
    }
}
