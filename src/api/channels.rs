//! Log line channel.
//!
//! Log records are produced wherever `log` macros run, including other
//! threads. They are queued here without heap allocation and drained by
//! the server loop, which pushes them to subscribed clients.
//!
//! ```text
//! ┌──────────────┐  LogLine   ┌──────────────┐
//! │ log::Log     │──────────▶│ ApiServer    │──▶ push_log per client
//! │ (any thread) │            │ forward_logs │
//! └──────────────┘            └──────────────┘
//! ```

use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;

use super::messages::LogLevel;

/// Longest line kept; longer text is cut at a char boundary.
pub const LOG_LINE_MAX: usize = 256;

/// Queued lines before new ones are dropped.
const LOG_DEPTH: usize = 16;

pub struct LogLine {
    pub level: LogLevel,
    pub text: String<LOG_LINE_MAX>,
}

impl LogLine {
    pub fn new(level: LogLevel, text: &str) -> Self {
        let mut cut = text.len().min(LOG_LINE_MAX);
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut line = String::new();
        // Fits: `cut` is at most the capacity.
        let _ = line.push_str(&text[..cut]);
        Self { level, text: line }
    }

    /// Format straight into the fixed buffer, cutting at capacity.
    pub fn from_args(level: LogLevel, args: fmt::Arguments<'_>) -> Self {
        let mut text = String::new();
        let _ = Truncating(&mut text).write_fmt(args);
        Self { level, text }
    }
}

/// Writer that keeps whole chars until the buffer is full.
struct Truncating<'a>(&'a mut String<LOG_LINE_MAX>);

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Log lines: logger → server loop.
pub static LOG_CHANNEL: Channel<CriticalSectionRawMutex, LogLine, LOG_DEPTH> = Channel::new();

/// Queue a line. Returns `false` when the channel is full.
pub fn try_forward(level: LogLevel, text: &str) -> bool {
    LOG_CHANNEL.try_send(LogLine::new(level, text)).is_ok()
}

/// Queue a formatted line. Returns `false` when the channel is full.
pub fn try_forward_args(level: LogLevel, args: fmt::Arguments<'_>) -> bool {
    LOG_CHANNEL.try_send(LogLine::from_args(level, args)).is_ok()
}

/// Lines currently waiting.
pub fn queued_logs() -> usize {
    LOG_CHANNEL.len()
}

/// Take the oldest queued line.
pub fn try_recv_log() -> Option<LogLine> {
    LOG_CHANNEL.try_receive().ok()
}
