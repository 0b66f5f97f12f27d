//! Log forwarding adapter.
//!
//! Wraps the platform logger (ESP-IDF `EspLogger` on the device, any
//! `log::Log` on the host) and copies each record into the API log
//! channel so subscribed clients receive it. The wrapped logger still
//! sees every record.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::api::channels;

/// `log::Log` that tees records into the API log channel.
pub struct ApiLogForwarder<L> {
    inner: L,
    forward_level: LevelFilter,
}

impl<L: Log> ApiLogForwarder<L> {
    pub fn new(inner: L, forward_level: LevelFilter) -> Self {
        Self {
            inner,
            forward_level,
        }
    }
}

impl<L: Log + 'static> ApiLogForwarder<L> {
    /// Install as the global logger.
    pub fn install(self, max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl<L: Log> Log for ApiLogForwarder<L> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.forward_level || self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        self.inner.log(record);
        if record.level() <= self.forward_level {
            // A full channel drops the line; clients miss it, nothing else.
            channels::try_forward_args(
                record.level().into(),
                format_args!("[{}] {}", record.target(), record.args()),
            );
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
