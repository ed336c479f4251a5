use std::ffi::CString;
use std::os::raw::c_int;

use crate::broker::Broker;
use crate::ffi;

/// Installs a `log` backend writing to the broker's log. A backend already installed in the
/// process is left alone.
pub fn logger_init(broker: &'static dyn Broker, level: log::LevelFilter) {
    match log::set_boxed_logger(Box::new(BrokerLogger(broker))) {
        Ok(()) => log::set_max_level(level),
        Err(e) => log::debug!("logger already installed, {}", e),
    }
}

struct BrokerLogger(&'static dyn Broker);

impl log::Log for BrokerLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, r: &log::Record) {
        self.0.log(log_to_broker_level(r.level()), &format_record(r));
    }

    fn flush(&self) {}
}

fn log_to_broker_level(level: log::Level) -> c_int {
    match level {
        log::Level::Error => ffi::MOSQ_LOG_ERR,
        log::Level::Warn => ffi::MOSQ_LOG_WARNING,
        log::Level::Info => ffi::MOSQ_LOG_INFO,
        log::Level::Debug | log::Level::Trace => ffi::MOSQ_LOG_DEBUG,
    }
}

fn format_record(r: &log::Record) -> CString {
    let msg = format!("{}: {}", r.target(), r.args());
    CString::new(msg).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}
