//! Logger setup for the daemon.

use std::backtrace::Backtrace;
use std::panic::PanicInfo;

use clap::ValueEnum;
use tracing::error;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::error::Error;
use crate::error::Result;

#[derive(ValueEnum, Debug, Clone)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(val: LogLevel) -> Self {
        match val {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn set_panic_hook() {
    // Record panics as tracing events so they carry the span context in
    // which they occurred.
    std::panic::set_hook(Box::new(|panic| {
        log_panic(panic);
    }));
}

fn log_panic(panic: &PanicInfo) {
    let backtrace = Backtrace::force_capture();
    let backtrace = format!("{:?}", backtrace);
    if let Some(location) = panic.location() {
        error!(
            message = %panic,
            backtrace = %backtrace,
            panic.file = location.file(),
            panic.line = location.line(),
            panic.column = location.column(),
        );
    } else {
        error!(message = %panic, backtrace = %backtrace);
    }
}

pub fn init_logging(level: LevelFilter) -> Result<()> {
    set_panic_hook();

    LogTracer::init().map_err(|_| Error::LoggerInit)?;

    let subscriber = Registry::default()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(level));
    tracing::subscriber::set_global_default(subscriber).map_err(|_| Error::LoggerInit)?;
    Ok(())
}
