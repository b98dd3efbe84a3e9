//! Minimal `log` backend: records are pushed over a channel and written by a
//! dedicated thread, so request tasks never block on stdout.

use log::{Level, Metadata, Record, SetLoggerError};
use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

const SHUTDOWN: &str = "__logger_shutdown__";

pub struct ChannelLogger {
    sender: mpsc::SyncSender<String>,
    writer_handle: Option<thread::JoinHandle<()>>,
    level: Level,
}

impl ChannelLogger {
    pub fn new<W: Write + Send + 'static>(buffer: usize, destination: W, level: Level) -> Self {
        let (sender, receiver) = mpsc::sync_channel(buffer);
        let destination = Arc::new(Mutex::new(destination));

        let writer_handle = thread::spawn(move || loop {
            let line = match receiver.recv() {
                Ok(line) if line == SHUTDOWN => break,
                Ok(line) => line,
                Err(_) => break,
            };
            if let Ok(mut out) = destination.lock() {
                let _ = writeln!(out, "{}", line);
            }
        });

        Self {
            sender,
            writer_handle: Some(writer_handle),
            level,
        }
    }
}

impl log::Log for ChannelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = self
                .sender
                .send(format!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

impl Drop for ChannelLogger {
    fn drop(&mut self) {
        let _ = self.sender.send(SHUTDOWN.to_string());
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Install a stdout logger; level comes from `LOG_LEVEL` (default `info`).
pub fn init() -> Result<(), SetLoggerError> {
    let level = match std::env::var("LOG_LEVEL")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" => Level::Warn,
        "error" => Level::Error,
        _ => Level::Info,
    };

    log::set_boxed_logger(Box::new(ChannelLogger::new(256, io::stdout(), level)))
        .map(|()| log::set_max_level(level.to_level_filter()))
}

/// Same as [`init`] but with an explicit level; used by the admin binary to
/// keep table output clean.
pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(ChannelLogger::new(256, io::stdout(), level)))
        .map(|()| log::set_max_level(level.to_level_filter()))
}
