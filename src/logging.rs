//! Logging setup: console output plus a daily `logs-YYYY-MM-DD.csv` file with
//! `timestamp,level,message` rows.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

pub fn init(log_dir: impl Into<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(CsvLogLayer::new(log_dir))
        .init();
}

pub struct CsvLogLayer {
    dir: PathBuf,
}

impl CsvLogLayer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl<S: Subscriber> Layer<S> for CsvLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        log_to_csv(&self.dir, &event.metadata().level().to_string(), &visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Appends one row to today's log file. Logging never fails the caller.
pub fn log_to_csv(dir: &Path, level: &str, message: &str) {
    let now = chrono::Utc::now();
    let filename = dir.join(format!("logs-{}.csv", now.format("%Y-%m-%d")));

    match std::fs::OpenOptions::new().append(true).create(true).open(&filename) {
        Ok(file) => {
            let mut writer = csv::Writer::from_writer(file);
            if writer
                .write_record([now.to_rfc3339().as_str(), level, message])
                .is_ok()
            {
                let _ = writer.flush();
            }
        }
        Err(e) => eprintln!("could not open log file {}: {}", filename.display(), e),
    }
}
