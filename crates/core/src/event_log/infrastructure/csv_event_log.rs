use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::estimation::domain::attribute_estimator::Gender;
use crate::event_log::domain::senior_event_log::{EventLogError, SeniorEventLog};
use crate::shared::constants::{LOG_HEADER, LOG_TIME_FORMAT};

pub type Clock = Box<dyn Fn() -> DateTime<Local> + Send>;

/// Appends `Age,Gender,Time` rows to a CSV file.
///
/// The file is opened per record, so rows written before a crash survive
/// and other programs may read the log while a run is active.
pub struct CsvEventLog {
    path: PathBuf,
    clock: Clock,
}

impl CsvEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Box::new(Local::now))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> EventLogError {
        EventLogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SeniorEventLog for CsvEventLog {
    fn record(&mut self, age: u32, gender: Gender) -> Result<(), EventLogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let new_file = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        let timestamp = (self.clock)().format(LOG_TIME_FORMAT);
        let mut row = String::new();
        if new_file {
            row.push_str(LOG_HEADER);
            row.push('\n');
        }
        row.push_str(&format!("{age},{gender},{timestamp}\n"));

        file.write_all(row.as_bytes())
            .map_err(|e| self.io_error(e))?;
        log::debug!("Logged senior: {age}, {gender}");
        Ok(())
    }
}
