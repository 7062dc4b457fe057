use std::path::PathBuf;

use thiserror::Error;

use crate::estimation::domain::attribute_estimator::Gender;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("failed to write senior log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only record of senior sightings, one entry per classified face.
pub trait SeniorEventLog: Send {
    fn record(&mut self, age: u32, gender: Gender) -> Result<(), EventLogError>;
}
