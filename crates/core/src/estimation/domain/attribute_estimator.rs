use std::fmt;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Dominant-gender labels as they appear in existing senior logs
        match self {
            Gender::Male => write!(f, "Man"),
            Gender::Female => write!(f, "Woman"),
        }
    }
}

/// Apparent age and gender of the face in one crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeEstimate {
    pub age: u32,
    pub gender: Gender,
}

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("no discernible face in crop")]
    NoFace,
    #[error("attribute inference failed: {0}")]
    Inference(String),
}

/// Estimates age and gender from a face crop.
///
/// A failed estimate only skips that one detection; it never ends a run.
pub trait AttributeEstimator: Send {
    fn estimate(&mut self, face: &Frame) -> Result<AttributeEstimate, EstimationError>;
}
