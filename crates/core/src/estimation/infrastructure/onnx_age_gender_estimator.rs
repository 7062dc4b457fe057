use std::path::Path;

use crate::detection::infrastructure::onnx_session::{input_size, load_session, SharedSession};
use crate::estimation::domain::attribute_estimator::{
    AttributeEstimate, AttributeEstimator, EstimationError, Gender,
};
use crate::shared::frame::Frame;

/// InsightFace `genderage` models take 96x96 input.
const DEFAULT_INPUT_SIZE: u32 = 96;

/// Crops smaller than this in either dimension cannot hold a usable face.
pub const MIN_FACE_SIZE: u32 = 8;

/// Age and gender estimator for InsightFace-style `genderage.onnx` models.
///
/// The crop is padded to a square (black borders, centred), resized to the
/// model's input size and fed as NCHW RGB floats in `[0, 255]`. The output
/// is `[female_score, male_score, age / 100]`.
pub struct OnnxAgeGenderEstimator {
    session: SharedSession,
    input_size: u32,
}

impl OnnxAgeGenderEstimator {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_shared_session(load_session(model_path)?)
    }

    pub fn from_shared_session(session: SharedSession) -> Result<Self, Box<dyn std::error::Error>> {
        let input_size = {
            let guard = session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            input_size(&guard).unwrap_or(DEFAULT_INPUT_SIZE)
        };
        Ok(Self {
            session,
            input_size,
        })
    }
}

impl AttributeEstimator for OnnxAgeGenderEstimator {
    fn estimate(&mut self, face: &Frame) -> Result<AttributeEstimate, EstimationError> {
        ensure_face_size(face)?;

        let tensor = preprocess(face, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(tensor)
            .map_err(|e| EstimationError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EstimationError::Inference(format!("Lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| EstimationError::Inference(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(EstimationError::Inference(
                "age/gender model produced no outputs".into(),
            ));
        }
        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| EstimationError::Inference(e.to_string()))?;
        let values = output
            .as_slice()
            .ok_or_else(|| EstimationError::Inference("Cannot get tensor slice".into()))?;

        decode(values)
    }
}

fn ensure_face_size(face: &Frame) -> Result<(), EstimationError> {
    if face.width() < MIN_FACE_SIZE || face.height() < MIN_FACE_SIZE {
        return Err(EstimationError::NoFace);
    }
    Ok(())
}

/// Pad to a centred square, resize, and lay out as `[1, 3, size, size]`.
fn preprocess(face: &Frame, size: u32) -> Result<ndarray::Array4<f32>, EstimationError> {
    let img = image::RgbImage::from_raw(face.width(), face.height(), face.data().to_vec())
        .ok_or_else(|| EstimationError::Inference("crop is not RGB".into()))?;

    let side = face.width().max(face.height());
    let mut square = image::RgbImage::new(side, side);
    image::imageops::overlay(
        &mut square,
        &img,
        ((side - face.width()) / 2) as i64,
        ((side - face.height()) / 2) as i64,
    );
    let resized = image::imageops::resize(&square, size, size, image::imageops::FilterType::Triangle);

    let n = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, n, n));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32;
        }
    }
    Ok(tensor)
}

fn decode(values: &[f32]) -> Result<AttributeEstimate, EstimationError> {
    let [female, male, age, ..] = values else {
        return Err(EstimationError::Inference(format!(
            "expected at least 3 outputs, got {}",
            values.len()
        )));
    };
    if !age.is_finite() || !female.is_finite() || !male.is_finite() {
        return Err(EstimationError::Inference("non-finite model output".into()));
    }
    let gender = if male > female {
        Gender::Male
    } else {
        Gender::Female
    };
    Ok(AttributeEstimate {
        age: (age * 100.0).round().max(0.0) as u32,
        gender,
    })
}
