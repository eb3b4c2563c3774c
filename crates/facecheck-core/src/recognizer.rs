//! ArcFace face recognizer via ONNX Runtime.
//!
//! Produces L2-normalized 512-dimensional embeddings from 112×112 face
//! crops, using the w600k_r50 ArcFace model.

use crate::alignment::{self, ALIGNED_SIZE, CHANNELS};
use crate::types::{BoundingBox, Embedding};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric, unlike SCRFD
const ARCFACE_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognition model file not found: {0}")]
    ModelNotFound(String),
    #[error("embedding extraction failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding for `face` in a packed RGB8 image.
    ///
    /// With `align` set and landmarks available the face is warped to the
    /// canonical landmark positions; otherwise its box is cropped and resized.
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
        align: bool,
    ) -> Result<Embedding, RecognizerError> {
        let crop = face_crop(rgb, width, height, face, align);
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(e.to_string()))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding { values: l2_normalize(raw) })
    }
}

fn face_crop(rgb: &[u8], width: u32, height: u32, face: &BoundingBox, align: bool) -> Vec<u8> {
    match (&face.landmarks, align) {
        (Some(landmarks), true) => alignment::align_face(rgb, width, height, landmarks),
        _ => alignment::crop_and_resize(rgb, width, height, face),
    }
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// 112×112 RGB crop to NCHW float tensor. Missing pixels read as black.
fn preprocess(crop: &[u8]) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, ALIGNED_SIZE, ALIGNED_SIZE));

    for y in 0..ALIGNED_SIZE {
        for x in 0..ALIGNED_SIZE {
            let offset = (y * ALIGNED_SIZE + x) * CHANNELS;
            for c in 0..CHANNELS {
                let pixel = crop.get(offset + c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }
    }

    tensor
}
