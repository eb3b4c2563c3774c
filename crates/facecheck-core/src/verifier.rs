//! Two-image face verification.
//!
//! [`FaceVerifier`] is the seam the CLI talks to. [`OnnxVerifier`] is the
//! SCRFD + ArcFace implementation; models are loaded on first use so a
//! missing model surfaces as an ordinary verification failure.

use crate::config::{VerifierConfig, DETECTOR_BACKEND, DISTANCE_METRIC, MODEL_NAME};
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which side of the comparison an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Reference,
    Candidate,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Reference => f.write_str("reference"),
            ImageRole::Candidate => f.write_str("candidate"),
        }
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("failed to read {role} image {}: {source}", .path.display())]
    Image {
        role: ImageRole,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no face detected in {role} image")]
    NoFaceDetected { role: ImageRole },
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Two image paths to compare.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub reference: PathBuf,
    pub candidate: PathBuf,
}

impl VerificationRequest {
    pub fn new(reference: impl Into<PathBuf>, candidate: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }
}

/// Successful comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub verified: bool,
    pub distance: f64,
    pub threshold: f64,
    pub model: Option<String>,
    pub detector: Option<String>,
}

impl Verification {
    /// Decide against `threshold`: same person iff `distance <= threshold`.
    pub fn decide(distance: f64, threshold: f64) -> Self {
        Self {
            verified: distance <= threshold,
            distance,
            threshold,
            model: Some(MODEL_NAME.to_string()),
            detector: Some(DETECTOR_BACKEND.to_string()),
        }
    }
}

/// Classified result of one verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Verified(Verification),
    NotVerified(Verification),
    DetectionFailed,
    Failed(String),
}

impl From<Result<Verification, VerifyError>> for Outcome {
    fn from(result: Result<Verification, VerifyError>) -> Self {
        match result {
            Ok(v) if v.verified => Outcome::Verified(v),
            Ok(v) => Outcome::NotVerified(v),
            Err(VerifyError::NoFaceDetected { .. }) => Outcome::DetectionFailed,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

/// A face verification capability.
pub trait FaceVerifier {
    fn verify(&mut self, request: &VerificationRequest) -> Result<Verification, VerifyError>;
}

struct Models {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl Models {
    fn load(config: &VerifierConfig) -> Result<Self, VerifyError> {
        let detector = FaceDetector::load(
            &config.scrfd_model_path(),
            config.intra_threads,
            config.detection_confidence,
        )?;
        let recognizer = FaceRecognizer::load(&config.arcface_model_path(), config.intra_threads)?;
        Ok(Self { detector, recognizer })
    }
}

/// SCRFD detection + ArcFace embeddings + cosine distance.
pub struct OnnxVerifier {
    config: VerifierConfig,
    models: Option<Models>,
}

impl OnnxVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config, models: None }
    }

    fn models(&mut self) -> Result<&mut Models, VerifyError> {
        let models = match self.models.take() {
            Some(models) => models,
            None => Models::load(&self.config)?,
        };
        Ok(self.models.insert(models))
    }

    fn embed(&mut self, image: &RgbImage, role: ImageRole) -> Result<Embedding, VerifyError> {
        let align = self.config.align;
        let enforce = self.config.enforce_detection;
        let (width, height) = image.dimensions();
        let models = self.models()?;

        let faces = models.detector.detect(image.as_raw(), width, height)?;
        let face = select_face(faces, role, enforce, width, height)?;
        tracing::debug!(%role, confidence = face.confidence, "face selected");

        Ok(models.recognizer.extract(image.as_raw(), width, height, &face, align)?)
    }
}

impl FaceVerifier for OnnxVerifier {
    fn verify(&mut self, request: &VerificationRequest) -> Result<Verification, VerifyError> {
        let reference = load_rgb(&request.reference, ImageRole::Reference)?;
        let candidate = load_rgb(&request.candidate, ImageRole::Candidate)?;

        let a = self.embed(&reference, ImageRole::Reference)?;
        let b = self.embed(&candidate, ImageRole::Candidate)?;

        let result = Verification::decide(embedding_distance(&a, &b)?, self.config.threshold);
        tracing::info!(
            verified = result.verified,
            distance = result.distance,
            threshold = result.threshold,
            metric = DISTANCE_METRIC,
            "verification complete"
        );
        Ok(result)
    }
}

/// Pick the most confident face, or the whole image when detection is not enforced.
fn select_face(
    faces: Vec<BoundingBox>,
    role: ImageRole,
    enforce_detection: bool,
    width: u32,
    height: u32,
) -> Result<BoundingBox, VerifyError> {
    match faces.into_iter().next() {
        Some(face) => Ok(face),
        None if enforce_detection => Err(VerifyError::NoFaceDetected { role }),
        None => {
            tracing::warn!(%role, "no face detected; using the whole image");
            Ok(BoundingBox::whole_image(width, height))
        }
    }
}

/// Cosine distance between the two embeddings. NaN or infinity means the
/// recognizer output was unusable.
fn embedding_distance(a: &Embedding, b: &Embedding) -> Result<f64, VerifyError> {
    let distance = a.cosine_distance(b);
    if !distance.is_finite() {
        return Err(RecognizerError::InferenceFailed(format!(
            "embedding distance is not a finite number ({distance})"
        ))
        .into());
    }
    Ok(distance)
}

fn load_rgb(path: &Path, role: ImageRole) -> Result<RgbImage, VerifyError> {
    let image = image::open(path).map_err(|source| VerifyError::Image {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn face(confidence: f32) -> BoundingBox {
        BoundingBox {
            x: 10.0, y: 10.0, width: 50.0, height: 50.0, confidence, landmarks: None,
        }
    }

    #[test]
    fn test_decide_boundary_is_inclusive() {
        assert!(Verification::decide(0.68, 0.68).verified);
        assert!(!Verification::decide(0.6800001, 0.68).verified);
        assert!(Verification::decide(0.0, 0.68).verified);
    }

    #[test]
    fn test_decide_echoes_model_and_detector() {
        let v = Verification::decide(0.2, 0.68);
        assert_eq!(v.model.as_deref(), Some("ArcFace"));
        assert_eq!(v.detector.as_deref(), Some("scrfd"));
    }

    #[test]
    fn test_outcome_classification() {
        let ok = Outcome::from(Ok::<_, VerifyError>(Verification::decide(0.1, 0.68)));
        assert!(matches!(ok, Outcome::Verified(ref v) if v.distance == 0.1));

        let miss = Outcome::from(Ok::<_, VerifyError>(Verification::decide(0.9, 0.68)));
        assert!(matches!(miss, Outcome::NotVerified(_)));

        let no_face = Outcome::from(Err::<Verification, _>(VerifyError::NoFaceDetected {
            role: ImageRole::Candidate,
        }));
        assert_eq!(no_face, Outcome::DetectionFailed);

        let other = Outcome::from(Err::<Verification, _>(VerifyError::Detector(DetectorError::ModelNotFound(
            "/m/det_10g.onnx".into(),
        ))));
        assert_eq!(other, Outcome::Failed("detector model file not found: /m/det_10g.onnx".into()));
    }

    #[test]
    fn test_embedding_distance_between_real_vectors() {
        let a = Embedding { values: vec![1.0, 0.0] };
        let b = Embedding { values: vec![0.0, 1.0] };
        assert!((embedding_distance(&a, &b).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_embedding_is_an_inference_failure() {
        let a = Embedding { values: vec![f32::NAN, 0.5] };
        let b = Embedding { values: vec![0.5, 0.5] };
        let err = embedding_distance(&a, &b).unwrap_err();
        assert!(matches!(err, VerifyError::Recognizer(RecognizerError::InferenceFailed(_))));
        assert_eq!(
            Outcome::from(Err::<Verification, _>(err)),
            Outcome::Failed("embedding extraction failed: embedding distance is not a finite number (NaN)".into())
        );
    }

    #[test]
    fn test_select_face_takes_first() {
        let picked = select_face(vec![face(0.9), face(0.6)], ImageRole::Reference, true, 100, 100)
            .expect("face present");
        assert!((picked.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_select_face_enforced_fails() {
        let err = select_face(vec![], ImageRole::Reference, true, 100, 100).unwrap_err();
        assert!(matches!(err, VerifyError::NoFaceDetected { role: ImageRole::Reference }));
        assert_eq!(err.to_string(), "no face detected in reference image");
    }

    #[test]
    fn test_select_face_not_enforced_uses_whole_image() {
        let picked = select_face(vec![], ImageRole::Candidate, false, 320, 240).expect("fallback");
        assert_eq!((picked.width, picked.height), (320.0, 240.0));
    }

    #[test]
    fn test_verify_undecodable_image_fails_before_model_load() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("not-an-image.jpg");
        std::fs::write(&bogus, b"plain text").unwrap();

        let mut verifier = OnnxVerifier::new(VerifierConfig::new(dir.path().join("no-models")));
        let err = verifier.verify(&VerificationRequest::new(&bogus, &bogus)).unwrap_err();
        assert!(matches!(err, VerifyError::Image { role: ImageRole::Reference, .. }));
    }

    #[test]
    fn test_verify_missing_models_is_reported() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("face.png");
        RgbImage::from_pixel(32, 32, image::Rgb([120u8, 90, 60])).save(&png).unwrap();

        let mut verifier = OnnxVerifier::new(VerifierConfig::new(dir.path().join("no-models")));
        let err = verifier.verify(&VerificationRequest::new(&png, &png)).unwrap_err();
        assert!(matches!(err, VerifyError::Detector(DetectorError::ModelNotFound(_))));
    }
}
