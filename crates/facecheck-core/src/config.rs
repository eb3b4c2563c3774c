use std::path::PathBuf;

/// Recognition model family echoed back to callers.
pub const MODEL_NAME: &str = "ArcFace";
/// Detector backend echoed back to callers.
pub const DETECTOR_BACKEND: &str = "scrfd";
/// Distance metric used for the verified/not-verified decision.
pub const DISTANCE_METRIC: &str = "cosine";

/// Cosine distance cutoff for ArcFace: at or below means same person.
pub const DEFAULT_THRESHOLD: f64 = 0.68;
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_INTRA_THREADS: usize = 2;

const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Configuration handed to the verifier at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    pub threshold: f64,
    /// Minimum SCRFD score for a detection to count as a face.
    pub detection_confidence: f32,
    /// ONNX Runtime intra-op thread count per session.
    pub intra_threads: usize,
    /// Warp faces to canonical landmark positions before embedding.
    pub align: bool,
    /// Fail instead of falling back to the whole image when no face is found.
    pub enforce_detection: bool,
}

impl VerifierConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            threshold: DEFAULT_THRESHOLD,
            detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            intra_threads: DEFAULT_INTRA_THREADS,
            align: true,
            enforce_detection: true,
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join(SCRFD_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL_FILE)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::new(default_model_dir())
    }
}

/// `$XDG_DATA_HOME/facecheck/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facecheck")
        .join("models")
}
