//! facecheck-core — Two-image face verification engine.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime on the CPU. Faces are compared by cosine
//! distance against a model-specific threshold.

pub mod alignment;
pub mod config;
pub mod detector;
pub mod recognizer;
pub mod types;
pub mod verifier;

pub use config::VerifierConfig;
pub use types::{BoundingBox, Embedding};
pub use verifier::{
    FaceVerifier, ImageRole, OnnxVerifier, Outcome, Verification, VerificationRequest, VerifyError,
};
