use crate::envelope::Envelope;
use facecheck_core::{FaceVerifier, Outcome, Verification, VerificationRequest};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub const USAGE_MESSAGE: &str =
    "Missing image paths. Usage: facecheck <reference_image> <candidate_image>";

/// Shown when no face could be found in one of the images.
pub const DETECTION_FAILED_MESSAGE: &str = "Wajah tidak terdeteksi dengan jelas di salah satu foto. \
     Pastikan pencahayaan cukup dan wajah menghadap kamera.";

/// How the invocation ended, which decides the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The verifier ran; the envelope may still report `success: false`.
    Completed,
    /// Arguments, files or configuration were rejected before verification.
    PreconditionFailed,
}

/// Envelope to print plus the resulting status.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub envelope: Envelope,
    pub status: Status,
}

impl Report {
    pub fn completed(envelope: Envelope) -> Self {
        Self { envelope, status: Status::Completed }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            envelope: Envelope::failure(error),
            status: Status::PreconditionFailed,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.status {
            Status::Completed => ExitCode::SUCCESS,
            Status::PreconditionFailed => ExitCode::from(1),
        }
    }
}

/// Validate the two positional paths. The reference image is checked first.
pub fn check_preconditions(
    reference: Option<&Path>,
    candidate: Option<&Path>,
) -> Result<VerificationRequest, Report> {
    let (Some(reference), Some(candidate)) = (reference, candidate) else {
        return Err(Report::rejected(USAGE_MESSAGE));
    };

    if !reference.exists() {
        return Err(Report::rejected(format!(
            "Master image not found at path: {}",
            reference.display()
        )));
    }
    if !candidate.exists() {
        return Err(Report::rejected(format!(
            "Submitted image not found at path: {}",
            candidate.display()
        )));
    }

    Ok(VerificationRequest::new(
        PathBuf::from(reference),
        PathBuf::from(candidate),
    ))
}

/// Run one verification and map its outcome to an envelope.
pub fn invoke(verifier: &mut impl FaceVerifier, request: &VerificationRequest) -> Report {
    let outcome = Outcome::from(verifier.verify(request));
    match &outcome {
        Outcome::DetectionFailed => tracing::info!("verification failed: no face detected"),
        Outcome::Failed(message) => tracing::warn!(error = %message, "verification failed"),
        _ => {}
    }
    Report::completed(envelope_for(outcome))
}

pub fn envelope_for(outcome: Outcome) -> Envelope {
    match outcome {
        Outcome::Verified(v) | Outcome::NotVerified(v) => verdict(v),
        Outcome::DetectionFailed => Envelope::failure(DETECTION_FAILED_MESSAGE),
        Outcome::Failed(message) => Envelope::failure(message),
    }
}

fn verdict(v: Verification) -> Envelope {
    Envelope::verdict(v.verified, v.distance, v.threshold, v.model, v.detector)
}
