use anyhow::{bail, Context, Result};
use facecheck_core::VerifierConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    model_dir: Option<PathBuf>,
    threshold: Option<f64>,
    detection_confidence: Option<f32>,
    intra_threads: Option<usize>,
    align: Option<bool>,
    enforce_detection: Option<bool>,
}

/// Values given on the command line; these win over everything else.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub threshold: Option<f64>,
}

/// Build the verifier configuration from the process environment.
///
/// Precedence: defaults < TOML file < `FACECHECK_*` variables < CLI flags.
pub fn load(overrides: &Overrides) -> Result<VerifierConfig> {
    resolve(overrides, |key| std::env::var(key).ok())
}

fn resolve(overrides: &Overrides, env: impl Fn(&str) -> Option<String>) -> Result<VerifierConfig> {
    let mut config = VerifierConfig::default();

    let config_path = overrides
        .config_path
        .clone()
        .or_else(|| env("FACECHECK_CONFIG").map(PathBuf::from));
    if let Some(path) = config_path {
        apply_file(&mut config, &read_file(&path)?);
    }

    if let Some(dir) = env("FACECHECK_HOME") {
        config.model_dir = PathBuf::from(dir);
    }
    if let Some(v) = env_parse(&env, "FACECHECK_THRESHOLD")? {
        config.threshold = v;
    }
    if let Some(v) = env_parse(&env, "FACECHECK_DETECTION_CONFIDENCE")? {
        config.detection_confidence = v;
    }
    if let Some(v) = env_parse(&env, "FACECHECK_INTRA_THREADS")? {
        config.intra_threads = v;
    }

    if let Some(dir) = &overrides.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(threshold) = overrides.threshold {
        config.threshold = threshold;
    }

    validate(&config)?;
    tracing::debug!(?config, "verifier configuration");
    Ok(config)
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn apply_file(config: &mut VerifierConfig, file: &FileConfig) {
    if let Some(dir) = &file.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(v) = file.threshold {
        config.threshold = v;
    }
    if let Some(v) = file.detection_confidence {
        config.detection_confidence = v;
    }
    if let Some(v) = file.intra_threads {
        config.intra_threads = v;
    }
    if let Some(v) = file.align {
        config.align = v;
    }
    if let Some(v) = file.enforce_detection {
        config.enforce_detection = v;
    }
}

fn env_parse<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match env(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(v) => Ok(Some(v)),
            Err(_) => bail!("{key} has an invalid value: {raw:?}"),
        },
    }
}

fn validate(config: &VerifierConfig) -> Result<()> {
    if !config.threshold.is_finite() || config.threshold < 0.0 {
        bail!("threshold must be a non-negative number, got {}", config.threshold);
    }
    if !(0.0..=1.0).contains(&config.detection_confidence) {
        bail!(
            "detection_confidence must be within [0, 1], got {}",
            config.detection_confidence
        );
    }
    if config.intra_threads == 0 {
        bail!("intra_threads must be at least 1");
    }
    Ok(())
}
