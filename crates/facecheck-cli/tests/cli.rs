use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated command: empty model directory and no ambient FACECHECK_* settings.
fn cmd(models: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("facecheck");
    cmd.env("FACECHECK_HOME", models)
        .env_remove("FACECHECK_CONFIG")
        .env_remove("FACECHECK_THRESHOLD")
        .env_remove("FACECHECK_DETECTION_CONFIDENCE")
        .env_remove("FACECHECK_INTRA_THREADS")
        .env_remove("FACECHECK_LOG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::GrayImage::from_pixel(48, 48, image::Luma([140u8]))
        .save(&path)
        .unwrap();
    path
}

/// Stdout must be exactly one line of JSON.
fn single_json_line(stdout: &[u8]) -> Value {
    let text = String::from_utf8(stdout.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 1, "stdout: {text:?}");
    serde_json::from_str(text.trim_end()).unwrap()
}

#[test]
fn no_arguments() {
    let tmp = TempDir::new().unwrap();
    let out = cmd(tmp.path())
        .assert()
        .code(1)
        .stdout(contains("\"success\": false"))
        .stdout(contains("Missing image paths"))
        .get_output()
        .stdout
        .clone();
    assert_eq!(single_json_line(&out)["success"], false);
}

#[test]
fn one_argument() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "a.png");
    cmd(tmp.path())
        .arg(&img)
        .assert()
        .code(1)
        .stdout(contains("Missing image paths"));
}

#[test]
fn missing_reference() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "b.png");
    let missing = tmp.path().join("nope.jpg");
    cmd(tmp.path())
        .arg(&missing)
        .arg(&img)
        .assert()
        .code(1)
        .stdout(contains("\"success\": false"))
        .stdout(contains("Master image not found at path"));
}

#[test]
fn missing_candidate() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "a.png");
    let missing = tmp.path().join("nope.jpg");
    cmd(tmp.path())
        .arg(&img)
        .arg(&missing)
        .assert()
        .code(1)
        .stdout(contains("Submitted image not found at path"));
}

#[test]
fn undecodable_image_reports_failure_with_exit_zero() {
    let tmp = TempDir::new().unwrap();
    let text = tmp.path().join("notes.jpg");
    std::fs::write(&text, "not an image").unwrap();

    let out = cmd(tmp.path())
        .arg(&text)
        .arg(&text)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = single_json_line(&out);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("reference image"));
}

#[test]
fn missing_models_reported_with_exit_zero() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");
    let models = tmp.path().join("models");

    cmd(&models)
        .arg(&img)
        .arg(&img)
        .assert()
        .success()
        .stdout(contains("\"success\": false"))
        .stdout(contains("det_10g.onnx"));
}

#[test]
fn arguments_after_the_second_path_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");

    let out = cmd(&tmp.path().join("models"))
        .arg(&img)
        .arg(&img)
        .arg("extra")
        .arg("--threshold")
        .assert()
        .success()
        .stdout(contains("det_10g.onnx"))
        .get_output()
        .stdout
        .clone();
    assert_eq!(single_json_line(&out)["success"], false);
}

#[test]
fn path_starting_with_a_dash_is_an_image() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "-face.png");

    cmd(&tmp.path().join("models"))
        .current_dir(tmp.path())
        .args(["-face.png", "-face.png"])
        .assert()
        .success()
        .stdout(contains("det_10g.onnx"))
        .stdout(contains("not found at path").not());
}

#[test]
fn model_dir_flag_beats_environment() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");
    let flagged = tmp.path().join("flag-models");

    cmd(&tmp.path().join("env-models"))
        .arg("--model-dir")
        .arg(&flagged)
        .arg(&img)
        .arg(&img)
        .assert()
        .success()
        .stdout(contains("flag-models"))
        .stdout(contains("env-models").not());
}

#[test]
fn invalid_config_file_is_a_precondition_failure() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");
    let config = tmp.path().join("facecheck.toml");
    std::fs::write(&config, "threshold = \"high\"\n").unwrap();

    cmd(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg(&img)
        .arg(&img)
        .assert()
        .code(1)
        .stdout(contains("invalid config file"));
}

#[test]
fn negative_threshold_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");
    cmd(tmp.path())
        .arg("--threshold=-1")
        .arg(&img)
        .arg(&img)
        .assert()
        .code(1)
        .stdout(contains("threshold must be a non-negative number"));
}

#[test]
fn unparsable_flag_value_yields_envelope() {
    let tmp = TempDir::new().unwrap();
    let out = cmd(tmp.path())
        .args(["--threshold", "abc", "a.jpg", "b.jpg"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    assert_eq!(single_json_line(&out)["success"], false);
}

#[test]
fn logs_stay_off_stdout() {
    let tmp = TempDir::new().unwrap();
    let img = write_png(tmp.path(), "face.png");
    let out = cmd(tmp.path())
        .env("FACECHECK_LOG", "debug")
        .arg(&img)
        .arg(&img)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    single_json_line(&out);
}

#[test]
fn help_is_plain_text() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Usage"));
}
