//! CLI test cases.
//!
//! Real OCR engines are heavyweight and rarely installed on CI runners, so
//! most of these tests point the engines at missing binaries (which makes
//! them fail setup and get skipped) or at small shell scripts that fake them.

use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// The multi-engine report header.
static MULTI_HEADER: &str = "image_name,ocr_engine,time_ms,recognized_text\n";

/// A config which makes every engine fail setup.
static MISSING_ENGINES_CONFIG: &str = r#"
[tesseract]
command = "/nonexistent/tesseract"

[easyocr]
python = "/nonexistent/python3"

[paddleocr]
command = "/nonexistent/PaddleOCR-json"
"#;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("ocr-bench").unwrap()
}

/// Write a config file into `dir` and return its path as a string.
fn write_config(dir: &Path, contents: &str) -> String {
    let path = dir.join("bench.toml");
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_engines_lists_all_engines() {
    cmd()
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("tesseract"))
        .stdout(predicate::str::contains("easyocr"))
        .stdout(predicate::str::contains("paddleocr"))
        .stdout(predicate::str::contains("PaddleOCR"));
}

#[test]
fn test_missing_images_dir_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out.csv");
    cmd()
        .arg("run")
        .arg(tmp.path().join("no-such-dir"))
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("image directory"));
    assert!(!out.exists());
}

#[test]
fn test_empty_corpus_writes_header_only_report() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    fs::create_dir(&images).unwrap();
    let config = write_config(tmp.path(), MISSING_ENGINES_CONFIG);
    let out = tmp.path().join("out.csv");

    cmd()
        .arg("run")
        .arg(&images)
        .args(["-c", &config, "-e", "tesseract", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&out).unwrap(), MULTI_HEADER);
}

#[test]
fn test_unavailable_engines_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    fs::create_dir(&images).unwrap();
    fs::write(images.join("a.png"), b"not really a png").unwrap();
    let config = write_config(tmp.path(), MISSING_ENGINES_CONFIG);
    let out = tmp.path().join("out.csv");

    cmd()
        .arg("run")
        .arg(&images)
        .args(["-c", &config, "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Skipped Tesseract"))
        .stderr(predicate::str::contains("Skipped EasyOCR"))
        .stderr(predicate::str::contains("Skipped PaddleOCR"));
    assert_eq!(fs::read_to_string(&out).unwrap(), MULTI_HEADER);
}

#[test]
fn test_single_layout_requires_one_engine() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .arg("run")
        .arg(tmp.path())
        .args(["--layout", "single", "-e", "tesseract", "-e", "easyocr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exactly one --engine"));
}

#[test]
fn test_unknown_engine_is_usage_error() {
    cmd()
        .args(["run", ".", "-e", "cuneiform"])
        .assert()
        .failure();
}

#[test]
fn test_bad_config_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), "langauge = \"en\"\n");
    cmd()
        .arg("run")
        .arg(tmp.path())
        .args(["-c", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

/// Run the whole pipeline against a shell script pretending to be tesseract.
#[cfg(unix)]
#[test]
fn test_fake_tesseract_end_to_end() {
    use std::os::unix::fs::PermissionsExt as _;

    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    fs::create_dir(&images).unwrap();
    for name in ["b.jpg", "a.png", "notes.txt"] {
        fs::write(images.join(name), b"fake image").unwrap();
    }

    let fake = tmp.path().join("fake-tesseract");
    fs::write(
        &fake,
        "#!/bin/sh\n\
         case \"$1\" in\n\
           --version) echo 'tesseract 5.3.0'; exit 0 ;;\n\
           --list-langs) echo eng; exit 0 ;;\n\
           *b.jpg) echo 'Error in pixReadStream: Unknown format' >&2; exit 1 ;;\n\
         esac\n\
         printf 'LAP 1, \"fast\"\\n'\n",
    )
    .unwrap();
    fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

    let config = write_config(
        tmp.path(),
        &format!("[tesseract]\ncommand = {:?}\n", fake.display().to_string()),
    );
    let out = tmp.path().join("single.csv");
    let summary = tmp.path().join("summary.json");

    cmd()
        .arg("run")
        .arg(&images)
        .args(["-c", &config, "-e", "tesseract", "--layout", "single", "-o"])
        .arg(&out)
        .arg("--summary")
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Average time (Tesseract): "))
        .stdout(predicate::str::ends_with(" ms\n"));

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    assert_eq!(
        rdr.headers().unwrap(),
        vec!["image_name", "time_ms", "recognized_text"]
    );
    let rows = rdr
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_owned(), r[2].to_owned())
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        [
            ("a.png".to_owned(), "LAP 1, \"fast\"".to_owned()),
            ("b.jpg".to_owned(), "**OCR_FAILED**".to_owned()),
        ]
    );

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(summary[0]["engine_name"], "Tesseract");
    assert_eq!(summary[0]["count"], 2);
    assert_eq!(summary[0]["failures"], 1);
}

#[test]
#[ignore = "Needs tesseract and a screenshots/ corpus"]
fn test_real_tesseract() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .args(["run", "screenshots", "-e", "tesseract", "-o"])
        .arg(tmp.path().join("out.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Average time (Tesseract)"));
}
