//! Tesseract OCR engine.

use tokio::process::Command;

use super::OcrEngine;
use crate::{
    config::TesseractConfig,
    corpus::ImageRef,
    error::EngineError,
    prelude::*,
    process::{check_for_command_failure, run_command},
};

/// OCR engine wrapping the `tesseract` CLI tool.
///
/// This has no state worth keeping between calls, so every image pays the
/// full cost of starting `tesseract` and loading its language data.
pub struct TesseractEngine {
    /// The `tesseract` binary.
    command: PathBuf,

    /// The Tesseract language code, like `eng`.
    language: String,
}

impl TesseractEngine {
    /// Create a new `tesseract` engine, checking that the binary runs and has
    /// data for every requested language.
    #[instrument(level = "debug", skip(config))]
    pub async fn new(config: &TesseractConfig, language: &str) -> Result<Self, EngineError> {
        let version = tesseract_output(&config.command, "--version")
            .await
            .map_err(EngineError::Init)?;
        let version = String::from_utf8_lossy(&version.stdout);
        debug!(version = %version.lines().next().unwrap_or_default(), "Found tesseract");

        let language = tesseract_language(language);
        let listing = tesseract_output(&config.command, "--list-langs")
            .await
            .map_err(EngineError::Init)?;
        // Older releases print the list to stderr.
        let available = format!(
            "{}\n{}",
            String::from_utf8_lossy(&listing.stdout),
            String::from_utf8_lossy(&listing.stderr)
        );
        check_languages_installed(&language, &available).map_err(EngineError::Init)?;

        Ok(Self {
            command: config.command.clone(),
            language,
        })
    }
}

/// Run `tesseract` with a single flag, failing on a non-zero exit.
async fn tesseract_output(command: &Path, flag: &str) -> Result<std::process::Output> {
    let output = run_command("tesseract", Command::new(command).arg(flag)).await?;
    check_for_command_failure("tesseract", &output)?;
    Ok(output)
}

/// Make sure every `+`-separated entry of `language` appears in the output of
/// `tesseract --list-langs`.
fn check_languages_installed(language: &str, list_langs_output: &str) -> Result<()> {
    let available = list_langs_output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .collect::<Vec<_>>();
    let missing = language
        .split('+')
        .filter(|lang| !available.contains(lang))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "tesseract has no language data for {} (installed: {})",
            missing.join(", "),
            available.join(", ")
        ))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(image = %image.name()))]
    async fn recognize(&mut self, image: &ImageRef) -> Result<String, EngineError> {
        let output = run_command(
            "tesseract",
            Command::new(&self.command)
                .arg(image.path())
                .arg("stdout")
                .args(["-l", self.language.as_str()]),
        )
        .await
        .map_err(EngineError::Execution)?;
        check_for_command_failure("tesseract", &output).map_err(EngineError::Execution)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

/// Map an ISO 639-1 code to Tesseract's language data name. Unknown codes are
/// passed through, so `eng+deu` and friends still work.
fn tesseract_language(iso: &str) -> String {
    let name = match iso {
        "en" => "eng",
        "de" => "deu",
        "fr" => "fra",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "ja" => "jpn",
        "ko" => "kor",
        "zh" => "chi_sim",
        other => other,
    };
    name.to_owned()
}
