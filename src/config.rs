//! Benchmark configuration.
//!
//! Configuration can be supplied as TOML or JSON. Every field has a default,
//! so an empty file (or no file at all) is a valid configuration.

use std::time::Duration;

use tokio::fs;

use crate::prelude::*;

/// Configuration shared by all engines in a benchmark run.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// The recognition language, as an ISO 639-1 code like `en`.
    pub language: String,

    /// Per-call timeout, in seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,

    /// Tesseract settings.
    pub tesseract: TesseractConfig,

    /// EasyOCR settings.
    pub easyocr: EasyOcrConfig,

    /// PaddleOCR settings.
    pub paddleocr: PaddleOcrConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            timeout_secs: None,
            tesseract: TesseractConfig::default(),
            easyocr: EasyOcrConfig::default(),
            paddleocr: PaddleOcrConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load a configuration file. JSON is detected from a `.json` extension or
    /// a leading `{`. Anything else is parsed as TOML.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at path: {:?}", path))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json")
            || data.trim_start().starts_with('{');
        let config: Self = if is_json {
            serde_json::from_str(&data).with_context(|| {
                format!("Failed to parse JSON from file at path: {:?}", path)
            })?
        } else {
            toml::from_str(&data).with_context(|| {
                format!("Failed to parse TOML from file at path: {:?}", path)
            })?
        };
        config
            .validate()
            .with_context(|| format!("Invalid config file at path: {:?}", path))?;
        Ok(config)
    }

    /// Reject settings that parse but can't work.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(anyhow!("timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// The per-call timeout, if any. Engine setup is never timed out.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Settings for the Tesseract CLI wrapper.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TesseractConfig {
    /// The `tesseract` binary to run.
    pub command: PathBuf,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("tesseract"),
        }
    }
}

/// Settings for the EasyOCR worker.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EasyOcrConfig {
    /// A Python interpreter with the `easyocr` package installed.
    pub python: PathBuf,

    /// Run the models on the GPU.
    pub gpu: bool,
}

impl Default for EasyOcrConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            gpu: false,
        }
    }
}

/// Settings for the `PaddleOCR-json` worker.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PaddleOcrConfig {
    /// The `PaddleOCR-json` executable.
    pub command: PathBuf,

    /// Classify text orientation before recognition.
    pub use_angle_cls: bool,

    /// Directory containing PaddleOCR models.
    pub models_path: Option<PathBuf>,

    /// Explicit PaddleOCR config file. Overrides the one chosen from
    /// `language`.
    pub config_path: Option<PathBuf>,
}

impl Default for PaddleOcrConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("PaddleOCR-json"),
            use_angle_cls: true,
            models_path: None,
            config_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = toml::from_str::<BenchConfig>("").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.language, "en");
        assert!(config.paddleocr.use_angle_cls);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<BenchConfig>("langauge = \"de\"").is_err());
        assert!(toml::from_str::<BenchConfig>("[tesseract]\nbinary = \"x\"").is_err());
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "timeout_secs = 0\n")?;
        let err = BenchConfig::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("timeout_secs must be at least 1"), "{err:#}");
        Ok(())
    }

    #[tokio::test]
    async fn load_reads_toml_and_json() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let toml_path = dir.path().join("bench.toml");
        let mut file = std::fs::File::create(&toml_path)?;
        writeln!(
            file,
            "language = \"de\"\ntimeout_secs = 5\n\n[paddleocr]\nuse_angle_cls = false"
        )?;
        let config = BenchConfig::load(&toml_path).await?;
        assert_eq!(config.language, "de");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert!(!config.paddleocr.use_angle_cls);
        assert_eq!(config.tesseract, TesseractConfig::default());

        let json_path = dir.path().join("bench.cfg");
        std::fs::write(&json_path, r#"{"easyocr": {"gpu": true}}"#)?;
        let config = BenchConfig::load(&json_path).await?;
        assert!(config.easyocr.gpu);
        assert_eq!(config.language, "en");
        Ok(())
    }
}
