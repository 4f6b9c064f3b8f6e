//! PaddleOCR engine, driven through `PaddleOCR-json`.

use super::{
    OcrEngine,
    worker::{OcrWorker, WorkerCommand},
};
use crate::{
    config::PaddleOcrConfig, corpus::ImageRef, error::EngineError, prelude::*,
};

/// Multilingual, angle-aware engine wrapping the `PaddleOCR-json` executable.
///
/// With `use_angle_cls` set, each text region is classified for orientation
/// before it is recognized.
pub struct PaddleOcrEngine {
    worker: OcrWorker,
}

impl PaddleOcrEngine {
    /// Start `PaddleOCR-json` and wait for its models to load.
    #[instrument(level = "debug", skip(config))]
    pub async fn new(
        config: &PaddleOcrConfig,
        language: &str,
    ) -> Result<Self, EngineError> {
        let worker =
            OcrWorker::start("PaddleOCR", worker_command(config, language)).await?;
        Ok(Self { worker })
    }
}

#[async_trait]
impl OcrEngine for PaddleOcrEngine {
    #[instrument(level = "debug", skip_all, fields(image = %image.name()))]
    async fn recognize(&mut self, image: &ImageRef) -> Result<String, EngineError> {
        self.worker.recognize(image.path()).await
    }

    async fn recover(&mut self) -> Result<(), EngineError> {
        self.worker.recover().await
    }
}

/// Build the command line for `PaddleOCR-json`.
fn worker_command(config: &PaddleOcrConfig, language: &str) -> WorkerCommand {
    let mut args = vec![
        format!("--use_angle_cls={}", config.use_angle_cls),
        format!("--cls={}", config.use_angle_cls),
    ];
    if let Some(models_path) = &config.models_path {
        args.push(format!("--models_path={}", models_path.display()));
    }
    let config_path = match &config.config_path {
        Some(path) => Some(path.display().to_string()),
        None => {
            let models_path = config.models_path.as_deref().unwrap_or(Path::new("models"));
            match paddle_config_file(language) {
                Some(file) => Some(models_path.join(file).display().to_string()),
                None => {
                    warn!(
                        language,
                        "No PaddleOCR config for this language, using the engine default"
                    );
                    None
                }
            }
        }
    };
    if let Some(config_path) = config_path {
        args.push(format!("--config_path={config_path}"));
    }
    WorkerCommand {
        program: config.command.clone(),
        args,
    }
}

/// The `PaddleOCR-json` config file for an ISO 639-1 code, if it ships one.
fn paddle_config_file(iso: &str) -> Option<&'static str> {
    match iso {
        "en" => Some("config_en.txt"),
        "zh" => Some("config_chinese.txt"),
        "ja" => Some("config_japan.txt"),
        "ko" => Some("config_korean.txt"),
        "ru" => Some("config_cyrillic.txt"),
        _ => None,
    }
}
