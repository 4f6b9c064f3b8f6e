//! EasyOCR engine, driven through a persistent Python worker.

use super::{
    OcrEngine,
    worker::{OcrWorker, WorkerCommand},
};
use crate::{
    config::EasyOcrConfig, corpus::ImageRef, error::EngineError, prelude::*,
};

/// Our worker script. It loads `easyocr.Reader` once and then speaks the
/// protocol described in [`super::worker`].
const WORKER_SCRIPT: &str = include_str!("easyocr/worker.py");

/// Deep-learning detection and recognition engine wrapping EasyOCR.
///
/// Model loading happens in [`EasyOcrEngine::new`], not in `recognize`.
pub struct EasyOcrEngine {
    worker: OcrWorker,
}

impl EasyOcrEngine {
    /// Start the EasyOCR worker and wait for its models to load.
    #[instrument(level = "debug", skip(config))]
    pub async fn new(config: &EasyOcrConfig, language: &str) -> Result<Self, EngineError> {
        let worker = OcrWorker::start("EasyOCR", worker_command(config, language)).await?;
        Ok(Self { worker })
    }
}

#[async_trait]
impl OcrEngine for EasyOcrEngine {
    #[instrument(level = "debug", skip_all, fields(image = %image.name()))]
    async fn recognize(&mut self, image: &ImageRef) -> Result<String, EngineError> {
        self.worker.recognize(image.path()).await
    }

    async fn recover(&mut self) -> Result<(), EngineError> {
        self.worker.recover().await
    }
}

/// Build the command line for our worker.
fn worker_command(config: &EasyOcrConfig, language: &str) -> WorkerCommand {
    let mut args = vec![
        "-u".to_owned(),
        "-c".to_owned(),
        WORKER_SCRIPT.to_owned(),
        "--lang".to_owned(),
        easyocr_language(language).to_owned(),
    ];
    if config.gpu {
        args.push("--gpu".to_owned());
    }
    WorkerCommand {
        program: config.python.clone(),
        args,
    }
}

/// Map an ISO 639-1 code to EasyOCR's language name. Most are the same.
fn easyocr_language(iso: &str) -> &str {
    match iso {
        "zh" => "ch_sim",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_command_passes_language_and_gpu() {
        let config = EasyOcrConfig {
            python: PathBuf::from("/opt/venv/bin/python"),
            gpu: true,
        };
        let command = worker_command(&config, "zh");
        assert_eq!(command.program, PathBuf::from("/opt/venv/bin/python"));
        assert_eq!(command.args[..2], ["-u", "-c"]);
        assert_eq!(command.args[3..], ["--lang", "ch_sim", "--gpu"]);

        let command = worker_command(&EasyOcrConfig::default(), "en");
        assert_eq!(command.args[3..], ["--lang", "en"]);
    }

    #[test]
    fn worker_script_announces_readiness() {
        assert!(WORKER_SCRIPT.contains(super::super::worker::READY_MARKER));
    }

    #[tokio::test]
    async fn missing_interpreter_is_init_error() {
        let config = EasyOcrConfig {
            python: PathBuf::from("/nonexistent/python3"),
            gpu: false,
        };
        let err = EasyOcrEngine::new(&config, "en").await.err().unwrap();
        assert!(matches!(err, EngineError::Init(_)));
    }
}
