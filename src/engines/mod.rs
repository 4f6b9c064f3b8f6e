//! OCR engine interface.
//!
//! Every engine is wrapped in an [`OcrEngine`] adapter with a single
//! `recognize` operation. Engines are registered lazily through
//! [`EngineRegistration`], so expensive setup (loading models, starting
//! workers) happens once per run, right before that engine is benchmarked, and
//! never inside a timed call.

use std::pin::Pin;

use clap::ValueEnum;

use crate::{config::BenchConfig, corpus::ImageRef, error::EngineError, prelude::*};

pub mod easyocr;
pub mod paddleocr;
pub mod tesseract;
pub mod worker;

/// A type alias for a boxed future.
pub type BoxedFuture<Output> = Pin<Box<dyn Future<Output = Output> + Send>>;

/// Interface to an initialized OCR engine.
#[async_trait]
pub trait OcrEngine: Send {
    /// Extract the text from a single image, trimmed of surrounding
    /// whitespace. Returns an empty string if no text was found.
    async fn recognize(&mut self, image: &ImageRef) -> Result<String, EngineError>;

    /// Get back into a usable state after a failed or abandoned call. This is
    /// never timed.
    async fn recover(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// The one-time setup function for an engine.
type InitFn =
    Box<dyn FnOnce() -> BoxedFuture<Result<Box<dyn OcrEngine>, EngineError>> + Send>;

/// An engine which has been registered for a benchmark run, but not yet set up.
pub struct EngineRegistration {
    /// The engine name, known before setup so we can report setup failures.
    name: String,

    /// Performs one-time setup.
    init: InitFn,
}

impl EngineRegistration {
    /// Register an engine with a setup function.
    pub fn new<F, Fut>(name: impl Into<String>, init: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Box<dyn OcrEngine>, EngineError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// The engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one-time setup.
    pub async fn init(self) -> Result<Box<dyn OcrEngine>, EngineError> {
        (self.init)().await
    }
}

/// The engines we know how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
    /// Tesseract, via its command-line tool.
    Tesseract,
    /// EasyOCR, via a persistent Python worker.
    Easyocr,
    /// PaddleOCR, via the `PaddleOCR-json` worker.
    Paddleocr,
}

impl EngineKind {
    /// Every engine, in default registration order.
    pub const ALL: &'static [EngineKind] =
        &[EngineKind::Tesseract, EngineKind::Easyocr, EngineKind::Paddleocr];

    /// The name used in reports.
    pub fn display_name(self) -> &'static str {
        match self {
            EngineKind::Tesseract => "Tesseract",
            EngineKind::Easyocr => "EasyOCR",
            EngineKind::Paddleocr => "PaddleOCR",
        }
    }

    /// A short description, for `ocr-bench engines`.
    pub fn description(self) -> &'static str {
        match self {
            EngineKind::Tesseract => "CPU-only LSTM engine, run once per image via the tesseract CLI",
            EngineKind::Easyocr => "deep-learning detection and recognition in a Python worker",
            EngineKind::Paddleocr => "multilingual, angle-aware recognition via PaddleOCR-json",
        }
    }

    /// The identifier used on the command line.
    pub fn id(self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_owned())
            .unwrap_or_else(|| format!("{self:?}").to_lowercase())
    }

    /// Register this engine. Nothing is started until the registration is
    /// initialized.
    pub fn registration(self, config: &BenchConfig) -> EngineRegistration {
        let language = config.language.clone();
        match self {
            EngineKind::Tesseract => {
                let config = config.tesseract.clone();
                EngineRegistration::new(self.display_name(), move || async move {
                    let engine = tesseract::TesseractEngine::new(&config, &language).await?;
                    Ok(Box::new(engine) as Box<dyn OcrEngine>)
                })
            }
            EngineKind::Easyocr => {
                let config = config.easyocr.clone();
                EngineRegistration::new(self.display_name(), move || async move {
                    let engine = easyocr::EasyOcrEngine::new(&config, &language).await?;
                    Ok(Box::new(engine) as Box<dyn OcrEngine>)
                })
            }
            EngineKind::Paddleocr => {
                let config = config.paddleocr.clone();
                EngineRegistration::new(self.display_name(), move || async move {
                    let engine = paddleocr::PaddleOcrEngine::new(&config, &language).await?;
                    Ok(Box::new(engine) as Box<dyn OcrEngine>)
                })
            }
        }
    }
}

/// Join text fragments from a detection-based engine with single spaces, in
/// the order the engine reported them, and trim the result.
pub fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for (idx, fragment) in fragments.into_iter().enumerate() {
        if idx > 0 {
            joined.push(' ');
        }
        joined.push_str(fragment.as_ref());
    }
    joined.trim().to_owned()
}
