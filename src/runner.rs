//! Run every engine against every image and time each call.
//!
//! Everything here is strictly sequential: engines run one after another in
//! registration order, and each engine sees the images in corpus order. Each
//! `recognize` call is awaited before the next one starts, so latencies are
//! never distorted by other work we're doing.

use std::time::Duration;

use tokio::time::{self, Instant};

use crate::{
    corpus::{ImageCorpus, ImageRef},
    engines::{EngineRegistration, OcrEngine},
    error::EngineError,
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Written in place of recognized text when recognition fails.
pub const FAILED_TEXT: &str = "**OCR_FAILED**";

/// What happened when we ran one engine on one image.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The engine returned this text (possibly empty).
    Recognized(String),

    /// The engine failed, with this error message.
    Failed(String),
}

/// One measured (image, engine) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRecord {
    /// The image's display name.
    pub image_name: String,

    /// The engine's name.
    pub engine_name: String,

    /// Wall-clock time for the call, rounded to 0.01 ms, the resolution of
    /// the written report.
    pub elapsed_ms: f64,

    /// The recognized text, or why there isn't any.
    pub outcome: Outcome,
}

impl ResultRecord {
    /// The text to report. Failures are reported as [`FAILED_TEXT`].
    pub fn text(&self) -> &str {
        match &self.outcome {
            Outcome::Recognized(text) => text,
            Outcome::Failed(_) => FAILED_TEXT,
        }
    }

    /// Did recognition fail?
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// An engine that could not be set up, and was left out of the run.
#[derive(Clone, Debug)]
pub struct SkippedEngine {
    pub name: String,
    pub reason: String,
}

/// Everything a benchmark run produced.
#[derive(Clone, Debug, Default)]
pub struct BenchmarkReport {
    /// Engines that were set up successfully, in registration order.
    pub engines: Vec<String>,

    /// Engines that failed setup.
    pub skipped: Vec<SkippedEngine>,

    /// One record per (engine, image), engines outermost.
    pub records: Vec<ResultRecord>,
}

impl BenchmarkReport {
    /// How many records failed?
    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failed()).count()
    }
}

/// Options for [`run_benchmark`].
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Give up on a single call after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Benchmark each registered engine against every image in `corpus`.
///
/// Engine setup failures and per-image failures are logged and recorded, but
/// never abort the run.
#[instrument(level = "debug", skip_all, fields(images = corpus.len()))]
pub async fn run_benchmark(
    ui: &Ui,
    corpus: &ImageCorpus,
    registrations: Vec<EngineRegistration>,
    opts: &RunOptions,
) -> BenchmarkReport {
    let mut report = BenchmarkReport::default();
    for registration in registrations {
        let name = registration.name().to_owned();

        // One-time setup, outside any timed region.
        let setup_started = Instant::now();
        let mut engine = match registration.init().await {
            Ok(engine) => engine,
            Err(err) => {
                warn!(engine = %name, "Skipping engine: {err}");
                report.skipped.push(SkippedEngine {
                    name,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        info!(engine = %name, setup = ?setup_started.elapsed(), "Engine ready");
        report.engines.push(name.clone());

        let msg = format!("Running {name}");
        let done_msg = format!("Ran {name}");
        let pb = ui.new_progress_bar(
            &ProgressConfig {
                emoji: "🔍",
                msg: &msg,
                done_msg: &done_msg,
            },
            corpus.len() as u64,
        );
        for image in corpus.images() {
            let record = benchmark_one(engine.as_mut(), &name, image, opts.timeout).await;
            if let Outcome::Failed(message) = &record.outcome {
                warn!(engine = %name, image = %image.name(), "{message}");
                if let Err(err) = engine.recover().await {
                    warn!(engine = %name, "Could not recover engine: {err}");
                }
            }
            report.records.push(record);
            pb.inc(1);
        }
        drop(pb);

        // Dropping the engine shuts down any worker processes before the next
        // engine loads its models.
        drop(engine);
    }
    report
}

/// Time a single `recognize` call.
async fn benchmark_one(
    engine: &mut dyn OcrEngine,
    engine_name: &str,
    image: &ImageRef,
    timeout: Option<Duration>,
) -> ResultRecord {
    let start = Instant::now();
    let result = match timeout {
        Some(limit) => time::timeout(limit, engine.recognize(image))
            .await
            .unwrap_or(Err(EngineError::Timeout(limit))),
        None => engine.recognize(image).await,
    };
    let elapsed = start.elapsed();

    ResultRecord {
        image_name: image.name().to_owned(),
        engine_name: engine_name.to_owned(),
        elapsed_ms: round_to_report_resolution(elapsed),
        outcome: match result {
            Ok(text) => Outcome::Recognized(text),
            Err(err) => Outcome::Failed(err.to_string()),
        },
    }
}

/// Convert a duration to milliseconds, rounded to 0.01 ms.
///
/// Rounding here, rather than only when formatting, keeps the printed averages
/// equal to the mean of the `time_ms` column in the report.
pub fn round_to_report_resolution(elapsed: Duration) -> f64 {
    // 10 µs steps.
    let steps = (elapsed.as_nanos() as f64 / 10_000.0).round();
    steps / 100.0
}
