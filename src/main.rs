use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod aggregate;
mod cmd;
mod config;
mod corpus;
mod engines;
mod error;
mod prelude;
mod process;
mod report;
mod runner;
mod ui;

/// Benchmark OCR engines against a directory of images.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - RUST_LOG (optional): Log filter, like `info` or `ocr_bench=debug`.

  Engines need their own runtimes: the `tesseract` binary, a Python
  interpreter with the `easyocr` package, and `PaddleOCR-json`. Engines
  that can't be started are skipped with a warning.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run every engine against every image, and write a CSV report.
    Run(cmd::run::RunOpts),
    /// List the available engines.
    Engines,
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Run(run_opts) => {
            cmd::run::cmd_run(ui, run_opts).await?;
        }
        Cmd::Engines => {
            cmd::engines::cmd_engines()?;
        }
    }
    Ok(())
}
