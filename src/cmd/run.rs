//! The `run` subcommand.

use std::io;

use clap::Args;

use crate::{
    aggregate::aggregate,
    config::BenchConfig,
    corpus::ImageCorpus,
    engines::EngineKind,
    prelude::*,
    report::{ReportLayout, print_averages, write_report, write_summary},
    runner::{RunOptions, run_benchmark},
    ui::Ui,
};

/// `run` command line arguments.
#[derive(Debug, Args)]
pub struct RunOpts {
    /// Directory containing the images to benchmark (PNG or JPEG).
    #[clap(value_name = "IMAGES_DIR")]
    pub images_dir: PathBuf,

    /// Engine to benchmark. May be repeated; engines run in the order given.
    /// Defaults to every engine.
    #[clap(short = 'e', long = "engine", value_enum, value_name = "ENGINE")]
    pub engines: Vec<EngineKind>,

    /// Where to write the CSV report.
    #[clap(short = 'o', long = "out", default_value = "ocr_results.csv")]
    pub output_path: PathBuf,

    /// Report columns. `single` omits the engine column, and requires exactly
    /// one `--engine`.
    #[clap(long, value_enum, default_value = "multi")]
    pub layout: ReportLayout,

    /// Configuration file (TOML or JSON).
    #[clap(short = 'c', long = "config", value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Recognition language, as an ISO 639-1 code. Overrides the config file.
    #[clap(short = 'l', long)]
    pub language: Option<String>,

    /// Give up on a single image after this many seconds. Overrides the
    /// config file. By default, we wait forever. This only limits
    /// recognition calls; engine setup (loading models) is never cut short.
    #[clap(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Also write per-engine statistics to this path, as JSON.
    #[clap(long = "summary", value_name = "PATH")]
    pub summary_path: Option<PathBuf>,
}

impl RunOpts {
    /// The engines to run, in order, without duplicates.
    fn selected_engines(&self) -> Vec<EngineKind> {
        if self.engines.is_empty() {
            return EngineKind::ALL.to_vec();
        }
        let mut selected = Vec::with_capacity(self.engines.len());
        for &kind in &self.engines {
            if selected.contains(&kind) {
                warn!(engine = %kind.id(), "Ignoring duplicate --engine");
            } else {
                selected.push(kind);
            }
        }
        selected
    }

    /// Load our config file, if any, and apply command-line overrides.
    async fn config(&self) -> Result<BenchConfig> {
        let mut config = match &self.config_path {
            Some(path) => BenchConfig::load(path).await?,
            None => BenchConfig::default(),
        };
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = Some(timeout_secs);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the `run` subcommand.
#[instrument(level = "debug", skip_all, fields(images_dir = %opts.images_dir.display()))]
pub async fn cmd_run(ui: Ui, opts: &RunOpts) -> Result<()> {
    let engines = opts.selected_engines();
    if opts.layout == ReportLayout::Single && engines.len() != 1 {
        return Err(anyhow!(
            "--layout single requires exactly one --engine (got {})",
            engines.len()
        ));
    }
    let config = opts.config().await?;
    debug!(?config, "Loaded configuration");

    let corpus = ImageCorpus::load(&opts.images_dir).await?;
    info!(images = corpus.len(), "Loaded image corpus");
    if corpus.is_empty() {
        warn!(dir = %opts.images_dir.display(), "No images found");
    }

    let registrations = engines
        .iter()
        .map(|kind| kind.registration(&config))
        .collect::<Vec<_>>();
    let run_opts = RunOptions {
        timeout: config.timeout(),
    };
    let report = run_benchmark(&ui, &corpus, registrations, &run_opts).await;

    write_report(&opts.output_path, opts.layout, &report.records)?;
    let aggregates = aggregate(&report);
    for agg in &aggregates {
        info!(
            engine = %agg.engine_name,
            count = agg.count,
            failures = agg.failures,
            mean_ms = agg.mean_ms,
            min_ms = agg.min_ms,
            max_ms = agg.max_ms,
            "Engine timings"
        );
    }
    if let Some(summary_path) = &opts.summary_path {
        write_summary(summary_path, &aggregates).await?;
    }

    ui.multi_progress()
        .suspend(|| print_averages(&mut io::stdout().lock(), &aggregates))
        .context("failed to write averages to stdout")?;

    for skipped in &report.skipped {
        ui.display_message(
            "⚠️",
            &format!("Skipped {}: {}", skipped.name, skipped.reason),
        );
    }
    let failures = report.failure_count();
    if failures > 0 {
        ui.display_message(
            "⚠️",
            &format!(
                "{failures} of {} OCR calls failed (marked in the report)",
                report.records.len()
            ),
        );
    }
    ui.display_message(
        "📝",
        &format!(
            "Wrote {} results to {}",
            report.records.len(),
            opts.output_path.display()
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[clap(flatten)]
        run: RunOpts,
    }

    fn parse(args: &[&str]) -> RunOpts {
        TestCli::parse_from(std::iter::once("ocr-bench").chain(args.iter().copied())).run
    }

    #[test]
    fn defaults() {
        let opts = parse(&["screenshots"]);
        assert_eq!(opts.images_dir, Path::new("screenshots"));
        assert_eq!(opts.output_path, Path::new("ocr_results.csv"));
        assert_eq!(opts.layout, ReportLayout::Multi);
        assert_eq!(opts.selected_engines(), EngineKind::ALL);
    }

    #[test]
    fn engines_keep_order_and_drop_duplicates() {
        let opts = parse(&["dir", "-e", "paddleocr", "-e", "tesseract", "-e", "paddleocr"]);
        assert_eq!(
            opts.selected_engines(),
            [EngineKind::Paddleocr, EngineKind::Tesseract]
        );
    }

    #[tokio::test]
    async fn cli_flags_override_config_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("bench.toml");
        std::fs::write(&config_path, "language = \"de\"\ntimeout_secs = 30\n")?;
        let config_arg = config_path.display().to_string();

        let opts = parse(&["dir", "-c", &config_arg, "-l", "ja"]);
        let config = opts.config().await?;
        assert_eq!(config.language, "ja");
        assert_eq!(config.timeout_secs, Some(30));

        let opts = parse(&["dir", "-c", &config_arg, "--timeout-secs", "5"]);
        let config = opts.config().await?;
        assert_eq!(config.language, "de");
        assert_eq!(config.timeout_secs, Some(5));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = TestCli::try_parse_from(["ocr-bench", "dir", "--timeout-secs", "0"]);
        assert!(result.is_err());
        assert_eq!(parse(&["dir", "--timeout-secs", "1"]).timeout_secs, Some(1));
    }

    #[test]
    fn help_says_timeout_does_not_cover_setup() {
        use clap::CommandFactory as _;

        let help = TestCli::command().render_long_help().to_string();
        assert!(help.contains("setup"), "{help}");
    }

    #[tokio::test]
    async fn single_layout_needs_one_engine() {
        let opts = parse(&["dir", "--layout", "single"]);
        let err = cmd_run(Ui::init_for_tests(), &opts).await.unwrap_err();
        assert!(err.to_string().contains("exactly one --engine"));
    }
}
