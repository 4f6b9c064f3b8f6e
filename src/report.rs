//! Writing benchmark results.
//!
//! The CSV report has one row per [`ResultRecord`]. Its header and the
//! `Average time (...)` lines we print are what downstream scripts parse, so
//! keep them stable.

use std::io;

use clap::ValueEnum;
use tempfile::NamedTempFile;
use tokio::fs;

use crate::{aggregate::EngineAggregate, error::BenchError, prelude::*, runner::ResultRecord};

/// Which columns to write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportLayout {
    /// `image_name,ocr_engine,time_ms,recognized_text`
    #[default]
    Multi,
    /// `image_name,time_ms,recognized_text`, for single-engine runs.
    Single,
}

impl ReportLayout {
    /// The header row.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            ReportLayout::Multi => &["image_name", "ocr_engine", "time_ms", "recognized_text"],
            ReportLayout::Single => &["image_name", "time_ms", "recognized_text"],
        }
    }
}

/// Format milliseconds the way we report them.
pub fn format_ms(ms: f64) -> String {
    format!("{ms:.2}")
}

/// Write a CSV report to `writer`, returning the writer once everything has
/// been flushed.
pub fn write_report_to<W: io::Write>(
    writer: W,
    layout: ReportLayout,
    records: &[ResultRecord],
) -> Result<W, csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    // Written by hand, so that an empty report still gets a header.
    wtr.write_record(layout.headers())?;
    for record in records {
        let time_ms = format_ms(record.elapsed_ms);
        match layout {
            ReportLayout::Multi => wtr.write_record([
                record.image_name.as_str(),
                record.engine_name.as_str(),
                time_ms.as_str(),
                record.text(),
            ])?,
            ReportLayout::Single => wtr.write_record([
                record.image_name.as_str(),
                time_ms.as_str(),
                record.text(),
            ])?,
        }
    }
    wtr.into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Write a CSV report to `path`.
///
/// We write to a temporary file next to `path` and rename it into place, so
/// `path` either holds a complete report or is left untouched.
#[instrument(level = "debug", skip(records), fields(rows = records.len()))]
pub fn write_report(
    path: &Path,
    layout: ReportLayout,
    records: &[ResultRecord],
) -> Result<(), BenchError> {
    let report_error = |source: csv::Error| BenchError::ReportWrite {
        path: path.to_owned(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|err| report_error(err.into()))?;
    let tmp = write_report_to(tmp, layout, records).map_err(report_error)?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| report_error(err.into()))?;
    tmp.persist(path)
        .map_err(|err| report_error(err.error.into()))?;
    debug!(path = %path.display(), "Wrote report");
    Ok(())
}

/// Print one `Average time (<engine>): <ms> ms` line per engine.
pub fn print_averages<W: io::Write>(out: &mut W, aggregates: &[EngineAggregate]) -> io::Result<()> {
    for agg in aggregates {
        writeln!(
            out,
            "Average time ({}): {} ms",
            agg.engine_name,
            format_ms(agg.mean_ms)
        )?;
    }
    out.flush()
}

/// Write aggregates as pretty-printed JSON.
pub async fn write_summary(path: &Path, aggregates: &[EngineAggregate]) -> Result<()> {
    let json = serde_json::to_string_pretty(aggregates).context("failed to serialize summary")?;
    fs::write(path, json + "\n")
        .await
        .with_context(|| format!("Failed to write summary to {:?}", path))
}
