//! Per-engine timing statistics.

use crate::{
    prelude::*,
    runner::{BenchmarkReport, ResultRecord},
};

/// Timing statistics for one engine.
///
/// Failed calls count towards the timings, because their latency is real.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineAggregate {
    /// The engine name.
    pub engine_name: String,

    /// How many images did we time?
    pub count: usize,

    /// How many of those failed?
    pub failures: usize,

    /// Arithmetic mean of elapsed milliseconds. 0 if there are no records.
    pub mean_ms: f64,

    /// Fastest call. 0 if there are no records.
    pub min_ms: f64,

    /// Slowest call. 0 if there are no records.
    pub max_ms: f64,
}

impl EngineAggregate {
    /// An aggregate with no records.
    fn empty(engine_name: &str) -> Self {
        Self {
            engine_name: engine_name.to_owned(),
            count: 0,
            failures: 0,
            mean_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        }
    }
}

/// Aggregate a whole report. Every engine that was set up gets an aggregate,
/// even if it has no records.
pub fn aggregate(report: &BenchmarkReport) -> Vec<EngineAggregate> {
    aggregate_records(&report.engines, &report.records)
}

/// Compute one [`EngineAggregate`] per engine.
///
/// The result lists `engines` first, in order, followed by any other engine
/// names found in `records`, in order of first appearance.
pub fn aggregate_records(engines: &[String], records: &[ResultRecord]) -> Vec<EngineAggregate> {
    // (aggregate, running sum) per engine. Engine counts are tiny, so a linear
    // search is fine.
    let mut groups = engines
        .iter()
        .map(|name| (EngineAggregate::empty(name), 0.0))
        .collect::<Vec<_>>();

    for record in records {
        let idx = match groups
            .iter()
            .position(|(agg, _)| agg.engine_name == record.engine_name)
        {
            Some(idx) => idx,
            None => {
                groups.push((EngineAggregate::empty(&record.engine_name), 0.0));
                groups.len() - 1
            }
        };
        let (agg, sum) = &mut groups[idx];
        if agg.count == 0 {
            agg.min_ms = record.elapsed_ms;
            agg.max_ms = record.elapsed_ms;
        } else {
            agg.min_ms = agg.min_ms.min(record.elapsed_ms);
            agg.max_ms = agg.max_ms.max(record.elapsed_ms);
        }
        agg.count += 1;
        if record.is_failed() {
            agg.failures += 1;
        }
        *sum += record.elapsed_ms;
    }

    groups
        .into_iter()
        .map(|(mut agg, sum)| {
            if agg.count > 0 {
                agg.mean_ms = sum / agg.count as f64;
            }
            agg
        })
        .collect()
}
