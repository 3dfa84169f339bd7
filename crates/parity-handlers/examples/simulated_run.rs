//! Simulated multi-worker run
//!
//! Loads a handler map, splits a synthetic run across worker threads, each
//! driving its own copy of the collection, then folds the partial results
//! together and writes the summaries.
//!
//! Run with `RUST_LOG=debug` to see per-section loading output.

use anyhow::{bail, Context, Result};
use parity_core::prelude::*;
use parity_core::sinks::{MemoryDatabase, MemorySummary};
use parity_core::{reduce_into, AsAny, JsonMapSource};
use parity_handlers::{builtin_factory, Correlator, CORRELATOR};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CHANNELS: [&str; 6] = ["bcm1", "md1", "md2", "md3", "bpm4x", "bpm4y"];
const WORKERS: usize = 4;
const EVENTS_PER_WORKER: usize = 2_500;

const MAP: &str = r#"{
    "preamble": {"comment": "simulated run handlers"},
    "handlers": [
        {"type": "Combiner", "name": "combine_md", "inputs": ["md1", "md2", "md3"], "weights": [1, 1, 0.5]},
        {"type": "Combiner", "name": "bcm_yield", "inputs": "bcm1", "stream": "yield"},
        {"type": "Correlator", "name": "md_vs_bpm", "dependents": "md1 md2", "independents": "bpm4x bpm4y"},
        {"type": "Correlator", "name": "debug_only", "dependents": "md3", "independents": "bpm4x"}
    ]
}"#;

fn fill_event(streams: &mut MeasurementStreams, event: usize) -> Result<()> {
    let t = event as f64;
    let bpm_x = (t * 0.013).sin();
    let bpm_y = (t * 0.029).cos();
    let noise = (t * 1.7).sin() * 0.05;

    streams.yields.set("bcm1", 100.0 + noise)?;
    streams.difference.set("bpm4x", bpm_x)?;
    streams.difference.set("bpm4y", bpm_y)?;
    streams.asymmetry.set("md1", 0.8 * bpm_x + noise)?;
    streams.asymmetry.set("md2", -0.3 * bpm_y + noise)?;
    streams.asymmetry.set("md3", 0.1 * bpm_x - 0.1 * bpm_y)?;
    // every 97th event is flagged bad
    streams.set_error_flag(u32::from(event % 97 == 0));
    Ok(())
}

fn run_worker(mut array: HandlerArray, worker: usize) -> Result<HandlerArray> {
    let streams = SharedStreams::new(MeasurementStreams::with_channels(&CHANNELS));
    array.bind_streams(streams.clone())?;

    let mut accumulated = 0usize;
    for event in worker * EVENTS_PER_WORKER..(worker + 1) * EVENTS_PER_WORKER {
        fill_event(&mut *streams.write()?, event)?;
        array.clear_event_data();
        if array.process_entry()? {
            accumulated += 1;
        }
    }
    info!(worker, accumulated, "Worker finished");
    Ok(array)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = ArrayOptions::from_json(
        r#"{"DataHandler.disable-by-name": ["debug_only"], "print-runningsum": true}"#,
    )?;
    let factory = builtin_factory();
    let streams = SharedStreams::new(MeasurementStreams::with_channels(&CHANNELS));

    let mut template = HandlerArray::with_options(&options);
    let mut source = JsonMapSource::parse(MAP).context("parsing handler map")?;
    let report = template.load_from_configuration(&mut source, &factory, streams, "sim_0001");
    if !report.is_clean() {
        bail!("handler map had {} bad sections", report.skipped.len());
    }
    info!(loaded = ?report.loaded, disabled = ?report.disabled, "Handlers ready");

    let partials = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let array = template.clone();
                scope.spawn(move || run_worker(array, worker))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(_) => bail!("worker thread panicked"),
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut aggregate = template.clone();
    let summary = reduce_into(&mut aggregate, &partials);
    if !summary.is_complete() {
        bail!("{} partial collections could not be merged", summary.rejected.len());
    }
    aggregate.finish();

    for handler in aggregate.find_by_type(CORRELATOR) {
        if let Some(correlator) = handler.as_any().downcast_ref::<Correlator>() {
            for result in correlator.results() {
                println!(
                    "{:>12} d{}/d{}: slope {:?} (n = {})",
                    handler.name(),
                    result.dependent,
                    result.independent,
                    result.slope,
                    result.count
                );
            }
        }
    }

    let mut db = MemoryDatabase::default();
    aggregate.fill_db(&mut db, "simulated");
    let mut prompt = MemorySummary::default();
    aggregate.write_prompt_summary(&mut prompt, "simulated");

    println!("\n{} database rows", db.rows.len());
    for element in &prompt.elements {
        println!(
            "{:>12}: {:.6} +/- {:.6} (width {:.6})",
            element.element, element.value, element.error, element.width
        );
    }
    Ok(())
}
