//! Background driver for the Batch Processor.
//!
//! Each tick drains every due record, one batch at a time, then sleeps. Batches are claimed
//! with row leases, so any number of workers can share one database.

use std::time::Duration as StdDuration;

use tokio::time as tokio_time;

use murmur_service::{BatchReport, MurmurService};

use crate::Result;

pub struct WorkerState {
	pub service: MurmurService,
	pub poll_interval_ms: u64,
}

pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	tracing::info!(poll_interval_ms = state.poll_interval_ms, "Embedding worker started.");

	loop {
		match drain_pending(&state.service).await {
			Ok(totals) if totals.processed > 0 => tracing::info!(
				processed = totals.processed,
				successful = totals.successful,
				failed = totals.failed,
				"Pending embeddings drained."
			),
			Ok(_) => {},
			Err(err) => tracing::error!(error = %err, "Embedding batch processing failed."),
		}

		tokio_time::sleep(StdDuration::from_millis(state.poll_interval_ms)).await;
	}
}

/// Runs batches until one comes back empty. Failed items back off, so they end the drain.
pub async fn drain_pending(service: &MurmurService) -> Result<BatchReport> {
	let mut totals = BatchReport::default();

	loop {
		let report = service.process_pending_batch(None).await?;

		if report.processed == 0 {
			return Ok(totals);
		}

		totals.processed += report.processed;
		totals.successful += report.successful;
		totals.failed += report.failed;
	}
}

