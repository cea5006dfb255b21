use crate::error::Result;
use crate::pipeline::batch::BatchAccumulator;
use crate::pipeline::decoder::RowDecoder;
use crate::pipeline::project::project_batch;
use crate::pipeline::writer::BatchSink;
use crate::types::{ImportSummary, TripRecord};
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::info;

/// Run one import end to end: decode rows, buffer up to `batch_size`,
/// write each full batch before decoding any further (that await is the
/// backpressure), then flush the tail. The first decode, projection, or
/// write error ends the import; batches committed before it stay
/// committed, and nothing is retried.
pub async fn run_import<R, S>(source: R, sink: &S, batch_size: usize) -> Result<ImportSummary>
where
    R: AsyncRead + Unpin + Send,
    S: BatchSink + ?Sized,
{
    let mut decoder = RowDecoder::open(source).await?;
    let mut accumulator = BatchAccumulator::new(batch_size);
    let mut summary = ImportSummary::default();

    while let Some(row) = decoder.next_row().await? {
        summary.rows_read += 1;
        if let Some(batch) = accumulator.accept(row) {
            project_and_write(sink, &batch, &mut summary).await?;
        }
    }

    if let Some(batch) = accumulator.flush() {
        project_and_write(sink, &batch, &mut summary).await?;
    }

    info!(
        rows = summary.rows_read,
        batches = summary.batches_written,
        rides = summary.rides_inserted,
        "import finished"
    );

    Ok(summary)
}

/// Import a trip-history CSV from disk.
pub async fn import_file<S>(path: &Path, sink: &S, batch_size: usize) -> Result<ImportSummary>
where
    S: BatchSink + ?Sized,
{
    let file = tokio::fs::File::open(path).await?;
    run_import(file, sink, batch_size).await
}

async fn project_and_write<S>(
    sink: &S,
    rows: &[TripRecord],
    summary: &mut ImportSummary,
) -> Result<()>
where
    S: BatchSink + ?Sized,
{
    let projected = project_batch(rows)?;
    let report = sink.write_batch(&projected).await?;

    summary.batches_written += 1;
    summary.coordinates_inserted += report.coordinates_inserted;
    summary.stations_inserted += report.stations_inserted;
    summary.rides_inserted += report.rides_inserted;

    info!(rows = rows.len(), rides = report.rides_inserted, "batch written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::types::{BatchReport, ProjectedBatch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const HEADER: &str = "ride_id,rideable_type,started_at,ended_at,start_station_id,start_station_name,start_lat,start_lng,end_station_id,end_station_name,end_lat,end_lng,member_casual";

    /// Records the ride count of every batch it is handed.
    #[derive(Default)]
    struct RecordingSink {
        batch_sizes: Mutex<Vec<usize>>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn write_batch(&self, batch: &ProjectedBatch) -> Result<BatchReport> {
            let mut sizes = self.batch_sizes.lock().unwrap();
            sizes.push(batch.rides.len());
            if self.fail_on_batch == Some(sizes.len()) {
                return Err(IngestError::Connection("sink unavailable".to_string()));
            }
            Ok(BatchReport {
                coordinates_inserted: batch.coordinates.len() as u64,
                stations_inserted: batch.stations.len() as u64,
                rides_inserted: batch.rides.len() as u64,
            })
        }
    }

    fn csv_with_rows(count: usize) -> Vec<u8> {
        let mut body = String::from(HEADER);
        for i in 0..count {
            body.push_str(&format!(
                "\nR{i},classic_bike,2023-06-01 08:00:00,2023-06-01 08:10:00,\
                 S{i},Station {i},40.0,-74.0,S{next},Station {next},41.0,-75.0,member",
                next = i + 1,
            ));
        }
        body.push('\n');
        body.into_bytes()
    }

    #[tokio::test]
    async fn writes_full_batches_then_the_tail() {
        let sink = RecordingSink::default();
        let data = csv_with_rows(5);

        let summary = run_import(&data[..], &sink, 2).await.unwrap();

        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.batches_written, 3);
        assert_eq!(*sink.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn no_batch_exceeds_the_configured_size() {
        let sink = RecordingSink::default();
        let data = csv_with_rows(7);

        run_import(&data[..], &sink, 3).await.unwrap();

        assert!(sink.batch_sizes.lock().unwrap().iter().all(|&n| n <= 3));
    }

    #[tokio::test]
    async fn exact_multiple_writes_no_empty_tail() {
        let sink = RecordingSink::default();
        let data = csv_with_rows(4);

        let summary = run_import(&data[..], &sink, 2).await.unwrap();

        assert_eq!(summary.batches_written, 2);
        assert_eq!(*sink.batch_sizes.lock().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn header_only_stream_writes_nothing() {
        let sink = RecordingSink::default();
        let data = format!("{HEADER}\n").into_bytes();

        let summary = run_import(&data[..], &sink, 2).await.unwrap();

        assert_eq!(summary.rows_read, 0);
        assert_eq!(summary.batches_written, 0);
        assert!(sink.batch_sizes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failure_stops_the_import() {
        let sink = RecordingSink {
            fail_on_batch: Some(2),
            ..RecordingSink::default()
        };
        let data = csv_with_rows(6);

        let err = run_import(&data[..], &sink, 2).await.err().unwrap();

        assert!(matches!(err, IngestError::Connection(_)));
        // The failed batch was the last one attempted; no retry, no third batch
        assert_eq!(*sink.batch_sizes.lock().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn summary_accumulates_across_batches() {
        let sink = RecordingSink::default();
        let data = csv_with_rows(5);

        let summary = run_import(&data[..], &sink, 2).await.unwrap();

        assert_eq!(summary.rides_inserted, 5);
        assert_eq!(summary.coordinates_inserted, 10);
    }
}
