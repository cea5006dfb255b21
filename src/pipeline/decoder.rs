use crate::error::{IngestError, Result};
use crate::types::TripRecord;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use tokio::io::AsyncRead;

/// Column set every trip-history export carries, in order.
pub const EXPECTED_HEADERS: [&str; 13] = [
    "ride_id",
    "rideable_type",
    "started_at",
    "ended_at",
    "start_station_id",
    "start_station_name",
    "start_lat",
    "start_lng",
    "end_station_id",
    "end_station_name",
    "end_lat",
    "end_lng",
    "member_casual",
];

/// Streaming decoder over a trip-history CSV byte stream. Rows come out
/// one at a time and are never buffered beyond the reader's internal
/// block, so file size does not bound memory.
pub struct RowDecoder<R> {
    reader: AsyncReader<R>,
    headers: StringRecord,
    record: StringRecord,
}

impl<R> RowDecoder<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Read and validate the header row before any data row is decoded.
    pub async fn open(source: R) -> Result<Self> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            // Larger internal buffer reduces syscalls on big uploads
            .buffer_capacity(1 << 20)
            .create_reader(source);

        let headers = reader.headers().await?.clone();
        if !headers.iter().eq(EXPECTED_HEADERS) {
            return Err(IngestError::Header {
                expected: &EXPECTED_HEADERS,
                found: headers.iter().map(String::from).collect(),
            });
        }

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
        })
    }

    /// The next decoded row, or `None` at end of stream. A malformed line
    /// (wrong column count, bad UTF-8) aborts the stream with an error.
    pub async fn next_row(&mut self) -> Result<Option<TripRecord>> {
        if !self.reader.read_record(&mut self.record).await? {
            return Ok(None);
        }

        let row = self.record.deserialize(Some(&self.headers))?;
        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ride_id,rideable_type,started_at,ended_at,start_station_id,start_station_name,start_lat,start_lng,end_station_id,end_station_name,end_lat,end_lng,member_casual";

    #[tokio::test]
    async fn decodes_rows_in_order() {
        let data = format!(
            "{HEADER}\n\
             R1,classic_bike,2023-06-01 08:00:00,2023-06-01 08:15:00,S1,First Ave,40.71,-74.0,S2,Second Ave,40.72,-74.01,member\n\
             R2,electric_bike,2023-06-01 09:00:00,2023-06-01 09:05:00,S2,Second Ave,40.72,-74.01,S1,First Ave,40.71,-74.0,casual\n"
        );

        let mut decoder = RowDecoder::open(data.as_bytes()).await.unwrap();

        let first = decoder.next_row().await.unwrap().unwrap();
        assert_eq!(first.ride_id, "R1");
        assert_eq!(first.start_station_name, "First Ave");
        assert_eq!(first.start_lat, "40.71");

        let second = decoder.next_row().await.unwrap().unwrap();
        assert_eq!(second.ride_id, "R2");
        assert_eq!(second.member_casual, "casual");

        assert!(decoder.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keeps_empty_fields_as_empty_strings() {
        let data = format!(
            "{HEADER}\n\
             R1,classic_bike,2023-06-01 08:00:00,2023-06-01 08:15:00,,,,,S2,Second Ave,40.72,-74.01,member\n"
        );

        let mut decoder = RowDecoder::open(data.as_bytes()).await.unwrap();
        let row = decoder.next_row().await.unwrap().unwrap();

        assert_eq!(row.start_station_id, "");
        assert_eq!(row.start_lat, "");
        assert_eq!(row.end_lat, "40.72");
    }

    #[tokio::test]
    async fn rejects_unexpected_header() {
        let data = "ride_id,rideable_type\nR1,classic_bike\n";

        let err = RowDecoder::open(data.as_bytes()).await.err().unwrap();
        assert!(matches!(err, IngestError::Header { .. }));
    }

    #[tokio::test]
    async fn malformed_row_aborts_the_stream() {
        let data = format!("{HEADER}\nR1,classic_bike,too,few,columns\n");

        let mut decoder = RowDecoder::open(data.as_bytes()).await.unwrap();
        let err = decoder.next_row().await.err().unwrap();
        assert!(matches!(err, IngestError::Decode(_)));
    }
}
