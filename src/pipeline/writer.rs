use crate::error::Result;
use crate::types::{BatchReport, CoordinateRow, ProjectedBatch, RideRow, StationRow};
use async_trait::async_trait;
use libsql::{params_from_iter, Connection, Transaction, Value};
use tracing::{debug, warn};

/// Where projected batches go. The pipeline holds only one batch in
/// flight, so implementations see writes strictly in row order.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn write_batch(&self, batch: &ProjectedBatch) -> Result<BatchReport>;
}

/// Writes batches to the trip store: three conflict-skip statements in
/// one transaction, coordinates first, then stations, then rides. Any
/// statement failure rolls the whole batch back.
pub struct TripWriter {
    conn: Connection,
}

impl TripWriter {
    /// Each import owns its connection for its whole lifetime; nothing
    /// here is shared across imports.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    async fn upsert_coordinates(tx: &Transaction, rows: &[CoordinateRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO coordinates (lat, lng) \
             SELECT DISTINCT column1, column2 FROM (VALUES {}) \
             WHERE true \
             ON CONFLICT (lat, lng) DO NOTHING",
            placeholder_rows(rows.len(), 2)
        );

        let mut params: Vec<Value> = Vec::with_capacity(rows.len() * 2);
        for row in rows {
            params.push(Value::Real(row.lat));
            params.push(Value::Real(row.lng));
        }

        Ok(tx.execute(&sql, params_from_iter(params)).await?)
    }

    /// Resolves each station's coordinate reference by joining the batch
    /// values against the coordinates just upserted, comparing the
    /// normalized numerics rather than any string form.
    async fn upsert_stations(tx: &Transaction, rows: &[StationRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO stations (station_id, name, coordinate_id) \
             SELECT s.column1, s.column2, c.coordinate_id \
             FROM (VALUES {}) AS s \
             JOIN coordinates c ON c.lat = s.column3 AND c.lng = s.column4 \
             WHERE true \
             ON CONFLICT (station_id) DO NOTHING",
            placeholder_rows(rows.len(), 4)
        );

        let mut params: Vec<Value> = Vec::with_capacity(rows.len() * 4);
        for row in rows {
            params.push(Value::Text(row.station_id.clone()));
            params.push(Value::Text(row.name.clone()));
            params.push(Value::Real(row.lat));
            params.push(Value::Real(row.lng));
        }

        Ok(tx.execute(&sql, params_from_iter(params)).await?)
    }

    async fn insert_rides(tx: &Transaction, rows: &[RideRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO rides (ride_id, rideable_type, started_at, ended_at, \
             start_station_id, end_station_id, member_casual) \
             VALUES {} \
             ON CONFLICT (ride_id) DO NOTHING",
            placeholder_rows(rows.len(), 7)
        );

        let mut params: Vec<Value> = Vec::with_capacity(rows.len() * 7);
        for row in rows {
            params.push(Value::Text(row.ride_id.clone()));
            params.push(Value::Text(row.rideable_type.clone()));
            params.push(Value::Text(row.started_at.clone()));
            params.push(Value::Text(row.ended_at.clone()));
            params.push(Value::Text(row.start_station_id.clone()));
            params.push(Value::Text(row.end_station_id.clone()));
            params.push(Value::Text(row.member_casual.clone()));
        }

        Ok(tx.execute(&sql, params_from_iter(params)).await?)
    }

    /// Dependency order: coordinates before stations before rides.
    async fn apply(tx: &Transaction, batch: &ProjectedBatch) -> Result<BatchReport> {
        let coordinates_inserted = Self::upsert_coordinates(tx, &batch.coordinates).await?;
        let stations_inserted = Self::upsert_stations(tx, &batch.stations).await?;
        let rides_inserted = Self::insert_rides(tx, &batch.rides).await?;

        Ok(BatchReport {
            coordinates_inserted,
            stations_inserted,
            rides_inserted,
        })
    }
}

#[async_trait]
impl BatchSink for TripWriter {
    async fn write_batch(&self, batch: &ProjectedBatch) -> Result<BatchReport> {
        if batch.is_empty() {
            return Ok(BatchReport::default());
        }

        let tx = self.conn.transaction().await?;

        match Self::apply(&tx, batch).await {
            Ok(report) => {
                tx.commit().await?;
                debug!(
                    coordinates = report.coordinates_inserted,
                    stations = report.stations_inserted,
                    rides = report.rides_inserted,
                    "batch committed"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback after failed batch also failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }
}

/// "(?, ?), (?, ?)" for `count` rows of `width` placeholders each. Only
/// the shape is computed here; values always travel as parameters.
fn placeholder_rows(count: usize, width: usize) -> String {
    let row = format!("({})", vec!["?"; width].join(", "));
    vec![row; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_rows_shapes_match_value_counts() {
        assert_eq!(placeholder_rows(1, 2), "(?, ?)");
        assert_eq!(placeholder_rows(3, 2), "(?, ?), (?, ?), (?, ?)");
        assert_eq!(placeholder_rows(2, 4), "(?, ?, ?, ?), (?, ?, ?, ?)");
    }
}
