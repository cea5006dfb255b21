use crate::error::{IngestError, Result};
use crate::types::{CoordinateRow, ProjectedBatch, RideRow, StationRow, TripRecord};
use std::collections::HashSet;

/// Stand-in key for an empty coordinate field. A real number keeps the
/// (lat, lng) unique key and the station lookup join exact; SQL NULLs
/// compare unequal to each other and would break both.
pub const COORDINATE_SENTINEL: f64 = 0.0;

/// Normalize one coordinate field: blank (empty after trimming) means
/// the sentinel, anything else must parse as a float.
pub fn normalize_coordinate(column: &'static str, value: &str) -> Result<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(COORDINATE_SENTINEL);
    }

    trimmed.parse::<f64>().map_err(|_| IngestError::Coordinate {
        column,
        value: value.to_string(),
    })
}

/// Project one batch into the three value-sets, start side before end
/// side for every row. Station candidates are deduplicated on station_id
/// within the batch, keeping the first occurrence; coordinate duplicates
/// are left for the store-side DISTINCT and conflict skip. Pure: no
/// connection, no I/O.
pub fn project_batch(rows: &[TripRecord]) -> Result<ProjectedBatch> {
    let mut batch = ProjectedBatch {
        coordinates: Vec::with_capacity(rows.len() * 2),
        stations: Vec::with_capacity(rows.len() * 2),
        rides: Vec::with_capacity(rows.len()),
    };
    let mut seen_stations: HashSet<String> = HashSet::with_capacity(rows.len() * 2);

    for row in rows {
        let start_lat = normalize_coordinate("start_lat", &row.start_lat)?;
        let start_lng = normalize_coordinate("start_lng", &row.start_lng)?;
        let end_lat = normalize_coordinate("end_lat", &row.end_lat)?;
        let end_lng = normalize_coordinate("end_lng", &row.end_lng)?;

        batch.coordinates.push(CoordinateRow {
            lat: start_lat,
            lng: start_lng,
        });
        batch.coordinates.push(CoordinateRow {
            lat: end_lat,
            lng: end_lng,
        });

        if seen_stations.insert(row.start_station_id.clone()) {
            batch.stations.push(StationRow {
                station_id: row.start_station_id.clone(),
                name: row.start_station_name.clone(),
                lat: start_lat,
                lng: start_lng,
            });
        }
        if seen_stations.insert(row.end_station_id.clone()) {
            batch.stations.push(StationRow {
                station_id: row.end_station_id.clone(),
                name: row.end_station_name.clone(),
                lat: end_lat,
                lng: end_lng,
            });
        }

        batch.rides.push(RideRow {
            ride_id: row.ride_id.clone(),
            rideable_type: row.rideable_type.clone(),
            started_at: row.started_at.clone(),
            ended_at: row.ended_at.clone(),
            start_station_id: row.start_station_id.clone(),
            end_station_id: row.end_station_id.clone(),
            member_casual: row.member_casual.clone(),
        });
    }

    Ok(batch)
}
