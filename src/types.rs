use serde::{Deserialize, Serialize};

/// One raw trip-history CSV record. Every field stays a string here;
/// coordinate normalization happens at projection time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TripRecord {
    pub ride_id: String,
    pub rideable_type: String,
    pub started_at: String,
    pub ended_at: String,
    pub start_station_id: String,
    pub start_station_name: String,
    pub start_lat: String,
    pub start_lng: String,
    pub end_station_id: String,
    pub end_station_name: String,
    pub end_lat: String,
    pub end_lng: String,
    pub member_casual: String,
}

/// A (lat, lng) pair, keyed by value in the coordinates table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateRow {
    pub lat: f64,
    pub lng: f64,
}

/// A docking station candidate with the normalized coordinates used to
/// resolve its coordinate reference at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRow {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// One trip, carrying timestamps verbatim as text.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRow {
    pub ride_id: String,
    pub rideable_type: String,
    pub started_at: String,
    pub ended_at: String,
    pub start_station_id: String,
    pub end_station_id: String,
    pub member_casual: String,
}

/// The three value-sets one batch projects into, in insert order:
/// coordinates, then stations, then rides.
#[derive(Debug, Default, Clone)]
pub struct ProjectedBatch {
    pub coordinates: Vec<CoordinateRow>,
    pub stations: Vec<StationRow>,
    pub rides: Vec<RideRow>,
}

impl ProjectedBatch {
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty() && self.stations.is_empty() && self.rides.is_empty()
    }
}

/// Rows actually inserted by one batch write; conflict skips are not
/// counted.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchReport {
    pub coordinates_inserted: u64,
    pub stations_inserted: u64,
    pub rides_inserted: u64,
}

/// Final accounting for one import.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ImportSummary {
    pub rows_read: u64,
    pub batches_written: u64,
    pub coordinates_inserted: u64,
    pub stations_inserted: u64,
    pub rides_inserted: u64,
}
