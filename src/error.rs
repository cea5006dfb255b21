use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV decode failed: {0}")]
    Decode(#[from] csv_async::Error),

    #[error("unexpected CSV header: expected {expected:?}, found {found:?}")]
    Header {
        expected: &'static [&'static str],
        found: Vec<String>,
    },

    #[error("invalid coordinate value {value:?} in column {column}")]
    Coordinate {
        column: &'static str,
        value: String,
    },

    #[error("database statement failed: {0}")]
    Database(#[from] libsql::Error),

    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP server error: {0}")]
    Server(#[from] hyper::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
