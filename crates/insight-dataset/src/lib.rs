//! CSV datasets: spreadsheet column letters, header parsing and the file
//! store that holds uploaded files.

pub mod columns;
pub mod csv_file;
pub mod storage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The stored file could not be parsed as CSV or has no header row.
    #[error("malformed CSV file: {0}")]
    MalformedFile(String),

    #[error("invalid file handle: {0}")]
    InvalidHandle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
