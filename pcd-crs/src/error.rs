use thiserror::Error;

use crate::wkt::WktError;

#[derive(Debug, Error)]
pub enum CrsError {
    #[error("invalid reference system: {0}")]
    InvalidReferenceSystem(String),
    #[error("corrupt LAS header: {0}")]
    CorruptHeader(String),
    #[error("record {record_id} payload of {len} bytes does not fit a VLR")]
    RecordTooLarge { record_id: u16, len: usize },
    #[error("malformed WKT: {0}")]
    Wkt(#[from] WktError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
