mod codec;
mod error;
pub mod geokeys;
pub mod header;
pub mod registry;
pub mod wkt;

pub use codec::{CrsCodec, LookupMode};
pub use error::CrsError;
pub use registry::{CrsDefinition, CrsKind, CrsRegistry};
