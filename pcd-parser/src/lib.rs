pub mod catalog;
mod error;
pub mod reader;

pub use error::ReadError;
