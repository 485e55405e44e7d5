pub mod errors;
pub mod model;
mod reader;

pub use errors::GpxError;
pub use model::{TrackLog, TrackMetadata, TrackPoint, CORE_COLUMNS};
pub use reader::parse_track_log;
