pub mod feed;
pub mod observation;
pub mod sample_time;

pub use feed::{DiffColumn, DiffStrategy, Envelope, ExpiryFilter, ExtractSpec, Feed, TIME_COLUMN};
pub use observation::Observation;
pub use sample_time::SampleTime;
