pub mod error;
pub mod progress;
pub mod store;

pub use error::{Error, Result};
pub use progress::{NullProgressSink, ProgressSink};
pub use store::{ModelStore, S3ModelStore, glob_match};
