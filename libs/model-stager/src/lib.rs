pub mod error;
pub mod manifest;
pub mod source;
pub mod stage;

pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestFile};
pub use source::{HttpModelSource, HuggingFaceModelSource, ModelFile, ModelSource};
pub use stage::ensure_staged;
