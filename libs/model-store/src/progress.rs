/// A sink for byte-level progress notifications during a staged upload.
///
/// The store itself never renders a progress bar; a caller (the CLI binary, say) wires a
/// concrete sink. [`NullProgressSink`] is the default and does nothing.
pub trait ProgressSink: Send + Sync {
    fn add_bytes(&self, n: u64);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn add_bytes(&self, _n: u64) {}
}
