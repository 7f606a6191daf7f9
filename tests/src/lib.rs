//! No library surface of its own; exists so `tests/tests/*.rs` has a crate to hang
//! integration scenarios off.
