//! Host capabilities for running the core against the real machine.

mod native;
mod output;

pub use native::NativeFs;
pub use output::OutputChannel;
