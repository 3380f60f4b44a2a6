pub mod recorder;

pub use recorder::{CompletedCall, UsageRecorder};
