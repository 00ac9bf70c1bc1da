//! Diagnostics
//!
//! Optional recording of an execution as a tree of debug frames.

mod recorder;
mod session;

pub use recorder::DebugRecorder;
pub use session::{DebugFrame, DebugSample, DebugSession, LibraryFingerprint};
