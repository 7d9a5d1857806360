//! `vibium-core`: the page/context registry and tool layer sitting on top
//! of the raw BiDi client, implementing the daemon's actual browser-session
//! semantics (spec.md §3 "Session" / §4.4 "Tools").

pub mod error;
pub mod registry;
pub mod script;
pub mod session;
pub mod tools;
pub mod trace;

pub use error::{Error, Result};
pub use registry::{BrowsingContext, ElementRef, Registry, SharedRegistry};
pub use session::{Session, SERVER_VERSION};
pub use tools::{dispatch, TOOL_NAMES};
pub use trace::{TraceScreenshotFormat, TraceStartOptions, TracingController};
