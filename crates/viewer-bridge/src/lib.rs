//! Transport-facing glue for the live viewer: selection JSON, the SSE
//! update stream and binary export fetches. No HTTP server lives here;
//! a host maps these onto its own routes.

pub mod dispatch;
pub mod error;
pub mod export;
pub mod messages;
pub mod stream;

pub use dispatch::{dispatch_selection, dispatch_selection_json};
pub use error::BridgeError;
pub use export::{fetch_export, ExportBody, ExportResponse};
pub use stream::EventStream;
