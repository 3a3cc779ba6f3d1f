//! Live CAD viewer core.
//!
//! User scripts `show` solids by name; viewers follow along through an
//! event stream, fetch binary meshes from a hash-keyed export cache and
//! pick faces, edges and vertices to read their properties back.

pub mod bus;
pub mod config;
pub mod error;
pub mod export;
pub mod hash;
pub mod registry;
pub mod script;
pub mod select;
pub mod stl;
pub mod viewer;

pub use bus::{BusListener, CancelToken, Delivery, EventBus, Subscription};
pub use config::ViewerConfig;
pub use error::{ViewerError, ViewerResult};
pub use export::{CacheStats, ExportCache, ExportedMesh, STL_EXTENSION, STL_MIMETYPE};
pub use registry::{NamedObject, Registry};
pub use script::ScriptSession;
pub use select::{SelectionResolver, SelectionResult};
pub use viewer::Viewer;

pub use viewer_kernel::{EntityProperties, KernelSolidHandle, TopoKind};
pub use viewer_types::{ContentHash, ShowEvent};
