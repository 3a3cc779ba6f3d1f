pub mod event;
pub mod topo;

pub use event::*;
pub use topo::*;
