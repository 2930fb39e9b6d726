//! Event synchronization engine: per-host streams, per-entity read
//! positions, entity-scoped filters and the wait state machine.

mod filter;
mod position;
mod stream;
mod tracker;

pub use filter::*;
pub(crate) use position::PositionKey;
pub use position::PositionStore;
pub use stream::*;
pub use tracker::*;
