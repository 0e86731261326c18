//! Session registry and message routing.
//!
//! - `ConnectionRegistry`: connection <-> session bijection, username uniqueness
//! - `MessageRouter`: decode, dispatch by kind, compute recipients
//! - `Broadcaster`: fan-out to all open connections or a targeted subset

mod broadcaster;
mod registry;
mod router;
mod session;

pub use broadcaster::{Broadcaster, DeliveryResult};
pub use registry::{ConnectionRegistry, Registration};
pub use router::{MessageRouter, RouterStats, RouterStatsSnapshot};
pub use session::Session;
