//! Runtime: collaborator seams, inbound commands and connectivity.
//!
//! # Reentrancy
//!
//! The broker client must never be asked to publish or subscribe from inside
//! its own message delivery. Inbound messages therefore only reach an
//! [`Inbox`], which records them in the [`CommandQueue`]. The
//! [`CommandProcessor`] drains the queue afterwards from the main loop, where
//! publishing the reflected state is safe.
//!
//! # Ordering
//!
//! [`Connectivity::ensure`] returns only after every setter topic is
//! subscribed and every discovery message accepted, so no command is
//! processed for a control the hub has not been told about.

pub mod command;
pub mod connectivity;
pub mod processor;
pub mod queue;
pub mod traits;

pub use connectivity::{Connectivity, ConnectivityState, Links, Session};
pub use processor::{CommandProcessor, ControlHandler};
pub use queue::{CommandQueue, Inbox, PendingOperation};
pub use traits::{
    Board, Broker, Color, Delivery, DeviceContext, Display, EnvironmentSensor, Frame, Graphic,
    LastWill, MessageSink, Network, QoS, Reading, Siren, StatusLight, TextSize,
};
