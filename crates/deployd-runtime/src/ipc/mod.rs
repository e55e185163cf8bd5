//! Control channel to the supervised server process.

mod channel;

pub use channel::{ControlChannel, ControlPeer, PeerId};
