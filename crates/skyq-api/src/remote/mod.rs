//! Remote-control button presses over the box's TCP remote port.

mod client;
mod command;

#[allow(clippy::module_name_repetitions)]
pub use client::{SkyRemote, press_bytes, press_remote, release_bytes};
#[allow(clippy::module_name_repetitions)]
pub use command::RemoteCommand;
