//! Online/standby status tracking over the box's status websocket.

mod listener;
mod payload;

#[allow(clippy::module_name_repetitions)]
pub use listener::{Status, StatusBuilder};
pub use payload::standby_from_payload;
