//! Status websocket payload decoding.

use serde::Deserialize;

use crate::error::{Error, Result};

/// HDMI state the box reports while switched on.
const HDMI_AVAILABLE: &str = "available";

/// Subset of the `/as/system/status` payload the listener needs.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    hdmi: Option<HdmiStatus>,
}

#[derive(Debug, Deserialize)]
struct HdmiStatus {
    state: String,
}

/// Decodes a status payload into the standby flag.
///
/// The box is in standby whenever `hdmi.state` is anything other than
/// `"available"`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the payload is not JSON or has no `hdmi.state`.
pub fn standby_from_payload(text: &str) -> Result<bool> {
    let payload: StatusPayload =
        serde_json::from_str(text).map_err(|e| Error::parse("status payload", e))?;
    let hdmi = payload
        .hdmi
        .ok_or_else(|| Error::parse("status payload", "missing hdmi section"))?;
    Ok(hdmi.state != HDMI_AVAILABLE)
}
