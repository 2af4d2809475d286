//! Ports, endpoint paths and defaults for the Sky Q box.

use std::time::Duration;

/// TCP port of the remote-control interface.
pub const REMOTE_PORT: u16 = 49160;

/// Remote port used by older firmware.
pub const REMOTE_LEGACY_PORT: u16 = 5900;

/// Port of the REST and websocket server.
pub const REST_PORT: u16 = 9006;

/// Channel summary endpoint.
pub const REST_SERVICES_PATH: &str = "/as/services";

/// Channel detail endpoint prefix (append the sid).
pub const REST_SERVICE_DETAIL_PATH_PREFIX: &str = "/as/services/details/";

/// Status websocket endpoint.
pub const REST_STATUS_PATH: &str = "/as/system/status";

/// Host name used when none is configured.
pub const DEFAULT_HOST: &str = "skyq";

/// Base URL used to resolve relative XMLTV icon paths.
pub const XMLTV_BASE_URL: &str = "http://www.xmltv.co.uk/";

/// Default XMLTV cache directory.
pub const DEFAULT_EPG_CACHE_DIR: &str = ".epg_data";

/// Total timeout for box REST requests.
pub const REST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect/read/write timeout for the remote socket.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
