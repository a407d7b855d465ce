//! Fixed endpoints of the WES web server and the commands understood by
//! `AJAX.CGX`.

use std::time::Duration;

use reqwest::Url;

use crate::error::{Result, WesError};

pub(crate) const USER_ADMIN_CHECK_URL: &str = "/INFOCFG.HTM";
pub(crate) const USER_READONLY_CHECK_URL: &str = "/index.htm";
pub(crate) const AJAX_URL: &str = "/AJAX.CGX";

/// Status file every WES serves out of the box.
pub const DEFAULT_SENSOR_FILE: &str = "DATA.cgx";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the base url from a configured host, which may or may not carry a
/// scheme.
pub(crate) fn base_url(host: &str) -> Result<Url> {
    let url = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    Url::parse(&url).map_err(|err| WesError::InvalidUrl {
        url,
        reason: err.to_string(),
    })
}

/// Resolves `path` against `base`. Absolute urls are returned unchanged.
pub(crate) fn resolve(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(|err| WesError::InvalidUrl {
        url: path.to_string(),
        reason: err.to_string(),
    })
}

/// Commands sent as query parameters to `AJAX.CGX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetRelay { relay: u8, on: bool },
    ToggleRelay { relay: u8 },
    SetVirtualSwitch { switch: u8, on: bool },
    ToggleVirtualSwitch { switch: u8 },
    Reset,
}

impl Command {
    pub fn params(&self) -> Vec<(String, String)> {
        use Command::*;
        let on_off = |on: bool| if on { "ON" } else { "OFF" }.to_string();
        match *self {
            SetRelay { relay, on } => vec![(format!("rl{}", relay), on_off(on))],
            ToggleRelay { relay } => vec![("frl".to_string(), relay.to_string())],
            SetVirtualSwitch { switch, on } => vec![(format!("vs{}", switch), on_off(on))],
            ToggleVirtualSwitch { switch } => vec![("fvs".to_string(), switch.to_string())],
            Reset => vec![("reset".to_string(), "yes".to_string())],
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self
            .params()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");
        write!(f, "{}", params)
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
