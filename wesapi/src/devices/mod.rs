use serde::Serialize;

use crate::wes_xml::Document;

pub const MANUFACTURER: &str = "cartelectronic";
pub const MODEL: &str = "WES (Web energie supervisor)";
pub const NAME: &str = "wes";

/// Identity of the polled WES, read once from the `info` section of the
/// status file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub serial: String,
    pub hardware: String,
    pub firmware: String,
}

impl DeviceIdentity {
    pub fn from_document(doc: &Document) -> Option<Self> {
        Some(DeviceIdentity {
            serial: doc.text(&["info", "serial"])?.to_string(),
            hardware: doc.text(&["info", "hardware"])?.to_string(),
            firmware: doc.text(&["info", "firmware"])?.to_string(),
        })
    }

    pub fn manufacturer(&self) -> &'static str {
        MANUFACTURER
    }

    pub fn model(&self) -> &'static str {
        MODEL
    }

    pub fn name(&self) -> &'static str {
        NAME
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} serial={:?} hardware={:?} firmware={:?}",
            MANUFACTURER, MODEL, self.serial, self.hardware, self.firmware
        )
    }
}

/// Privileges of the configured web user on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Admin,
    ReadOnly,
    Unknown,
}

impl AccessLevel {
    pub fn is_admin(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Admin => write!(f, "admin"),
            AccessLevel::ReadOnly => write!(f, "read-only"),
            AccessLevel::Unknown => write!(f, "unknown"),
        }
    }
}
