//! Library for polling and controlling the Cartelectronic "WES" (Web Energie
//! Superviseur).
//!
//! The WES serves its measurements (current clamps, TIC metering, 1-wire
//! probes, relays) as XML files over HTTP with basic authentication. This crate
//! decodes those files into a [`Document`], turns fields of it into typed
//! sensors and switches, and polls the device on an interval.
//!
//! It is used by the `wesctrl` utility.
//!
//! ## Example
//!
//! ```ignore
//! let client = wesapi::WesClient::new("192.168.1.20", "admin", "wes")?;
//! let identity = client.identify().await?.unwrap();
//! let access = client.probe_access_level().await;
//!
//! let snapshot = client.fetch_sensor_snapshot().await?.unwrap();
//! let mut entities = wesapi::Entities::discover(&snapshot, &identity, access);
//!
//! // turn relay 1 on if the user is admin
//! if let Some(relay) = entities.switches.first_mut() {
//!     relay.turn_on(&client).await;
//! }
//! ```

#[macro_use]
extern crate tracing;

pub mod api;
pub(crate) mod client;
pub mod devices;
pub mod entities;
pub mod error;
pub mod ftp;
pub mod poller;
pub mod wes_xml;

pub use api::Command;
pub use client::WesClient;
pub use devices::{AccessLevel, DeviceIdentity};
pub use entities::{
    Entities, Reading, ResetButton, SensorEntity, SensorKind, SwitchEntity, SwitchKind, Unit,
};
pub use error::{Result, WesError};
pub use ftp::WesFtp;
pub use poller::{Poller, Snapshot};
pub use wes_xml::{Document, Node};
