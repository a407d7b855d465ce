//! Typed views on a status [`Document`]: sensors, switches and the reset
//! button, plus the discovery that decides which of them a device exposes.

use serde::Serialize;

use crate::devices::{AccessLevel, DeviceIdentity};
use crate::wes_xml::Document;

mod button;
mod sensor;
mod switch;

pub use button::ResetButton;
pub use sensor::{parse_power, PowerShape, PowerValue, SensorEntity, SensorKind};
pub use switch::{SwitchEntity, SwitchKind};

pub(crate) const ID_PREFIX: &str = "wes_";

pub const CLAMPS: u8 = 4;
pub const TICS: u8 = 2;
pub const PROBES: u8 = 30;
pub const RELAYS: u8 = 2;
pub const VIRTUAL_SWITCHES: u8 = 24;

/// Cumulative counters of the TIC, in Wh. Historic ("mode historique") and
/// standard mode labels.
pub const TIC_INDEX_LABELS: &[&str] = &[
    "BASE", "HCHC", "HCHP", "EJPHN", "EJPHPM", "BBRHCJB", "BBRHPJB", "BBRHCJW", "BBRHPJW",
    "BBRHCJR", "BBRHPJR", "EAST", "EASF01", "EASF02", "EASF03", "EASF04", "EASF05", "EASF06",
    "EAIT",
];

/// Instant integer values of the TIC.
pub const TIC_VALUE_LABELS: &[&str] = &["ISOUSC", "IINST", "IMAX", "PAPP"];

/// Free text fields of the TIC.
pub const TIC_TEXT_LABELS: &[&str] = &["ADCO", "OPTARIF", "PTEC"];

/// Value of a sensor after coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Float(f64),
    Int(i64),
    Text(String),
}

impl Reading {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Float(val) => Some(*val),
            Reading::Int(val) => Some(*val as f64),
            Reading::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reading::Float(val) => write!(f, "{}", val),
            Reading::Int(val) => write!(f, "{}", val),
            Reading::Text(val) => write!(f, "{}", val),
        }
    }
}

/// Outcome of reading one field out of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Extract<T> {
    Value(T),
    /// Some segment of the key path is absent.
    Missing,
    /// The field is there but its text cannot be coerced.
    Invalid(String),
}

impl<T> Extract<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Extract::Value(val) => Some(val),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize)]
pub enum Unit {
    Ampere,
    Volt,
    Watt,
    VoltAmpere,
    WattHour,
    Celsius,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Ampere => write!(f, "A"),
            Unit::Volt => write!(f, "V"),
            Unit::Watt => write!(f, "W"),
            Unit::VoltAmpere => write!(f, "VA"),
            Unit::WattHour => write!(f, "Wh"),
            Unit::Celsius => write!(f, "°C"),
        }
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
// discovery

/// Creates the sensors a device exposes, judged from one sample snapshot.
///
/// * clamps get current, consumption and injection index sensors; the power
///   sensor is apparent or real power depending on the sampled text, and
///   real-power clamps also get a power factor sensor,
/// * TIC counters only show up when the sample is a positive integer,
/// * probes only show up when the sample is a temperature.
pub fn discover_sensors(doc: &Document, serial: &str) -> Vec<SensorEntity> {
    let mut sensors = Vec::new();

    if let Some(clamps) = doc.section("clamps") {
        if clamps.text(&["V"]).map_or(false, |v| !v.is_empty()) {
            sensors.push(SensorEntity::new(SensorKind::MainVoltage, serial));
        }
        for clamp in 1..=CLAMPS {
            let data = match clamps.section(&format!("clamp{}", clamp)) {
                Some(data) => data,
                None => continue,
            };
            // files without the flag report every clamp
            let enabled = data.text(&["enabled"]).map_or(true, |flag| flag == "1");
            let mut kinds = Vec::new();
            match data.text(&["power"]).and_then(parse_power) {
                Some(PowerValue::Apparent(_)) => kinds.push(SensorKind::ClampPower {
                    clamp,
                    shape: PowerShape::Apparent,
                }),
                Some(PowerValue::Real { .. }) => {
                    kinds.push(SensorKind::ClampPower {
                        clamp,
                        shape: PowerShape::Real,
                    });
                    kinds.push(SensorKind::ClampPowerFactor { clamp });
                }
                None => debug!("clamp{} power has no known shape, skipping", clamp),
            }
            kinds.push(SensorKind::ClampCurrent { clamp });
            kinds.push(SensorKind::ClampIndex {
                clamp,
                inject: false,
            });
            kinds.push(SensorKind::ClampIndex {
                clamp,
                inject: true,
            });
            sensors.extend(
                kinds
                    .into_iter()
                    .map(|kind| SensorEntity::new(kind, serial).with_enabled(enabled)),
            );
        }
    }

    if let Some(tics) = doc.section("tics") {
        for tic in 1..=TICS {
            let data = match tics.section(&format!("tic{}", tic)) {
                Some(data) => data,
                None => continue,
            };
            for &label in TIC_INDEX_LABELS {
                let positive = data
                    .text(&[label])
                    .and_then(|val| val.trim().parse::<u64>().ok())
                    .map_or(false, |val| val > 0);
                if positive {
                    sensors.push(SensorEntity::new(
                        SensorKind::TicIndex {
                            tic,
                            label: label.to_string(),
                        },
                        serial,
                    ));
                }
            }
            for &label in TIC_VALUE_LABELS {
                if data.text(&[label]).map_or(false, |val| val.trim().parse::<i64>().is_ok()) {
                    sensors.push(SensorEntity::new(
                        SensorKind::TicValue {
                            tic,
                            label: label.to_string(),
                        },
                        serial,
                    ));
                }
            }
            for &label in TIC_TEXT_LABELS {
                if data.text(&[label]).map_or(false, |val| !val.is_empty()) {
                    sensors.push(SensorEntity::new(
                        SensorKind::TicText {
                            tic,
                            label: label.to_string(),
                        },
                        serial,
                    ));
                }
            }
        }
    }

    if let Some(probes) = doc.section("probes") {
        for probe in 1..=PROBES {
            let key = format!("probe{}", probe);
            let valid = probes
                .text(&[key.as_str()])
                .map_or(false, |val| val.trim().parse::<f64>().is_ok());
            if valid {
                sensors.push(SensorEntity::new(
                    SensorKind::ProbeTemperature { probe },
                    serial,
                ));
            }
        }
    }

    sensors
}

/// Relays and virtual switches, only exposed to admin users.
pub fn discover_switches(access: AccessLevel, serial: &str) -> Vec<SwitchEntity> {
    if !access.is_admin() {
        info!("user is not admin ({}), no switches", access);
        return Vec::new();
    }
    (1..=RELAYS)
        .map(SwitchKind::Relay)
        .chain((1..=VIRTUAL_SWITCHES).map(SwitchKind::Virtual))
        .map(|kind| SwitchEntity::new(kind, serial))
        .collect()
}

/// Everything a device exposes, kept in sync with the latest snapshot.
#[derive(Debug)]
pub struct Entities {
    pub sensors: Vec<SensorEntity>,
    pub switches: Vec<SwitchEntity>,
    pub reset: ResetButton,
}

impl Entities {
    pub fn discover(doc: &Document, identity: &DeviceIdentity, access: AccessLevel) -> Self {
        let mut entities = Entities {
            sensors: discover_sensors(doc, &identity.serial),
            switches: discover_switches(access, &identity.serial),
            reset: ResetButton::new(&identity.serial),
        };
        entities.update(doc);
        entities
    }

    /// Applies a snapshot to every entity and returns the unique ids of those
    /// whose displayed state changed.
    pub fn update(&mut self, doc: &Document) -> Vec<String> {
        let sensors = self
            .sensors
            .iter_mut()
            .filter_map(|sensor| sensor.update(doc).then(|| sensor.unique_id().to_string()));
        let switches = self
            .switches
            .iter_mut()
            .filter_map(|switch| switch.update(doc).then(|| switch.unique_id().to_string()));
        sensors.chain(switches).collect()
    }

    pub fn sensor(&self, kind: &SensorKind) -> Option<&SensorEntity> {
        self.sensors.iter().find(|sensor| sensor.kind() == kind)
    }

    pub fn switch(&self, kind: SwitchKind) -> Option<&SwitchEntity> {
        self.switches.iter().find(|switch| switch.kind() == kind)
    }
}
