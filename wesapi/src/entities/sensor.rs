use lazy_static::lazy_static;
use regex::Regex;

use super::{Extract, Reading, Unit, ID_PREFIX};
use crate::wes_xml::Document;

/// Whether a clamp reports apparent power (`<N> VA`) or real power
/// (`<N> W cos phi <F>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerShape {
    Apparent,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerValue {
    Apparent(i64),
    Real { watts: i64, power_factor: f64 },
}

impl PowerValue {
    pub fn shape(&self) -> PowerShape {
        match self {
            PowerValue::Apparent(_) => PowerShape::Apparent,
            PowerValue::Real { .. } => PowerShape::Real,
        }
    }
}

/// Parses the `power` field of a clamp.
pub fn parse_power(text: &str) -> Option<PowerValue> {
    lazy_static! {
        static ref RE: Regex =
            Regex::new(r"^\s*(?:(?P<va>\d+) VA|(?P<w>\d+) W cos phi (?P<cos_phi>\d[.,]\d+))").unwrap();
    }
    let caps = RE.captures(text)?;
    if let Some(va) = caps.name("va") {
        return va.as_str().parse().ok().map(PowerValue::Apparent);
    }
    let watts = caps.name("w")?.as_str().parse().ok()?;
    // some firmwares print the factor with a decimal comma
    let power_factor = caps.name("cos_phi")?.as_str().replace(',', ".").parse().ok()?;
    Some(PowerValue::Real {
        watts,
        power_factor,
    })
}

/// What a sensor reads, and where in the status document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorKind {
    MainVoltage,
    ClampCurrent { clamp: u8 },
    /// The shape is decided once, when the sensor is discovered.
    ClampPower { clamp: u8, shape: PowerShape },
    ClampPowerFactor { clamp: u8 },
    ClampIndex { clamp: u8, inject: bool },
    TicIndex { tic: u8, label: String },
    TicValue { tic: u8, label: String },
    TicText { tic: u8, label: String },
    ProbeTemperature { probe: u8 },
}

impl SensorKind {
    /// Key path of the field in the status document.
    pub fn path(&self) -> Vec<String> {
        use SensorKind::*;
        let clamp_field = |clamp: u8, field: &str| {
            vec![
                "clamps".to_string(),
                format!("clamp{}", clamp),
                field.to_string(),
            ]
        };
        match self {
            MainVoltage => vec!["clamps".to_string(), "V".to_string()],
            ClampCurrent { clamp } => clamp_field(*clamp, "I"),
            ClampPower { clamp, .. } | ClampPowerFactor { clamp } => clamp_field(*clamp, "power"),
            ClampIndex {
                clamp,
                inject: false,
            } => clamp_field(*clamp, "index"),
            ClampIndex {
                clamp,
                inject: true,
            } => clamp_field(*clamp, "idxinject"),
            TicIndex { tic, label } | TicValue { tic, label } | TicText { tic, label } => {
                vec!["tics".to_string(), format!("tic{}", tic), label.clone()]
            }
            ProbeTemperature { probe } => vec!["probes".to_string(), format!("probe{}", probe)],
        }
    }

    pub fn name(&self) -> String {
        use SensorKind::*;
        match self {
            MainVoltage => "Main voltage".to_string(),
            ClampCurrent { clamp } => format!("Clamp{} current", clamp),
            ClampPower {
                clamp,
                shape: PowerShape::Apparent,
            } => format!("Clamp{} apparent power", clamp),
            ClampPower {
                clamp,
                shape: PowerShape::Real,
            } => format!("Clamp{} power", clamp),
            ClampPowerFactor { clamp } => format!("Clamp{} power factor", clamp),
            ClampIndex {
                clamp,
                inject: false,
            } => format!("Clamp{} consumption index", clamp),
            ClampIndex {
                clamp,
                inject: true,
            } => format!("Clamp{} inject index", clamp),
            TicIndex { tic, label } => format!("Tic{} {} index", tic, label),
            TicValue { tic, label } | TicText { tic, label } => format!("Tic{} {}", tic, label),
            ProbeTemperature { probe } => format!("Probe{} temperature", probe),
        }
    }

    pub(crate) fn id_suffix(&self) -> String {
        use SensorKind::*;
        match self {
            MainVoltage => "main_voltage".to_string(),
            ClampCurrent { clamp } => format!("clamp{}_current", clamp),
            ClampPower {
                clamp,
                shape: PowerShape::Apparent,
            } => format!("clamp{}_apparent_power", clamp),
            ClampPower {
                clamp,
                shape: PowerShape::Real,
            } => format!("clamp{}_power", clamp),
            ClampPowerFactor { clamp } => format!("clamp{}_power_factor", clamp),
            ClampIndex {
                clamp,
                inject: false,
            } => format!("clamp{}_consumption_index", clamp),
            ClampIndex {
                clamp,
                inject: true,
            } => format!("clamp{}_inject_index", clamp),
            TicIndex { tic, label } | TicValue { tic, label } | TicText { tic, label } => {
                format!("tic{}_{}", tic, label.to_lowercase())
            }
            ProbeTemperature { probe } => format!("probe{}_temperature", probe),
        }
    }

    pub fn unit(&self) -> Option<Unit> {
        use SensorKind::*;
        match self {
            MainVoltage => Some(Unit::Volt),
            ClampCurrent { .. } => Some(Unit::Ampere),
            ClampPower {
                shape: PowerShape::Apparent,
                ..
            } => Some(Unit::VoltAmpere),
            ClampPower {
                shape: PowerShape::Real,
                ..
            } => Some(Unit::Watt),
            ClampPowerFactor { .. } | TicText { .. } => None,
            ClampIndex { .. } | TicIndex { .. } => Some(Unit::WattHour),
            TicValue { label, .. } if label == "PAPP" => Some(Unit::VoltAmpere),
            TicValue { .. } => Some(Unit::Ampere),
            ProbeTemperature { .. } => Some(Unit::Celsius),
        }
    }

    /// Reads and coerces the value of this sensor out of `doc`.
    pub fn extract(&self, doc: &Document) -> Extract<Reading> {
        use SensorKind::*;
        let path = self.path();
        let path = path.iter().map(String::as_str).collect::<Vec<_>>();
        let text = match doc.text(&path) {
            Some(text) => text,
            None => return Extract::Missing,
        };
        let invalid = || Extract::Invalid(text.to_string());

        match self {
            ClampCurrent { .. } | ClampIndex { .. } | ProbeTemperature { .. } => {
                match text.trim().parse::<f64>() {
                    Ok(val) => Extract::Value(Reading::Float(val)),
                    Err(_) => invalid(),
                }
            }
            MainVoltage | TicIndex { .. } | TicValue { .. } => match text.trim().parse::<i64>() {
                Ok(val) => Extract::Value(Reading::Int(val)),
                Err(_) => invalid(),
            },
            TicText { .. } => Extract::Value(Reading::Text(text.to_string())),
            ClampPower { shape, .. } => match parse_power(text) {
                Some(PowerValue::Apparent(va)) if *shape == PowerShape::Apparent => {
                    Extract::Value(Reading::Int(va))
                }
                Some(PowerValue::Real { watts, .. }) if *shape == PowerShape::Real => {
                    Extract::Value(Reading::Int(watts))
                }
                _ => invalid(),
            },
            ClampPowerFactor { .. } => match parse_power(text) {
                Some(PowerValue::Real { power_factor, .. }) => {
                    Extract::Value(Reading::Float(power_factor))
                }
                _ => invalid(),
            },
        }
    }
}

/// A sensor together with the last value it displayed.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    kind: SensorKind,
    unique_id: String,
    enabled: bool,
    available: bool,
    state: Option<Reading>,
}

impl SensorEntity {
    pub fn new(kind: SensorKind, serial: &str) -> Self {
        let unique_id = format!("{}{}_{}", ID_PREFIX, serial, kind.id_suffix());
        SensorEntity {
            kind,
            unique_id,
            enabled: true,
            available: false,
            state: None,
        }
    }

    /// Disabled sensors (a clamp switched off on the device) never become
    /// available.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn kind(&self) -> &SensorKind {
        &self.kind
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn unit(&self) -> Option<Unit> {
        self.kind.unit()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn state(&self) -> Option<&Reading> {
        self.state.as_ref()
    }

    /// Applies a new snapshot. A missing field makes the sensor unavailable; a
    /// field that cannot be coerced is logged and the previous value kept.
    /// Returns true if the displayed state changed.
    pub fn update(&mut self, doc: &Document) -> bool {
        if !self.enabled {
            let changed = self.available;
            self.available = false;
            return changed;
        }
        match self.kind.extract(doc) {
            Extract::Value(val) => {
                let changed = !self.available || self.state.as_ref() != Some(&val);
                self.available = true;
                self.state = Some(val);
                changed
            }
            Extract::Missing => {
                debug!("{}: field {:?} not found", self.unique_id, self.kind.path());
                let changed = self.available;
                self.available = false;
                changed
            }
            Extract::Invalid(raw) => {
                warn!(
                    "{}: cannot read {:?} as {}, keeping {:?}",
                    self.unique_id,
                    raw,
                    self.name(),
                    self.state
                );
                false
            }
        }
    }
}
