use super::ID_PREFIX;
use crate::client::WesClient;
use crate::wes_xml::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    /// One of the two physical relays.
    Relay(u8),
    /// One of the 24 virtual switches usable by the device's programs.
    Virtual(u8),
}

impl SwitchKind {
    pub fn path(&self) -> Vec<String> {
        match self {
            SwitchKind::Relay(n) => vec![
                "relays".to_string(),
                format!("relay{}", n),
                "enabled".to_string(),
            ],
            SwitchKind::Virtual(n) => vec!["virtual_switch".to_string(), format!("switch{}", n)],
        }
    }

    pub fn name(&self) -> String {
        match self {
            SwitchKind::Relay(n) => format!("relay{}", n),
            SwitchKind::Virtual(n) => format!("virtual switch{}", n),
        }
    }

    fn id_suffix(&self) -> String {
        match self {
            SwitchKind::Relay(n) => format!("relay{}", n),
            SwitchKind::Virtual(n) => format!("virtual_switch{}", n),
        }
    }

    /// `"1"` is on, anything else (including a missing field) is off.
    pub fn is_on(&self, doc: &Document) -> bool {
        let path = self.path();
        let path = path.iter().map(String::as_str).collect::<Vec<_>>();
        match doc.text(&path) {
            Some(state) => state == "1",
            None => {
                debug!("no state for {}, assuming off", self.name());
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchEntity {
    kind: SwitchKind,
    unique_id: String,
    on: bool,
}

impl SwitchEntity {
    pub fn new(kind: SwitchKind, serial: &str) -> Self {
        SwitchEntity {
            kind,
            unique_id: format!("{}{}_{}", ID_PREFIX, serial, kind.id_suffix()),
            on: false,
        }
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Returns true if the state changed.
    pub fn update(&mut self, doc: &Document) -> bool {
        let on = self.kind.is_on(doc);
        let changed = on != self.on;
        self.on = on;
        changed
    }

    pub async fn turn_on(&mut self, client: &WesClient) -> bool {
        self.set(client, true).await
    }

    pub async fn turn_off(&mut self, client: &WesClient) -> bool {
        self.set(client, false).await
    }

    /// Flips the switch on the device; the expected state only follows if
    /// the device accepted the command.
    pub async fn toggle(&mut self, client: &WesClient) -> bool {
        debug!("toggle {}", self.unique_id);
        let ok = match self.kind {
            SwitchKind::Relay(n) => client.toggle_relay(n).await,
            SwitchKind::Virtual(n) => client.toggle_virtual(n).await,
        };
        if ok {
            self.on = !self.on;
        }
        ok
    }

    async fn set(&mut self, client: &WesClient, on: bool) -> bool {
        debug!("turn {} {}", self.unique_id, if on { "on" } else { "off" });
        let ok = match self.kind {
            SwitchKind::Relay(n) => client.switch_relay(n, on).await,
            SwitchKind::Virtual(n) => client.switch_virtual(n, on).await,
        };
        if ok {
            self.on = on;
        }
        ok
    }
}
