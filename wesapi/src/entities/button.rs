use super::ID_PREFIX;
use crate::client::WesClient;

/// Restarts the device.
#[derive(Debug, Clone)]
pub struct ResetButton {
    unique_id: String,
}

impl ResetButton {
    pub fn new(serial: &str) -> Self {
        ResetButton {
            unique_id: format!("{}{}_reset", ID_PREFIX, serial),
        }
    }

    pub fn name(&self) -> &'static str {
        "WES reset"
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub async fn press(&self, client: &WesClient) -> bool {
        debug!("reset WES server");
        client.reset().await
    }
}
