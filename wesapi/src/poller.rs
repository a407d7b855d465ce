use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::api;
use crate::client::WesClient;
use crate::error::{Result, WesError};
use crate::wes_xml::Document;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = api::DEFAULT_TIMEOUT;

/// One successfully decoded poll. Shared read-only between the poller and
/// its subscribers.
pub type Snapshot = Arc<Document>;

/// Polls the status file of one device at a fixed interval and publishes the
/// latest snapshot.
///
/// A cycle that fails (transport error, non-200, bad XML, timeout) is logged
/// and leaves the previous snapshot in place. Cycles never overlap: the next
/// tick only starts once the current fetch returned or timed out.
pub struct Poller {
    client: Arc<WesClient>,
    interval: Duration,
    timeout: Duration,
    tx: watch::Sender<Option<Snapshot>>,
}

impl Poller {
    pub fn new(client: Arc<WesClient>) -> Self {
        let (tx, _) = watch::channel(None);
        Poller {
            client,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            tx,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &Arc<WesClient> {
        &self.client
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Runs one poll cycle. Returns true if a new snapshot was published.
    pub async fn refresh(&self) -> bool {
        match self.fetch().await {
            Ok(Some(doc)) => {
                self.tx.send_replace(Some(Arc::new(doc)));
                true
            }
            Ok(None) => {
                warn!("[wes poller] no data this cycle, keeping previous snapshot");
                false
            }
            Err(err) => {
                warn!("[wes poller] {}, keeping previous snapshot", err);
                false
            }
        }
    }

    /// Polls forever.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "[wes poller] polling {} every {:?}",
            self.client.base_url(),
            self.interval
        );
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }

    async fn fetch(&self) -> Result<Option<Document>> {
        tokio::time::timeout(self.timeout, self.client.fetch_sensor_snapshot())
            .await
            .map_err(|_| WesError::Timeout(self.timeout))?
    }
}
