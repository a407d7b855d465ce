use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};

use crate::api::{self, Command};
use crate::devices::{AccessLevel, DeviceIdentity};
use crate::error::{Result, WesError};
use crate::wes_xml::{self, Document};

/// The main interface to get data from a WES and to send it commands.
///
/// The client is cheap to share behind an `Arc`: every request is independent,
/// the only state it keeps is the access level and the device identity, both
/// written at most once.
#[derive(Debug)]
pub struct WesClient {
    http: Client,
    base: Url,
    user: String,
    password: String,
    sensor_file: String,
    timeout: Duration,
    access: OnceLock<AccessLevel>,
    identity: OnceLock<DeviceIdentity>,
}

impl WesClient {
    /// `host` may be a bare host name (`192.168.1.20`, `wes.local:8080`) or
    /// an `http://` url.
    pub fn new(host: &str, user: impl ToString, password: impl ToString) -> Result<Self> {
        Ok(WesClient {
            // the WES lives on the local network
            http: Client::builder().no_proxy().build()?,
            base: api::base_url(host)?,
            user: user.to_string(),
            password: password.to_string(),
            sensor_file: api::DEFAULT_SENSOR_FILE.to_string(),
            timeout: api::DEFAULT_TIMEOUT,
            access: OnceLock::new(),
            identity: OnceLock::new(),
        })
    }

    /// Reuse an existing http client (connection pool) instead of a private one.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Status file polled by [`WesClient::fetch_sensor_snapshot`], relative to
    /// the device root. A leading `/` is optional.
    pub fn with_sensor_file(mut self, file: impl AsRef<str>) -> Self {
        self.sensor_file = file.as_ref().trim_start_matches('/').to_string();
        self
    }

    /// Upper bound for every request, from connecting to the end of the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn sensor_file(&self) -> &str {
        &self.sensor_file
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    /// GETs `path` and decodes it as a status document.
    ///
    /// Returns `Ok(None)` when the device answers with anything but 200: the
    /// caller should treat that as "no update this cycle". Transport errors and
    /// malformed XML are returned as errors.
    pub async fn fetch_status_document(&self, path: &str) -> Result<Option<Document>> {
        let url = api::resolve(&self.base, path)?;
        let response = self.get(url.clone(), &[]).await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                "[wes api] unable to retrieve {} status: {:?} {:?}",
                url,
                status,
                status.canonical_reason().unwrap_or_default()
            );
            return Ok(None);
        }

        let body = response.bytes().await?;
        let doc = wes_xml::parse_status_document(body.as_ref()).map_err(|err| {
            warn!("[wes api] cannot parse {}: {}", url, err);
            err
        })?;
        trace!("[wes api] retrieved {:?}", doc);
        Ok(Some(doc))
    }

    /// Fetches the configured status file.
    pub async fn fetch_sensor_snapshot(&self) -> Result<Option<Document>> {
        let path = if self.sensor_file.contains("://") {
            self.sensor_file.clone()
        } else {
            format!("/{}", self.sensor_file)
        };
        self.fetch_status_document(&path).await
    }

    /// Reads the identity of the device from the status file. Once read, the
    /// identity is kept for the lifetime of the client.
    pub async fn identify(&self) -> Result<Option<DeviceIdentity>> {
        if let Some(identity) = self.identity.get() {
            return Ok(Some(identity.clone()));
        }
        let doc = match self.fetch_sensor_snapshot().await? {
            Some(doc) => doc,
            None => return Ok(None),
        };
        match DeviceIdentity::from_document(&doc) {
            Some(identity) => Ok(Some(self.identity.get_or_init(|| identity).clone())),
            None => {
                warn!("[wes api] unable to read the device identity, info section incomplete");
                Ok(None)
            }
        }
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.get()
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    /// Sends raw query parameters to `AJAX.CGX`. True only if the device
    /// answered 200.
    pub async fn send_command(&self, params: &[(String, String)]) -> bool {
        match self.command_status(params).await {
            Ok(StatusCode::OK) => true,
            Ok(status) => {
                warn!("[wes api] command {:?} rejected, status {}", params, status);
                false
            }
            Err(err) => {
                warn!("[wes api] command {:?} failed: {}", params, err);
                false
            }
        }
    }

    pub async fn command(&self, cmd: Command) -> bool {
        debug!("[wes api] command {}", cmd);
        self.send_command(&cmd.params()).await
    }

    pub async fn switch_relay(&self, relay: u8, on: bool) -> bool {
        self.command(Command::SetRelay { relay, on }).await
    }

    pub async fn toggle_relay(&self, relay: u8) -> bool {
        self.command(Command::ToggleRelay { relay }).await
    }

    pub async fn switch_virtual(&self, switch: u8, on: bool) -> bool {
        self.command(Command::SetVirtualSwitch { switch, on }).await
    }

    pub async fn toggle_virtual(&self, switch: u8) -> bool {
        self.command(Command::ToggleVirtualSwitch { switch }).await
    }

    /// Reboots the device. The WES tends to drop the connection instead of
    /// answering, a reset connection right after the request counts as success.
    pub async fn reset(&self) -> bool {
        info!("[wes api] resetting {}", self.base);
        match self.command_status(&Command::Reset.params()).await {
            Ok(StatusCode::OK) => true,
            Ok(status) => {
                warn!("[wes api] reset rejected, status {}", status);
                false
            }
            Err(WesError::Http(err)) if is_connection_reset(&err) => {
                debug!("[wes api] connection dropped after reset: {}", err);
                true
            }
            Err(err) => {
                warn!("[wes api] reset failed: {}", err);
                false
            }
        }
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    /// Determines whether the configured user is admin. The first conclusive
    /// answer is cached, later calls never hit the device again.
    pub async fn probe_access_level(&self) -> AccessLevel {
        if let Some(level) = self.access.get() {
            return *level;
        }

        let level = match self.probe_status(api::USER_ADMIN_CHECK_URL).await {
            Some(StatusCode::FORBIDDEN) => {
                info!("[wes api] user {:?} is not admin", self.user);
                match self.probe_status(api::USER_READONLY_CHECK_URL).await {
                    Some(status) if status.is_success() => Some(AccessLevel::ReadOnly),
                    _ => None,
                }
            }
            Some(status) if status.is_success() => Some(AccessLevel::Admin),
            _ => None,
        };

        match level {
            Some(level) => *self.access.get_or_init(|| level),
            None => AccessLevel::Unknown,
        }
    }

    /// The cached access level, if a probe already succeeded.
    pub fn access_level(&self) -> Option<AccessLevel> {
        self.access.get().copied()
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    async fn get(&self, url: Url, params: &[(String, String)]) -> Result<Response> {
        let mut request = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .basic_auth(&self.user, Some(&self.password));
        if !params.is_empty() {
            request = request.query(params);
        }
        let response = request.send().await?;
        let status = response.status();
        debug!(
            "[wes api] GET {} status: {:?} {:?}",
            url,
            status,
            status.canonical_reason().unwrap_or_default()
        );
        Ok(response)
    }

    async fn command_status(&self, params: &[(String, String)]) -> Result<StatusCode> {
        let url = api::resolve(&self.base, api::AJAX_URL)?;
        let response = self.get(url, params).await?;
        Ok(response.status())
    }

    async fn probe_status(&self, path: &str) -> Option<StatusCode> {
        let url = match api::resolve(&self.base, path) {
            Ok(url) => url,
            Err(err) => {
                warn!("[wes api] {}", err);
                return None;
            }
        };
        match self.get(url, &[]).await {
            Ok(response) => Some(response.status()),
            Err(err) => {
                warn!("[wes api] access probe {} failed: {}", path, err);
                None
            }
        }
    }
}

/// True if `err` was caused by the peer resetting or closing the connection
/// before sending a response.
fn is_connection_reset(err: &reqwest::Error) -> bool {
    use std::io::ErrorKind;

    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tracing_test::traced_test;

    /// base64 of `admin:wes`
    const AUTH: &str = "Basic YWRtaW46d2Vz";

    const STATUS: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<data>
  <info><serial>0123456789AB</serial><hardware>3</hardware><firmware>V0.84A</firmware></info>
  <clamps><V>230</V></clamps>
</data>"##;

    fn client(server: &Server) -> WesClient {
        WesClient::new(&server.url(), "admin", "wes").unwrap()
    }

    #[tokio::test]
    async fn fetch_status_document() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/DATA.cgx")
            .match_header("authorization", AUTH)
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(STATUS)
            .create_async()
            .await;

        let doc = client(&server)
            .fetch_sensor_snapshot()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.text(&["clamps", "V"]), Some("230"));
        assert_eq!(doc.text(&["info", "serial"]), Some("0123456789AB"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn configured_sensor_file() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/homeassistant.cgx")
            .with_status(200)
            .with_body("<clamps><V>231</V></clamps>")
            .create_async()
            .await;

        let client = client(&server).with_sensor_file("/homeassistant.cgx");
        assert_eq!(client.sensor_file(), "homeassistant.cgx");
        let doc = client.fetch_sensor_snapshot().await.unwrap().unwrap();
        assert_eq!(doc.text(&["clamps", "V"]), Some("231"));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn non_200_is_no_update() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/DATA.cgx")
            .with_status(401)
            .create_async()
            .await;

        let result = client(&server).fetch_sensor_snapshot().await.unwrap();
        assert!(result.is_none());
        assert!(logs_contain("unable to retrieve"));
    }

    #[tokio::test]
    async fn malformed_xml_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/DATA.cgx")
            .with_status(200)
            .with_body("<data><clamps></data>")
            .create_async()
            .await;

        let result = client(&server).fetch_sensor_snapshot().await;
        assert!(matches!(result, Err(WesError::XmlParse(_))));
    }

    #[tokio::test]
    async fn transport_error() {
        let client = WesClient::new("127.0.0.1:1", "admin", "wes").unwrap();
        let result = client.fetch_sensor_snapshot().await;
        assert!(matches!(result, Err(WesError::Http(_))));
    }

    #[tokio::test]
    async fn identify() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/DATA.cgx")
            .with_status(200)
            .with_body(STATUS)
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        assert!(client.identity().is_none());
        let identity = client.identify().await.unwrap().unwrap();
        assert_eq!(identity.serial, "0123456789AB");
        assert_eq!(identity.firmware, "V0.84A");
        // cached
        assert_eq!(client.identify().await.unwrap(), Some(identity));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn switch_relay() {
        let mut server = Server::new_async().await;
        let on = server
            .mock("GET", "/AJAX.CGX")
            .match_header("authorization", AUTH)
            .match_query(Matcher::UrlEncoded("rl1".into(), "ON".into()))
            .with_status(200)
            .create_async()
            .await;
        let toggle = server
            .mock("GET", "/AJAX.CGX")
            .match_query(Matcher::UrlEncoded("frl".into(), "2".into()))
            .with_status(500)
            .create_async()
            .await;

        let client = client(&server);
        assert!(client.switch_relay(1, true).await);
        assert!(!client.toggle_relay(2).await);
        on.assert_async().await;
        toggle.assert_async().await;
    }

    #[tokio::test]
    async fn virtual_switch_commands() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/AJAX.CGX")
            .match_query(Matcher::UrlEncoded("vs7".into(), "OFF".into()))
            .with_status(200)
            .create_async()
            .await;

        assert!(client(&server).switch_virtual(7, false).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn command_transport_error_is_false() {
        let client = WesClient::new("127.0.0.1:1", "admin", "wes").unwrap();
        assert!(!client.switch_relay(1, true).await);
        assert!(!client.reset().await);
    }

    #[tokio::test]
    async fn access_level_read_only_is_cached() {
        let mut server = Server::new_async().await;
        let admin = server
            .mock("GET", "/INFOCFG.HTM")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;
        let read_only = server
            .mock("GET", "/index.htm")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(client.access_level(), None);
        assert_eq!(client.probe_access_level().await, AccessLevel::ReadOnly);
        assert_eq!(client.probe_access_level().await, AccessLevel::ReadOnly);
        assert_eq!(client.access_level(), Some(AccessLevel::ReadOnly));
        admin.assert_async().await;
        read_only.assert_async().await;
    }

    #[tokio::test]
    async fn access_level_admin() {
        let mut server = Server::new_async().await;
        let admin = server
            .mock("GET", "/INFOCFG.HTM")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(client.probe_access_level().await, AccessLevel::Admin);
        assert_eq!(client.probe_access_level().await, AccessLevel::Admin);
        admin.assert_async().await;
    }

    #[tokio::test]
    async fn access_level_unknown_is_probed_again() {
        let mut server = Server::new_async().await;
        let admin = server
            .mock("GET", "/INFOCFG.HTM")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(client.probe_access_level().await, AccessLevel::Unknown);
        assert_eq!(client.probe_access_level().await, AccessLevel::Unknown);
        assert_eq!(client.access_level(), None);
        admin.assert_async().await;
    }

    #[tokio::test]
    async fn reset_ok() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/AJAX.CGX")
            .match_query(Matcher::UrlEncoded("reset".into(), "yes".into()))
            .with_status(200)
            .create_async()
            .await;

        assert!(client(&server).reset().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reset_connection_dropped_is_success() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        });

        let client = WesClient::new(&format!("http://{}", addr), "admin", "wes").unwrap();
        assert!(client.reset().await);
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let client = WesClient::new(&format!("http://{}", addr), "admin", "wes")
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let bound = Duration::from_secs(5);

        let switched = tokio::time::timeout(bound, client.switch_relay(1, true)).await;
        assert_eq!(switched, Ok(false));
        let reset = tokio::time::timeout(bound, client.reset()).await;
        assert_eq!(reset, Ok(false));
        let access = tokio::time::timeout(bound, client.probe_access_level()).await;
        assert_eq!(access, Ok(AccessLevel::Unknown));
        match tokio::time::timeout(bound, client.identify()).await {
            Ok(Err(WesError::Http(err))) => assert!(err.is_timeout()),
            other => panic!("expected a request timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reset_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/AJAX.CGX")
            .match_query(Matcher::UrlEncoded("reset".into(), "yes".into()))
            .with_status(403)
            .create_async()
            .await;

        assert!(!client(&server).reset().await);
    }
}
