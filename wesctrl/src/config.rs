use std::{io::Read, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use wesapi::{api::DEFAULT_SENSOR_FILE, ftp, poller};

use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: Option<String>,
    pub user: String,
    pub password: String,
    pub sensor_file: String,
    #[serde(with = "crate::duration")]
    pub poll_interval: Duration,
    #[serde(with = "crate::duration")]
    pub timeout: Duration,
    pub ftp: FtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: None,
            user: "admin".to_string(),
            password: "wes".to_string(),
            sensor_file: DEFAULT_SENSOR_FILE.to_string(),
            poll_interval: poller::DEFAULT_INTERVAL,
            timeout: poller::DEFAULT_TIMEOUT,
            ftp: FtpConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpConfig {
    pub user: String,
    pub password: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        FtpConfig {
            user: ftp::DEFAULT_FTP_USER.to_string(),
            password: ftp::DEFAULT_FTP_PASSWORD.to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_file(p: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(p)?;
        Self::from_yaml(f)
    }

    pub fn from_yaml(yaml_reader: impl Read) -> Result<Self> {
        Ok(serde_yaml::from_reader(yaml_reader)?)
    }

    pub fn from_string(s: impl ToString) -> Result<Self> {
        Config::from_yaml(s.to_string().as_bytes())
    }

    pub fn host(&self) -> Result<&str> {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => Ok(host),
            _ => Err(Error::MissingHost),
        }
    }
}
