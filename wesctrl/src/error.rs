use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to open config file: {0}")]
    ConfigFileError(#[from] std::io::Error),
    #[error("unable to parse config file: {0}")]
    ConfigReadError(#[from] serde_yaml::Error),

    #[error("unable to parse duration: {0}")]
    DurationParseError(String),

    #[error("no WES host configured, use --host, WES_HOST or the config file")]
    MissingHost,
}

pub type Result<T> = std::result::Result<T, Error>;
