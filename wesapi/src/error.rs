#[derive(thiserror::Error, Debug)]
pub enum WesError {
    #[error("http request failed: `{0}`")]
    Http(#[from] reqwest::Error),

    #[error("cannot parse xml: `{0}`")]
    XmlParse(#[from] xml::reader::Error),

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("ftp error: `{0}`")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("io error: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("request did not complete within {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, WesError>;
