//! One-time provisioning of a WES: the status file template is uploaded over
//! FTP, with credentials separate from the web user.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use suppaftp::types::FileType;
use suppaftp::FtpStream;

use crate::api;
use crate::error::{Result, WesError};

pub const DEFAULT_FTP_USER: &str = "adminftp";
pub const DEFAULT_FTP_PASSWORD: &str = "wesftp";
pub const FTP_PORT: u16 = 21;

/// Name a provisioned status file gets on the device, next to the stock
/// `DATA.cgx`.
pub const PROVISIONED_SENSOR_FILE: &str = "wesctrl.cgx";

pub struct WesFtp {
    host: String,
    port: u16,
    user: String,
    password: String,
    stream: Option<FtpStream>,
}

impl WesFtp {
    /// `host` is the same value used for the web client; a scheme or port in
    /// it is ignored.
    pub fn new(host: &str, user: impl ToString, password: impl ToString) -> Result<Self> {
        let url = api::base_url(host)?;
        let host = url
            .host_str()
            .ok_or_else(|| WesError::InvalidUrl {
                url: host.to_string(),
                reason: "no host".to_string(),
            })?
            .to_string();
        Ok(WesFtp {
            host,
            port: FTP_PORT,
            user: user.to_string(),
            password: password.to_string(),
            stream: None,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Stores `reader` as `remote_name` on the device. Connects and logs in on
    /// first use.
    pub fn upload(&mut self, reader: &mut impl Read, remote_name: &str) -> Result<u64> {
        let stream = self.stream()?;
        stream.transfer_type(FileType::Binary)?;
        let written = stream.put_file(remote_name, reader)?;
        info!(
            "[wes ftp] stored {} ({} bytes) on {}",
            remote_name, written, self.host
        );
        Ok(written)
    }

    /// Uploads a local file. Without `remote_name` the local file name is used.
    pub fn upload_file(&mut self, path: impl AsRef<Path>, remote_name: Option<&str>) -> Result<u64> {
        let path = path.as_ref();
        let remote_name = match remote_name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{:?} has no file name", path),
                    )
                })?,
        };
        let mut file = File::open(path)?;
        self.upload(&mut file, &remote_name)
    }

    pub fn quit(mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.quit()?;
        }
        Ok(())
    }

    fn stream(&mut self) -> Result<&mut FtpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                debug!("[wes ftp] connecting to {}:{}", self.host, self.port);
                let mut stream = FtpStream::connect((self.host.as_str(), self.port))?;
                stream.login(&self.user, &self.password)?;
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }
}

/// Uploads `path` once and closes the session, on a blocking thread so it can
/// be called from async code.
pub async fn provision(
    ftp: WesFtp,
    path: impl Into<PathBuf>,
    remote_name: Option<String>,
) -> Result<u64> {
    let path = path.into();
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut ftp = ftp;
        let written = ftp.upload_file(&path, remote_name.as_deref())?;
        ftp.quit()?;
        Ok(written)
    })
    .await
    .map_err(|err| WesError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Minimal passive-mode FTP server accepting a single upload. Returns the
    /// control port and a handle yielding the received commands and bytes.
    fn fake_server() -> (u16, JoinHandle<(Vec<String>, Vec<u8>)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (control, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(control.try_clone().unwrap());
            let mut writer = control;
            writer.write_all(b"220 WES FTP\r\n").unwrap();

            let data_listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let data_port = data_listener.local_addr().unwrap().port();
            let mut commands = Vec::new();
            let mut received = Vec::new();
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                let cmd = line.trim_end().to_string();
                line.clear();
                let verb = cmd.split(' ').next().unwrap_or_default().to_string();
                commands.push(cmd);
                let reply = match verb.as_str() {
                    "USER" => "331 password required".to_string(),
                    "PASS" => "230 logged in".to_string(),
                    "TYPE" => "200 type set".to_string(),
                    "PASV" => format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        data_port >> 8,
                        data_port & 0xff
                    ),
                    "STOR" => {
                        writer.write_all(b"150 opening data connection\r\n").unwrap();
                        let (mut data, _) = data_listener.accept().unwrap();
                        data.read_to_end(&mut received).unwrap();
                        "226 transfer complete".to_string()
                    }
                    "QUIT" => {
                        writer.write_all(b"221 bye\r\n").unwrap();
                        break;
                    }
                    _ => "502 not implemented".to_string(),
                };
                writer.write_all(format!("{}\r\n", reply).as_bytes()).unwrap();
            }
            (commands, received)
        });
        (port, handle)
    }

    #[test]
    fn host_from_web_address() {
        let ftp = WesFtp::new("http://192.168.1.20:8080/", "adminftp", "wesftp").unwrap();
        assert_eq!(ftp.host(), "192.168.1.20");
        let ftp = WesFtp::new("wes.local", "adminftp", "wesftp").unwrap();
        assert_eq!(ftp.host(), "wes.local");
    }

    #[test]
    fn upload() {
        let (port, server) = fake_server();
        let mut ftp = WesFtp::new("127.0.0.1", DEFAULT_FTP_USER, DEFAULT_FTP_PASSWORD)
            .unwrap()
            .with_port(port);
        let written = ftp
            .upload(&mut &b"t <data>\r\n"[..], "wesctrl.cgx")
            .unwrap();
        assert_eq!(written, 10);
        ftp.quit().unwrap();

        let (commands, received) = server.join().unwrap();
        assert_eq!(received, b"t <data>\r\n");
        assert!(commands.contains(&"USER adminftp".to_string()));
        assert!(commands.contains(&"PASS wesftp".to_string()));
        assert!(commands.contains(&"STOR wesctrl.cgx".to_string()));
    }

    #[tokio::test]
    async fn provision_local_file() {
        let path = std::env::temp_dir().join(format!("wesapi-provision-{}.cgx", std::process::id()));
        std::fs::write(&path, b"<data></data>").unwrap();

        let (port, server) = fake_server();
        let ftp = WesFtp::new("127.0.0.1", "adminftp", "wesftp")
            .unwrap()
            .with_port(port);
        let written = provision(ftp, &path, None).await.unwrap();
        assert_eq!(written, 13);

        let (commands, received) = server.join().unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(received, b"<data></data>");
        let file_name = path.file_name().unwrap().to_string_lossy();
        assert!(commands.contains(&format!("STOR {}", file_name)));
    }

    #[test]
    fn connection_refused() {
        let mut ftp = WesFtp::new("127.0.0.1", "adminftp", "wesftp")
            .unwrap()
            .with_port(1);
        assert!(ftp.upload(&mut &b"x"[..], "x.cgx").is_err());
    }
}
