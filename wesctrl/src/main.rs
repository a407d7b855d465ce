#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use wesapi::api::DEFAULT_SENSOR_FILE;
use wesapi::ftp::PROVISIONED_SENSOR_FILE;
use wesapi::{WesClient, WesFtp};

mod config;
mod duration;
mod error;
mod list;
mod switch;
mod watch;

use config::Config;
use switch::{SwitchAction, SwitchTarget};

#[derive(Parser)]
#[clap(author, version, about)]
struct Args {
    #[clap(short, long, action)]
    verbose: bool,
    #[clap(short, long, help = "yaml config file")]
    config: Option<PathBuf>,
    #[clap(long, env = "WES_HOST", help = "address of the WES, e.g. 192.168.1.20")]
    host: Option<String>,
    #[clap(short, long, env = "WES_USER")]
    user: Option<String>,
    #[clap(short, long, env = "WES_PASSWORD")]
    password: Option<String>,
    #[clap(long, env = "WES_SENSOR_FILE", help = "status file polled on the device")]
    sensor_file: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Checks which access level the user has on the device.
    Probe,
    /// Prints serial, hardware and firmware of the device.
    Info,
    /// Reads the status file once and lists all sensors and switches.
    List,
    /// Polls the device and prints state changes.
    Watch {
        #[clap(long, help = "poll interval, e.g. \"0mins 30secs\"")]
        interval: Option<String>,
    },
    /// Turns a relay or virtual switch on or off.
    Switch {
        #[clap(value_enum)]
        target: SwitchTarget,
        number: u8,
        #[clap(long, action)]
        on: bool,
        #[clap(long, action)]
        off: bool,
        #[clap(long, action)]
        toggle: bool,
    },
    /// Restarts the device.
    Reset,
    /// Uploads the status file template over FTP.
    Provision {
        file: PathBuf,
        #[clap(long, help = "name on the device, defaults to wesctrl.cgx or the configured sensor file")]
        remote_name: Option<String>,
        #[clap(long, env = "WES_FTP_USER")]
        ftp_user: Option<String>,
        #[clap(long, env = "WES_FTP_PASSWORD")]
        ftp_password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        "info,wesapi=trace,wesctrl=debug,reqwest=debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::builder().parse_lossy(log_level))
        .with(tracing_forest::ForestLayer::default())
        .init();

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(file) => Config::from_yaml_file(file)?,
        None => Config::default(),
    };
    if let Some(host) = &args.host {
        config.host = Some(host.clone());
    }
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if let Some(sensor_file) = &args.sensor_file {
        config.sensor_file = sensor_file.clone();
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(&args)?;

    let client = WesClient::new(config.host()?, &config.user, &config.password)?
        .with_sensor_file(&config.sensor_file)
        .with_timeout(config.timeout);
    let client = Arc::new(client);

    match args.command {
        Command::Probe => {
            let access = client.probe_access_level().await;
            println!("{}", access);
        }
        Command::Info => {
            let identity = client.identify().await?.ok_or_else(|| {
                anyhow::anyhow!("Cannot read device identity from {}", client.base_url())
            })?;
            print!("{}", serde_yaml::to_string(&identity)?);
        }
        Command::List => list::list(&client).await?,
        Command::Watch { interval } => {
            if let Some(interval) = interval {
                config.poll_interval = duration::duration_parse(&interval)?;
            }
            watch::watch(client, &config).await?;
        }
        Command::Switch {
            target,
            number,
            on,
            off,
            toggle,
        } => {
            let kind = switch::switch_kind(target, number)?;
            let action = SwitchAction::from_flags(on, off, toggle)?;
            switch::switch(&client, kind, action).await?;
        }
        Command::Reset => {
            let identity = client.identify().await?.ok_or_else(|| {
                anyhow::anyhow!("Cannot read device identity from {}", client.base_url())
            })?;
            let button = wesapi::ResetButton::new(&identity.serial);
            if !button.press(&client).await {
                return Err(anyhow::anyhow!("{} failed", button.name()));
            }
            println!("{} restarting", identity);
        }
        Command::Provision {
            file,
            remote_name,
            ftp_user,
            ftp_password,
        } => {
            let ftp = WesFtp::new(
                config.host()?,
                ftp_user.unwrap_or_else(|| config.ftp.user.clone()),
                ftp_password.unwrap_or_else(|| config.ftp.password.clone()),
            )?;
            let remote_name = provision_target(&config, remote_name);
            let written =
                wesapi::ftp::provision(ftp, file, Some(remote_name.clone())).await?;
            println!("uploaded {} bytes as {}", written, remote_name);
            if remote_name != config.sensor_file {
                println!("set sensor_file: {} to poll it", remote_name);
            }
        }
    }

    Ok(())
}

/// Remote name for an uploaded status file. The stock status file of the
/// device is never overwritten unless asked for explicitly.
fn provision_target(config: &Config, remote_name: Option<String>) -> String {
    match remote_name {
        Some(name) => name,
        None if config.sensor_file.trim_start_matches('/') == DEFAULT_SENSOR_FILE => PROVISIONED_SENSOR_FILE.to_string(),
        None => config.sensor_file.clone(),
    }
}
