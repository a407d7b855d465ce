use std::sync::Arc;

use chrono::Local;
use wesapi::{AccessLevel, DeviceIdentity, Entities, Poller, Snapshot, WesClient};

use crate::{config::Config, duration::duration_pretty, list::sensor_state};

/// Polls the device and prints every entity whose state changed, until ctrl-c.
pub(crate) async fn watch(client: Arc<WesClient>, config: &Config) -> anyhow::Result<()> {
    let identity = client
        .identify()
        .await?
        .ok_or_else(|| anyhow::anyhow!("Cannot read device identity from {}", client.base_url()))?;
    let access = client.probe_access_level().await;
    info!("watching {} ({} access)", identity, access);

    let poller = Poller::new(client)
        .with_interval(config.poll_interval)
        .with_timeout(config.timeout);
    let mut rx = poller.subscribe();

    info!(
        "polling every {}, press ctrl-c to stop",
        duration_pretty(config.poll_interval)
    );

    let printer = async move {
        let mut entities: Option<Entities> = None;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(snapshot) = snapshot {
                print_changes(&mut entities, &snapshot, &identity, access);
            }
        }
    };

    tokio::select! {
        _ = poller.run() => {}
        _ = printer => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("stopping");
        }
    }

    Ok(())
}

fn print_changes(
    entities: &mut Option<Entities>,
    snapshot: &Snapshot,
    identity: &DeviceIdentity,
    access: AccessLevel,
) {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");

    if entities.is_none() {
        let discovered = Entities::discover(snapshot, identity, access);
        info!(
            "discovered {} sensors and {} switches",
            discovered.sensors.len(),
            discovered.switches.len()
        );
        for sensor in &discovered.sensors {
            println!("[{}] {}: {}", now, sensor.name(), sensor_state(sensor));
        }
        for switch in &discovered.switches {
            println!("[{}] {}: {}", now, switch.name(), on_off(switch.is_on()));
        }
        *entities = Some(discovered);
        return;
    }
    let entities = match entities.as_mut() {
        Some(entities) => entities,
        None => return,
    };

    let changed = entities.update(snapshot);
    for sensor in &entities.sensors {
        if changed.iter().any(|id| id == sensor.unique_id()) {
            println!("[{}] {}: {}", now, sensor.name(), sensor_state(sensor));
        }
    }
    for switch in &entities.switches {
        if changed.iter().any(|id| id == switch.unique_id()) {
            println!("[{}] {}: {}", now, switch.name(), on_off(switch.is_on()));
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
