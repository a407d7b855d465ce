use wesapi::{SwitchEntity, SwitchKind, WesClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SwitchTarget {
    Relay,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchAction {
    On,
    Off,
    Toggle,
}

impl SwitchAction {
    pub fn from_flags(on: bool, off: bool, toggle: bool) -> anyhow::Result<Self> {
        match (on, off, toggle) {
            (true, false, false) => Ok(SwitchAction::On),
            (false, true, false) => Ok(SwitchAction::Off),
            (false, false, true) => Ok(SwitchAction::Toggle),
            _ => Err(anyhow::anyhow!(
                "Use exactly one of --on, --off or --toggle"
            )),
        }
    }
}

pub fn switch_kind(target: SwitchTarget, number: u8) -> anyhow::Result<SwitchKind> {
    let (kind, max) = match target {
        SwitchTarget::Relay => (SwitchKind::Relay(number), wesapi::entities::RELAYS),
        SwitchTarget::Virtual => (
            SwitchKind::Virtual(number),
            wesapi::entities::VIRTUAL_SWITCHES,
        ),
    };
    if number == 0 || number > max {
        return Err(anyhow::anyhow!(
            "{:?} number must be between 1 and {}, got {}",
            target,
            max,
            number
        ));
    }
    Ok(kind)
}

pub(crate) async fn switch(
    client: &WesClient,
    kind: SwitchKind,
    action: SwitchAction,
) -> anyhow::Result<()> {
    let identity = client
        .identify()
        .await?
        .ok_or_else(|| anyhow::anyhow!("Cannot read device identity from {}", client.base_url()))?;

    let access = client.probe_access_level().await;
    if !access.is_admin() {
        warn!("user {:?} has {} access, the device may refuse the command", client.user(), access);
    }

    let mut switch = SwitchEntity::new(kind, &identity.serial);
    match client.fetch_sensor_snapshot().await {
        Ok(Some(snapshot)) => {
            switch.update(&snapshot);
        }
        Ok(None) => warn!("no current state for {}", switch.name()),
        Err(err) => warn!("no current state for {}: {}", switch.name(), err),
    }

    let ok = match action {
        SwitchAction::On => switch.turn_on(client).await,
        SwitchAction::Off => switch.turn_off(client).await,
        SwitchAction::Toggle => switch.toggle(client).await,
    };

    if !ok {
        return Err(anyhow::anyhow!("Device did not accept the command for {}", switch.name()));
    }

    println!(
        "{} is {}",
        switch.name(),
        if switch.is_on() { "on" } else { "off" }
    );

    Ok(())
}
