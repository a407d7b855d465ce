use prettytable::{format, Cell, Row, Table};
use wesapi::{Entities, SensorEntity, WesClient};

pub(crate) async fn list(client: &WesClient) -> anyhow::Result<()> {
    let identity = client
        .identify()
        .await?
        .ok_or_else(|| anyhow::anyhow!("Cannot read device identity from {}", client.base_url()))?;
    let access = client.probe_access_level().await;
    let snapshot = client
        .fetch_sensor_snapshot()
        .await?
        .ok_or_else(|| anyhow::anyhow!("Cannot read {} from the device", client.sensor_file()))?;

    let entities = Entities::discover(&snapshot, &identity, access);
    info!(
        "found {} sensors and {} switches",
        entities.sensors.len(),
        entities.switches.len()
    );

    println!("{} (access: {})", identity, access);
    print_sensor_table(&entities.sensors);
    if !entities.switches.is_empty() {
        println!();
        print_switch_table(&entities);
    }

    Ok(())
}

pub(crate) fn create_table() -> Table {
    let mut table = Table::new();
    let fmt = format::FormatBuilder::new()
        .padding(1, 1)
        .separator(
            format::LinePosition::Title,
            format::LineSeparator::new('-', '+', '+', '+'),
        )
        .column_separator('|')
        .build();
    table.set_format(fmt);
    table
}

/// Value and unit of a sensor, or "unavailable".
pub(crate) fn sensor_state(sensor: &SensorEntity) -> String {
    match sensor.state().filter(|_| sensor.is_available()) {
        Some(state) => match sensor.unit() {
            Some(unit) => format!("{} {}", state, unit),
            None => state.to_string(),
        },
        None => "unavailable".to_string(),
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

fn print_sensor_table(sensors: &[SensorEntity]) {
    let mut table = create_table();
    table.set_titles(Row::new(vec![
        Cell::new_align("id", format::Alignment::CENTER),
        Cell::new_align("name", format::Alignment::CENTER),
        Cell::new_align("state", format::Alignment::CENTER),
    ]));

    for sensor in sensors {
        table.add_row(Row::new(vec![
            Cell::new(sensor.unique_id()),
            Cell::new(&sensor.name()),
            Cell::new_align(&sensor_state(sensor), format::Alignment::RIGHT),
        ]));
    }
    table.printstd();
}

fn print_switch_table(entities: &Entities) {
    let mut table = create_table();
    table.set_titles(Row::new(vec![
        Cell::new_align("id", format::Alignment::CENTER),
        Cell::new_align("name", format::Alignment::CENTER),
        Cell::new_align("state", format::Alignment::CENTER),
    ]));

    for switch in &entities.switches {
        table.add_row(Row::new(vec![
            Cell::new(switch.unique_id()),
            Cell::new(&switch.name()),
            Cell::new(if switch.is_on() { "on" } else { "off" }),
        ]));
    }
    table.add_row(Row::new(vec![
        Cell::new(entities.reset.unique_id()),
        Cell::new(entities.reset.name()),
        Cell::new("-"),
    ]));
    table.printstd();
}

#[cfg(test)]
mod tests {
    use super::*;
    use wesapi::{wes_xml, SensorKind};

    #[test]
    fn state_column() {
        let doc =
            wes_xml::parse_status_document(&b"<data><probes><probe1>19.5</probe1></probes></data>"[..])
                .unwrap();
        let mut sensor = SensorEntity::new(SensorKind::ProbeTemperature { probe: 1 }, "AB12");
        assert_eq!(sensor_state(&sensor), "unavailable");
        sensor.update(&doc);
        assert_eq!(sensor_state(&sensor), "19.5 °C");

        let mut disabled = SensorEntity::new(SensorKind::ProbeTemperature { probe: 1 }, "AB12")
            .with_enabled(false);
        disabled.update(&doc);
        assert_eq!(sensor_state(&disabled), "unavailable");
    }
}
