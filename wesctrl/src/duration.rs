use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

pub fn duration_pretty(d: Duration) -> String {
    let seconds = d.as_secs();
    format!("{}mins {}secs", seconds / 60, seconds % 60)
}

/// Parses `"1mins 30secs"`, `"10secs"` or `"2mins"`.
pub fn duration_parse(s: &str) -> Result<Duration, Error> {
    let mut seconds = 0;
    let mut parts = 0;

    for part in s.split_whitespace() {
        parts += 1;
        if let Some(minutes) = part.strip_suffix("mins") {
            seconds += minutes
                .parse::<u64>()
                .map_err(|_| Error::DurationParseError(format!("unable to parse minutes in {s:?}")))?
                * 60;
        } else if let Some(secs) = part.strip_suffix("secs") {
            seconds += secs
                .parse::<u64>()
                .map_err(|_| Error::DurationParseError(format!("unable to parse seconds in {s:?}")))?;
        } else {
            return Err(Error::DurationParseError(format!(
                "unable to parse duration from {s:?}"
            )));
        }
    }

    if parts == 0 {
        return Err(Error::DurationParseError("empty duration".to_string()));
    }

    Ok(Duration::from_secs(seconds))
}

pub fn serialize<S>(arg: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&duration_pretty(*arg))
}

pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    duration_parse(&String::deserialize(d)?)
        .map_err(|err| serde::de::Error::custom(err.to_string()))
}
