/// Seconds in one day. Default plan span.
pub const DAY_SECONDS: u32 = 24 * 3600;

/// Parses `HH:MM:SS` into seconds since midnight. Hours may exceed 23, e.g. `25:30:00`.
pub fn parse_time(value: &str) -> Option<u32> {
    let split: Vec<&str> = value.trim().split(':').collect();
    if split.len() != 3 {
        return None;
    }
    let hour: u32 = split[0].parse().ok()?;
    let minutes: u32 = split[1].parse().ok()?;
    let seconds: u32 = split[2].parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    hour.checked_mul(3600)?.checked_add(minutes * 60 + seconds)
}

pub fn format_time(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Serde helper for time fields. Serializes as `HH:MM:SS`, deserializes from either a string
/// in that format or plain seconds.
pub mod time_format {
    use super::{format_time, parse_time};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Seconds(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_time(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match RawTime::deserialize(deserializer)? {
            RawTime::Seconds(s) => Ok(s),
            RawTime::Text(t) => parse_time(&t)
                .ok_or_else(|| D::Error::custom(format!("invalid time '{t}', expected HH:MM:SS"))),
        }
    }
}
