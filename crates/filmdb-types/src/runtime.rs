use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InvalidRuntimeFormat;

const UNIT: &str = "mins";

/// Movie duration in whole minutes.
///
/// Externally it is always represented as text in form `"<minutes> mins"`,
/// e.g. `"102 mins"`. The codec does not check the range of the value,
/// negative numbers are parsed fine and must be rejected by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Runtime(i32);

impl Runtime {
    pub const fn new(minutes: i32) -> Self {
        Runtime(minutes)
    }

    pub const fn minutes(&self) -> i32 {
        self.0
    }
}

impl From<i32> for Runtime {
    fn from(minutes: i32) -> Self {
        Runtime(minutes)
    }
}

impl From<Runtime> for i32 {
    fn from(runtime: Runtime) -> Self {
        runtime.0
    }
}

impl Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, UNIT)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ');
        let (Some(number), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InvalidRuntimeFormat);
        };
        if unit != UNIT {
            return Err(InvalidRuntimeFormat);
        }
        let minutes = number.parse::<i32>().map_err(|_| InvalidRuntimeFormat)?;
        Ok(Runtime(minutes))
    }
}

impl Serialize for Runtime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct RuntimeVisitor;

impl de::Visitor<'_> for RuntimeVisitor {
    type Value = Runtime;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("string in form \"<minutes> mins\"")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(RuntimeVisitor)
    }
}
