use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

pub const DEFAULT_ROSTER: [&str; 7] = [
    "Marcus", "Sofia", "Jonas", "Elin", "Oskar", "Linnea", "Viktor",
];
pub const DEFAULT_PIN: &str = "2580";
const CONFIG_FILE: &str = "config/dashboard";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("Roster must name at least one consultant")]
    EmptyRoster,
    #[error("Roster contains a blank name")]
    BlankName,
    #[error("Roster lists {0} more than once")]
    DuplicateName(String),
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(deserialize_with = "names")]
    pub roster: Vec<String>,
    pub pin: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Settings {
    pub fn roster(&self) -> Result<Roster, SettingsError> {
        Roster::new(self.roster.clone())
    }
}

/// Accepts a list of names or one comma-separated string, as set through
/// `KPI_ROSTER`. Names are kept as text even when they look numeric.
fn names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Names;

    impl<'de> Visitor<'de> for Names {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of names or a comma-separated string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.split(',').map(|name| name.trim().to_string()).collect())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut names = Vec::new();
            while let Some(name) = seq.next_element::<String>()? {
                names.push(name);
            }
            Ok(names)
        }
    }

    deserializer.deserialize_any(Names)
}

/// The closed set of consultants eligible for aggregation, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: Vec<String>,
}

impl Roster {
    pub fn new(members: Vec<String>) -> Result<Self, SettingsError> {
        if members.is_empty() {
            return Err(SettingsError::EmptyRoster);
        }

        let mut seen = HashSet::new();
        for member in members.iter() {
            if member.trim().is_empty() {
                return Err(SettingsError::BlankName);
            }
            if !seen.insert(member.as_str()) {
                return Err(SettingsError::DuplicateName(member.clone()));
            }
        }

        Ok(Self { members })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

/// Layers built-in defaults, an optional `config/dashboard.yaml` and
/// `KPI_*` environment variables. `DATABASE_URL` is used when no
/// `KPI_DATABASE_URL` is set.
pub fn read_config() -> Result<Settings, SettingsError> {
    load(CONFIG_FILE)
}

fn load(file: &str) -> Result<Settings, SettingsError> {
    // Values stay strings so the PIN and roster names are compared verbatim.
    let settings = config::Config::builder()
        .set_default("roster", DEFAULT_ROSTER.to_vec())?
        .set_default("pin", DEFAULT_PIN)?
        .set_default("max_connections", 5)?
        .add_source(config::File::with_name(file).required(false))
        .add_source(
            config::Environment::with_prefix("KPI")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut settings = settings.try_deserialize::<Settings>()?;
    settings.database_url = settings
        .database_url
        .filter(|url| !url.trim().is_empty())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .filter(|url| !url.trim().is_empty());

    Ok(settings)
}
