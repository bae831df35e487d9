//! Backing datastore configuration of the recognition service.
//!
//! Exactly one variant is active on the server at a time. The wire format is
//! `{"type": "mysql", ...}`, `{"type": "postgresql", ...}`, or
//! `{"enabled": false}` for the embedded file store.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_MYSQL_CHARSET: &str = "utf8mb4";

const REDACTED: &str = "********";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

fn default_charset() -> String {
    DEFAULT_MYSQL_CHARSET.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastoreConfig {
    /// Embedded file store; no external database.
    Embedded,
    MySql(MySqlConfig),
    PostgreSql(PostgresConfig),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ExternalWire {
    Mysql(MySqlConfig),
    Postgresql(PostgresConfig),
}

impl DatastoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            DatastoreConfig::Embedded => "embedded",
            DatastoreConfig::MySql(_) => "mysql",
            DatastoreConfig::PostgreSql(_) => "postgresql",
        }
    }

    /// Reject configs the service could never apply.
    pub fn validate(&self) -> Result<(), ClientError> {
        let (host, port, database) = match self {
            DatastoreConfig::Embedded => return Ok(()),
            DatastoreConfig::MySql(c) => (&c.host, c.port, &c.database),
            DatastoreConfig::PostgreSql(c) => (&c.host, c.port, &c.database),
        };
        if host.trim().is_empty() {
            return Err(ClientError::Validation(format!("{} host must not be empty", self.kind())));
        }
        if port == 0 {
            return Err(ClientError::Validation(format!("{} port must be non-zero", self.kind())));
        }
        if database.trim().is_empty() {
            return Err(ClientError::Validation(format!(
                "{} database name must not be empty",
                self.kind()
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        match self {
            DatastoreConfig::Embedded => serde_json::json!({ "enabled": false }),
            DatastoreConfig::MySql(c) => serde_json::to_value(ExternalWire::Mysql(c.clone()))
                .unwrap_or(Value::Null),
            DatastoreConfig::PostgreSql(c) => {
                serde_json::to_value(ExternalWire::Postgresql(c.clone())).unwrap_or(Value::Null)
            }
        }
    }

    /// Wire form with the password masked, for display.
    pub fn to_redacted_json(&self) -> Value {
        let mut value = self.to_json();
        if let Some(password) = value.get_mut("password") {
            *password = Value::String(REDACTED.to_string());
        }
        value
    }

    /// Interpret a connection document reported by the service.
    ///
    /// Accepts the document at the top level or nested under `config` /
    /// `connection`. A document with no `type` (or `enabled: false`) is the
    /// embedded store.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        let doc = ["config", "connection"]
            .iter()
            .find_map(|key| value.get(key).filter(|v| v.is_object()))
            .unwrap_or(value);

        let enabled = doc.get("enabled").and_then(Value::as_bool).unwrap_or(true);
        if !enabled || doc.get("type").is_none() {
            return Ok(DatastoreConfig::Embedded);
        }

        Ok(match serde_json::from_value::<ExternalWire>(doc.clone())? {
            ExternalWire::Mysql(c) => DatastoreConfig::MySql(c),
            ExternalWire::Postgresql(c) => DatastoreConfig::PostgreSql(c),
        })
    }
}
