//! AlarmSrv configuration
//!
//! Flat option set, kept key-compatible with the add-on `options.json` the
//! gateways were deployed with. Loaded through figment: file first (format by
//! extension), then `ALARMSRV_*` environment overrides.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::warn;

use crate::error::{AlarmSrvError, Result};

/// Options file written by the add-on supervisor
pub const DEFAULT_CONFIG_PATH: &str = "/data/options.json";

/// Environment override prefix (`ALARMSRV_MQTT_BROKER`, ...)
pub const ENV_PREFIX: &str = "ALARMSRV_";

pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Keys read verbatim from the environment
///
/// Figment would otherwise turn `+1555` or `0042` into integers.
const RAW_ENV_KEYS: &[&str] = &[
    "mqtt_user",
    "mqtt_pass",
    "mqtt_payload",
    "sms_credentials",
    "cold_room_sensors",
    "normal_room_sensors",
    "phone_numbers",
];

/// Alarm service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlarmSrvConfig {
    /// `host` or `host:port`; empty disables the message bus
    pub mqtt_broker: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_pass: String,
    pub mqtt_client_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_payload: String,
    pub mqtt_timeout_secs: u64,

    /// Empty disables SMS
    pub sms_uri: String,
    /// `user:password` for Basic auth; empty disables SMS
    #[serde(deserialize_with = "lenient_string")]
    pub sms_credentials: String,
    pub sms_method: String,
    pub sms_timeout_secs: u64,

    /// Global cooldown between admissions
    pub alarm_delay_minutes: u64,
    pub expiry_grace_secs: u64,
    pub expire_ungrouped_sensors: bool,

    #[serde(deserialize_with = "comma_list")]
    pub cold_room_sensors: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub normal_room_sensors: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub phone_numbers: Vec<String>,

    pub listen_host: String,
    pub listen_port: u16,
    pub read_chunk_size: usize,
    pub dispatch_workers: usize,
    pub dispatch_queue_capacity: usize,

    /// Log root, used when `COLDWATCH_LOG_DIR` is not set
    pub log_dir: Option<String>,
}

impl Default for AlarmSrvConfig {
    fn default() -> Self {
        Self {
            mqtt_broker: String::new(),
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_client_id: "P1".to_string(),
            mqtt_payload: "1".to_string(),
            mqtt_timeout_secs: 10,
            sms_uri: String::new(),
            sms_credentials: String::new(),
            sms_method: "POST".to_string(),
            sms_timeout_secs: 100,
            alarm_delay_minutes: 5,
            expiry_grace_secs: 300,
            expire_ungrouped_sensors: true,
            cold_room_sensors: Vec::new(),
            normal_room_sensors: Vec::new(),
            phone_numbers: Vec::new(),
            listen_host: "0.0.0.0".to_string(),
            listen_port: 5060,
            read_chunk_size: 8192,
            dispatch_workers: 4,
            dispatch_queue_capacity: 256,
            log_dir: None,
        }
    }
}

/// Broker connection settings, present only when a broker is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub payload: String,
    pub timeout: Duration,
}

/// SMS gateway settings, present only when uri and credentials are set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsSettings {
    pub uri: String,
    pub credentials: String,
    pub method: String,
    pub timeout: Duration,
}

impl AlarmSrvConfig {
    /// Load from `path` plus environment overrides
    ///
    /// A missing file is not an error: defaults and environment still apply.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env_prefix(path.as_ref(), ENV_PREFIX)
    }

    fn load_with_env_prefix(path: &Path, prefix: &str) -> Result<Self> {
        let mut figment = Figment::new();

        if path.exists() {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "json".to_string());

            figment = match extension.as_str() {
                "json" => figment.merge(Json::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                other => {
                    return Err(AlarmSrvError::config(format!(
                        "Unsupported configuration format: {other}"
                    )))
                },
            };
        } else {
            warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
        }

        figment = figment.merge(Env::prefixed(prefix).ignore(RAW_ENV_KEYS));
        for key in RAW_ENV_KEYS {
            let var = format!("{}{}", prefix, key.to_ascii_uppercase());
            if let Ok(raw) = std::env::var(&var) {
                figment = figment.merge(Serialized::default(key, raw));
            }
        }
        Ok(figment.extract()?)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.alarm_delay_minutes.saturating_mul(60))
    }

    pub fn expiry_grace(&self) -> Duration {
        Duration::from_secs(self.expiry_grace_secs)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// `Ok(None)` when no broker is configured
    pub fn mqtt_settings(&self) -> Result<Option<MqttSettings>> {
        if self.mqtt_broker.trim().is_empty() {
            return Ok(None);
        }
        let (host, port) = parse_broker(&self.mqtt_broker)?;
        Ok(Some(MqttSettings {
            host,
            port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_user.clone(),
            password: self.mqtt_pass.clone(),
            payload: self.mqtt_payload.clone(),
            timeout: Duration::from_secs(self.mqtt_timeout_secs),
        }))
    }

    pub fn sms_settings(&self) -> Option<SmsSettings> {
        if self.sms_uri.trim().is_empty() || self.sms_credentials.is_empty() {
            return None;
        }
        Some(SmsSettings {
            uri: self.sms_uri.trim().to_string(),
            credentials: self.sms_credentials.clone(),
            method: self.sms_method.clone(),
            timeout: Duration::from_secs(self.sms_timeout_secs),
        })
    }

    /// Non-fatal problems; each entry disables or degrades something
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.mqtt_settings() {
            Ok(None) => warnings.push("mqtt_broker not set, bus publishing disabled".to_string()),
            Err(e) => warnings.push(format!("mqtt_broker unusable ({e}), bus publishing disabled")),
            Ok(Some(_)) => {},
        }

        if self.sms_uri.trim().is_empty() {
            warnings.push("sms_uri not set, SMS disabled".to_string());
        } else if self.sms_credentials.is_empty() {
            warnings.push("sms_credentials not set, SMS disabled".to_string());
        } else if !self.sms_method.eq_ignore_ascii_case("POST") {
            warnings.push(format!(
                "sms_method {} not supported (only POST), SMS disabled",
                self.sms_method
            ));
        }

        if self.phone_numbers.is_empty() {
            warnings.push("phone_numbers empty, no SMS will be sent".to_string());
        }

        if self.cold_room_sensors.is_empty()
            && self.normal_room_sensors.is_empty()
            && !self.expire_ungrouped_sensors
        {
            warnings.push("no sensor groups configured, alarms will never expire".to_string());
        }

        for (name, value) in [
            ("read_chunk_size", self.read_chunk_size),
            ("dispatch_workers", self.dispatch_workers),
            ("dispatch_queue_capacity", self.dispatch_queue_capacity),
        ] {
            if value == 0 {
                warnings.push(format!("{name} is 0, using 1"));
            }
        }

        warnings
    }
}

/// Split a comma list, trimming entries and dropping empties
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `host` or `host:port`
pub fn parse_broker(raw: &str) -> Result<(String, u16)> {
    let raw = raw.trim();
    let (host, port) = match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                AlarmSrvError::config(format!("Invalid MQTT broker port in '{raw}'"))
            })?;
            (host, port)
        },
        None => (raw, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(AlarmSrvError::config(format!(
            "Missing MQTT broker host in '{raw}'"
        )));
    }
    Ok((host.to_string(), port))
}

/// Accepts `"a, b"`, `["a", "b"]`, a bare number or nothing
fn comma_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a comma-separated string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            Ok(split_list(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_some<D2: Deserializer<'de>>(
            self,
            deserializer: D2,
        ) -> std::result::Result<Self::Value, D2::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_seq<A: SeqAccess<'de>>(
            self,
            mut seq: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                let item = item.trim();
                if !item.is_empty() {
                    items.push(item.to_string());
                }
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

/// Environment values like `1234` arrive as numbers; credentials stay strings
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringVisitor;

    impl Visitor<'_> for StringVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(StringVisitor)
}
