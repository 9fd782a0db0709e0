//! Settings read from environment variables at startup.

use {
    crate::sensors::ccs811,
    anyhow::{anyhow, bail, Context, Result},
    std::{env, path::PathBuf, str::FromStr, time::Duration},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device_id: String,
    /// I2C character device, e.g. `/dev/i2c-1`.
    pub i2c_dev: PathBuf,
    pub address: u8,
    pub drive_mode: u8,
    pub measure_delay: Duration,
    pub broker: Broker,
    pub publish_topic: String,
    pub subscription_topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Broker {
    pub host: String,
    pub port: u16,
    pub client_name: String,
    pub tls: Option<Tls>,
    pub credentials: Option<Credentials>,
}

/// Root CA for server authentication, certificate and key for client
/// authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Tls {
    pub root_ca: PathBuf,
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_id = lookup("DEVICE_ID")
            .or_else(|| lookup("BALENA_DEVICE_UUID"))
            .ok_or_else(|| {
                anyhow!("Failed to find DEVICE_ID or BALENA_DEVICE_UUID environment variable")
            })?;

        let i2c_dev = match lookup("I2C_BUS") {
            Some(bus) if bus.starts_with('/') => PathBuf::from(bus),
            Some(bus) => {
                let id: u8 = parse("I2C_BUS", &bus)?;
                PathBuf::from(format!("/dev/i2c-{}", id))
            }
            None => PathBuf::from("/dev/i2c-1"),
        };

        let address = match lookup("I2C_ADDR") {
            Some(addr) => {
                parse_address(&addr).with_context(|| format!("Invalid I2C_ADDR {:?}", addr))?
            }
            None => ccs811::ADDRESS,
        };

        let drive_mode = optional(&lookup, "DRIVE_MODE")?.unwrap_or(1);

        let measure_delay = optional::<f64, _>(&lookup, "MEASURE_DELAY")?.unwrap_or(1.0);
        let measure_delay = Duration::try_from_secs_f64(measure_delay).with_context(|| {
            format!(
                "MEASURE_DELAY must be a non-negative number of seconds, got {}",
                measure_delay
            )
        })?;

        let tls = match lookup("MQTT_ROOT_CA") {
            Some(root_ca) => Some(Tls {
                root_ca: PathBuf::from(root_ca),
                certificate: lookup("MQTT_CERTIFICATE").map(PathBuf::from),
                private_key: lookup("MQTT_PRIVATE_KEY").map(PathBuf::from),
            }),
            None => None,
        };

        let credentials = match (lookup("MQTT_USERNAME"), lookup("MQTT_PASSWORD")) {
            (Some(username), password) => Some(Credentials {
                username,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => bail!("MQTT_PASSWORD is set without MQTT_USERNAME"),
            (None, None) => None,
        };

        let default_port = if tls.is_some() { 8883 } else { 1883 };
        let broker = Broker {
            host: lookup("MQTT_ADDR").context("Failed to find MQTT_ADDR environment variable")?,
            port: optional(&lookup, "MQTT_PORT")?.unwrap_or(default_port),
            client_name: lookup("MQTT_CLIENT_NAME").unwrap_or_else(|| device_id.clone()),
            tls,
            credentials,
        };

        Ok(Self {
            publish_topic: lookup("PUBLISH_TOPIC").unwrap_or_else(|| format!("{}/aq", device_id)),
            subscription_topic: lookup("SUBSCRIPTION_TOPIC"),
            device_id,
            i2c_dev,
            address,
            drive_mode,
            measure_delay,
            broker,
        })
    }
}

fn optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|value| parse(key, &value)).transpose()
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} {:?}", key, value))
}

/// Accepts decimal or `0x` prefixed hex, limited to 7 bit addresses.
fn parse_address(value: &str) -> Result<u8> {
    let value = value.trim();
    let address = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16)?,
        None => value.parse()?,
    };

    if address > 0x7F {
        bail!("not a 7 bit address");
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[("BALENA_DEVICE_UUID", "abc123"), ("MQTT_ADDR", "broker")]).unwrap();

        assert_eq!(c.device_id, "abc123");
        assert_eq!(c.i2c_dev, PathBuf::from("/dev/i2c-1"));
        assert_eq!(c.address, 0x5B);
        assert_eq!(c.drive_mode, 1);
        assert_eq!(c.measure_delay, Duration::from_secs(1));
        assert_eq!(c.broker.host, "broker");
        assert_eq!(c.broker.port, 1883);
        assert_eq!(c.broker.client_name, "abc123");
        assert_eq!(c.broker.tls, None);
        assert_eq!(c.broker.credentials, None);
        assert_eq!(c.publish_topic, "abc123/aq");
        assert_eq!(c.subscription_topic, None);
    }

    #[test]
    fn everything_set() {
        let c = config(&[
            ("DEVICE_ID", "kitchen"),
            ("BALENA_DEVICE_UUID", "ignored"),
            ("I2C_BUS", "0"),
            ("I2C_ADDR", "0x5A"),
            ("DRIVE_MODE", "3"),
            ("MEASURE_DELAY", "2.5"),
            ("MQTT_ADDR", "example.iot.eu-west-1.amazonaws.com"),
            ("MQTT_CLIENT_NAME", "kitchen-ccs811"),
            ("MQTT_ROOT_CA", "/certs/root-ca.pem"),
            ("MQTT_CERTIFICATE", "/certs/cert.pem"),
            ("MQTT_PRIVATE_KEY", "/certs/private.key"),
            ("PUBLISH_TOPIC", "air/kitchen"),
            ("SUBSCRIPTION_TOPIC", "air/commands"),
        ])
        .unwrap();

        assert_eq!(c.device_id, "kitchen");
        assert_eq!(c.i2c_dev, PathBuf::from("/dev/i2c-0"));
        assert_eq!(c.address, 0x5A);
        assert_eq!(c.drive_mode, 3);
        assert_eq!(c.measure_delay, Duration::from_millis(2500));
        assert_eq!(c.broker.port, 8883);
        assert_eq!(c.broker.client_name, "kitchen-ccs811");
        assert_eq!(
            c.broker.tls,
            Some(Tls {
                root_ca: PathBuf::from("/certs/root-ca.pem"),
                certificate: Some(PathBuf::from("/certs/cert.pem")),
                private_key: Some(PathBuf::from("/certs/private.key")),
            })
        );
        assert_eq!(c.publish_topic, "air/kitchen");
        assert_eq!(c.subscription_topic.as_deref(), Some("air/commands"));
    }

    #[test]
    fn bus_path_and_decimal_address() {
        let c = config(&[
            ("DEVICE_ID", "d"),
            ("MQTT_ADDR", "broker"),
            ("MQTT_PORT", "1884"),
            ("I2C_BUS", "/dev/i2c-7"),
            ("I2C_ADDR", "91"),
            ("MQTT_USERNAME", "user"),
            ("MQTT_PASSWORD", "secret"),
        ])
        .unwrap();

        assert_eq!(c.i2c_dev, PathBuf::from("/dev/i2c-7"));
        assert_eq!(c.address, 0x5B);
        assert_eq!(c.broker.port, 1884);
        assert_eq!(
            c.broker.credentials,
            Some(Credentials {
                username: "user".to_string(),
                password: "secret".to_string(),
            })
        );
    }

    #[test]
    fn zero_delay_is_allowed() {
        let c = config(&[("DEVICE_ID", "d"), ("MQTT_ADDR", "b"), ("MEASURE_DELAY", "0")])
            .unwrap();
        assert_eq!(c.measure_delay, Duration::ZERO);
    }

    #[test]
    fn rejected_values() {
        let base = [("DEVICE_ID", "d"), ("MQTT_ADDR", "b")];
        let bad = [
            ("MEASURE_DELAY", "-1"),
            ("MEASURE_DELAY", "NaN"),
            ("MEASURE_DELAY", "inf"),
            ("MEASURE_DELAY", "1e30"),
            ("MEASURE_DELAY", "soon"),
            ("I2C_ADDR", "0x80"),
            ("I2C_ADDR", "zz"),
            ("I2C_BUS", "one"),
            ("DRIVE_MODE", "-1"),
            ("MQTT_PORT", "70000"),
            ("MQTT_PASSWORD", "secret"),
        ];

        for (key, value) in bad.iter() {
            let mut vars = base.to_vec();
            vars.push((*key, *value));
            assert!(config(&vars).is_err(), "{}={} accepted", key, value);
        }
    }

    #[test]
    fn missing_required() {
        assert!(config(&[("MQTT_ADDR", "broker")]).is_err());
        assert!(config(&[("DEVICE_ID", "d")]).is_err());
    }
}
