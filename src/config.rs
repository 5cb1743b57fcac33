//! Device configuration.
//!
//! Everything here is static for the lifetime of a boot. Values normally come
//! from compile-time environment constants in the firmware binary.

/// Prefix of every topic the device uses.
pub const TOPIC_BASE: &str = "homeassistant";

/// Maximum length of a topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Maximum length of an outbound payload (discovery payloads are the largest).
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Maximum length of a short identifier (device type, ids, icons, units).
pub const MAX_LABEL_LEN: usize = 32;

/// Maximum length of a pre-escaped custom-settings JSON fragment.
pub const MAX_CUSTOM_SETTINGS_LEN: usize = 384;

/// Maximum length of an inbound command value.
pub const MAX_COMMAND_LEN: usize = 256;

/// Number of inbound commands that can wait for processing.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Capacity of each entity collection.
pub const MAX_ENTITIES: usize = 8;

/// Short bounded string used for identifiers and display metadata.
pub type Label = heapless::String<MAX_LABEL_LEN>;

/// A fully resolved broker topic.
pub type Topic = heapless::String<MAX_TOPIC_LEN>;

/// An outbound payload.
pub type Payload = heapless::String<MAX_PAYLOAD_LEN>;

/// Create a [`Label`], truncating at a character boundary if `s` is too long.
pub fn label(s: &str) -> Label {
    let mut out = Label::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Identity of the appliance as presented to the hub.
#[derive(Debug, Clone)]
pub struct DeviceIdentity<'a> {
    /// Stable device identifier used in every topic (`featheresp32s2`).
    pub device_id: &'a str,
    /// Device type segment of the device-wide topics (`siren`).
    pub device_type: &'a str,
    /// Human-readable device name.
    pub name: &'a str,
    pub manufacturer: &'a str,
    pub model: &'a str,
    pub sw_version: &'a str,
}

/// Wireless network credentials.
#[derive(Debug, Clone)]
pub struct NetworkCredentials<'a> {
    pub ssid: &'a str,
    pub passphrase: &'a str,
}

/// Broker endpoint and session credentials.
#[derive(Debug, Clone)]
pub struct BrokerOptions<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Client id presented to the broker; defaults to the device id.
    pub client_id: Option<&'a str>,
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> BrokerOptions<'a> {
    /// Options for `host:1883` with empty credentials.
    pub fn new(host: &'a str) -> Self {
        Self {
            host,
            port: 1883,
            client_id: None,
            username: "",
            password: "",
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: &'a str, password: &'a str) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn with_client_id(mut self, client_id: &'a str) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

/// Bounded-retry policy shared by network and broker session establishment.
///
/// Network and broker failures are counted independently; reaching
/// `max_attempts` consecutive failures of one class restarts the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub network_cooldown_ms: u32,
    pub broker_cooldown_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            network_cooldown_ms: 30_000,
            broker_cooldown_ms: 10_000,
        }
    }
}

/// Complete configuration of the appliance.
#[derive(Debug, Clone)]
pub struct DeviceConfig<'a> {
    pub identity: DeviceIdentity<'a>,
    pub network: NetworkCredentials<'a>,
    pub broker: BrokerOptions<'a>,
    pub retry: RetryPolicy,
    /// Directory on the storage card holding the tone files.
    pub tones_dir: &'a str,
    /// Status refresh interval used until the hub sets another one.
    pub refresh_interval_ms: u32,
}

impl<'a> DeviceConfig<'a> {
    pub fn new(
        identity: DeviceIdentity<'a>,
        network: NetworkCredentials<'a>,
        broker: BrokerOptions<'a>,
    ) -> Self {
        Self {
            identity,
            network,
            broker,
            retry: RetryPolicy::default(),
            tones_dir: "/tones",
            refresh_interval_ms: 60_000,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tones_dir(mut self, tones_dir: &'a str) -> Self {
        self.tones_dir = tones_dir;
        self
    }

    pub fn with_refresh_interval_ms(mut self, refresh_interval_ms: u32) -> Self {
        self.refresh_interval_ms = refresh_interval_ms;
        self
    }

    /// The client id to present to the broker.
    pub fn client_id(&self) -> &'a str {
        self.broker.client_id.unwrap_or(self.identity.device_id)
    }
}
