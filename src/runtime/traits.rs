//! Collaborator traits.
//!
//! The chime core never touches hardware or sockets directly. The wireless
//! link, the broker session, the board and the actuators are reached through
//! the traits defined here, so the same core runs on the device and against
//! the fakes used in tests.
//!
//! # Async Seams
//!
//! [`Network`] and [`Broker`] perform I/O and use native `async fn` in traits.
//! The actuator traits ([`Siren`], [`Display`], [`StatusLight`],
//! [`EnvironmentSensor`]) are synchronous and dyn-compatible so the command
//! processor can hold them as `&mut dyn` without generic parameters.
//!
//! # Inbound Messages
//!
//! The broker delivers inbound messages through [`MessageSink`]. The sink never
//! receives a broker handle: all it can do is record the message. Any broker I/O
//! caused by a message happens later, outside the delivery callback.

use core::net::Ipv4Addr;

use crate::config::{BrokerOptions, NetworkCredentials, Topic};
use crate::error::DriverError;

/// Quality of Service level used for outbound publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
}

/// Delivery flags of an outbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Delivery {
    pub retain: bool,
    pub qos: QoS,
}

impl Delivery {
    /// Discovery payloads and availability.
    pub const RETAINED: Delivery = Delivery {
        retain: true,
        qos: QoS::AtLeastOnce,
    };

    /// Telemetry and reflected control state.
    pub const TELEMETRY: Delivery = Delivery {
        retain: false,
        qos: QoS::AtMostOnce,
    };
}

/// Last will registered with the broker: `offline` on the availability topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: Topic,
    pub payload: &'static str,
}

impl LastWill {
    pub const OFFLINE: &'static str = "offline";

    pub fn offline(topic: Topic) -> Self {
        Self {
            topic,
            payload: Self::OFFLINE,
        }
    }
}

/// Object-safe receiver of inbound broker messages.
///
/// Called synchronously from [`Broker::poll`] for every message on a
/// subscribed topic. Implementations must not block and cannot publish.
pub trait MessageSink {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

/// The wireless network link.
#[allow(async_fn_in_trait)]
pub trait Network {
    type Error: core::fmt::Debug;

    /// Whether the link is currently associated and has an address.
    fn is_associated(&self) -> bool;

    /// Associate with the access point and obtain an address.
    async fn connect(&mut self, credentials: &NetworkCredentials<'_>) -> Result<(), Self::Error>;

    /// Received signal strength in dBm.
    fn rssi(&self) -> i32;

    fn ip(&self) -> Option<Ipv4Addr>;

    fn mac(&self) -> [u8; 6];
}

/// A broker session.
///
/// Implementations wrap an MQTT client. Publishing and subscribing are only
/// valid while [`is_connected`](Broker::is_connected) returns `true`.
#[allow(async_fn_in_trait)]
pub trait Broker {
    type Error: core::fmt::Debug;

    /// Configure the session endpoint and last will. Called once per boot,
    /// before the first [`connect`](Broker::connect).
    fn init(&mut self, options: &BrokerOptions<'_>, will: &LastWill);

    fn is_connected(&self) -> bool;

    async fn connect(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), Self::Error>;

    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        delivery: Delivery,
    ) -> Result<(), Self::Error>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Service the session and hand every pending inbound message to `sink`.
    async fn poll(&mut self, sink: &mut dyn MessageSink) -> Result<(), Self::Error>;
}

/// Board services: clock, wall clock and restart.
pub trait Board {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Restart the device. On hardware this does not return.
    fn restart(&mut self);

    /// Current wall-clock time, if the board has one.
    fn wall_clock(&mut self) -> Option<heapless::String<32>>;
}

/// The audio player.
pub trait Siren {
    /// Start playing the tone file at `path`. `volume` is the player's
    /// attenuation: 0 is loudest, 255 is silent.
    fn start(&mut self, path: &str, volume: u8) -> Result<(), DriverError>;

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// Feed the player. Must be called every loop iteration while playing.
    fn service(&mut self);
}

/// The e-paper display.
pub trait Display {
    fn clear(&mut self);

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), DriverError>;
}

/// The RGB status LED.
pub trait StatusLight {
    fn show(&mut self, color: Color);

    fn off(&mut self);
}

/// The environment sensor.
pub trait EnvironmentSensor {
    fn read(&mut self) -> Option<Reading>;
}

/// One reading of the environment sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Pressure in hPa.
    pub pressure: f32,
}

/// Text size of a text-only frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TextSize {
    Small,
    Medium,
    Large,
}

/// Icon shown next to the text of a graphic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Graphic {
    Aqi,
    Fire,
    Co2,
    Rads,
    Door,
    Garage,
    Safe,
    Alert,
    Freeze,
    Gas,
    Water,
    Info,
    /// The network link is down.
    WifiAlert,
    /// The broker session is down.
    MqttAlert,
    /// The device is about to restart.
    Broken,
}

/// Something the display can show.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame<'a> {
    Text { size: TextSize, text: &'a str },
    Graphic { graphic: Graphic, text: &'a str },
}

impl Frame<'_> {
    /// Map a hub-provided graphic label to a frame.
    ///
    /// `NONE`, `MEDIUM_TEXT` and `LARGE_TEXT` select a text-only layout; the
    /// other known labels select an icon. Unknown labels fall back to the
    /// info icon.
    pub fn from_label<'a>(label: &str, text: &'a str) -> Frame<'a> {
        let graphic = match label {
            "NONE" => {
                return Frame::Text {
                    size: TextSize::Small,
                    text,
                };
            }
            "MEDIUM_TEXT" => {
                return Frame::Text {
                    size: TextSize::Medium,
                    text,
                };
            }
            "LARGE_TEXT" => {
                return Frame::Text {
                    size: TextSize::Large,
                    text,
                };
            }
            "AQI" => Graphic::Aqi,
            "FIRE" => Graphic::Fire,
            "CO2" => Graphic::Co2,
            "RADS" => Graphic::Rads,
            "DOOR" => Graphic::Door,
            "GARAGE" => Graphic::Garage,
            "SAFE" => Graphic::Safe,
            "ALERT" => Graphic::Alert,
            "FREEZE" => Graphic::Freeze,
            "GAS" => Graphic::Gas,
            "WATER" => Graphic::Water,
            "INFO" => Graphic::Info,
            _ => {
                warn!("unknown display graphic, showing info");
                Graphic::Info
            }
        };
        Frame::Graphic { graphic, text }
    }
}

/// RGB color of the status light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Connecting to the wireless network.
    pub const NETWORK: Color = Color::rgb(0, 0, 128);
    /// Connecting to the broker.
    pub const BROKER: Color = Color::rgb(128, 0, 128);
    /// Publishing status.
    pub const PUBLISHING: Color = Color::rgb(0, 128, 0);
    /// Playing a tone.
    pub const PLAYING: Color = Color::rgb(128, 128, 0);
    /// Unrecoverable failure.
    pub const FAULT: Color = Color::rgb(255, 0, 0);
}

/// The actuators and sensors driven by the command processor and status
/// publisher.
pub struct DeviceContext<'a> {
    pub siren: &'a mut dyn Siren,
    pub display: &'a mut dyn Display,
    pub status_light: &'a mut dyn StatusLight,
    pub sensor: Option<&'a mut dyn EnvironmentSensor>,
}
