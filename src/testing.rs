//! Recording fakes for every collaborator trait.

use core::net::Ipv4Addr;

use embedded_hal_async::delay::DelayNs;

use crate::config::{BrokerOptions, DeviceConfig, DeviceIdentity, NetworkCredentials};
use crate::error::DriverError;
use crate::runtime::traits::{
    Board, Broker, Color, Delivery, DeviceContext, Display, EnvironmentSensor, Frame, LastWill,
    MessageSink, Network, QoS, Reading, Siren, StatusLight,
};

pub fn identity() -> DeviceIdentity<'static> {
    DeviceIdentity {
        device_id: "featheresp32s2",
        device_type: "siren",
        name: "Chime",
        manufacturer: "Adafruit",
        model: "Feather ESP32-S2",
        sw_version: "1.0",
    }
}

pub fn config() -> DeviceConfig<'static> {
    DeviceConfig::new(
        identity(),
        NetworkCredentials {
            ssid: "home",
            passphrase: "secret",
        },
        BrokerOptions::new("10.0.0.2").with_credentials("chime", "pw"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

pub struct FakeNetwork {
    pub associated: bool,
    pub failures_left: usize,
    pub connects: usize,
    pub rssi: i32,
    pub ip: Option<Ipv4Addr>,
    pub mac: [u8; 6],
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            associated: false,
            failures_left: 0,
            connects: 0,
            rssi: -43,
            ip: Some(Ipv4Addr::new(10, 0, 0, 177)),
            mac: [0x84, 0xF7, 0x03, 0xD6, 0x8B, 0x20],
        }
    }
}

impl Network for FakeNetwork {
    type Error = FakeError;

    fn is_associated(&self) -> bool {
        self.associated
    }

    async fn connect(&mut self, _credentials: &NetworkCredentials<'_>) -> Result<(), FakeError> {
        self.connects += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(FakeError);
        }
        self.associated = true;
        Ok(())
    }

    fn rssi(&self) -> i32 {
        self.rssi
    }

    fn ip(&self) -> Option<Ipv4Addr> {
        self.ip
    }

    fn mac(&self) -> [u8; 6] {
        self.mac
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: QoS,
}

#[derive(Default)]
pub struct FakeBroker {
    pub connected: bool,
    pub inits: usize,
    pub will: Option<String>,
    pub connects: usize,
    pub connect_failures_left: usize,
    pub disconnects: usize,
    pub subscriptions: Vec<String>,
    pub subscribe_failures_left: usize,
    pub published: Vec<Published>,
    pub inbound: Vec<(String, Vec<u8>)>,
    publish_failure: Option<(String, usize)>,
}

impl FakeBroker {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Fail the next `count` publishes whose topic contains `pattern`.
    pub fn fail_publishes_matching(&mut self, pattern: &str, count: usize) {
        self.publish_failure = Some((pattern.to_string(), count));
    }

    /// Queue a message for delivery on the next poll.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push((topic.to_string(), payload.to_vec()));
    }

    /// Topics of every accepted publish, in order.
    pub fn topics(&self) -> Vec<&str> {
        self.published.iter().map(|p| p.topic.as_str()).collect()
    }

    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
            .collect()
    }
}

impl Broker for FakeBroker {
    type Error = FakeError;

    fn init(&mut self, _options: &BrokerOptions<'_>, will: &LastWill) {
        self.inits += 1;
        self.will = Some(will.topic.as_str().to_string());
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(
        &mut self,
        _client_id: &str,
        _username: &str,
        _password: &str,
    ) -> Result<(), FakeError> {
        self.connects += 1;
        if self.connect_failures_left > 0 {
            self.connect_failures_left -= 1;
            return Err(FakeError);
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), FakeError> {
        self.disconnects += 1;
        self.connected = false;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        delivery: Delivery,
    ) -> Result<(), FakeError> {
        if !self.connected {
            return Err(FakeError);
        }
        if let Some((pattern, left)) = &mut self.publish_failure {
            if *left > 0 && topic.contains(pattern.as_str()) {
                *left -= 1;
                return Err(FakeError);
            }
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain: delivery.retain,
            qos: delivery.qos,
        });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), FakeError> {
        if !self.connected {
            return Err(FakeError);
        }
        if self.subscribe_failures_left > 0 {
            self.subscribe_failures_left -= 1;
            return Err(FakeError);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, sink: &mut dyn MessageSink) -> Result<(), FakeError> {
        if !self.connected {
            return Err(FakeError);
        }
        for (topic, payload) in self.inbound.drain(..) {
            sink.on_message(&topic, &payload);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDelay {
    pub waits: Vec<u32>,
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.waits.push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits.push(ms);
    }
}

#[derive(Default)]
pub struct FakeBoard {
    pub now: u64,
    pub restarts: usize,
    pub clock: Option<&'static str>,
}

impl Board for FakeBoard {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn wall_clock(&mut self) -> Option<heapless::String<32>> {
        let mut out = heapless::String::new();
        out.push_str(self.clock?).ok()?;
        Some(out)
    }
}

#[derive(Default)]
pub struct FakeSiren {
    pub starts: Vec<(String, u8)>,
    pub stops: usize,
    pub services: usize,
    pub playing: bool,
    pub fail_next: bool,
}

impl Siren for FakeSiren {
    fn start(&mut self, path: &str, volume: u8) -> Result<(), DriverError> {
        self.starts.push((path.to_string(), volume));
        if self.fail_next {
            self.fail_next = false;
            return Err(DriverError::ToneNotFound);
        }
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn service(&mut self) {
        self.services += 1;
    }
}

#[derive(Default)]
pub struct FakeDisplay {
    pub frames: Vec<String>,
    pub clears: usize,
}

impl Display for FakeDisplay {
    fn clear(&mut self) {
        self.clears += 1;
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), DriverError> {
        self.frames.push(format!("{frame:?}"));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLight {
    pub shown: Vec<Color>,
    pub offs: usize,
}

impl StatusLight for FakeLight {
    fn show(&mut self, color: Color) {
        self.shown.push(color);
    }

    fn off(&mut self) {
        self.offs += 1;
    }
}

pub struct FakeSensor {
    pub reading: Option<Reading>,
}

impl Default for FakeSensor {
    fn default() -> Self {
        Self {
            reading: Some(Reading {
                temperature: 21.5,
                humidity: 40.25,
                pressure: 1013.21,
            }),
        }
    }
}

impl EnvironmentSensor for FakeSensor {
    fn read(&mut self) -> Option<Reading> {
        self.reading
    }
}

#[derive(Default)]
pub struct FakeDevices {
    pub siren: FakeSiren,
    pub display: FakeDisplay,
    pub light: FakeLight,
    pub sensor: FakeSensor,
}

impl FakeDevices {
    pub fn context(&mut self) -> DeviceContext<'_> {
        DeviceContext {
            siren: &mut self.siren,
            display: &mut self.display,
            status_light: &mut self.light,
            sensor: Some(&mut self.sensor),
        }
    }
}
