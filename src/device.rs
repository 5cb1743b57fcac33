//! The chime appliance.
//!
//! [`Chime`] owns the registry, the command queue, the processor and the
//! connectivity state, and drives them from one cooperative loop. Each
//! [`tick`](Chime::tick):
//!
//! 1. services the siren and reports the end of playback,
//! 2. makes sure the device is connected, subscribed and discovered,
//! 3. polls the broker, which fills the command queue,
//! 4. processes queued commands,
//! 5. republishes status when the refresh interval has elapsed.

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use heapless::String;

use crate::config::DeviceConfig;
use crate::discovery::entity::{
    ControlEntity, CustomSettings, FactDiagnostic, MeasuredDiagnostic, SensorEntity,
};
use crate::discovery::payload::{self, DiscoveryContext};
use crate::discovery::registry::Registry;
use crate::discovery::topic::{self, DeviceTopics};
use crate::error::Error;
use crate::runtime::connectivity::{Connectivity, Links, Session};
use crate::runtime::processor::{CommandProcessor, DISPLAY_CONTROL, REFRESH_CONTROL, SIREN_CONTROL};
use crate::runtime::queue::{CommandQueue, Inbox};
use crate::runtime::traits::{Board, Broker, Color, Delivery, DeviceContext, Network};

/// `AA:BB:CC:DD:EE:FF`
pub type MacString = String<17>;

type IpString = String<15>;

/// Payload reflected to the siren getter topic when playback ends.
pub const SIREN_OFF: &str = r#"{"state":"OFF"}"#;

const ONLINE: &str = "online";

const SIREN_SETTINGS: &str = concat!(
    r#""optimistic": false, "support_duration": false, "support_volume_set": true, "#,
    r#""available_tones": ["#
);

/// Format a hardware address as upper-case, colon-separated hex.
pub fn format_mac(mac: &[u8; 6]) -> MacString {
    let mut out = MacString::new();
    for (i, byte) in mac.iter().enumerate() {
        if i > 0 {
            let _ = out.push(':');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Build the appliance's entity set.
///
/// `tones` lists the tone files offered to the hub. Environment sensors are
/// only registered when the board has one.
pub fn chime_registry(
    device_id: &str,
    tones: &[&str],
    with_sensors: bool,
) -> Result<Registry, Error> {
    let mut registry = Registry::new();

    if with_sensors {
        registry.add_sensor(
            "temperature",
            SensorEntity::new("temperature")
                .with_icon("mdi:home-thermometer")
                .with_unit("°C"),
        )?;
        registry.add_sensor(
            "humidity",
            SensorEntity::new("humidity")
                .with_icon("mdi:water-percent")
                .with_unit("%"),
        )?;
        registry.add_sensor(
            "pressure",
            SensorEntity::new("pressure")
                .with_icon("mdi:gauge")
                .with_unit("hPa"),
        )?;
    }

    registry.add_control(
        REFRESH_CONTROL,
        ControlEntity::new("number")
            .with_icon("mdi:refresh-circle")
            .with_unit("minutes")
            .with_custom_settings(r#""min": 1, "max": 60, "step": 1"#)?,
    )?;

    let mut siren_settings = CustomSettings::new();
    siren_settings
        .push_str(SIREN_SETTINGS)
        .map_err(|_| Error::PayloadTooLarge)?;
    for (i, tone) in tones.iter().enumerate() {
        let sep = if i > 0 { ", " } else { "" };
        if write!(siren_settings, "{}\"{}\"", sep, tone).is_err() {
            return Err(Error::PayloadTooLarge);
        }
    }
    siren_settings.push(']').map_err(|_| Error::PayloadTooLarge)?;

    registry.add_control(
        SIREN_CONTROL,
        ControlEntity::new("siren")
            .with_icon("mdi:bullhorn")
            .with_custom_settings(&siren_settings)?
            .with_set_topic(topic::join(&["siren", device_id, "command"]))
            .with_get_topic(topic::join(&["siren", device_id, SIREN_CONTROL, "state"])),
    )?;

    registry.add_control(
        DISPLAY_CONTROL,
        ControlEntity::new("text")
            .with_icon("mdi:image-text")
            .with_custom_settings(concat!(
                r#""command_template": "{ 'text': '{{ value }}', 'graphic': 'NONE' }", "#,
                r#""value_template": "{{ value_json.text }}""#
            ))?
            .with_set_topic(topic::join(&["text", device_id, DISPLAY_CONTROL, "command"]))
            .with_get_topic(topic::join(&["text", device_id, DISPLAY_CONTROL, "state"])),
    )?;

    registry.add_measured_diagnostic(
        "wifi_rssi",
        MeasuredDiagnostic::new().with_icon("mdi:wifi-strength-2"),
    )?;
    registry.add_fact_diagnostic("wifi_ip", FactDiagnostic::new().with_icon("mdi:ip-network"))?;
    registry.add_fact_diagnostic(
        "wifi_mac",
        FactDiagnostic::new().with_icon("mdi:network-pos"),
    )?;
    registry.add_fact_diagnostic(
        "last_boot",
        FactDiagnostic::new().with_icon("mdi:clock-start"),
    )?;

    Ok(registry)
}

/// The appliance main loop.
pub struct Chime<'a, N, B, D, P> {
    config: DeviceConfig<'a>,
    topics: DeviceTopics,
    mac: MacString,
    registry: Registry,
    queue: CommandQueue,
    processor: CommandProcessor<'a>,
    connectivity: Connectivity,
    network: N,
    broker: B,
    delay: D,
    board: P,
    was_playing: bool,
    last_status_ms: u64,
}

impl<'a, N, B, D, P> Chime<'a, N, B, D, P>
where
    N: Network,
    B: Broker,
    D: DelayNs,
    P: Board,
{
    pub fn new(
        config: DeviceConfig<'a>,
        registry: Registry,
        network: N,
        broker: B,
        delay: D,
        board: P,
    ) -> Self {
        let topics = DeviceTopics::new(config.identity.device_type, config.identity.device_id);
        let mac = format_mac(&network.mac());
        let processor = CommandProcessor::new(config.tones_dir, config.refresh_interval_ms);
        Self {
            config,
            topics,
            mac,
            registry,
            queue: CommandQueue::new(),
            processor,
            connectivity: Connectivity::new(),
            network,
            broker,
            delay,
            board,
            was_playing: false,
            last_status_ms: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn board_mut(&mut self) -> &mut P {
        &mut self.board
    }

    pub fn refresh_interval_ms(&self) -> u32 {
        self.processor.refresh_interval_ms()
    }

    /// Enqueue `value` for `control_id` as if the hub had sent it.
    pub fn simulate_publish(&self, control_id: &str, value: &str) -> bool {
        self.queue.simulate_publish(&self.registry, control_id, value)
    }

    /// Run ticks until the device gives up and restarts.
    pub async fn run(&mut self, devices: &mut DeviceContext<'_>) -> Error {
        loop {
            if let Err(e) = self.tick(devices).await {
                return e;
            }
        }
    }

    /// One iteration of the main loop.
    pub async fn tick(&mut self, devices: &mut DeviceContext<'_>) -> Result<(), Error> {
        self.service_siren(devices).await;

        let ctx = DiscoveryContext {
            identity: &self.config.identity,
            identifier: &self.mac,
            topics: &self.topics,
        };
        let mut links = Links {
            network: &mut self.network,
            broker: &mut self.broker,
            delay: &mut self.delay,
            board: &mut self.board,
        };
        let session = self
            .connectivity
            .ensure(&self.config, &mut links, &mut self.registry, &ctx, devices)
            .await?;
        if session == Session::Established {
            self.publish_status(devices).await;
        }

        let mut inbox = Inbox::new(&self.registry, &self.queue);
        if self.broker.poll(&mut inbox).await.is_err() {
            warn!("broker poll failed");
        }

        self.processor
            .process(
                &self.queue,
                &self.registry,
                self.config.identity.device_id,
                &mut self.broker,
                devices,
            )
            .await;

        let now = self.board.now_ms();
        let interval = u64::from(self.processor.refresh_interval_ms());
        if now.saturating_sub(self.last_status_ms) >= interval {
            devices.status_light.show(Color::PUBLISHING);
            self.publish_status(devices).await;
            if devices.siren.is_playing() {
                devices.status_light.show(Color::PLAYING);
            } else {
                devices.status_light.off();
            }
        }

        embassy_futures::yield_now().await;
        Ok(())
    }

    async fn service_siren(&mut self, devices: &mut DeviceContext<'_>) {
        let playing = devices.siren.is_playing();
        if playing {
            devices.siren.service();
        } else if self.was_playing {
            info!("playback finished");
            devices.status_light.off();
            if let Some(control) = self.registry.control(SIREN_CONTROL) {
                let getter = control.getter_topic(self.config.identity.device_id, SIREN_CONTROL);
                if self
                    .broker
                    .publish(&getter, SIREN_OFF.as_bytes(), Delivery::TELEMETRY)
                    .await
                    .is_err()
                {
                    warn!("failed to report end of playback");
                }
            }
        }
        self.was_playing = playing;
    }

    /// Availability, sensor state, diagnostics and control state.
    async fn publish_status(&mut self, devices: &mut DeviceContext<'_>) {
        self.last_status_ms = self.board.now_ms();

        if self
            .broker
            .publish(
                &self.topics.availability,
                ONLINE.as_bytes(),
                Delivery::RETAINED,
            )
            .await
            .is_err()
        {
            warn!("failed to publish availability");
        }

        if self.registry.has_sensors() {
            match devices.sensor.as_mut().and_then(|sensor| sensor.read()) {
                Some(reading) => {
                    let state = payload::state_payload(&reading);
                    if self
                        .broker
                        .publish(&self.topics.state, state.as_bytes(), Delivery::TELEMETRY)
                        .await
                        .is_err()
                    {
                        warn!("failed to publish sensor state");
                    }
                }
                None => warn!("no sensor reading"),
            }
        }

        let mut ip = IpString::new();
        if let Some(addr) = self.network.ip() {
            let _ = write!(ip, "{}", addr);
        }
        let rssi = self.network.rssi();
        let last_boot = self.connectivity.last_boot();
        match payload::diagnostics_payload(rssi, &ip, &self.mac, last_boot) {
            Ok(diagnostics) => {
                if self
                    .broker
                    .publish(
                        &self.topics.diagnostics,
                        diagnostics.as_bytes(),
                        Delivery::TELEMETRY,
                    )
                    .await
                    .is_err()
                {
                    warn!("failed to publish diagnostics");
                }
            }
            Err(e) => error!("diagnostics payload failed: {:?}", e),
        }

        self.processor
            .reflect_controls(
                &self.registry,
                self.config.identity.device_id,
                &mut self.broker,
            )
            .await;
    }
}
