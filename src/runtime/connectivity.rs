//! Connectivity state machine.
//!
//! Establishes and repairs the network link and the broker session, then
//! subscribes to every setter topic and publishes discovery until nothing is
//! pending. The call blocks (cooperatively) until the device is operational or
//! the retry budget of one failure class is exhausted.
//!
//! ```text
//! Disconnected -> NetworkConnecting -> NetworkUp -> BrokerConnecting
//!     -> Subscribing -> PublishingDiscovery -> Operational
//!                                   (any) -> HardReset
//! ```
//!
//! Network and broker failures are counted separately. A failed subscription
//! or a discovery pass that makes no progress counts as a broker failure and
//! restarts from `BrokerConnecting` after a disconnect.

use embedded_hal_async::delay::DelayNs;

use crate::config::DeviceConfig;
use crate::discovery::payload::DiscoveryContext;
use crate::discovery::publisher::publish_discovery;
use crate::discovery::registry::Registry;
use crate::error::Error;
use crate::runtime::traits::{
    Board, Broker, Color, DeviceContext, Frame, Graphic, LastWill, Network,
};

/// Wall-clock timestamp of the current boot.
pub type BootTime = heapless::String<32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectivityState {
    Disconnected,
    NetworkConnecting,
    NetworkUp,
    BrokerConnecting,
    Subscribing,
    PublishingDiscovery,
    Operational,
    HardReset,
}

/// Outcome of [`Connectivity::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Session {
    /// A new connectivity cycle completed; a full status publish is due.
    Established,
    /// The existing session is still up.
    Existing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum FailureClass {
    Network,
    Broker,
}

/// The collaborators the state machine drives.
pub struct Links<'l, N, B, D, P> {
    pub network: &'l mut N,
    pub broker: &'l mut B,
    pub delay: &'l mut D,
    pub board: &'l mut P,
}

/// Connectivity bookkeeping for one boot.
#[derive(Debug)]
pub struct Connectivity {
    state: ConnectivityState,
    network_failures: u8,
    broker_failures: u8,
    broker_initialized: bool,
    boot_time_read: bool,
    last_boot: BootTime,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            network_failures: 0,
            broker_failures: 0,
            broker_initialized: false,
            boot_time_read: false,
            last_boot: BootTime::new(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Consecutive network failures so far.
    pub fn network_failures(&self) -> u8 {
        self.network_failures
    }

    /// Consecutive broker failures so far.
    pub fn broker_failures(&self) -> u8 {
        self.broker_failures
    }

    /// ISO-8601 boot time, empty until the wall clock has been read.
    pub fn last_boot(&self) -> &str {
        &self.last_boot
    }

    /// Bring the device to `Operational`.
    ///
    /// Returns [`Session::Existing`] immediately when both sessions are still
    /// up. Returns `Err(Error::HardReset)` after the board was asked to
    /// restart.
    pub async fn ensure<N, B, D, P>(
        &mut self,
        config: &DeviceConfig<'_>,
        links: &mut Links<'_, N, B, D, P>,
        registry: &mut Registry,
        ctx: &DiscoveryContext<'_>,
        devices: &mut DeviceContext<'_>,
    ) -> Result<Session, Error>
    where
        N: Network,
        B: Broker,
        D: DelayNs,
        P: Board,
    {
        if self.state == ConnectivityState::HardReset {
            return Err(Error::HardReset);
        }
        let associated = links.network.is_associated();
        if self.state == ConnectivityState::Operational
            && associated
            && links.broker.is_connected()
        {
            return Ok(Session::Existing);
        }

        self.state = if associated {
            ConnectivityState::BrokerConnecting
        } else {
            ConnectivityState::Disconnected
        };

        loop {
            trace!("connectivity state {:?}", self.state);
            self.state = match self.state {
                ConnectivityState::Disconnected => {
                    warn!("network session lost");
                    ConnectivityState::NetworkConnecting
                }
                ConnectivityState::NetworkConnecting => {
                    devices.status_light.show(Color::NETWORK);
                    indicate(devices, Graphic::WifiAlert, "Connecting to WiFi");
                    info!("connecting to network {}", config.network.ssid);
                    match links.network.connect(&config.network).await {
                        Ok(()) => {
                            self.network_failures = 0;
                            ConnectivityState::NetworkUp
                        }
                        Err(_) => {
                            self.fail(FailureClass::Network, config, links, devices)
                                .await?;
                            ConnectivityState::NetworkConnecting
                        }
                    }
                }
                ConnectivityState::NetworkUp => {
                    info!("network up, rssi {} dBm", links.network.rssi());
                    ConnectivityState::BrokerConnecting
                }
                ConnectivityState::BrokerConnecting => {
                    if !links.network.is_associated() {
                        ConnectivityState::Disconnected
                    } else {
                        self.read_boot_time(links.board);
                        self.connect_broker(config, links, ctx, devices).await?
                    }
                }
                ConnectivityState::Subscribing => {
                    let mut failed = false;
                    for topic in registry.resolve_subscriptions(ctx.device_id()) {
                        if links.broker.subscribe(&topic).await.is_err() {
                            warn!("subscription to {} failed", topic.as_str());
                            failed = true;
                            break;
                        }
                        debug!("subscribed to {}", topic.as_str());
                    }
                    if failed {
                        self.drop_broker(config, links, devices).await?
                    } else {
                        ConnectivityState::PublishingDiscovery
                    }
                }
                ConnectivityState::PublishingDiscovery => {
                    let before = registry.pending_count();
                    let pending = publish_discovery(registry, links.broker, ctx).await;
                    if pending == 0 {
                        ConnectivityState::Operational
                    } else if pending < before {
                        debug!("{} discovery messages pending", pending);
                        ConnectivityState::PublishingDiscovery
                    } else {
                        warn!("discovery made no progress, {} pending", pending);
                        self.drop_broker(config, links, devices).await?
                    }
                }
                ConnectivityState::Operational => {
                    self.broker_failures = 0;
                    devices.status_light.off();
                    devices.display.clear();
                    info!("operational");
                    return Ok(Session::Established);
                }
                ConnectivityState::HardReset => return Err(Error::HardReset),
            };
        }
    }

    /// Read the wall clock once per boot, on the first pass with the network
    /// associated.
    fn read_boot_time<P: Board>(&mut self, board: &mut P) {
        if self.boot_time_read {
            return;
        }
        self.boot_time_read = true;
        match board.wall_clock() {
            Some(now) => self.last_boot = now,
            None => debug!("wall clock unavailable"),
        }
    }

    async fn connect_broker<N, B, D, P>(
        &mut self,
        config: &DeviceConfig<'_>,
        links: &mut Links<'_, N, B, D, P>,
        ctx: &DiscoveryContext<'_>,
        devices: &mut DeviceContext<'_>,
    ) -> Result<ConnectivityState, Error>
    where
        N: Network,
        B: Broker,
        D: DelayNs,
        P: Board,
    {
        if !self.broker_initialized {
            let will = LastWill::offline(ctx.topics.availability.clone());
            links.broker.init(&config.broker, &will);
            self.broker_initialized = true;
        }
        if links.broker.is_connected() {
            return Ok(ConnectivityState::Subscribing);
        }

        devices.status_light.show(Color::BROKER);
        indicate(devices, Graphic::MqttAlert, "Connecting to MQTT");
        info!(
            "connecting to broker {}:{}",
            config.broker.host, config.broker.port
        );
        let result = links
            .broker
            .connect(
                config.client_id(),
                config.broker.username,
                config.broker.password,
            )
            .await;
        match result {
            Ok(()) => Ok(ConnectivityState::Subscribing),
            Err(_) => {
                self.fail(FailureClass::Broker, config, links, devices)
                    .await?;
                Ok(ConnectivityState::BrokerConnecting)
            }
        }
    }

    /// Disconnect after a failed subscription or discovery pass and count it
    /// as a broker failure.
    async fn drop_broker<N, B, D, P>(
        &mut self,
        config: &DeviceConfig<'_>,
        links: &mut Links<'_, N, B, D, P>,
        devices: &mut DeviceContext<'_>,
    ) -> Result<ConnectivityState, Error>
    where
        N: Network,
        B: Broker,
        D: DelayNs,
        P: Board,
    {
        if links.broker.disconnect().await.is_err() {
            debug!("broker disconnect failed");
        }
        self.fail(FailureClass::Broker, config, links, devices)
            .await?;
        Ok(ConnectivityState::BrokerConnecting)
    }

    /// Count a failure; restart the board once the budget is spent, otherwise
    /// wait out the cooldown of the failure class.
    async fn fail<N, B, D, P>(
        &mut self,
        class: FailureClass,
        config: &DeviceConfig<'_>,
        links: &mut Links<'_, N, B, D, P>,
        devices: &mut DeviceContext<'_>,
    ) -> Result<(), Error>
    where
        N: Network,
        B: Broker,
        D: DelayNs,
        P: Board,
    {
        let retry = &config.retry;
        let (failures, cooldown_ms) = match class {
            FailureClass::Network => (&mut self.network_failures, retry.network_cooldown_ms),
            FailureClass::Broker => (&mut self.broker_failures, retry.broker_cooldown_ms),
        };
        *failures = failures.saturating_add(1);
        warn!(
            "{:?} attempt {} of {} failed",
            class, *failures, retry.max_attempts
        );

        if *failures >= retry.max_attempts {
            error!("{:?} retries exhausted, restarting", class);
            self.state = ConnectivityState::HardReset;
            devices.status_light.show(Color::FAULT);
            indicate(devices, Graphic::Broken, "Restarting");
            links.board.restart();
            return Err(Error::HardReset);
        }

        links.delay.delay_ms(cooldown_ms).await;
        Ok(())
    }
}

fn indicate(devices: &mut DeviceContext<'_>, graphic: Graphic, text: &str) {
    if devices.display.render(&Frame::Graphic { graphic, text }).is_err() {
        debug!("status frame not rendered");
    }
}
