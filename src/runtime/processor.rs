//! Command processor.
//!
//! Drains the [`CommandQueue`] in the main loop, dispatches each operation by
//! control identifier to a fixed handler, and reflects the resulting state to
//! the control's getter topic. Runs strictly outside the broker's delivery
//! callback, so publishing here is allowed.

use core::fmt::Write;

use heapless::String;

use crate::config::MAX_COMMAND_LEN;
use crate::discovery::registry::Registry;
use crate::error::CommandError;
use crate::runtime::command::{self, SirenCommand};
use crate::runtime::queue::{CommandQueue, PendingOperation};
use crate::runtime::traits::{Broker, Color, Delivery, DeviceContext};

/// Value published to a getter topic.
pub type Reflection = String<MAX_COMMAND_LEN>;

type TonePath = String<128>;

/// Identifier of the siren control.
pub const SIREN_CONTROL: &str = "chime";
/// Identifier of the refresh-rate control.
pub const REFRESH_CONTROL: &str = "refreshrate";
/// Identifier of the display control.
pub const DISPLAY_CONTROL: &str = "display";

/// The fixed handler table, keyed by control identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlHandler {
    Siren,
    RefreshRate,
    Display,
}

impl ControlHandler {
    pub fn for_control(id: &str) -> Option<Self> {
        match id {
            SIREN_CONTROL => Some(ControlHandler::Siren),
            REFRESH_CONTROL => Some(ControlHandler::RefreshRate),
            DISPLAY_CONTROL => Some(ControlHandler::Display),
            _ => None,
        }
    }
}

/// Executes pending operations and owns the state they change.
pub struct CommandProcessor<'a> {
    tones_dir: &'a str,
    refresh_interval_ms: u32,
    display_state: Option<Reflection>,
}

impl<'a> CommandProcessor<'a> {
    pub fn new(tones_dir: &'a str, refresh_interval_ms: u32) -> Self {
        Self {
            tones_dir,
            refresh_interval_ms,
            display_state: None,
        }
    }

    /// Current status refresh interval.
    pub fn refresh_interval_ms(&self) -> u32 {
        self.refresh_interval_ms
    }

    /// Current status refresh interval in whole minutes.
    pub fn refresh_minutes(&self) -> u32 {
        self.refresh_interval_ms / 60_000
    }

    /// Last display command accepted, if any.
    pub fn display_state(&self) -> Option<&str> {
        self.display_state.as_deref()
    }

    /// Run `op` through its handler. Returns the value to reflect to the
    /// getter topic, or `None` when nothing must be reflected.
    pub fn execute(
        &mut self,
        op: &PendingOperation,
        devices: &mut DeviceContext<'_>,
    ) -> Option<Reflection> {
        let Some(handler) = ControlHandler::for_control(&op.control) else {
            warn!("no handler for control {}, dropped", op.control.as_str());
            return None;
        };

        let result = match handler {
            ControlHandler::Siren => self.run_siren(&op.value, devices),
            ControlHandler::RefreshRate => Ok(self.run_refresh(&op.value)),
            ControlHandler::Display => self.run_display(&op.value, devices),
        };

        match result {
            Ok(reflection) => Some(reflection),
            Err(e) => {
                warn!("rejected command for {}: {:?}", op.control.as_str(), e);
                None
            }
        }
    }

    fn run_siren(
        &mut self,
        value: &str,
        devices: &mut DeviceContext<'_>,
    ) -> Result<Reflection, CommandError> {
        let json = command::normalize_quotes(value);
        match command::parse_siren(&json)? {
            SirenCommand::Start { tone, volume } => {
                let mut path = TonePath::new();
                if write!(path, "{}/{}", self.tones_dir, tone).is_err() {
                    error!("tone path for {} too long", tone.as_str());
                    return Err(CommandError::Malformed);
                }
                info!("playing {} at attenuation {}", path.as_str(), volume);
                match devices.siren.start(&path, volume) {
                    Ok(()) => devices.status_light.show(Color::PLAYING),
                    Err(e) => error!("siren failed to start {}: {:?}", path.as_str(), e),
                }
            }
            SirenCommand::Stop => {
                info!("stopping siren");
                devices.siren.stop();
                devices.status_light.off();
            }
        }
        Ok(reflection(value))
    }

    fn run_refresh(&mut self, value: &str) -> Reflection {
        let minutes = command::parse_refresh_minutes(value);
        self.refresh_interval_ms = minutes * 60_000;
        info!("refresh interval set to {} min", minutes);

        let mut out = Reflection::new();
        let _ = write!(out, "{}", minutes);
        out
    }

    fn run_display(
        &mut self,
        value: &str,
        devices: &mut DeviceContext<'_>,
    ) -> Result<Reflection, CommandError> {
        let json = command::normalize_quotes(value);
        let display = command::parse_display(&json)?;
        match display.frame() {
            None => devices.display.clear(),
            Some(frame) => {
                if let Err(e) = devices.display.render(&frame) {
                    error!("display failed to render: {:?}", e);
                }
            }
        }
        let state = reflection(value);
        self.display_state = Some(state.clone());
        Ok(state)
    }

    /// Drain the queue in FIFO order, executing each operation and publishing
    /// its reflection. Returns the number of operations removed.
    pub async fn process<B: Broker>(
        &mut self,
        queue: &CommandQueue,
        registry: &Registry,
        device_id: &str,
        broker: &mut B,
        devices: &mut DeviceContext<'_>,
    ) -> usize {
        let mut processed = 0;
        while let Some(op) = queue.pop() {
            processed += 1;
            let Some(reflection) = self.execute(&op, devices) else {
                continue;
            };
            let Some(control) = registry.control(&op.control) else {
                continue;
            };
            let getter = control.getter_topic(device_id, &op.control);
            if broker
                .publish(&getter, reflection.as_bytes(), Delivery::TELEMETRY)
                .await
                .is_err()
            {
                warn!("failed to reflect {} state", op.control.as_str());
            }
        }
        processed
    }

    /// Publish the current state of every control, as part of a status
    /// publish. The siren has no standing state and is skipped.
    pub async fn reflect_controls<B: Broker>(
        &self,
        registry: &Registry,
        device_id: &str,
        broker: &mut B,
    ) {
        for (id, control) in registry.controls() {
            let value = match ControlHandler::for_control(id) {
                Some(ControlHandler::RefreshRate) => {
                    let mut out = Reflection::new();
                    let _ = write!(out, "{}", self.refresh_minutes());
                    out
                }
                Some(ControlHandler::Display) => match &self.display_state {
                    Some(state) => state.clone(),
                    None => continue,
                },
                Some(ControlHandler::Siren) => continue,
                None => {
                    warn!("no state to reflect for control {}", id);
                    continue;
                }
            };
            let getter = control.getter_topic(device_id, id);
            if broker
                .publish(&getter, value.as_bytes(), Delivery::TELEMETRY)
                .await
                .is_err()
            {
                warn!("failed to reflect {} state", id);
            }
        }
    }
}

fn reflection(value: &str) -> Reflection {
    let mut out = Reflection::new();
    let _ = out.push_str(value);
    out
}
