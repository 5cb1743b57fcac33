//! Discovery and telemetry payload builders.
//!
//! Each payload is a serde structure whose field order is the documented key
//! order on the wire. Optional keys are skipped entirely when absent rather than
//! emitted empty; the hub treats an empty `device_class` or
//! `unit_of_measurement` differently from a missing one.

use core::fmt::Write;

use heapless::String;
use serde::Serialize;

use crate::config::{DeviceIdentity, MAX_LABEL_LEN, Payload, Topic};
use crate::discovery::entity::{ControlEntity, FactDiagnostic, MeasuredDiagnostic, SensorEntity};
use crate::discovery::topic::DeviceTopics;
use crate::error::Error;
use crate::runtime::traits::Reading;

/// `<device_id>_<attr>` or `<device_id> <attr>`.
type Composite = String<{ MAX_LABEL_LEN * 2 + 1 }>;

/// Jinja template referencing one attribute of the state document.
type Template = String<96>;

/// A resolved discovery message, built on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: Topic,
    pub payload: Payload,
}

/// Full device block, used by sensors and controls.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo<'a> {
    pub name: &'a str,
    pub identifiers: &'a str,
    #[serde(rename = "mf")]
    pub manufacturer: &'a str,
    #[serde(rename = "mdl")]
    pub model: &'a str,
    #[serde(rename = "sw")]
    pub sw_version: &'a str,
}

/// Short device block, used by diagnostics. The hub merges it with the full
/// block published by the other entities through the shared identifier.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRef<'a> {
    pub name: &'a str,
    pub ids: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DeviceBlock<'a> {
    Full(DeviceInfo<'a>),
    Short(DeviceRef<'a>),
}

/// Shared device context every discovery payload is built against.
#[derive(Debug, Clone)]
pub struct DiscoveryContext<'a> {
    pub identity: &'a DeviceIdentity<'a>,
    /// Hardware identifier of the device (the wireless MAC address).
    pub identifier: &'a str,
    pub topics: &'a DeviceTopics,
}

impl<'a> DiscoveryContext<'a> {
    pub fn device_id(&self) -> &'a str {
        self.identity.device_id
    }

    fn full_device(&self) -> DeviceBlock<'a> {
        DeviceBlock::Full(DeviceInfo {
            name: self.identity.name,
            identifiers: self.identifier,
            manufacturer: self.identity.manufacturer,
            model: self.identity.model,
            sw_version: self.identity.sw_version,
        })
    }

    fn short_device(&self) -> DeviceBlock<'a> {
        DeviceBlock::Short(DeviceRef {
            name: self.identity.name,
            ids: self.identifier,
        })
    }
}

#[derive(Serialize)]
struct SensorConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    state_class: &'a str,
    availability_topic: &'a str,
    unique_id: &'a str,
    device: DeviceBlock<'a>,
    name: &'a str,
    icon: &'a str,
    state_topic: &'a str,
    value_template: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attributes_topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attributes_template: Option<&'a str>,
}

#[derive(Serialize)]
struct ControlConfig<'a> {
    entity_category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    availability_topic: &'a str,
    unique_id: &'a str,
    device: DeviceBlock<'a>,
    name: &'a str,
    icon: &'a str,
    state_topic: &'a str,
    command_topic: &'a str,
}

#[derive(Serialize)]
struct MeasuredDiagnosticConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    state_class: &'a str,
    entity_category: &'a str,
    availability_topic: &'a str,
    unique_id: &'a str,
    device: DeviceBlock<'a>,
    name: &'a str,
    icon: &'a str,
    state_topic: &'a str,
    value_template: &'a str,
}

#[derive(Serialize)]
struct FactDiagnosticConfig<'a> {
    entity_category: &'a str,
    availability_topic: &'a str,
    unique_id: &'a str,
    device: DeviceBlock<'a>,
    name: &'a str,
    icon: &'a str,
    state_topic: &'a str,
    value_template: &'a str,
}

#[derive(Serialize)]
struct DiagnosticsReport<'a> {
    wifi_rssi: i32,
    wifi_ip: &'a str,
    wifi_mac: &'a str,
    last_boot: &'a str,
}

fn composite(device_id: &str, separator: char, attr: &str) -> Composite {
    let mut out = Composite::new();
    let _ = write!(out, "{device_id}{separator}{attr}");
    out
}

fn value_template(attr: &str) -> Template {
    let mut out = Template::new();
    let _ = write!(out, "{{{{ value_json.{attr} }}}}");
    out
}

fn details_template(attr: &str) -> Template {
    let mut out = Template::new();
    let _ = write!(out, "{{{{ value_json.{attr}_details | tojson }}}}");
    out
}

/// Serialize `value` into a [`Payload`].
pub fn to_payload<T: Serialize>(value: &T) -> Result<Payload, Error> {
    let mut buf = [0u8; crate::config::MAX_PAYLOAD_LEN];
    let len = serde_json_core::to_slice(value, &mut buf).map_err(|e| match e {
        serde_json_core::ser::Error::BufferFull => Error::PayloadTooLarge,
        _ => Error::Serialize,
    })?;
    let json = core::str::from_utf8(&buf[..len]).map_err(|_| Error::Serialize)?;

    let mut payload = Payload::new();
    payload.push_str(json).map_err(|_| Error::PayloadTooLarge)?;
    Ok(payload)
}

/// Append a pre-escaped `"key": value` fragment inside the closing brace.
fn append_fragment(payload: &mut Payload, fragment: &str) -> Result<(), Error> {
    if fragment.is_empty() {
        return Ok(());
    }
    if payload.pop() != Some('}') {
        return Err(Error::Serialize);
    }
    payload.push_str(", ").map_err(|_| Error::PayloadTooLarge)?;
    payload
        .push_str(fragment)
        .map_err(|_| Error::PayloadTooLarge)?;
    payload.push('}').map_err(|_| Error::PayloadTooLarge)
}

/// Discovery payload of a plain sensor reporting attribute `id` of the state document.
pub fn sensor_payload(
    ctx: &DiscoveryContext<'_>,
    id: &str,
    sensor: &SensorEntity,
) -> Result<Payload, Error> {
    let unique_id = composite(ctx.device_id(), '_', id);
    let name = composite(ctx.device_id(), ' ', id);
    let template = value_template(id);
    let details = details_template(id);

    to_payload(&SensorConfig {
        device_class: sensor.device_class.as_deref(),
        unit_of_measurement: sensor.unit.as_deref(),
        state_class: "measurement",
        availability_topic: &ctx.topics.availability,
        unique_id: &unique_id,
        device: ctx.full_device(),
        name: &name,
        icon: &sensor.icon,
        state_topic: &ctx.topics.state,
        value_template: &template,
        json_attributes_topic: sensor
            .has_sub_attributes
            .then_some(ctx.topics.state.as_str()),
        json_attributes_template: sensor.has_sub_attributes.then_some(details.as_str()),
    })
}

/// Discovery payload of a bidirectional control. The control's custom-settings
/// fragment is appended verbatim after the fixed keys.
pub fn control_payload(
    ctx: &DiscoveryContext<'_>,
    id: &str,
    control: &ControlEntity,
) -> Result<Payload, Error> {
    let unique_id = composite(ctx.device_id(), '_', id);
    let name = composite(ctx.device_id(), ' ', id);
    let getter = control.getter_topic(ctx.device_id(), id);
    let setter = control.setter_topic(ctx.device_id(), id);

    let mut payload = to_payload(&ControlConfig {
        entity_category: "config",
        unit_of_measurement: control.unit.as_deref(),
        availability_topic: &ctx.topics.availability,
        unique_id: &unique_id,
        device: ctx.full_device(),
        name: &name,
        icon: &control.icon,
        state_topic: &getter,
        command_topic: &setter,
    })?;
    if let Some(fragment) = &control.custom_settings {
        append_fragment(&mut payload, fragment)?;
    }
    Ok(payload)
}

/// Discovery payload of a measured diagnostic (such as signal strength).
pub fn measured_diagnostic_payload(
    ctx: &DiscoveryContext<'_>,
    id: &str,
    diagnostic: &MeasuredDiagnostic,
) -> Result<Payload, Error> {
    let unique_id = composite(ctx.device_id(), '_', id);
    let name = composite(ctx.device_id(), ' ', id);
    let template = value_template(id);

    to_payload(&MeasuredDiagnosticConfig {
        device_class: diagnostic.device_class.as_deref(),
        unit_of_measurement: diagnostic.unit.as_deref(),
        state_class: &diagnostic.state_class,
        entity_category: "diagnostic",
        availability_topic: &ctx.topics.availability,
        unique_id: &unique_id,
        device: ctx.short_device(),
        name: &name,
        icon: &diagnostic.icon,
        state_topic: &ctx.topics.diagnostics,
        value_template: &template,
    })
}

/// Discovery payload of a diagnostic fact (such as the IP address).
pub fn fact_diagnostic_payload(
    ctx: &DiscoveryContext<'_>,
    id: &str,
    diagnostic: &FactDiagnostic,
) -> Result<Payload, Error> {
    let unique_id = composite(ctx.device_id(), '_', id);
    let name = composite(ctx.device_id(), ' ', id);
    let template = value_template(id);

    to_payload(&FactDiagnosticConfig {
        entity_category: "diagnostic",
        availability_topic: &ctx.topics.availability,
        unique_id: &unique_id,
        device: ctx.short_device(),
        name: &name,
        icon: &diagnostic.icon,
        state_topic: &ctx.topics.diagnostics,
        value_template: &template,
    })
}

/// State document with the environment readings:
/// `{"temperature": 21.50, "humidity": 40.25, "pressure": 1013.2}`.
pub fn state_payload(reading: &Reading) -> Payload {
    let mut payload = Payload::new();
    let _ = write!(
        payload,
        "{{\"temperature\": {:.2}, \"humidity\": {:.2}, \"pressure\": {:.1}}}",
        reading.temperature, reading.humidity, reading.pressure
    );
    payload
}

/// Diagnostics document published to the diagnostics topic.
pub fn diagnostics_payload(
    rssi: i32,
    ip: &str,
    mac: &str,
    last_boot: &str,
) -> Result<Payload, Error> {
    to_payload(&DiagnosticsReport {
        wifi_rssi: rssi,
        wifi_ip: ip,
        wifi_mac: mac,
        last_boot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::label;
    use crate::testing::identity;

    const MAC: &str = "84:F7:03:D6:8B:20";

    fn topics() -> DeviceTopics {
        DeviceTopics::new("siren", "featheresp32s2")
    }

    const FULL_DEVICE: &str = concat!(
        r#""device":{"name":"Chime","identifiers":"84:F7:03:D6:8B:20","#,
        r#""mf":"Adafruit","mdl":"Feather ESP32-S2","sw":"1.0"}"#
    );
    const SHORT_DEVICE: &str = r#""device":{"name":"Chime","ids":"84:F7:03:D6:8B:20"}"#;

    #[test]
    fn sensor_payload_uses_fixed_key_order() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let sensor = SensorEntity::new("temperature")
            .with_icon("mdi:home-thermometer")
            .with_unit("C");

        let payload = sensor_payload(&ctx, "temperature", &sensor).unwrap();
        let expected = std::format!(
            concat!(
                r#"{{"device_class":"temperature","unit_of_measurement":"C","state_class":"measurement","#,
                r#""availability_topic":"homeassistant/siren/featheresp32s2/availability","#,
                r#""unique_id":"featheresp32s2_temperature",{},"name":"featheresp32s2 temperature","#,
                r#""icon":"mdi:home-thermometer","state_topic":"homeassistant/siren/featheresp32s2/state","#,
                r#""value_template":"{{{{ value_json.temperature }}}}"}}"#
            ),
            FULL_DEVICE
        );
        assert_eq!(payload.as_str(), expected);
    }

    #[test]
    fn sensor_sub_attributes_add_json_attribute_keys() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let sensor = SensorEntity::new("pm25").with_sub_attributes();

        let payload = sensor_payload(&ctx, "pm25", &sensor).unwrap();
        assert!(payload.ends_with(concat!(
            r#""json_attributes_topic":"homeassistant/siren/featheresp32s2/state","#,
            r#""json_attributes_template":"{{ value_json.pm25_details | tojson }}"}"#
        )));
    }

    #[test]
    fn control_payload_appends_custom_settings_verbatim() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let control = ControlEntity::new("number")
            .with_icon("mdi:refresh-circle")
            .with_unit("minutes")
            .with_custom_settings(r#""min": 1, "max": 60, "step": 1"#)
            .unwrap();

        let payload = control_payload(&ctx, "refreshrate", &control).unwrap();
        let expected = std::format!(
            concat!(
                r#"{{"entity_category":"config","unit_of_measurement":"minutes","#,
                r#""availability_topic":"homeassistant/siren/featheresp32s2/availability","#,
                r#""unique_id":"featheresp32s2_refreshrate",{},"name":"featheresp32s2 refreshrate","#,
                r#""icon":"mdi:refresh-circle","#,
                r#""state_topic":"homeassistant/number/featheresp32s2/refreshrate/get","#,
                r#""command_topic":"homeassistant/number/featheresp32s2/refreshrate/set","#,
                r#" "min": 1, "max": 60, "step": 1}}"#
            ),
            FULL_DEVICE
        );
        assert_eq!(payload.as_str(), expected);
    }

    #[test]
    fn control_without_unit_omits_the_key() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let control = ControlEntity::new("siren").with_icon("mdi:bullhorn");

        let payload = control_payload(&ctx, "chime", &control).unwrap();
        assert!(!payload.contains("unit_of_measurement"));
        assert!(payload.starts_with(r#"{"entity_category":"config","availability_topic""#));
        let tail = r#""command_topic":"homeassistant/siren/featheresp32s2/chime/set"}"#;
        assert!(payload.ends_with(tail));
    }

    #[test]
    fn measured_diagnostic_omits_absent_class_and_unit_but_keeps_state_class() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let rssi = MeasuredDiagnostic::new().with_icon("mdi:wifi-strength-2");

        let payload = measured_diagnostic_payload(&ctx, "wifi_rssi", &rssi)
            .unwrap();
        let expected = std::format!(
            concat!(
                r#"{{"state_class":"measurement","entity_category":"diagnostic","#,
                r#""availability_topic":"homeassistant/siren/featheresp32s2/availability","#,
                r#""unique_id":"featheresp32s2_wifi_rssi",{},"name":"featheresp32s2 wifi_rssi","#,
                r#""icon":"mdi:wifi-strength-2","state_topic":"homeassistant/siren/featheresp32s2/diagnostics","#,
                r#""value_template":"{{{{ value_json.wifi_rssi }}}}"}}"#
            ),
            SHORT_DEVICE
        );
        assert_eq!(payload.as_str(), expected);

        let with_class = MeasuredDiagnostic::new()
            .with_device_class("signal_strength")
            .with_unit("dBm");
        let payload = measured_diagnostic_payload(&ctx, "wifi_rssi", &with_class)
            .unwrap();
        assert!(payload.starts_with(
            r#"{"device_class":"signal_strength","unit_of_measurement":"dBm","state_class":"measurement""#
        ));
    }

    #[test]
    fn fact_diagnostic_payload_uses_short_device_block() {
        let identity = identity();
        let topics = topics();
        let ctx = DiscoveryContext {
            identity: &identity,
            identifier: MAC,
            topics: &topics,
        };
        let ip = FactDiagnostic::new().with_icon("mdi:ip-network");

        let payload = fact_diagnostic_payload(&ctx, "wifi_ip", &ip).unwrap();
        assert!(payload.starts_with(r#"{"entity_category":"diagnostic","#));
        assert!(payload.contains(SHORT_DEVICE));
        assert!(payload.ends_with(r#""value_template":"{{ value_json.wifi_ip }}"}"#));
    }

    #[test]
    fn telemetry_payloads() {
        let reading = Reading {
            temperature: 21.5,
            humidity: 40.25,
            pressure: 1013.21,
        };
        assert_eq!(
            state_payload(&reading).as_str(),
            r#"{"temperature": 21.50, "humidity": 40.25, "pressure": 1013.2}"#
        );

        let diagnostics = diagnostics_payload(-43, "10.0.0.177", MAC, "").unwrap();
        assert_eq!(
            diagnostics.as_str(),
            r#"{"wifi_rssi":-43,"wifi_ip":"10.0.0.177","wifi_mac":"84:F7:03:D6:8B:20","last_boot":""}"#
        );
    }

    #[test]
    fn fragment_is_inserted_before_closing_brace() {
        let mut payload = to_payload(&DeviceRef {
            name: "x",
            ids: "y",
        })
        .unwrap();
        let fragment = label("\"k\": 1");
        append_fragment(&mut payload, &fragment).unwrap();
        assert_eq!(payload.as_str(), r#"{"name":"x","ids":"y", "k": 1}"#);
    }
}
