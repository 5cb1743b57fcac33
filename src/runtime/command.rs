//! Command value parsing.
//!
//! Pure functions turning the raw value of a setter-topic message into a typed
//! command. Nothing here touches an actuator or the broker.

use heapless::String;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::MAX_COMMAND_LEN;
use crate::error::CommandError;
use crate::runtime::traits::Frame;

/// Unescaped text carried by a command.
pub type CommandText = String<MAX_COMMAND_LEN>;

/// A command value rewritten to strict JSON. Escaping the double quotes of a
/// single-quoted string grows the value, so this holds twice a command.
pub type NormalizedValue = String<{ 2 * MAX_COMMAND_LEN }>;

/// Requested siren state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "UPPERCASE")]
pub enum SirenState {
    On,
    Off,
}

#[derive(Deserialize)]
struct SirenRequest {
    state: SirenState,
    #[serde(default, alias = "volume_set")]
    volume_level: Option<f32>,
    #[serde(default)]
    tone: Option<CommandText>,
}

#[derive(Deserialize)]
struct DisplayRequest {
    #[serde(default)]
    text: Option<CommandText>,
    #[serde(default)]
    graphic: Option<CommandText>,
}

/// A parsed siren command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SirenCommand {
    /// Play `tone` with the player attenuation `volume`.
    Start { tone: CommandText, volume: u8 },
    Stop,
}

/// A parsed display command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCommand {
    Clear,
    Show {
        graphic: CommandText,
        text: CommandText,
    },
}

impl DisplayCommand {
    /// The frame to render; `None` when the display is cleared.
    pub fn frame(&self) -> Option<Frame<'_>> {
        match self {
            DisplayCommand::Clear => None,
            DisplayCommand::Show { graphic, text } => Some(Frame::from_label(graphic, text)),
        }
    }
}

/// Rewrite the single-quoted objects rendered by the hub's command templates,
/// such as `{ 'text': 'say "hi"', 'graphic': 'NONE' }`, into strict JSON.
///
/// Single-quoted strings become double-quoted with their inner `"` escaped.
/// Double-quoted strings and escape sequences are copied unchanged, except for
/// `\'`, which is not valid JSON and becomes a bare `'`.
pub fn normalize_quotes(value: &str) -> NormalizedValue {
    let mut out = NormalizedValue::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in value.chars() {
        let fits = match (quote, c) {
            _ if escaped => {
                escaped = false;
                if c == '\'' {
                    out.push('\'').is_ok()
                } else {
                    out.push('\\').is_ok() && out.push(c).is_ok()
                }
            }
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push('"').is_ok()
            }
            (None, _) => out.push(c).is_ok(),
            (Some(_), '\\') => {
                escaped = true;
                true
            }
            (Some(open), _) if c == open => {
                quote = None;
                out.push('"').is_ok()
            }
            (Some('\''), '"') => out.push_str("\\\"").is_ok(),
            (Some(_), _) => out.push(c).is_ok(),
        };
        if !fits {
            break;
        }
    }
    out
}

fn from_json<T: DeserializeOwned>(value: &str) -> Result<T, CommandError> {
    let mut scratch = [0u8; MAX_COMMAND_LEN];
    serde_json_core::from_str_escaped(value, &mut scratch)
        .map(|(request, _)| request)
        .map_err(|_| CommandError::Malformed)
}

/// Map a volume level in `[0, 1]` to the player's attenuation scale, where 1 is
/// loudest and 255 is silent: `256 - ceil(255 * level)`, or 255 for zero.
/// Out-of-range levels are clamped.
pub fn attenuation(level: f32) -> u8 {
    if level.is_nan() || level <= 0.0 {
        return 255;
    }
    let scaled = 255.0 * level.min(1.0);
    let mut steps = scaled as u16;
    if (steps as f32) < scaled {
        steps += 1;
    }
    (256 - steps) as u8
}

/// Parse `{"state": "ON"|"OFF", "volume_level": 0.0..1.0, "tone": "<file>"}`.
///
/// `tone` is required when the state is `ON`. A missing volume plays at full
/// volume.
pub fn parse_siren(value: &str) -> Result<SirenCommand, CommandError> {
    let request: SirenRequest = from_json(value)?;

    match request.state {
        SirenState::Off => Ok(SirenCommand::Stop),
        SirenState::On => {
            let tone = request
                .tone
                .filter(|t| !t.is_empty())
                .ok_or(CommandError::MissingTone)?;
            Ok(SirenCommand::Start {
                tone,
                volume: attenuation(request.volume_level.unwrap_or(1.0)),
            })
        }
    }
}

/// Parse a refresh-rate value in minutes, clamped to `[1, 60]`.
/// Unparseable input counts as zero.
pub fn parse_refresh_minutes(value: &str) -> u32 {
    value.trim().parse::<i64>().unwrap_or(0).clamp(1, 60) as u32
}

/// Parse `{"text": "...", "graphic": "<LABEL>"}`; an empty value clears the
/// display. A missing graphic shows plain small text.
pub fn parse_display(value: &str) -> Result<DisplayCommand, CommandError> {
    if value.trim().is_empty() {
        return Ok(DisplayCommand::Clear);
    }
    let request: DisplayRequest = from_json(value)?;

    Ok(DisplayCommand::Show {
        graphic: request.graphic.unwrap_or_else(|| text("NONE")),
        text: request.text.unwrap_or_default(),
    })
}

fn text(s: &str) -> CommandText {
    let mut out = CommandText::new();
    let _ = out.push_str(s);
    out
}
