//! Conversion of browser-captured WebMIDI events into a Standard MIDI File.
//!
//! The browser records each event as
//! `{"timestamp": <ms>, "data": {"_data": {"0": status, "1": key, "2": value}}}`.
//! Note-on, note-off and control-change messages are written to a single
//! track on channel 0; every other message type is dropped.

use std::path::Path;

use anyhow::{Context, Result};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

/// Largest delta time an SMF variable-length quantity can hold.
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Configuration for WebMIDI conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMidiConfig {
    /// Metrical resolution of the written file.
    pub ticks_per_beat: u16,
    /// Tempo used to turn milliseconds into ticks.
    pub tempo_bpm: u32,
}

impl Default for WebMidiConfig {
    fn default() -> Self {
        Self {
            ticks_per_beat: 5000,
            tempo_bpm: 120,
        }
    }
}

impl WebMidiConfig {
    /// Microseconds per quarter note.
    pub fn tempo_micros(&self) -> u32 {
        60_000_000 / self.tempo_bpm.max(1)
    }

    /// Ticks spanned by `ms` milliseconds, rounded to the nearest tick.
    pub fn ms_to_ticks(&self, ms: f64) -> u32 {
        let ticks = ms * 1000.0 * self.ticks_per_beat as f64 / self.tempo_micros() as f64;
        ticks.round().clamp(0.0, MAX_DELTA as f64) as u32
    }
}

/// One recorded WebMIDI event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebMidiEvent {
    /// Milliseconds since the capture started.
    pub timestamp: f64,
    pub data: WebMidiData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebMidiData {
    #[serde(rename = "_data")]
    pub bytes: WebMidiBytes,
}

/// The raw message bytes, keyed by position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebMidiBytes {
    #[serde(rename = "0")]
    pub status: i64,
    #[serde(rename = "1", default)]
    pub data1: i64,
    #[serde(rename = "2", default)]
    pub data2: i64,
}

/// Kind of channel message encoded in a status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    NoteOff,
    NoteOn,
    PolyTouch,
    ControlChange,
    ProgramChange,
    ChannelTouch,
    PitchWheel,
    System,
}

impl EventCode {
    /// Decodes bits 4..=6 of a status byte.
    pub fn from_status(status: i64) -> Self {
        match (status >> 4) & 0b111 {
            0b000 => EventCode::NoteOff,
            0b001 => EventCode::NoteOn,
            0b010 => EventCode::PolyTouch,
            0b011 => EventCode::ControlChange,
            0b100 => EventCode::ProgramChange,
            0b101 => EventCode::ChannelTouch,
            0b110 => EventCode::PitchWheel,
            _ => EventCode::System,
        }
    }
}

/// Counts from a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub note_on: usize,
    pub note_off: usize,
    pub control_change: usize,
    /// Events of other types, or with out-of-range data bytes.
    pub skipped: usize,
}

/// Parses the JSON event list.
pub fn parse_events(json: &str) -> Result<Vec<WebMidiEvent>> {
    serde_json::from_str(json).context("Failed to parse WebMIDI event JSON")
}

fn data_byte(value: i64) -> Option<u7> {
    u8::try_from(value).ok().filter(|b| *b < 0x80).map(u7::new)
}

/// Builds a single-track SMF from `events`.
///
/// Delta times are measured from the previously written event, so dropped
/// events do not shift the timing of later ones.
pub fn events_to_smf(events: &[WebMidiEvent], config: &WebMidiConfig) -> (Smf<'static>, ConversionSummary) {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(config.ticks_per_beat.min(0x7FFF))),
    ));
    let mut summary = ConversionSummary::default();
    let mut track: Track<'static> = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(config.tempo_micros().min(0xFF_FFFF)))),
    }];

    let channel = u4::new(0);
    let mut previous = events.first().map(|e| e.timestamp).unwrap_or(0.0);

    for event in events {
        let bytes = &event.data.bytes;
        let message = match (EventCode::from_status(bytes.status), data_byte(bytes.data1)) {
            (EventCode::NoteOn, Some(key)) => {
                summary.note_on += 1;
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new((bytes.data2 & 0x7F) as u8),
                }
            }
            (EventCode::NoteOff, Some(key)) => {
                summary.note_off += 1;
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new((bytes.data2 & 0x7F) as u8),
                }
            }
            (EventCode::ControlChange, Some(controller)) => {
                summary.control_change += 1;
                MidiMessage::Controller {
                    controller,
                    value: u7::new((bytes.data2 & 0x7F) as u8),
                }
            }
            (code, _) => {
                tracing::debug!(?code, status = bytes.status, "dropping WebMIDI event");
                summary.skipped += 1;
                continue;
            }
        };

        let elapsed = event.timestamp - previous;
        if elapsed < 0.0 {
            tracing::warn!(
                timestamp = event.timestamp,
                previous,
                "WebMIDI event out of order; writing it with zero delta"
            );
        }
        track.push(TrackEvent {
            delta: u28::new(config.ms_to_ticks(elapsed)),
            kind: TrackEventKind::Midi { channel, message },
        });
        previous = event.timestamp;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    (smf, summary)
}

/// Converts WebMIDI JSON text into SMF bytes.
pub fn convert(json: &str, config: &WebMidiConfig) -> Result<(Vec<u8>, ConversionSummary)> {
    let events = parse_events(json)?;
    if events.is_empty() {
        anyhow::bail!("WebMIDI event list is empty");
    }
    let (smf, summary) = events_to_smf(&events, config);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)
        .context("Failed to encode MIDI file")?;
    tracing::info!(
        note_on = summary.note_on,
        note_off = summary.note_off,
        control_change = summary.control_change,
        skipped = summary.skipped,
        "converted WebMIDI events"
    );
    Ok((bytes, summary))
}

/// Reads WebMIDI JSON from `input` and writes a MIDI file to `output`.
pub fn convert_file(input: &Path, output: &Path, config: &WebMidiConfig) -> Result<ConversionSummary> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read WebMIDI file: {}", input.display()))?;
    let (bytes, summary) = convert(&json, config)?;
    std::fs::write(output, bytes)
        .with_context(|| format!("Failed to write MIDI file: {}", output.display()))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(timestamp: f64, status: i64, data1: i64, data2: i64) -> String {
        format!(
            r#"{{"timestamp": {}, "data": {{"_data": {{"0": {}, "1": {}, "2": {}}}}}}}"#,
            timestamp, status, data1, data2
        )
    }

    fn events_json(events: &[String]) -> String {
        format!("[{}]", events.join(","))
    }

    #[test]
    fn test_ms_to_ticks() {
        let config = WebMidiConfig::default();
        assert_eq!(config.tempo_micros(), 500_000);
        assert_eq!(config.ms_to_ticks(1.0), 10);
        assert_eq!(config.ms_to_ticks(250.04), 2500);
        assert_eq!(config.ms_to_ticks(-5.0), 0);
    }

    #[test]
    fn test_event_codes() {
        assert_eq!(EventCode::from_status(0x90), EventCode::NoteOn);
        assert_eq!(EventCode::from_status(0x80), EventCode::NoteOff);
        assert_eq!(EventCode::from_status(0xB3), EventCode::ControlChange);
        assert_eq!(EventCode::from_status(0xE0), EventCode::PitchWheel);
        assert_eq!(EventCode::from_status(0xF8), EventCode::System);
    }

    #[test]
    fn test_convert_writes_track() {
        let json = events_json(&[
            event(1000.0, 0x90, 60, 80),
            event(1100.0, 0xE0, 0, 64),
            event(1500.0, 0x80, 60, 0),
            event(1600.0, 0xB0, 64, 127),
        ]);
        let (bytes, summary) = convert(&json, &WebMidiConfig::default()).unwrap();
        assert_eq!(
            summary,
            ConversionSummary {
                note_on: 1,
                note_off: 1,
                control_change: 1,
                skipped: 1,
            }
        );

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(5000)));
        let track = &smf.tracks[0];
        // tempo, three channel messages, end of track
        assert_eq!(track.len(), 5);

        let deltas: Vec<u32> = track.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 0, 5000, 1000, 0]);
        assert_eq!(
            track[1].kind,
            TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(80)
                },
            }
        );
    }

    #[test]
    fn test_channel_is_normalised() {
        let json = events_json(&[event(0.0, 0x95, 62, 70)]);
        let (bytes, _) = convert(&json, &WebMidiConfig::default()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        match smf.tracks[0][1].kind {
            TrackEventKind::Midi { channel, .. } => assert_eq!(channel, u4::new(0)),
            ref other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_key_is_skipped() {
        let json = events_json(&[event(0.0, 0x90, 300, 70), event(10.0, 0x90, 60, 70)]);
        let (_, summary) = convert(&json, &WebMidiConfig::default()).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.note_on, 1);
    }

    #[test]
    fn test_empty_event_list_rejected() {
        assert!(convert("[]", &WebMidiConfig::default()).is_err());
        assert!(convert("{not json", &WebMidiConfig::default()).is_err());
    }
}
