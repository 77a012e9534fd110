use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::ShowError;

/// Tempo assumed until the file says otherwise: 500000 us per quarter note,
/// i.e. 120 bpm.
const DEFAULT_US_PER_QUARTER: f64 = 500_000.0;

/// One event from a midi performance, in merged stream order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// Seconds since the previous event in the stream.
    pub delta: f64,
    pub kind: NoteEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteEventKind {
    NoteOn(u8),
    NoteOff(u8),
    /// Meta or non-note message. Advances time, drives nothing.
    Other,
}

impl NoteEvent {
    pub fn note_on(note: u8, delta: f64) -> Self {
        NoteEvent {
            delta,
            kind: NoteEventKind::NoteOn(note),
        }
    }

    pub fn note_off(note: u8, delta: f64) -> Self {
        NoteEvent {
            delta,
            kind: NoteEventKind::NoteOff(note),
        }
    }

    pub fn other(delta: f64) -> Self {
        NoteEvent {
            delta,
            kind: NoteEventKind::Other,
        }
    }
}

/// Read a Standard MIDI File and flatten every track into one chronological
/// event stream with tempo-resolved second deltas.
///
/// Tracks are merged by absolute tick; ties keep file track order, so the
/// tempo map in track 0 applies before notes landing on the same tick. A
/// note-on with velocity 0 is the running-status spelling of a note-off and
/// comes out as one.
pub fn read_note_events(path: &Path) -> Result<Vec<NoteEvent>, ShowError> {
    let bytes = fs::read(path)?;
    let smf = Smf::parse(&bytes).map_err(|e| ShowError::MidiParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) => f64::from(ticks.as_int()),
        Timing::Timecode(..) => {
            return Err(ShowError::MidiParse {
                path: path.to_path_buf(),
                message: "SMPTE timecode division is not supported".to_string(),
            })
        }
    };

    let mut merged = Vec::new();
    for track in &smf.tracks {
        let mut at_tick = 0u64;
        for event in track {
            at_tick += u64::from(event.delta.as_int());
            merged.push((at_tick, event.kind));
        }
    }
    // Stable sort: events on the same tick keep track order.
    merged.sort_by_key(|(tick, _)| *tick);

    let mut events = Vec::with_capacity(merged.len());
    let mut us_per_quarter = DEFAULT_US_PER_QUARTER;
    let mut previous_tick = 0u64;
    for (tick, kind) in merged {
        // A tempo change terminates the span it sits on, so one tempo always
        // covers the whole distance back to the previous event.
        let delta = (tick - previous_tick) as f64 * us_per_quarter
            / (ticks_per_quarter * 1_000_000.0);
        previous_tick = tick;

        let kind = match kind {
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    NoteEventKind::NoteOn(key.as_int())
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    NoteEventKind::NoteOff(key.as_int())
                }
                _ => NoteEventKind::Other,
            },
            TrackEventKind::Meta(MetaMessage::Tempo(us)) => {
                us_per_quarter = f64::from(us.as_int());
                NoteEventKind::Other
            }
            _ => NoteEventKind::Other,
        };

        events.push(NoteEvent { delta, kind });
    }

    Ok(events)
}
