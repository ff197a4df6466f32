use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info, warn};

use super::{Host, HostError, check_tempo};
use crate::audio::{NoteParams, Pitch, SampleParams, SoundLibrary};

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const PROGRAM_CHANGE: u8 = 0xC0;
const CONTROL_CHANGE: u8 = 0xB0;
const ALL_NOTES_OFF: u8 = 123;
/// General MIDI percussion lives on channel 10.
const DRUM_CHANNEL: u8 = 9;
/// Beats a percussion key is held before its note-off.
const SAMPLE_GATE: f64 = 0.25;

/// amp 1.0 maps to velocity 100.
pub fn amp_to_velocity(amp: f64) -> u8 {
    (amp * 100.0).round().clamp(1.0, 127.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingOff {
    at: f64,
    channel: u8,
    key: u8,
}

/// Sounding keys and the beat each one is released at. At most one entry
/// per `(channel, key)`: striking a key that is still held releases it
/// first, so an older release never cuts the new note short.
#[derive(Debug, Default)]
pub(crate) struct NoteOffs {
    pending: Vec<PendingOff>,
}

impl NoteOffs {
    pub(crate) fn note_on(
        &mut self,
        channel: u8,
        key: u8,
        velocity: u8,
        off_at: f64,
        mut send: impl FnMut(&[u8]) -> Result<(), HostError>,
    ) -> Result<(), HostError> {
        if let Some(i) = self
            .pending
            .iter()
            .position(|off| off.channel == channel && off.key == key)
        {
            self.pending.swap_remove(i);
            send(&[NOTE_OFF | channel, key, 0])?;
        }
        send(&[NOTE_ON | channel, key, velocity])?;
        self.pending.push(PendingOff {
            at: off_at,
            channel,
            key,
        });
        Ok(())
    }

    /// Releases every key due at or before `beat`, earliest first.
    pub(crate) fn flush_until(
        &mut self,
        beat: f64,
        send: impl FnMut(&[u8]) -> Result<(), HostError>,
    ) -> Result<(), HostError> {
        self.pending.sort_by(|a, b| a.at.total_cmp(&b.at));
        let due = self.pending.partition_point(|off| off.at <= beat + 1e-9);
        Self::release(self.pending.drain(..due).collect(), send)
    }

    pub(crate) fn flush_all(
        &mut self,
        send: impl FnMut(&[u8]) -> Result<(), HostError>,
    ) -> Result<(), HostError> {
        self.pending.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self::release(std::mem::take(&mut self.pending), send)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn release(
        offs: Vec<PendingOff>,
        mut send: impl FnMut(&[u8]) -> Result<(), HostError>,
    ) -> Result<(), HostError> {
        for off in offs {
            send(&[NOTE_OFF | off.channel, off.key, 0])?;
        }
        Ok(())
    }
}

/// Forwards the score to an external synthesizer over MIDI. Synths become
/// General MIDI program changes and samples become percussion keys.
pub struct MidiHost {
    conn: MidiOutputConnection,
    port_name: String,
    library: SoundLibrary,
    channel: u8,
    beat: f64,
    note_offs: NoteOffs,
}

impl MidiHost {
    pub fn port_names() -> Result<Vec<String>, HostError> {
        let out = MidiOutput::new("loopscore").map_err(|e| HostError::Backend(e.to_string()))?;
        Ok(out
            .ports()
            .iter()
            .filter_map(|p| out.port_name(p).ok())
            .collect())
    }

    /// Connects to the first output port whose name contains `filter`, or
    /// to the first port at all.
    pub fn connect(
        filter: Option<&str>,
        channel: u8,
        library: SoundLibrary,
    ) -> Result<Self, HostError> {
        let channel = channel.min(15);
        let out = MidiOutput::new("loopscore").map_err(|e| HostError::Backend(e.to_string()))?;
        let ports = out.ports();
        let port = ports
            .iter()
            .find(|p| match filter {
                Some(filter) => out.port_name(p).unwrap_or_default().contains(filter),
                None => true,
            })
            .ok_or_else(|| HostError::Backend("no matching MIDI output port".to_string()))?;
        let port_name = out.port_name(port).unwrap_or_default();

        let conn = out
            .connect(port, "loopscore-out")
            .map_err(|e| HostError::Backend(e.to_string()))?;
        info!(port = %port_name, channel = channel + 1, "MIDI output connected");

        Ok(Self {
            conn,
            port_name,
            library,
            channel,
            beat: 0.0,
            note_offs: NoteOffs::default(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, message: &[u8]) -> Result<(), HostError> {
        send_to(&mut self.conn, message)
    }
}

fn send_to(conn: &mut MidiOutputConnection, message: &[u8]) -> Result<(), HostError> {
    conn.send(message)
        .map_err(|e| HostError::Backend(e.to_string()))
}

impl Host for MidiHost {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError> {
        check_tempo(bpm)
    }

    fn select_synth(&mut self, name: &str) -> Result<(), HostError> {
        let program = self
            .library
            .synth_program(name)
            .ok_or_else(|| HostError::UnknownSynth(name.to_string()))?;
        debug!(synth = name, program, "program change");
        self.send(&[PROGRAM_CHANGE | self.channel, program])
    }

    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError> {
        self.library.check_note_params(params)?;
        let velocity = amp_to_velocity(params.amp_or_default());
        let off_at = self.beat + params.release_or_default();
        let conn = &mut self.conn;
        for note in pitch.notes() {
            self.note_offs
                .note_on(self.channel, note.midi(), velocity, off_at, |m| send_to(conn, m))?;
        }
        Ok(())
    }

    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError> {
        self.library.check_sample_params(params)?;
        let key = self
            .library
            .sample_key(name)
            .ok_or_else(|| HostError::UnknownSample(name.to_string()))?;
        let velocity = amp_to_velocity(params.amp_or_default());
        let conn = &mut self.conn;
        self.note_offs.note_on(
            DRUM_CHANNEL,
            key,
            velocity,
            self.beat + SAMPLE_GATE,
            |m| send_to(conn, m),
        )
    }

    fn advance(&mut self, beats: f64) -> Result<(), HostError> {
        self.beat += beats;
        let conn = &mut self.conn;
        self.note_offs.flush_until(self.beat, |m| send_to(conn, m))
    }

    fn stop(&mut self) -> Result<(), HostError> {
        debug!(sounding = self.note_offs.len(), "releasing held notes");
        let conn = &mut self.conn;
        self.note_offs.flush_all(|m| send_to(conn, m))
    }
}

impl Drop for MidiHost {
    fn drop(&mut self) {
        for channel in [self.channel, DRUM_CHANNEL] {
            if let Err(e) = self.send(&[CONTROL_CHANGE | channel, ALL_NOTES_OFF, 0]) {
                warn!(error = %e, "failed to silence MIDI output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_follows_amp() {
        assert_eq!(amp_to_velocity(1.0), 100);
        assert_eq!(amp_to_velocity(0.5), 50);
        assert_eq!(amp_to_velocity(1.5), 127);
        assert_eq!(amp_to_velocity(0.0), 1);
        assert_eq!(amp_to_velocity(1.2), 120);
    }

    fn sent_by(
        offs: &mut NoteOffs,
        run: impl FnOnce(&mut NoteOffs, &mut dyn FnMut(&[u8]) -> Result<(), HostError>),
    ) -> Vec<Vec<u8>> {
        let mut sent = Vec::new();
        run(offs, &mut |m: &[u8]| {
            sent.push(m.to_vec());
            Ok(())
        });
        sent
    }

    #[test]
    fn restruck_key_is_released_before_the_new_note() {
        let a4 = 69;
        let mut offs = NoteOffs::default();
        // melody holds A4 from beat 2 to 3, the arpeggio strikes it at 2.25
        let sent = sent_by(&mut offs, |offs, send| {
            offs.note_on(0, a4, 100, 3.0, &mut *send).unwrap();
            offs.note_on(0, a4, 100, 2.55, &mut *send).unwrap();
        });
        assert_eq!(
            sent,
            vec![
                vec![NOTE_ON, a4, 100],
                vec![NOTE_OFF, a4, 0],
                vec![NOTE_ON, a4, 100],
            ]
        );
        assert_eq!(offs.len(), 1);

        let sent = sent_by(&mut offs, |offs, send| offs.flush_until(2.55, send).unwrap());
        assert_eq!(sent, vec![vec![NOTE_OFF, a4, 0]]);

        // nothing left to cut a later note at beat 3
        let sent = sent_by(&mut offs, |offs, send| offs.flush_until(3.0, send).unwrap());
        assert!(sent.is_empty());
    }

    #[test]
    fn same_key_on_other_channels_is_independent() {
        let mut offs = NoteOffs::default();
        let sent = sent_by(&mut offs, |offs, send| {
            offs.note_on(0, 36, 90, 1.0, &mut *send).unwrap();
            offs.note_on(DRUM_CHANNEL, 36, 90, 0.25, &mut *send).unwrap();
        });
        assert_eq!(sent.len(), 2);
        assert_eq!(offs.len(), 2);
    }

    #[test]
    fn flush_releases_due_keys_in_order() {
        let mut offs = NoteOffs::default();
        sent_by(&mut offs, |offs, send| {
            offs.note_on(0, 60, 100, 2.0, &mut *send).unwrap();
            offs.note_on(0, 64, 100, 1.0, &mut *send).unwrap();
            offs.note_on(DRUM_CHANNEL, 38, 100, 0.25, &mut *send).unwrap();
        });

        let sent = sent_by(&mut offs, |offs, send| offs.flush_until(1.0, send).unwrap());
        assert_eq!(
            sent,
            vec![vec![NOTE_OFF | DRUM_CHANNEL, 38, 0], vec![NOTE_OFF, 64, 0]]
        );
        assert_eq!(offs.len(), 1);
    }

    #[test]
    fn stopping_releases_everything_still_held() {
        let mut offs = NoteOffs::default();
        sent_by(&mut offs, |offs, send| {
            offs.note_on(2, 60, 100, 8.0, &mut *send).unwrap();
            offs.note_on(2, 67, 100, 4.0, &mut *send).unwrap();
        });

        let sent = sent_by(&mut offs, |offs, send| offs.flush_all(send).unwrap());
        assert_eq!(sent, vec![vec![NOTE_OFF | 2, 67, 0], vec![NOTE_OFF | 2, 60, 0]]);
        assert_eq!(offs.len(), 0);
    }

    #[test]
    fn a_failed_send_stops_the_flush() {
        let mut offs = NoteOffs::default();
        sent_by(&mut offs, |offs, send| {
            offs.note_on(0, 60, 100, 1.0, &mut *send).unwrap();
        });
        let result = offs.flush_all(|_| Err(HostError::Backend("unplugged".into())));
        assert_eq!(result, Err(HostError::Backend("unplugged".into())));
    }
}
