//! Multi-track step sequencer with a background timing thread.
//!
//! [`Sequencer`] is a handle: control calls update a local mirror of the
//! track table and forward a command to the worker, which advances the
//! playhead about once a millisecond and reports through
//! [`SequencerListener`]s.

pub mod listener;
pub mod schedule;
pub mod transport;
mod worker;

use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::config::EngineConfig;
use crate::mml::Pattern;

pub use listener::{ChannelListener, SequencerEvent, SequencerListener, DEFAULT_CHANNEL_CAPACITY};
pub use schedule::{pattern_grid, Schedule, ScheduledNote, NOTE_WINDOW_TICKS};
pub use transport::{Clock, Position, Transport, TransportState};

use worker::{lock, Command, SharedSnapshot, Worker};

pub const DEFAULT_NUM_TRACKS: usize = 8;

const TRACK_NAMES: [&str; 8] = ["Drums", "Bass", "Lead", "Pad", "FX1", "FX2", "FX3", "FX4"];

fn default_track_name(id: usize) -> String {
    TRACK_NAMES
        .get(id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Track {}", id + 1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerTrack {
    pub id: usize,
    pub name: String,
    pub pattern: Option<Pattern>,
    /// `[0, 1]`
    pub volume: f64,
    /// `[-1, 1]`
    pub pan: f64,
    pub muted: bool,
    pub solo: bool,
}

impl SequencerTrack {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            name: default_track_name(id),
            pattern: None,
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
        }
    }
}

/// One change to a track, applied identically by the handle and the worker.
#[derive(Debug, Clone)]
pub(crate) enum TrackEdit {
    SetPattern(usize, Pattern),
    ClearPattern(usize),
    Volume(usize, f64),
    Pan(usize, f64),
    Mute(usize, bool),
    Solo(usize, bool),
}

impl TrackEdit {
    pub(crate) fn track(&self) -> usize {
        match self {
            TrackEdit::SetPattern(id, _)
            | TrackEdit::ClearPattern(id)
            | TrackEdit::Volume(id, _)
            | TrackEdit::Pan(id, _)
            | TrackEdit::Mute(id, _)
            | TrackEdit::Solo(id, _) => *id,
        }
    }

    /// Out-of-range track ids are ignored.
    pub(crate) fn apply(self, tracks: &mut [SequencerTrack]) {
        let Some(track) = tracks.get_mut(self.track()) else {
            return;
        };
        match self {
            TrackEdit::SetPattern(_, pattern) => track.pattern = Some(pattern),
            TrackEdit::ClearPattern(_) => track.pattern = None,
            TrackEdit::Volume(_, volume) => track.volume = volume.clamp(0.0, 1.0),
            TrackEdit::Pan(_, pan) => track.pan = pan.clamp(-1.0, 1.0),
            TrackEdit::Mute(_, muted) => track.muted = muted,
            TrackEdit::Solo(_, solo) => track.solo = solo,
        }
    }
}

pub struct Sequencer {
    cmd_tx: Sender<Command>,
    shared: SharedSnapshot,
    tracks: Vec<SequencerTrack>,
    transport: Transport,
    join_handle: Option<JoinHandle<()>>,
}

impl Sequencer {
    pub fn new(num_tracks: usize) -> Self {
        Self::with_transport(num_tracks, Transport::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let transport = Transport::new(
            config.tempo,
            config.beats_per_bar,
            config.loop_enabled,
            config.loop_bars,
        );
        Self::with_transport(config.num_tracks, transport)
    }

    fn with_transport(num_tracks: usize, transport: Transport) -> Self {
        let tracks: Vec<SequencerTrack> = (0..num_tracks).map(SequencerTrack::new).collect();
        let shared = SharedSnapshot::default();
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let worker = Worker::new(cmd_rx, shared.clone(), transport, tracks.clone());
        let join_handle = std::thread::Builder::new()
            .name("sequencer".into())
            .spawn(move || worker.run())
            .map_err(|e| log::warn!(target: "sequencer", "failed to spawn worker: {e}"))
            .ok();
        Self {
            cmd_tx,
            shared,
            tracks,
            transport,
            join_handle,
        }
    }

    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            log::warn!(target: "sequencer", "worker gone, command dropped");
        }
    }

    fn edit(&mut self, edit: TrackEdit) {
        edit.clone().apply(&mut self.tracks);
        self.send(Command::Edit(edit));
    }

    // --- transport ---

    /// Start, or resume after [`Sequencer::pause`]. No-op while playing.
    pub fn play(&mut self) {
        {
            let mut snapshot = lock(&self.shared);
            if snapshot.state == TransportState::Playing {
                return;
            }
            snapshot.state = TransportState::Playing;
        }
        self.send(Command::Play);
        log::debug!(target: "sequencer", "play");
    }

    /// Halt and keep the position.
    pub fn pause(&mut self) {
        {
            let mut snapshot = lock(&self.shared);
            if snapshot.state != TransportState::Playing {
                return;
            }
            snapshot.state = TransportState::Paused;
        }
        self.send(Command::Pause);
    }

    /// Halt and reset the position to zero. Listeners get a stop event.
    pub fn stop(&mut self) {
        let generation = {
            let mut snapshot = lock(&self.shared);
            snapshot.generation += 1;
            snapshot.position = Position::default();
            snapshot.state = TransportState::Stopped;
            snapshot.generation
        };
        self.send(Command::Stop { generation });
    }

    /// Jump back to the start without changing the play state.
    pub fn rewind(&mut self) {
        let generation = {
            let mut snapshot = lock(&self.shared);
            snapshot.generation += 1;
            snapshot.position = Position::default();
            snapshot.generation
        };
        self.send(Command::Rewind { generation });
    }

    pub fn state(&self) -> TransportState {
        lock(&self.shared).state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn position(&self) -> Position {
        lock(&self.shared).position
    }

    pub fn tempo(&self) -> u32 {
        self.transport.tempo()
    }

    /// Clamped to `[40, 300]`. Takes effect without a jump in position.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.transport.set_tempo(bpm);
        self.send(Command::SetTempo(self.transport.tempo()));
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn set_loop(&mut self, enabled: bool, bars: u32) {
        self.transport.set_loop(enabled, bars);
        self.send(Command::SetLoop {
            enabled,
            bars: self.transport.loop_bars(),
        });
    }

    // --- tracks ---

    pub fn set_pattern(&mut self, track: usize, pattern: Pattern) {
        self.edit(TrackEdit::SetPattern(track, pattern));
    }

    pub fn clear_pattern(&mut self, track: usize) {
        self.edit(TrackEdit::ClearPattern(track));
    }

    pub fn set_track_volume(&mut self, track: usize, volume: f64) {
        self.edit(TrackEdit::Volume(track, volume));
    }

    pub fn set_track_pan(&mut self, track: usize, pan: f64) {
        self.edit(TrackEdit::Pan(track, pan));
    }

    pub fn mute_track(&mut self, track: usize, muted: bool) {
        self.edit(TrackEdit::Mute(track, muted));
    }

    pub fn solo_track(&mut self, track: usize, solo: bool) {
        self.edit(TrackEdit::Solo(track, solo));
    }

    pub fn track(&self, id: usize) -> Option<&SequencerTrack> {
        self.tracks.get(id)
    }

    pub fn tracks(&self) -> &[SequencerTrack] {
        &self.tracks
    }

    /// Onset grid of a track's first bar. All `false` for an empty track.
    pub fn pattern_grid(&self, track: usize, steps: usize) -> Vec<bool> {
        match self.tracks.get(track).and_then(|t| t.pattern.as_ref()) {
            Some(pattern) => pattern_grid(pattern, steps),
            None => vec![false; steps],
        }
    }

    /// Callbacks run on the worker thread, in registration order.
    pub fn add_listener(&mut self, listener: impl SequencerListener + 'static) {
        self.send(Command::AddListener(Box::new(listener)));
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_TRACKS)
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
