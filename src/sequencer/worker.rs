//! The sequencer's background thread. Owns the playhead, the track copies
//! and the note schedules; the handle talks to it only through commands.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};

use super::listener::{Listeners, SequencerEvent, SequencerListener};
use super::schedule::Schedule;
use super::transport::{Clock, Position, Transport, TransportState};
use crate::beat::TICKS_PER_BEAT;
use super::{SequencerTrack, TrackEdit};

/// How often the playhead advances while playing.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

const MAX_DRAIN_PER_TICK: usize = 64;

pub(crate) enum Command {
    Play,
    Pause,
    /// Reset to the start. The generation supersedes every earlier one.
    Stop { generation: u64 },
    Rewind { generation: u64 },
    Edit(TrackEdit),
    SetTempo(u32),
    SetLoop { enabled: bool, bars: u32 },
    AddListener(Box<dyn SequencerListener>),
    Shutdown,
}

/// What the handle can read without a round trip to the worker.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Snapshot {
    pub state: TransportState,
    pub position: Position,
    /// Bumped by the handle on stop and rewind. The worker only publishes
    /// positions while its own generation matches.
    pub generation: u64,
}

pub(crate) type SharedSnapshot = Arc<Mutex<Snapshot>>;

pub(crate) fn lock(shared: &SharedSnapshot) -> std::sync::MutexGuard<'_, Snapshot> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Worker {
    rx: Receiver<Command>,
    shared: SharedSnapshot,
    generation: u64,
    transport: Transport,
    tracks: Vec<SequencerTrack>,
    schedules: Vec<Schedule>,
    listeners: Listeners,
    playing: bool,
    clock: Clock,
    position: Position,
    /// Absolute index (tick / ticks per beat) of the last beat announced in
    /// this pass. `None` after a start, rewind or loop wrap.
    last_beat: Option<u64>,
}

impl Worker {
    pub(crate) fn new(
        rx: Receiver<Command>,
        shared: SharedSnapshot,
        transport: Transport,
        tracks: Vec<SequencerTrack>,
    ) -> Self {
        let schedules = vec![Schedule::default(); tracks.len()];
        Self {
            rx,
            shared,
            generation: 0,
            transport,
            tracks,
            schedules,
            listeners: Listeners::default(),
            playing: false,
            clock: Clock::new(Instant::now(), 0),
            position: Position::default(),
            last_beat: None,
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            if self.playing {
                crossbeam_channel::select! {
                    recv(self.rx) -> result => match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    default(POLL_INTERVAL) => {}
                }
            } else {
                // idle: block until there is something to do
                match self.rx.recv() {
                    Ok(cmd) => {
                        if self.handle_cmd(cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            if self.drain_commands() {
                break;
            }
            if self.playing {
                self.advance(Instant::now());
            }
        }
        log::debug!(target: "sequencer", "worker exiting");
    }

    fn drain_commands(&mut self) -> bool {
        for _ in 0..MAX_DRAIN_PER_TICK {
            match self.rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    /// Apply one command. Returns `true` when the worker should exit.
    pub(crate) fn handle_cmd(&mut self, cmd: Command) -> bool {
        self.handle_cmd_at(cmd, Instant::now())
    }

    pub(crate) fn handle_cmd_at(&mut self, cmd: Command, now: Instant) -> bool {
        match cmd {
            Command::Play => self.start(now),
            Command::Pause => {
                if self.playing {
                    self.playing = false;
                    self.release_sounding();
                    self.publish();
                    log::debug!(target: "sequencer", "paused at tick {}", self.position.tick);
                }
            }
            Command::Stop { generation } => {
                self.generation = generation;
                self.playing = false;
                self.release_sounding();
                self.position = Position::default();
                self.emit(SequencerEvent::Stop);
                log::debug!(target: "sequencer", "stopped");
            }
            Command::Rewind { generation } => {
                self.generation = generation;
                self.release_sounding();
                self.position = Position::default();
                self.clock.rebase(now, 0);
                self.rebuild_schedules();
                self.last_beat = None;
            }
            Command::Edit(edit) => {
                let track = edit.track();
                edit.apply(&mut self.tracks);
                if self.playing {
                    self.rebuild_schedule(track);
                }
            }
            Command::SetTempo(bpm) => {
                if self.playing {
                    let tick = self.clock.tick_at(now, self.transport.ticks_per_second());
                    self.clock.rebase(now, tick);
                }
                self.transport.set_tempo(bpm);
            }
            Command::SetLoop { enabled, bars } => self.transport.set_loop(enabled, bars),
            Command::AddListener(listener) => {
                self.listeners.add(listener);
                log::debug!(target: "sequencer", "{} listener(s)", self.listeners.len());
            }
            Command::Shutdown => return true,
        }
        false
    }

    /// Begin or resume playback from the current position.
    fn start(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.clock.rebase(now, self.position.tick);
        self.rebuild_schedules();
        // resuming: notes before the pause point already played
        for schedule in &mut self.schedules {
            schedule.skip_before(self.position.tick);
        }
        self.last_beat = None;
        log::debug!(target: "sequencer", "playing from tick {}", self.position.tick);
    }

    /// Move the playhead to wall-clock time `now` and fire whatever it
    /// crossed.
    pub(crate) fn advance(&mut self, now: Instant) {
        let raw = self.clock.tick_at(now, self.transport.ticks_per_second());
        let (tick, wrapped) = self.transport.wrap(raw);
        if wrapped {
            // finish the beats of the pass that just ended
            if let (Some(last), Some(length)) = (self.last_beat, self.transport.loop_ticks()) {
                self.emit_beats(last + 1, length / TICKS_PER_BEAT - 1, false);
            }
            self.clock.rebase(now, tick);
            self.release_sounding();
            self.rebuild_schedules();
            self.last_beat = None;
            log::debug!(target: "sequencer", "loop wrap to tick {tick}");
        }
        self.position = self.transport.position(tick);
        let Position { tick, bar, beat } = self.position;

        let index = tick / TICKS_PER_BEAT;
        let first = match self.last_beat {
            Some(last) => last + 1,
            None if wrapped => 0,
            // fresh start: announce where the playhead is
            None => index,
        };
        if first <= index {
            self.emit_beats(first, index, self.last_beat.is_none());
            self.last_beat = Some(index);
        }

        for track in 0..self.schedules.len() {
            for note in self.schedules[track].take_finished(tick) {
                self.emit(SequencerEvent::NoteOff { track, note: note.note });
            }
            if !self.is_audible(track) {
                continue;
            }
            for note in self.schedules[track].take_due(tick) {
                self.emit(SequencerEvent::NoteOn {
                    track,
                    note: note.note,
                    velocity: note.velocity,
                });
            }
        }

        self.emit(SequencerEvent::Position { tick, bar, beat });
        self.publish();
    }

    /// Beat events for absolute beat indexes `first..=last`, each followed
    /// by a Bar event on a downbeat. `announce_bar` also sends Bar for the
    /// first beat when it falls mid-bar.
    fn emit_beats(&mut self, first: u64, last: u64, announce_bar: bool) {
        let per_bar = self.transport.beats_per_bar() as u64;
        for index in first..=last {
            let (bar, beat) = (index / per_bar, index % per_bar);
            self.emit(SequencerEvent::Beat { bar, beat });
            if beat == 0 || (announce_bar && index == first) {
                self.emit(SequencerEvent::Bar { bar });
            }
        }
    }

    /// With any track soloed only soloed, unmuted tracks play; otherwise
    /// every unmuted track does.
    fn is_audible(&self, track: usize) -> bool {
        let Some(t) = self.tracks.get(track) else {
            return false;
        };
        if self.tracks.iter().any(|t| t.solo) {
            t.solo && !t.muted
        } else {
            !t.muted
        }
    }

    fn rebuild_schedules(&mut self) {
        self.schedules = self
            .tracks
            .iter()
            .map(|t| t.pattern.as_ref().map(|p| Schedule::build(p, t.volume)).unwrap_or_default())
            .collect();
    }

    /// Rebuild one track mid-playback without refiring notes already passed.
    fn rebuild_schedule(&mut self, track: usize) {
        let Some(t) = self.tracks.get(track) else {
            return;
        };
        let mut schedule = t.pattern.as_ref().map(|p| Schedule::build(p, t.volume)).unwrap_or_default();
        schedule.skip_before(self.position.tick);
        if let Some(old) = self.schedules.get_mut(track) {
            for note in old.release_all() {
                self.listeners.emit(SequencerEvent::NoteOff { track, note: note.note });
            }
            *old = schedule;
        }
    }

    fn release_sounding(&mut self) {
        for track in 0..self.schedules.len() {
            for note in self.schedules[track].release_all() {
                self.listeners.emit(SequencerEvent::NoteOff { track, note: note.note });
            }
        }
    }

    fn emit(&mut self, event: SequencerEvent) {
        self.listeners.emit(event);
    }

    fn publish(&self) {
        let mut snapshot = lock(&self.shared);
        if snapshot.generation == self.generation {
            snapshot.position = self.position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mml::parse;
    use crate::sequencer::listener::ChannelListener;

    struct Rig {
        worker: Worker,
        events: Receiver<SequencerEvent>,
        shared: SharedSnapshot,
        start: Instant,
        _tx: crossbeam_channel::Sender<Command>,
    }

    impl Rig {
        fn new(transport: Transport, tracks: usize) -> Self {
            let (tx, rx) = crossbeam_channel::unbounded();
            let shared = SharedSnapshot::default();
            let tracks = (0..tracks).map(SequencerTrack::new).collect();
            let mut worker = Worker::new(rx, shared.clone(), transport, tracks);
            let (listener, events) = ChannelListener::new();
            worker.listeners.add(Box::new(listener));
            Self {
                worker,
                events,
                shared,
                start: Instant::now(),
                _tx: tx,
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn cmd(&mut self, cmd: Command, ms: u64) {
            let now = self.at(ms);
            self.worker.handle_cmd_at(cmd, now);
        }

        fn advance(&mut self, ms: u64) {
            let now = self.at(ms);
            self.worker.advance(now);
        }

        fn drain(&self) -> Vec<SequencerEvent> {
            self.events
                .try_iter()
                .filter(|e| !matches!(e, SequencerEvent::Position { .. }))
                .collect()
        }
    }

    fn edit(edit: TrackEdit) -> Command {
        Command::Edit(edit)
    }

    #[test]
    fn play_fires_first_beat_and_note() {
        let mut rig = Rig::new(Transport::default(), 1);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("l4 c d"))), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        assert_eq!(
            rig.drain(),
            vec![
                SequencerEvent::Beat { bar: 0, beat: 0 },
                SequencerEvent::Bar { bar: 0 },
                SequencerEvent::NoteOn {
                    track: 0,
                    note: 60,
                    velocity: 101
                },
            ]
        );
        // 120 bpm: 960 ticks per second, so 500 ms is one beat
        rig.advance(500);
        assert_eq!(
            rig.drain(),
            vec![
                SequencerEvent::Beat { bar: 0, beat: 1 },
                SequencerEvent::NoteOff { track: 0, note: 60 },
                SequencerEvent::NoteOn {
                    track: 0,
                    note: 62,
                    velocity: 101
                },
            ]
        );
        assert_eq!(lock(&rig.shared).position.tick, 480);
    }

    #[test]
    fn loop_wraps_and_refires() {
        let mut rig = Rig::new(Transport::new(120, 4, true, 1), 1);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("l1 c"))), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        rig.drain();
        // one bar is 2000 ms; 2005 ms lands on tick 4 of the next pass
        rig.advance(2005);
        let events = rig.drain();
        assert!(events.contains(&SequencerEvent::NoteOff { track: 0, note: 60 }));
        assert!(events.contains(&SequencerEvent::NoteOn {
            track: 0,
            note: 60,
            velocity: 101
        }));
        assert_eq!(lock(&rig.shared).position.tick, 4);
    }

    fn beats(events: &[SequencerEvent]) -> Vec<SequencerEvent> {
        events
            .iter()
            .copied()
            .filter(|e| matches!(e, SequencerEvent::Beat { .. } | SequencerEvent::Bar { .. }))
            .collect()
    }

    #[test]
    fn late_poll_emits_every_crossed_beat() {
        let mut rig = Rig::new(Transport::new(120, 4, false, 4), 1);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        rig.drain();
        // one stalled poll jumps from beat 0 straight to tick 2016
        rig.advance(2100);
        assert_eq!(
            beats(&rig.drain()),
            vec![
                SequencerEvent::Beat { bar: 0, beat: 1 },
                SequencerEvent::Beat { bar: 0, beat: 2 },
                SequencerEvent::Beat { bar: 0, beat: 3 },
                SequencerEvent::Beat { bar: 1, beat: 0 },
                SequencerEvent::Bar { bar: 1 },
            ]
        );
        // nothing new inside the same beat
        rig.advance(2200);
        assert!(beats(&rig.drain()).is_empty());
    }

    #[test]
    fn late_poll_across_loop_end_finishes_both_passes() {
        let mut rig = Rig::new(Transport::new(120, 4, true, 1), 1);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        rig.drain();
        // 2600 ms is tick 2496, folded to 576 in the next pass
        rig.advance(2600);
        assert_eq!(
            beats(&rig.drain()),
            vec![
                SequencerEvent::Beat { bar: 0, beat: 1 },
                SequencerEvent::Beat { bar: 0, beat: 2 },
                SequencerEvent::Beat { bar: 0, beat: 3 },
                SequencerEvent::Beat { bar: 0, beat: 0 },
                SequencerEvent::Bar { bar: 0 },
                SequencerEvent::Beat { bar: 0, beat: 1 },
            ]
        );
    }

    #[test]
    fn resume_mid_bar_announces_current_bar() {
        let mut rig = Rig::new(Transport::new(120, 4, false, 4), 1);
        rig.cmd(Command::Play, 0);
        rig.advance(2600);
        rig.cmd(Command::Pause, 2600);
        rig.drain();
        rig.cmd(Command::Play, 9000);
        rig.advance(9000);
        assert_eq!(
            beats(&rig.drain()),
            vec![SequencerEvent::Beat { bar: 1, beat: 1 }, SequencerEvent::Bar { bar: 1 }]
        );
    }

    #[test]
    fn solo_silences_other_tracks() {
        let mut rig = Rig::new(Transport::default(), 2);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("c"))), 0);
        rig.cmd(edit(TrackEdit::SetPattern(1, parse("e"))), 0);
        rig.cmd(edit(TrackEdit::Solo(1, true)), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        let notes: Vec<usize> = rig
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                SequencerEvent::NoteOn { track, .. } => Some(track),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![1]);
    }

    #[test]
    fn muted_solo_track_is_silent() {
        let mut rig = Rig::new(Transport::default(), 2);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("c"))), 0);
        rig.cmd(edit(TrackEdit::Solo(0, true)), 0);
        rig.cmd(edit(TrackEdit::Mute(0, true)), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        assert!(!rig
            .drain()
            .iter()
            .any(|e| matches!(e, SequencerEvent::NoteOn { .. })));
    }

    #[test]
    fn volume_scales_note_velocity() {
        let mut rig = Rig::new(Transport::default(), 1);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("v15 c"))), 0);
        rig.cmd(edit(TrackEdit::Volume(0, 0.5)), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(0);
        assert!(rig.drain().contains(&SequencerEvent::NoteOn {
            track: 0,
            note: 60,
            velocity: 63
        }));
    }

    #[test]
    fn pause_keeps_position_and_resumes() {
        let mut rig = Rig::new(Transport::default(), 1);
        rig.cmd(Command::Play, 0);
        rig.advance(250);
        rig.cmd(Command::Pause, 260);
        assert_eq!(lock(&rig.shared).position.tick, 240);
        // time spent paused does not move the playhead
        rig.cmd(Command::Play, 5000);
        rig.advance(5250);
        assert_eq!(lock(&rig.shared).position.tick, 480);
    }

    #[test]
    fn stop_resets_and_notifies() {
        let mut rig = Rig::new(Transport::default(), 1);
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("l1 c"))), 0);
        rig.cmd(Command::Play, 0);
        rig.advance(100);
        rig.drain();
        lock(&rig.shared).generation = 1;
        rig.cmd(Command::Stop { generation: 1 }, 120);
        assert_eq!(
            rig.drain(),
            vec![
                SequencerEvent::NoteOff { track: 0, note: 60 },
                SequencerEvent::Stop
            ]
        );
        assert_eq!(rig.worker.position, Position::default());
        assert!(!rig.worker.playing);
    }

    #[test]
    fn stale_generation_does_not_publish() {
        let mut rig = Rig::new(Transport::default(), 1);
        rig.cmd(Command::Play, 0);
        // the handle has reset, the worker has not seen it yet
        lock(&rig.shared).generation = 3;
        rig.advance(400);
        assert_eq!(lock(&rig.shared).position, Position::default());
    }

    #[test]
    fn tempo_change_keeps_position_continuous() {
        let mut rig = Rig::new(Transport::new(120, 4, false, 4), 1);
        rig.cmd(Command::Play, 0);
        rig.cmd(Command::SetTempo(60), 1000);
        // 960 ticks at 120 bpm, then 480 per second at 60 bpm
        rig.advance(2000);
        assert_eq!(lock(&rig.shared).position.tick, 1440);
    }

    #[test]
    fn edit_while_playing_skips_passed_notes() {
        let mut rig = Rig::new(Transport::new(120, 4, false, 4), 1);
        rig.cmd(Command::Play, 0);
        rig.advance(505);
        rig.drain();
        // c at 0 and d at 480 have passed; only e at 960 should fire
        rig.cmd(edit(TrackEdit::SetPattern(0, parse("l4 c d e"))), 505);
        rig.advance(506);
        assert!(rig.drain().iter().all(|e| !matches!(e, SequencerEvent::NoteOn { .. })));
        rig.advance(1000);
        assert!(rig.drain().contains(&SequencerEvent::NoteOn {
            track: 0,
            note: 64,
            velocity: 101
        }));
    }

    #[test]
    fn shutdown_ends_worker() {
        let mut rig = Rig::new(Transport::default(), 1);
        assert!(rig.worker.handle_cmd_at(Command::Shutdown, rig.start));
        assert!(!rig.worker.handle_cmd_at(Command::Play, rig.start));
    }
}
