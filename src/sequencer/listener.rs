//! Sequencer callbacks.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender};

/// Events a [`ChannelListener`] buffers before it starts dropping them.
/// Position events arrive about once a millisecond while playing, so this
/// holds a few seconds of playback.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Something the sequencer reports while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEvent {
    NoteOn { track: usize, note: u8, velocity: u8 },
    NoteOff { track: usize, note: u8 },
    Beat { bar: u64, beat: u64 },
    Bar { bar: u64 },
    Stop,
    Position { tick: u64, bar: u64, beat: u64 },
}

/// Receives sequencer events on the sequencer's worker thread. Every method
/// defaults to doing nothing; implement the ones you need.
///
/// A panic inside a callback is caught and logged and does not stop
/// playback.
pub trait SequencerListener: Send {
    fn note_on(&mut self, _track: usize, _note: u8, _velocity: u8) {}
    fn note_off(&mut self, _track: usize, _note: u8) {}
    fn beat(&mut self, _bar: u64, _beat: u64) {}
    fn bar(&mut self, _bar: u64) {}
    fn stop(&mut self) {}
    fn position(&mut self, _tick: u64, _bar: u64, _beat: u64) {}

    /// Route an event to the matching callback.
    fn dispatch(&mut self, event: SequencerEvent) {
        match event {
            SequencerEvent::NoteOn { track, note, velocity } => self.note_on(track, note, velocity),
            SequencerEvent::NoteOff { track, note } => self.note_off(track, note),
            SequencerEvent::Beat { bar, beat } => self.beat(bar, beat),
            SequencerEvent::Bar { bar } => self.bar(bar),
            SequencerEvent::Stop => self.stop(),
            SequencerEvent::Position { tick, bar, beat } => self.position(tick, bar, beat),
        }
    }
}

/// Forwards events into a bounded crossbeam channel.
///
/// The worker never waits on a slow receiver: while the channel is full new
/// events are dropped, so drain the receiver steadily during playback.
pub struct ChannelListener {
    tx: Sender<SequencerEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, Receiver<SequencerEvent>) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<SequencerEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl SequencerListener for ChannelListener {
    fn dispatch(&mut self, event: SequencerEvent) {
        // full: the event is dropped; disconnected: nobody is listening
        let _ = self.tx.try_send(event);
    }
}

/// The registered listeners, called in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    listeners: Vec<Box<dyn SequencerListener>>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Box<dyn SequencerListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn emit(&mut self, event: SequencerEvent) {
        for (index, listener) in self.listeners.iter_mut().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.dispatch(event)));
            if result.is_err() {
                log::warn!(target: "sequencer", "listener {index} panicked on {event:?}");
            }
        }
    }
}
