//! Integration tests for threaded sequencer playback.
//!
//! These run the real worker thread, so they assert on ordering and resets
//! rather than exact tick counts.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use groovebox::config::EngineConfig;
use groovebox::mml;
use groovebox::sequencer::{ChannelListener, Position, Sequencer, SequencerEvent, TransportState};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Collect events until `done` matches one or the timeout passes.
fn collect_until(
    rx: &Receiver<SequencerEvent>,
    done: impl Fn(&SequencerEvent) -> bool,
) -> Vec<SequencerEvent> {
    let deadline = Instant::now() + TIMEOUT;
    let mut events = Vec::new();
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(event) => {
                let finished = done(&event);
                events.push(event);
                if finished {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    events
}

fn note_ons(events: &[SequencerEvent]) -> Vec<(usize, u8)> {
    events
        .iter()
        .filter_map(|e| match e {
            SequencerEvent::NoteOn { track, note, .. } => Some((*track, *note)),
            _ => None,
        })
        .collect()
}

#[test]
fn play_then_stop_resets_position() {
    for run_ms in [0, 15, 120] {
        let mut seq = Sequencer::default();
        seq.set_pattern(0, mml::parse("t240 l16 o4 c d e f g a b > c"));
        seq.play();
        std::thread::sleep(Duration::from_millis(run_ms));
        seq.stop();

        assert_eq!(seq.state(), TransportState::Stopped);
        assert_eq!(seq.position(), Position::default(), "after {run_ms} ms");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(seq.position(), Position::default(), "late update after {run_ms} ms");
    }
}

#[test]
fn notes_fire_in_pattern_order() {
    let mut seq = Sequencer::default();
    // slow tempo: a wide note window in wall-clock time
    seq.set_tempo(40);
    let (listener, rx) = ChannelListener::new();
    seq.add_listener(listener);
    seq.set_pattern(1, mml::parse("l32 o3 c e g"));
    seq.play();

    let events = collect_until(&rx, |e| matches!(e, SequencerEvent::NoteOn { note: 55, .. }));
    seq.stop();
    assert_eq!(note_ons(&events), vec![(1, 48), (1, 52), (1, 55)]);

    let first_note = events
        .iter()
        .position(|e| matches!(e, SequencerEvent::NoteOn { .. }))
        .unwrap();
    let first_beat = events
        .iter()
        .position(|e| *e == SequencerEvent::Beat { bar: 0, beat: 0 })
        .unwrap();
    assert!(first_beat < first_note);
}

#[test]
fn muted_track_stays_silent() {
    let mut seq = Sequencer::default();
    // slow tempo: a wide note window in wall-clock time
    seq.set_tempo(40);
    let (listener, rx) = ChannelListener::new();
    seq.add_listener(listener);
    seq.set_pattern(0, mml::parse("l32 c c c c"));
    seq.set_pattern(1, mml::parse("l32 r r e"));
    seq.mute_track(0, true);
    seq.play();

    let events = collect_until(&rx, |e| matches!(e, SequencerEvent::NoteOn { track: 1, .. }));
    seq.stop();
    assert_eq!(note_ons(&events), vec![(1, 64)]);
}

#[test]
fn stop_notifies_listeners() {
    let mut seq = Sequencer::default();
    let (listener, rx) = ChannelListener::new();
    seq.add_listener(listener);
    seq.play();
    seq.stop();
    let events = collect_until(&rx, |e| *e == SequencerEvent::Stop);
    assert_eq!(events.last(), Some(&SequencerEvent::Stop));
}

#[test]
fn pause_holds_position() {
    let mut seq = Sequencer::with_config(&EngineConfig {
        loop_enabled: false,
        ..EngineConfig::default()
    });
    seq.play();
    std::thread::sleep(Duration::from_millis(60));
    seq.pause();
    std::thread::sleep(Duration::from_millis(10));
    let held = seq.position();
    assert!(held.tick > 0);
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(seq.position(), held);
    assert_eq!(seq.state(), TransportState::Paused);
}
