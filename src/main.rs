//! groovebox: render songs, patterns and chords offline, or run the
//! sequencer against an MML pattern.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use groovebox::beat::SAMPLE_RATE;
use groovebox::config::EngineConfig;
use groovebox::export::{write_wav, MidiExporter};
use groovebox::instrument::{bass, drum, synth, BassVoice, SynthVoice};
use groovebox::mml;
use groovebox::sequencer::{Sequencer, SequencerListener};
use groovebox::song::{self, parser::note_to_midi, SongRenderer};

#[derive(Parser)]
#[command(name = "groovebox")]
#[command(about = "Offline groovebox: MML patterns, drum/bass/synth voices, MIDI and WAV export")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a song file to WAV
    Render {
        /// Song text file
        song: PathBuf,

        #[arg(short, long, default_value = "song.wav")]
        output: PathBuf,
    },

    /// Export an MML pattern as a Standard MIDI File
    Midi {
        /// MML text, or a drum preset name with --drums
        mml: String,

        #[arg(short, long, default_value = "pattern.mid")]
        output: PathBuf,

        /// Treat the pattern as drums (GM notes on channel 10)
        #[arg(long)]
        drums: bool,
    },

    /// Render one bar of 303 bass
    Bass {
        /// Preset name (acid, techno) or shorthand like "c2* c r c~ e* g"
        pattern: String,

        #[arg(short, long, default_value = "bass.wav")]
        output: PathBuf,
    },

    /// Render a chord on one of the synth presets
    Synth {
        /// Preset name
        preset: String,

        /// Notes such as c4 e4 g4
        #[arg(required = true)]
        notes: Vec<String>,

        #[arg(long, default_value_t = 2.0)]
        seconds: f64,

        #[arg(short, long, default_value = "synth.wav")]
        output: PathBuf,
    },

    /// Play an MML pattern on the sequencer and print transport events
    Play {
        mml: String,

        /// Stop after this many seconds (Ctrl-C stops earlier)
        #[arg(long, default_value_t = 8.0)]
        seconds: f64,
    },
}

const MAX_PLAY_SECONDS: f64 = 3600.0;

struct PrintListener;

impl SequencerListener for PrintListener {
    fn note_on(&mut self, track: usize, note: u8, velocity: u8) {
        println!("  note on  track {track} note {note} vel {velocity}");
    }

    fn bar(&mut self, bar: u64) {
        println!("bar {}", bar + 1);
    }

    fn stop(&mut self) {
        println!("stopped");
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::load().unwrap_or_default();

    match command {
        Commands::Render { song: path, output } => {
            let text = std::fs::read_to_string(&path)?;
            let mut song = song::parse(&text);
            song.apply_mix(&config);
            let samples = SongRenderer::new(SAMPLE_RATE).render(&song);
            write_wav(&output, &samples)?;
            println!(
                "{}: {} bars at {} BPM, {:.2}s -> {}",
                song.name,
                song.bars,
                song.tempo(),
                song.duration_seconds(),
                output.display()
            );
        }

        Commands::Midi { mml: text, output, drums } => {
            let mut exporter = MidiExporter::new();
            if drums {
                let pattern = drum::preset(&text).unwrap_or_else(|| drum::parse_pattern(&text));
                exporter.add_drum_pattern(&pattern);
            } else {
                exporter.add_pattern(&mml::parse(&text), 0, "");
            }
            exporter.export(&output)?;
            println!("wrote {}", output.display());
        }

        Commands::Bass { pattern, output } => {
            let pattern = bass::preset(&pattern).unwrap_or_else(|| bass::parse_shorthand(&pattern));
            let samples = BassVoice::new(SAMPLE_RATE).render_pattern(&pattern);
            write_wav(&output, &samples)?;
            println!("wrote {} samples to {}", samples.len(), output.display());
        }

        Commands::Synth {
            preset,
            notes,
            seconds,
            output,
        } => {
            let patch = synth::preset(&preset).ok_or_else(|| {
                format!("unknown preset {preset:?} (try {})", synth::list_presets().join(", "))
            })?;
            let midi: Vec<u8> = notes.iter().filter_map(|n| note_to_midi(n)).collect();
            if midi.is_empty() {
                return Err("no valid notes".into());
            }
            let samples = SynthVoice::new(SAMPLE_RATE).render_chord(&patch, &midi, seconds, 0.8);
            write_wav(&output, &samples)?;
            println!("{patch}: {} notes -> {}", midi.len(), output.display());
        }

        Commands::Play { mml: text, seconds } => {
            let pattern = mml::parse(&text);
            let mut sequencer = Sequencer::with_config(&config);
            sequencer.set_tempo(pattern.tempo());
            sequencer.add_listener(PrintListener);
            sequencer.set_pattern(0, pattern);

            let (tx, rx) = crossbeam_channel::bounded(1);
            ctrlc::set_handler(move || {
                let _ = tx.try_send(());
            })?;

            sequencer.play();
            // either Ctrl-C or the timeout ends playback
            let _ = rx.recv_timeout(Duration::from_secs_f64(seconds.max(0.0).min(MAX_PLAY_SECONDS)));
            sequencer.stop();
        }
    }
    Ok(())
}
