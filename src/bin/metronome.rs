//! Realtime console demo for the Rust Timeline
//!
//! Prints clicks from looping actions while the timeline plays in real time.
//!
//! Usage:
//!   cargo run --bin metronome -- --test 1 --bpm 120
//!   RUST_LOG=debug cargo run --bin metronome -- --test 3   # show state transitions
//!
//! Test Cases:
//!   1. Metronome      - Quarter note clicks for eight beats
//!   2. Polyrhythm     - 3 against 4, the triplets removed halfway through
//!   3. Playback Ramp  - Same clicks, playback rate raised every two beats
//!   4. Pause/Resume   - Pauses itself, then resumes from the host after a second

use rust_timeline::{Schedule, Timeline, TimelineConfig, TimelineResult, WeakTimeline};
use std::env;
use std::time::{Duration, Instant};

fn click(label: &'static str, started: Instant) -> impl FnMut() + 'static {
    let mut count = 0u32;
    move || {
        count += 1;
        println!("[{:>7.3}s] {} {}", started.elapsed().as_secs_f64(), label, count);
    }
}

fn stop_at(timeline: &Timeline, offset: f64) -> TimelineResult<()> {
    let weak = timeline.downgrade();
    timeline.insert(offset, move || {
        if let Some(t) = weak.upgrade() {
            t.stop();
        }
    })
}

fn with_timeline<F>(weak: &WeakTimeline, f: F)
where
    F: FnOnce(&Timeline),
{
    if let Some(t) = weak.upgrade() {
        f(&t);
    }
}

// ============================================================================
// Test 1: Metronome
// ============================================================================

fn test_metronome(timeline: &Timeline, beat: f64, started: Instant) -> TimelineResult<()> {
    println!("Test 1: Metronome");
    println!("-----------------");

    timeline.loop_every(beat, 0.0, click("click", started))?;
    stop_at(timeline, beat * 8.0 - beat / 2.0)?;
    timeline.start();
    timeline.run();
    Ok(())
}

// ============================================================================
// Test 2: Polyrhythm
// ============================================================================

fn test_polyrhythm(timeline: &Timeline, beat: f64, started: Instant) -> TimelineResult<()> {
    println!("Test 2: Polyrhythm (3 vs 4)");
    println!("---------------------------");

    let bar = beat * 4.0;
    let mut voices = Schedule::new();
    voices.loop_every(bar / 4.0, 0.0, vec!["four".to_string()], click("four ", started))?;
    voices.loop_every(bar / 3.0, 0.0, vec!["three".to_string()], click("three", started))?;
    timeline.insert_contents_of(voices);

    let weak = timeline.downgrade();
    timeline.insert(bar * 2.0 - beat / 2.0, move || {
        with_timeline(&weak, |t| {
            let removed = t.remove_all(&["three"]);
            println!("removed {} triplet voice(s)", removed);
        });
    })?;
    stop_at(timeline, bar * 3.0 - beat / 2.0)?;

    timeline.start();
    timeline.run();
    Ok(())
}

// ============================================================================
// Test 3: Playback Ramp
// ============================================================================

fn test_playback_ramp(timeline: &Timeline, beat: f64, started: Instant) -> TimelineResult<()> {
    println!("Test 3: Playback Ramp");
    println!("---------------------");

    timeline.loop_every(beat, 0.0, click("click", started))?;
    for (i, playback_rate) in [1.5, 2.0, 3.0].into_iter().enumerate() {
        let weak = timeline.downgrade();
        let offset = beat * 2.0 * (i + 1) as f64 - beat / 4.0;
        timeline.insert(offset, move || {
            with_timeline(&weak, |t| {
                if let Err(e) = t.set_playback_rate(playback_rate) {
                    tracing::error!("{}", e);
                }
                println!("playback rate {}", playback_rate);
            });
        })?;
    }
    stop_at(timeline, beat * 12.0 - beat / 2.0)?;

    timeline.start();
    timeline.run();
    Ok(())
}

// ============================================================================
// Test 4: Pause/Resume
// ============================================================================

fn test_pause_resume(timeline: &Timeline, beat: f64, started: Instant) -> TimelineResult<()> {
    println!("Test 4: Pause/Resume");
    println!("--------------------");

    timeline.loop_every(beat, 0.0, click("click", started))?;
    let weak = timeline.downgrade();
    timeline.insert(beat * 4.0 - beat / 2.0, move || {
        with_timeline(&weak, |t| {
            println!("pausing");
            t.pause();
        });
    })?;
    stop_at(timeline, beat * 8.0 - beat / 2.0)?;

    timeline.start();
    // Returns once the timeline pauses itself.
    timeline.run();

    std::thread::sleep(Duration::from_secs(1));
    println!("resuming");
    timeline.resume();
    timeline.run();
    Ok(())
}

fn print_usage() {
    println!("Rust Timeline - Realtime Metronome Demo");
    println!("=======================================");
    println!();
    println!("Usage:");
    println!("  cargo run --bin metronome -- --test T [--bpm B]");
    println!();
    println!("Test Cases:");
    println!("  1: Metronome      - Quarter note clicks for eight beats");
    println!("  2: Polyrhythm     - 3 vs 4, triplets removed after two bars");
    println!("  3: Playback Ramp  - Playback rate raised every two beats");
    println!("  4: Pause/Resume   - Pause mid-run, resume a second later");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut test_case: Option<usize> = None;
    let mut bpm: f64 = 120.0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--test" | "-t" => {
                i += 1;
                if i < args.len() {
                    test_case = args[i].parse().ok();
                }
            }
            "--bpm" | "-b" => {
                i += 1;
                if i < args.len() {
                    bpm = args[i].parse().unwrap_or(bpm);
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let test_case = match test_case {
        Some(t) if (1..=4).contains(&t) => t,
        Some(t) => {
            return Err(format!("Invalid test case {}. Must be 1-4.", t).into());
        }
        None => {
            print_usage();
            return Err("Missing --test argument".into());
        }
    };
    if !(bpm > 0.0 && f64::is_finite(bpm)) {
        return Err(format!("Invalid bpm {}", bpm).into());
    }

    let beat = 60.0 / bpm;
    let config = TimelineConfig {
        identifier: "metronome".to_string(),
        tick_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let timeline = Timeline::new(config)?.with_completion(|| println!("schedule exhausted"));

    tracing::info!(test_case, bpm, "starting demo");
    let started = Instant::now();
    match test_case {
        1 => test_metronome(&timeline, beat, started)?,
        2 => test_polyrhythm(&timeline, beat, started)?,
        3 => test_playback_ramp(&timeline, beat, started)?,
        _ => test_pause_resume(&timeline, beat, started)?,
    }
    tracing::info!(
        elapsed = started.elapsed().as_secs_f64(),
        "demo finished"
    );

    Ok(())
}
