//! Replay a WAV fixture through the classifier with a simulated frame clock.
//!
//! Prints (or writes) a JSON report with the viseme timeline and per-tick
//! latency. Use it to re-check recorded fixtures after touching any scoring
//! threshold.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lipsync_core::{
    AnalyserConfig, AudioTap, LipsyncSession, SessionDiagnostics, Viseme, VisemeFrame,
};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    fps: u32,
    output: Option<PathBuf>,
    include_frames: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    viseme: Viseme,
    start_ms: f64,
    end_ms: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    input: String,
    sample_rate: u32,
    fps: u32,
    duration_secs: f64,
    ticks: usize,
    p50_tick_us: f64,
    p95_tick_us: f64,
    max_tick_us: f64,
    /// Ticks spent on each viseme.
    histogram: BTreeMap<Viseme, usize>,
    segments: Vec<Segment>,
    diagnostics: SessionDiagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<VisemeFrame>>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("viseme-trace failed: {e}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args, String> {
    let mut input: Option<PathBuf> = None;
    let mut fps: u32 = 60;
    let mut output: Option<PathBuf> = None;
    let mut include_frames = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--input" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --input".into());
                };
                input = Some(PathBuf::from(v));
            }
            "--fps" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --fps".into());
                };
                fps = v
                    .parse::<u32>()
                    .map_err(|_| "invalid value for --fps".to_string())?
                    .clamp(10, 240);
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                output = Some(PathBuf::from(v));
            }
            "--frames" => include_frames = true,
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p lipsync-core --bin viseme-trace -- \\
  --input <file.wav> [--fps <n>] [--frames] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let input = input.ok_or_else(|| "missing --input <file.wav>".to_string())?;
    Ok(Args {
        input,
        fps,
        output,
        include_frames,
    })
}

fn read_wav_mono_f32(path: &Path) -> Result<(Vec<f32>, u32), String> {
    let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << (spec.bits_per_sample.max(1) - 1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max).map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    if channels == 1 {
        return Ok((interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn segments_of(timeline: &[Viseme], frame_ms: f64) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (i, &viseme) in timeline.iter().enumerate() {
        let start_ms = i as f64 * frame_ms;
        let end_ms = start_ms + frame_ms;
        match segments.last_mut() {
            Some(last) if last.viseme == viseme => last.end_ms = end_ms,
            _ => segments.push(Segment {
                viseme,
                start_ms,
                end_ms,
            }),
        }
    }
    segments
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    let (samples, sample_rate) = read_wav_mono_f32(&args.input)?;

    let mut session = LipsyncSession::with_tap(AnalyserConfig::default());
    let (mut writer, tap) = AudioTap::new(sample_rate);
    session.connect(tap).map_err(|e| e.to_string())?;

    let samples_per_tick = sample_rate as f64 / args.fps as f64;
    let frame_ms = 1_000.0 / args.fps as f64;
    let ticks = (samples.len() as f64 / samples_per_tick).ceil() as usize;

    let mut timeline = Vec::with_capacity(ticks);
    let mut latencies_us = Vec::with_capacity(ticks);
    let mut frames = args.include_frames.then(|| Vec::with_capacity(ticks));

    let clock_origin = Instant::now();
    for tick in 0..ticks {
        let start = (tick as f64 * samples_per_tick) as usize;
        let end = (((tick + 1) as f64 * samples_per_tick) as usize).min(samples.len());
        let chunk = &samples[start.min(end)..end];
        let written = writer.write(chunk);
        if written < chunk.len() {
            warn!(tick, dropped = chunk.len() - written, "tap overflow during replay");
        }

        let now = clock_origin + Duration::from_secs_f64(tick as f64 / args.fps as f64);
        let started = Instant::now();
        let viseme = session.tick_at(now);
        latencies_us.push(started.elapsed().as_secs_f64() * 1e6);

        timeline.push(viseme);
        if let (Some(frames), Some(frame)) = (frames.as_mut(), session.last_frame()) {
            frames.push(frame.clone());
        }
    }

    let mut histogram = BTreeMap::new();
    for &viseme in &timeline {
        *histogram.entry(viseme).or_insert(0usize) += 1;
    }

    let report = Report {
        input: args.input.display().to_string(),
        sample_rate,
        fps: args.fps,
        duration_secs: samples.len() as f64 / sample_rate.max(1) as f64,
        ticks,
        p50_tick_us: percentile(&latencies_us, 0.50),
        p95_tick_us: percentile(&latencies_us, 0.95),
        max_tick_us: latencies_us.iter().copied().fold(0.0, f64::max),
        histogram,
        segments: segments_of(&timeline, frame_ms),
        diagnostics: session.diagnostics(),
        frames,
    };
    session.disconnect();

    eprintln!(
        "Done. ticks={} segments={} p50={:.1}µs p95={:.1}µs",
        report.ticks,
        report.segments.len(),
        report.p50_tick_us,
        report.p95_tick_us
    );

    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        eprintln!("Wrote trace report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
