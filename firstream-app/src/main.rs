// firstream: play a WAV file through the block-buffered FIR low-pass filter.

mod settings;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use firstream_core::audio::device::list_output_devices;
use firstream_core::{AudioPlayback, FilterStrength, Pipeline, WavSource};
use tracing::{error, info};

use crate::settings::{default_settings_path, load_settings, save_settings, PlaybackSettings};

const COMPLETION_POLL: Duration = Duration::from_millis(20);
/// Lets the device play out the buffer it already pulled.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

const USAGE: &str = "Usage: firstream [options] <input.wav>

Options:
  --settings <file>        settings file (default: user data dir)
  --strength <light|strong>
  --decay <rate>           explicit kernel decay rate (overrides --strength)
  --block-size <frames>
  --kernel-length <taps>
  --device <name>          preferred output device
  --list-devices           print output devices and exit
  --write-settings         persist the effective settings
  -h, --help";

#[derive(Debug, Default, PartialEq)]
struct Args {
    settings_path: Option<PathBuf>,
    input: Option<PathBuf>,
    strength: Option<FilterStrength>,
    decay_rate: Option<f64>,
    block_size: Option<usize>,
    kernel_length: Option<usize>,
    device: Option<String>,
    list_devices: bool,
    write_settings: bool,
    help: bool,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    fn value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
        it.next()
            .with_context(|| format!("missing value for {flag}"))
    }

    let mut args = Args::default();
    let mut it = raw.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => args.settings_path = Some(PathBuf::from(value(&mut it, &arg)?)),
            "--strength" => {
                let v = value(&mut it, &arg)?;
                let strength = FilterStrength::parse(&v)
                    .with_context(|| format!("invalid value for --strength: {v}"))?;
                args.strength = Some(strength);
            }
            "--decay" => {
                let v = value(&mut it, &arg)?;
                args.decay_rate = Some(
                    v.parse::<f64>()
                        .with_context(|| format!("invalid value for --decay: {v}"))?,
                );
            }
            "--block-size" => {
                let v = value(&mut it, &arg)?;
                args.block_size = Some(
                    v.parse::<usize>()
                        .with_context(|| format!("invalid value for --block-size: {v}"))?,
                );
            }
            "--kernel-length" => {
                let v = value(&mut it, &arg)?;
                args.kernel_length = Some(
                    v.parse::<usize>()
                        .with_context(|| format!("invalid value for --kernel-length: {v}"))?,
                );
            }
            "--device" => args.device = Some(value(&mut it, &arg)?),
            "--list-devices" => args.list_devices = true,
            "--write-settings" => args.write_settings = true,
            "--help" | "-h" => args.help = true,
            other if other.starts_with('-') => bail!("unknown argument: {other}"),
            path => {
                if args.input.is_some() {
                    bail!("more than one input file given");
                }
                args.input = Some(PathBuf::from(path));
            }
        }
    }
    Ok(args)
}

/// Command-line values win over the settings file.
fn apply_overrides(settings: &mut PlaybackSettings, args: &Args) {
    if let Some(input) = &args.input {
        settings.input_path = Some(input.clone());
    }
    if let Some(strength) = args.strength {
        settings.strength = strength.as_str().into();
        settings.decay_rate = None;
    }
    if let Some(rate) = args.decay_rate {
        settings.decay_rate = Some(rate);
    }
    if let Some(size) = args.block_size {
        settings.block_size = size;
    }
    if let Some(len) = args.kernel_length {
        settings.kernel_length = len;
    }
    if let Some(device) = &args.device {
        settings.preferred_output_device = Some(device.clone());
    }
    settings.normalize();
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    if args.list_devices {
        let devices = list_output_devices();
        if devices.is_empty() {
            println!("no output devices found");
        }
        for device in devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let settings_path = args
        .settings_path
        .clone()
        .unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    apply_overrides(&mut settings, &args);
    info!(path = %settings_path.display(), "settings loaded");

    if args.write_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("failed to write {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    let Some(input) = settings.input_path.clone() else {
        if args.write_settings {
            return Ok(());
        }
        bail!("no input file given\n\n{USAGE}");
    };

    let config = settings.engine_config();
    config.validate().context("invalid filter configuration")?;
    info!(
        strength = settings.strength.as_str(),
        decay_rate = config.decay_rate,
        block_size = config.block_size,
        kernel_length = config.kernel_length,
        "filter configured"
    );

    let source = WavSource::open(&input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let sample_rate = source.sample_rate();
    let decode_failed = source.failure_flag();
    let (pipeline, mut completion) = Pipeline::from_config(source, &config)?;
    let diagnostics = pipeline.diagnostics();
    info!(
        group_delay_frames = pipeline.kernel().group_delay(),
        "output lags input by the kernel's group delay"
    );

    let playback = AudioPlayback::open_with_preference(
        pipeline,
        sample_rate,
        settings.preferred_output_device.as_deref(),
    )
    .context("failed to start audio output")?;

    loop {
        if let Some(outcome) = completion.try_wait() {
            outcome.context("pipeline stopped before completing")?;
            break;
        }
        if playback.has_failed() {
            bail!("audio output stream failed");
        }
        thread::sleep(COMPLETION_POLL);
    }

    thread::sleep(DRAIN_GRACE);
    drop(playback);

    let snapshot = diagnostics.snapshot();
    info!(
        diagnostics = %serde_json::to_string(&snapshot)?,
        "playback finished"
    );
    if decode_failed.load(Ordering::Acquire) {
        bail!(
            "{} could not be decoded to the end; playback stopped early",
            input.display()
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("firstream=info,firstream_core=info")
            }),
        )
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_and_input() {
        let parsed = args(&[
            "--strength",
            "Strong",
            "--block-size",
            "256",
            "--device",
            "Speakers",
            "song.wav",
        ])
        .unwrap();

        assert_eq!(parsed.strength, Some(FilterStrength::Strong));
        assert_eq!(parsed.block_size, Some(256));
        assert_eq!(parsed.device.as_deref(), Some("Speakers"));
        assert_eq!(parsed.input, Some(PathBuf::from("song.wav")));
        assert!(!parsed.list_devices);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&["--decay"]).is_err());
        assert!(args(&["--decay", "fast"]).is_err());
        assert!(args(&["--strength", "medium"]).is_err());
        assert!(args(&["--bogus"]).is_err());
        assert!(args(&["a.wav", "b.wav"]).is_err());
    }

    #[test]
    fn overrides_replace_settings_values() {
        let mut settings = PlaybackSettings {
            decay_rate: Some(3.0),
            ..PlaybackSettings::default()
        };
        let parsed = args(&["--strength", "strong", "--kernel-length", "0", "x.wav"]).unwrap();
        apply_overrides(&mut settings, &parsed);

        assert_eq!(settings.strength, "strong");
        // Choosing a preset clears a stale explicit rate.
        assert_eq!(settings.engine_config().decay_rate, 0.1);
        // Zero is repaired by normalize.
        assert_eq!(settings.kernel_length, 64);
        assert_eq!(settings.input_path, Some(PathBuf::from("x.wav")));
    }

    #[test]
    fn explicit_decay_beats_strength_on_the_command_line() {
        let mut settings = PlaybackSettings::default();
        let parsed = args(&["--strength", "strong", "--decay", "1.5"]).unwrap();
        apply_overrides(&mut settings, &parsed);
        assert_eq!(settings.engine_config().decay_rate, 1.5);
    }
}
