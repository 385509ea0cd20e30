//! Offline WAV-in/WAV-out driver for manual auditioning of the engine.
//!
//! Usage: `denoise_wav <input.wav> <output.wav> [learn_seconds]`
//!
//! The first `learn_seconds` of the input (default 1.0) are fed through the
//! engine in `learn_noise` mode to build a noise profile; the remainder is
//! then denoised with default parameters.

use anyhow::{bail, Context, Result};
use spectral_denoiser::{Engine, EngineConfig, Parameters};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: denoise_wav <input.wav> <output.wav> [learn_seconds]");
    }
    let learn_seconds: f32 = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(1.0);

    let mut reader = hound::WavReader::open(&args[1])
        .with_context(|| format!("opening {}", args[1]))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        bail!("only mono input is supported, got {} channels", spec.channels);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    let sample_rate = spec.sample_rate as f32;
    let engine_config = EngineConfig {
        sample_rate,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(engine_config)?;

    let learn_samples = ((learn_seconds * sample_rate) as usize).min(samples.len());
    let mut output = vec![0.0f32; samples.len()];

    let learn_params = Parameters { learn_noise: true, ..Default::default() };
    engine.run(&samples[..learn_samples], &mut output[..learn_samples], learn_samples, &learn_params);
    log::info!(
        "learned noise profile from {:.2}s ({} frames learned)",
        learn_samples as f32 / sample_rate,
        engine.noise_profile_snapshot().frames_learned
    );

    let apply_params = Parameters::default();
    let rest = &samples[learn_samples..];
    engine.run(rest, &mut output[learn_samples..], rest.len(), &apply_params);

    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&args[2], out_spec)
        .with_context(|| format!("creating {}", args[2]))?;
    for sample in output {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}
