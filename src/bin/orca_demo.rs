//! Orca command-line demo.
//!
//! Usage:
//!   cargo run --features demo --bin orca-demo -- \
//!       --access-key "$PV_ACCESS_KEY" --model-path orca_params_en_female.pv \
//!       --text "Hello from Rust!" --output hello.wav
//!
//!   # Feed the text word by word through the streaming API
//!   cargo run --features demo --bin orca-demo -- --stream --text "..." --output streamed.wav
//!
//!   # Inference devices available to the engine
//!   cargo run --features demo --bin orca-demo -- --list-devices

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::{bail, Context};
use clap::Parser;
use orca_tts::{
    list_hardware_devices, orca::Builder, resource, streaming::StreamingSynthesizer, text, wav,
    NativeLibrary, Orca, OrcaConfig, OrcaError, SynthesizeParams,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orca-demo")]
#[command(about = "Synthesize speech with the Orca engine", long_about = None)]
struct Args {
    /// AccessKey obtained from Picovoice Console
    #[arg(long, short = 'a', env = "PV_ACCESS_KEY")]
    access_key: Option<String>,

    /// Orca model parameter file
    #[arg(long, short = 'm', env = "PV_ORCA_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Engine shared library
    #[arg(long, short = 'l', env = "PV_ORCA_LIBRARY_PATH")]
    library_path: Option<PathBuf>,

    /// Inference device, e.g. best, cpu:4, gpu:0
    #[arg(long, short = 'y', env = "PV_ORCA_DEVICE")]
    device: Option<String>,

    /// JSON config file; command-line options take precedence
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Text to synthesize
    #[arg(long, short = 't', required_unless_present = "list_devices")]
    text: Option<String>,

    /// Output WAV file
    #[arg(long, short = 'o', default_value = "output.wav")]
    output: PathBuf,

    /// Speaking rate, 0.7 to 1.3
    #[arg(long, default_value_t = orca_tts::params::DEFAULT_SPEECH_RATE)]
    speech_rate: f32,

    /// Seed for reproducible output
    #[arg(long)]
    random_state: Option<i64>,

    /// Synthesize word by word through the streaming API
    #[arg(long)]
    stream: bool,

    /// Streaming: chunks to buffer before audio is released
    #[arg(long, default_value_t = 1)]
    audio_wait_chunks: usize,

    /// Print word and phoneme timings
    #[arg(long)]
    show_alignments: bool,

    /// List available hardware devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn config(&self) -> anyhow::Result<OrcaConfig> {
        let mut config = match &self.config {
            Some(path) => OrcaConfig::from_file(path)?,
            None => OrcaConfig::default(),
        };
        // clap already consulted the environment for each option.
        if self.access_key.is_some() {
            config.access_key = self.access_key.clone();
        }
        if self.model_path.is_some() {
            config.model_path = self.model_path.clone();
        }
        if self.library_path.is_some() {
            config.library_path = self.library_path.clone();
        }
        if self.device.is_some() {
            config.device = self.device.clone();
        }
        Ok(config)
    }

    fn params(&self) -> anyhow::Result<SynthesizeParams> {
        let mut builder = SynthesizeParams::builder().speech_rate(self.speech_rate);
        if let Some(seed) = self.random_state {
            builder = builder.random_state(seed);
        }
        Ok(builder.build()?)
    }
}

/// Friendlier wording for errors a user can act on.
fn describe(err: &OrcaError) -> String {
    match err {
        OrcaError::ActivationError(_) => "AccessKey activation error".to_string(),
        OrcaError::ActivationLimit(_) => "AccessKey has reached its processing limit".to_string(),
        OrcaError::ActivationRefused(_) => "AccessKey refused".to_string(),
        OrcaError::ActivationThrottled(_) => "AccessKey has been throttled".to_string(),
        other => other.to_string(),
    }
}

fn list_devices(config: &OrcaConfig) -> anyhow::Result<()> {
    let library_path = match &config.library_path {
        Some(p) => p.clone(),
        None => resource::default_library_path()?,
    };
    let library = NativeLibrary::load(&library_path)
        .with_context(|| format!("loading `{}`", library_path.display()))?;
    tracing::info!(library = %library.path().display(), "listing hardware devices");
    for device in list_hardware_devices(&library)? {
        println!("{device}");
    }
    Ok(())
}

fn synthesize_file(orca: &Orca, text: &str, args: &Args) -> anyhow::Result<()> {
    let params = args.params()?;
    let sample_rate = orca.sample_rate()?;

    let start = Instant::now();
    let words = orca.synthesize_to_file(text, &args.output, &params)?;
    let processing = start.elapsed().as_secs_f32();

    let (pcm, _) = wav::read_pcm(&args.output)?;
    let length = pcm.len() as f32 / sample_rate as f32;
    println!(
        "Orca took {processing:.2} seconds to synthesize {length:.2} seconds of speech which is \
         ~{:.0} times faster than real-time.",
        length / processing.max(f32::EPSILON)
    );

    if args.show_alignments {
        println!("Spoken text: {:?}", text::spoken_text(text));
        for word in &words {
            println!("{:>7.3} - {:>7.3}  {}", word.start_sec(), word.end_sec(), word.word());
            for p in word.phonemes() {
                println!("    {:>7.3} - {:>7.3}  {}", p.start_sec(), p.end_sec(), p.phoneme());
            }
        }
    }
    Ok(())
}

fn synthesize_streaming(orca: &Orca, text: &str, args: &Args) -> anyhow::Result<()> {
    let params = args.params()?;
    let sample_rate = orca.sample_rate()?;

    let pcm: Arc<Mutex<Vec<i16>>> = Arc::default();
    let sink = {
        let pcm = Arc::clone(&pcm);
        move |chunk: Vec<i16>| pcm.lock().unwrap_or_else(|p| p.into_inner()).extend(chunk)
    };

    let synth = StreamingSynthesizer::start(orca.stream_open(&params)?, args.audio_wait_chunks, sink);
    for token in text.split_inclusive(' ') {
        synth.synthesize(token)?;
    }
    synth.flush()?;
    if let Some(ttfa) = synth.time_to_first_audio() {
        println!("Time to first audio: {:.2} seconds", ttfa.as_secs_f32());
    }
    synth.close()?;

    let pcm = pcm.lock().unwrap_or_else(|p| p.into_inner());
    wav::write_pcm(&args.output, &pcm, sample_rate)?;
    println!("Streamed {:.2} seconds of speech.", pcm.len() as f32 / sample_rate as f32);
    Ok(())
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.config()?;
    if args.list_devices {
        return list_devices(&config);
    }

    let Some(text) = args.text.as_deref() else {
        bail!("--text is required");
    };
    if args.output.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() != Some("wav") {
        bail!("--output must have a .wav extension");
    }

    let orca = Builder::from_config(&config).build()?;
    println!("Orca version: {}", orca.version());

    let valid = orca.valid_characters()?;
    let invalid = text::invalid_characters(text, &valid);
    if !invalid.is_empty() {
        bail!("Text contains characters Orca cannot synthesize: {invalid:?}");
    }

    if args.stream {
        synthesize_streaming(&orca, text, args)?;
    } else {
        synthesize_file(&orca, text, args)?;
    }
    println!("Audio written to `{}`.", args.output.display());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        match err.downcast_ref::<OrcaError>() {
            Some(orca_err) => eprintln!("{}", describe(orca_err)),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}
