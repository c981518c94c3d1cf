//! tts-cli: 语音合成命令行工具：合成、列出音色、查询配额
//!
//! Usage:
//!   tts-cli speak <text> [--voice <id>] [--out <file>] [--stream] [--config <path>]
//!   tts-cli voices [--config <path>]
//!   tts-cli quota [--config <path>]

use anyhow::{bail, Context};
use futures::StreamExt;
use resilient_tts::provider::OpenAiSpeechProvider;
use resilient_tts::{SynthesisConfig, SynthesisOrchestrator, SynthesisRequest};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "speak" => cmd_speak(&args[2..]).await,
        "voices" => cmd_voices(&args[2..]).await,
        "quota" => cmd_quota(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"tts-cli: 弹性语音合成命令行工具

USAGE:
    tts-cli <COMMAND> [OPTIONS]

COMMANDS:
    speak <text>                Synthesize text to audio
        --voice <id>            Voice id (defaults to TTS_VOICE_ID / config)
        --out <file>            Output file (default: speech.mp3)
        --stream                Stream chunks to the file as they arrive
    voices                      List voices offered by the provider
    quota                       Show the remote character quota
    version                     Show version information
    help                        Show this help message

COMMON OPTIONS:
    --config <path>             YAML or JSON configuration file

ENVIRONMENT:
    TTS_API_KEY                 Provider credential (after config and OS keyring)
    TTS_VOICE_ID                Default voice
    OPENAI_API_KEY              Enables the OpenAI-compatible fallback
    RUST_LOG                    Log filter (e.g. resilient_tts=debug)"#
    );
}

fn cmd_version() {
    println!("tts-cli {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn load_config(args: &[String]) -> anyhow::Result<SynthesisConfig> {
    let config = match flag_value(args, "--config") {
        Some(path) => SynthesisConfig::from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => SynthesisConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn build(args: &[String]) -> anyhow::Result<SynthesisOrchestrator> {
    let config = load_config(args)?;
    let mut builder = SynthesisOrchestrator::builder(config);
    if let Ok(openai) = OpenAiSpeechProvider::builder().build() {
        builder = builder.fallback(Arc::new(openai));
    }
    Ok(builder.build()?)
}

async fn cmd_speak(args: &[String]) -> anyhow::Result<()> {
    let text = match args.first() {
        Some(t) if !t.starts_with("--") => t.clone(),
        _ => bail!("speak requires text, e.g. tts-cli speak \"Hello there\""),
    };
    let out = PathBuf::from(flag_value(args, "--out").unwrap_or("speech.mp3"));
    let tts = build(args)?;

    let mut request = SynthesisRequest::new(text);
    if let Some(voice) = flag_value(args, "--voice") {
        request = request.with_voice(voice);
    }

    let mut file = std::fs::File::create(&out)
        .with_context(|| format!("creating {}", out.display()))?;
    let mut written = 0usize;

    if has_flag(args, "--stream") {
        let (mut stream, cancel) = tts.stream_speech(&request.streaming(true)).await?;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;
        loop {
            tokio::select! {
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    cancel.cancel();
                    eprintln!("cancelled");
                }
                chunk = stream.next() => match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        file.write_all(&chunk)?;
                        written += chunk.len();
                    }
                    None => break,
                },
            }
        }
    } else {
        let audio = tts.generate_speech(&request).await?;
        file.write_all(&audio)?;
        written = audio.len();
    }

    let signals = tts.signals().await;
    println!("wrote {written} bytes to {}", out.display());
    println!(
        "primary successes: {}, fallbacks: {}, retries: {}, cache hits: {}",
        signals.metrics.primary_successes,
        signals.metrics.fallback_invocations,
        signals.metrics.retries,
        signals.cache.hits,
    );
    Ok(())
}

async fn cmd_voices(args: &[String]) -> anyhow::Result<()> {
    let tts = build(args)?;
    let voices = tts.list_voices().await?;
    for v in &voices {
        let category = v.category.as_deref().unwrap_or("-");
        println!("{:<24} {:<24} {}", v.voice_id, v.name, category);
    }
    println!("{} voice(s)", voices.len());
    Ok(())
}

async fn cmd_quota(args: &[String]) -> anyhow::Result<()> {
    let tts = build(args)?;
    match tts.quota_snapshot(true).await {
        Some(q) => {
            println!(
                "{} of {} characters remaining ({:.1}% used)",
                q.characters_remaining, q.character_limit, q.percent_used
            );
            Ok(())
        }
        None => bail!("quota endpoint unreachable"),
    }
}
