mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};

use cli::{Cli, Command};
use zoundscope::audio::describe::{known_genres, GenreBucket};
use zoundscope::audio::waveform::{reference_json_path, write_json};
use zoundscope::config::{discover_config_path, load_config};
use zoundscope::{AnalysisResult, Analyzer, CancelToken, Config, DspBackend};

#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    result: Option<AnalysisResult>,
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(path) = discover_config_path(cli.config.as_deref()) {
        if let Some(cfg) = load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            config = cfg;
        } else {
            log::warn!("Failed to load config from {}, using defaults", path.display());
        }
    }
    // Flags override the file
    if let Some(ffmpeg) = cli.ffmpeg {
        config.decoder.ffmpeg_path = ffmpeg;
    }
    if let Some(rate) = cli.sample_rate {
        config.decoder.target_sample_rate = rate;
    }

    let analyzer = Analyzer::new(config, DspBackend::shared());
    let cancel = CancelToken::new();

    match cli.command {
        Command::Analyze {
            files,
            genre,
            pretty,
            output,
        } => run_analyze(&analyzer, &cancel, &files, genre.as_deref(), pretty, output.as_deref()),
        Command::Waveform {
            file,
            chunk,
            output,
            output_dir,
        } => run_waveform(&analyzer, &cancel, &file, chunk, output.as_deref(), output_dir.as_deref()),
    }
}

fn run_analyze(
    analyzer: &Analyzer<'_>,
    cancel: &CancelToken,
    files: &[PathBuf],
    genre: Option<&str>,
    pretty: bool,
    output: Option<&Path>,
) -> Result<()> {
    for file in files {
        if !file.exists() {
            anyhow::bail!("Input file not found: {}", file.display());
        }
    }
    if genre.is_some() && GenreBucket::from_genre(genre) == GenreBucket::Unknown {
        let known: Vec<_> = known_genres().collect();
        log::warn!(
            "Unrecognised genre {:?}, using generic wording (known: {})",
            genre.unwrap_or_default(),
            known.join(", ")
        );
    }

    let json = if let [file] = files {
        let result = analyzer
            .analyze(file, genre, cancel)
            .with_context(|| format!("Failed to analyze {}", file.display()))?;
        to_json(&result, pretty)?
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            let report = match analyzer.analyze(file, genre, cancel) {
                Ok(result) => FileReport {
                    file: file.clone(),
                    result: Some(result),
                    error: None,
                },
                Err(err) => {
                    log::error!("{}: {}", file.display(), err);
                    FileReport {
                        file: file.clone(),
                        result: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            reports.push(report);
            pb.inc(1);
        }
        pb.finish_with_message("Analysis complete");
        to_json(&reports, pretty)?
    };

    emit(&json, output)
}

fn run_waveform(
    analyzer: &Analyzer<'_>,
    cancel: &CancelToken,
    file: &Path,
    chunk: Option<f64>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("Input file not found: {}", file.display());
    }

    if let (Some(dir), None) = (output_dir, chunk) {
        let path = analyzer
            .process_reference_track(file, dir, cancel)
            .with_context(|| format!("Failed to compute RMS chunks for {}", file.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    let series = analyzer
        .rms_chunks(file, chunk, cancel)
        .with_context(|| format!("Failed to compute RMS chunks for {}", file.display()))?;

    let target = output
        .map(Path::to_path_buf)
        .or_else(|| output_dir.map(|dir| reference_json_path(file, dir)));
    match target {
        Some(path) => {
            write_json(&series, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} values to {}", series.len(), path.display());
        }
        None => println!("{}", serde_json::to_string(&series.values)?),
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn emit(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
