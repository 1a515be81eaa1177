use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zoundscope", about = "Technical mix analysis for audio recordings")]
pub struct Cli {
    /// Config file (default: ./zoundscope.toml, then the per-user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// ffmpeg binary used when the built-in decoder fails
    #[arg(long, global = true)]
    pub ffmpeg: Option<String>,

    /// Resample decoded audio to this rate (0 keeps the native rate)
    #[arg(long, global = true)]
    pub sample_rate: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the analysis report for one or more files as JSON
    Analyze {
        /// Input audio files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Genre used to pick the low-end and spectral-balance wording
        #[arg(short, long)]
        genre: Option<String>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute the smoothed RMS-chunk series used for waveform display
    Waveform {
        /// Input audio file
        file: PathBuf,

        /// Chunk length in seconds (default: half a beat at the estimated tempo)
        #[arg(long)]
        chunk: Option<f64>,

        /// Write the JSON array here instead of stdout
        #[arg(short, long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Write `<stem>_rms.json` into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}
