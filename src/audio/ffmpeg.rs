use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::buffer::SampleBuffer;
use super::decode::{DecodePath, DecodeRequest};
use crate::cancel::CancelToken;
use crate::error::DecodeError;

/// Output rate requested from ffmpeg when the caller keeps native rates.
pub const FALLBACK_NATIVE_RATE: u32 = 44_100;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Fallback decode path: an `ffmpeg` child writing raw `f32le` PCM to stdout.
pub struct FfmpegDecoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegDecoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(path: &Path, channels: usize, sample_rate: u32) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "-nostdin".into(),
            "-hide_banner".into(),
            "-loglevel".into(), "error".into(),
            "-i".into(), path.as_os_str().to_os_string(),
            "-vn".into(),
            "-f".into(), "f32le".into(),
            "-acodec".into(), "pcm_f32le".into(),
            "-ac".into(), channels.to_string().into(),
            "-ar".into(), sample_rate.to_string().into(),
        ];
        args.push("pipe:1".into());
        args
    }
}

impl DecodePath for FfmpegDecoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn decode(&self, path: &Path, request: &DecodeRequest) -> Result<SampleBuffer, DecodeError> {
        let channels = if request.mono { 1 } else { 2 };
        let sample_rate = match request.target_sample_rate {
            0 => FALLBACK_NATIVE_RATE,
            rate => rate,
        };

        let child = Command::new(&self.program)
            .args(Self::args(path, channels, sample_rate))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DecodeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        log::debug!("Spawned {} (pid {}) for {}", self.program.display(), child.id(), path.display());

        let mut guard = ChildGuard::new(child);
        let stdout = spawn_reader(guard.child.stdout.take());
        let stderr = spawn_reader(guard.child.stderr.take());

        let status = guard.wait(self.timeout, &request.cancel);
        let pcm = join_reader(stdout);
        let err_text = String::from_utf8_lossy(&join_reader(stderr)).trim().to_string();
        let status = status?;

        if !status.success() {
            return Err(DecodeError::ProcessFailed {
                status: status.to_string(),
                stderr: err_text,
            });
        }

        let samples: Vec<f32> = pcm
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        log::debug!(
            "{} returned {} frames at {}Hz",
            self.program.display(),
            samples.len() / channels,
            sample_rate
        );
        Ok(SampleBuffer::from_interleaved(&samples, channels, sample_rate))
    }
}

/// Owns the child until it has been reaped. Dropping an unreaped child kills it.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, reaped: false }
    }

    /// Poll until exit, timeout or cancellation. The child is always reaped on return.
    fn wait(&mut self, timeout: Duration, cancel: &CancelToken) -> Result<ExitStatus, DecodeError> {
        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    return Ok(status);
                }
                Ok(None) => {
                    if cancel.is_cancelled() {
                        self.kill();
                        return Err(DecodeError::Cancelled);
                    }
                    if start.elapsed() >= timeout {
                        self.kill();
                        return Err(DecodeError::Timeout(timeout));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    self.kill();
                    return Err(DecodeError::ProcessFailed {
                        status: "unknown".into(),
                        stderr: err.to_string(),
                    });
                }
            }
        }
    }

    fn kill(&mut self) {
        if self.reaped {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
        log::debug!("Killed decoder process {}", self.child.id());
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
