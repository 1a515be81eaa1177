pub mod analysis;
pub mod bands;
pub mod buffer;
pub mod decode;
pub mod describe;
pub mod dynamics;
pub mod features;
pub mod ffmpeg;
pub mod key;
pub mod loudness;
pub mod onset;
pub mod peak;
pub mod resample;
pub mod spectrum;
pub mod stereo;
pub mod waveform;
pub mod windows;
