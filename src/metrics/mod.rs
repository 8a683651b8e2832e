pub mod aggregate;
pub mod alignment;
pub mod pitch;
pub mod report;
pub mod spectral;
pub mod stft;
