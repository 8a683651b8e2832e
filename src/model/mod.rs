pub mod context;
pub mod decoder;
pub mod encoder;
pub mod feature_transform;
pub mod filter;
pub mod oscillator;
pub mod registry;
pub mod vocoder;

pub use context::ExecutionContext;
pub use vocoder::DdspVocoder;
