pub mod config;
pub mod encoder;
pub mod metrics;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use encoder::{
    cancel_pair, CancelHandle, CancelSignal, EncodeJob, EncodeOutcome, EncoderConfig,
    EncoderError, EncoderListener, EncodingAttributes, EncodingEvent, FfmpegEncoder, MediaEncoder,
    MediaInfo, StreamInventory,
};
