pub mod client;
pub mod protocol;

pub use client::GenerateEngine;
pub use protocol::{
    ExtrusionMode, GenerationParameters, GenerationRequest, GenerationResult, ImageAsset,
    ServiceConfig, SubmitError,
};
