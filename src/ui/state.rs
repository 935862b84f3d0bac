use crate::net::{ExtrusionMode, GenerationParameters, ImageAsset, ServiceConfig};

/// Everything the side panel edits. Parameters stay here between
/// submissions; a request snapshots them into a `GenerationRequest`.
pub struct UiState {
    pub base_url: String,

    pub image: Option<ImageAsset>,

    pub block_width: f64,
    pub block_length: f64,
    pub block_thickness: f64,
    pub depth: f64,
    pub base_height: f64,
    pub mode: ExtrusionMode,
    pub invert: bool,

    pub show_grid: bool,
    pub show_help: bool,
}

impl Default for UiState {
    fn default() -> Self {
        let defaults = GenerationParameters::default();
        Self {
            base_url: ServiceConfig::default().base_url,

            image: None,

            block_width: defaults.block_width,
            block_length: defaults.block_length,
            block_thickness: defaults.block_thickness,
            depth: defaults.depth,
            base_height: defaults.base_height,
            mode: defaults.mode,
            invert: defaults.invert,

            show_grid: true,
            show_help: true,
        }
    }
}

impl UiState {
    pub fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            block_width: self.block_width,
            block_length: self.block_length,
            block_thickness: self.block_thickness,
            depth: self.depth,
            base_height: self.base_height,
            mode: self.mode,
            invert: self.invert,
        }
    }
}
