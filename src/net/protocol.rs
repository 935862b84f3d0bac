//! Wire types for the generation service.
//!
//! The service accepts a multipart form (PNG image plus parameter fields as
//! plain strings) on `POST {base_url}/api/generate` and answers with a JSON
//! object naming the generated file and its format.

use serde::Deserialize;
use thiserror::Error;

use crate::mesh::MeshFormat;

/// Extrusion direction: relief raised above or cut below the block surface.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExtrusionMode {
    Protrude,
    Carve,
}

impl ExtrusionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protrude => "protrude",
            Self::Carve => "carve",
        }
    }
}

/// Physical block and extrusion parameters, all dimensions in millimeters.
#[derive(Clone, Debug)]
pub struct GenerationParameters {
    pub block_width: f64,
    pub block_length: f64,
    pub block_thickness: f64,
    pub depth: f64,
    pub base_height: f64,
    pub mode: ExtrusionMode,
    pub invert: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            block_width: 100.0,
            block_length: 100.0,
            block_thickness: 10.0,
            depth: 5.0,
            base_height: 0.0,
            mode: ExtrusionMode::Protrude,
            invert: false,
        }
    }
}

impl GenerationParameters {
    /// Dimensional fields must be positive (base height may be zero).
    pub fn validate(&self) -> Result<(), SubmitError> {
        let checks = [
            ("block_width", self.block_width),
            ("block_length", self.block_length),
            ("block_thickness", self.block_thickness),
            ("depth", self.depth),
        ];
        for (field, value) in checks {
            if !(value > 0.0) {
                return Err(SubmitError::InvalidParameter { field, value });
            }
        }
        if self.base_height < 0.0 {
            return Err(SubmitError::InvalidParameter {
                field: "base_height",
                value: self.base_height,
            });
        }
        Ok(())
    }

    /// The multipart text fields, in wire order: numbers as decimal strings,
    /// mode and invert as their literal strings.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("block_width", format!("{}", self.block_width)),
            ("block_length", format!("{}", self.block_length)),
            ("block_thickness", format!("{}", self.block_thickness)),
            ("depth", format!("{}", self.depth)),
            ("base_height", format!("{}", self.base_height)),
            ("mode", self.mode.as_str().to_string()),
            ("invert", if self.invert { "true" } else { "false" }.to_string()),
        ]
    }
}

/// The uploaded heightmap: opaque PNG bytes plus the name shown in the UI.
#[derive(Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl ImageAsset {
    /// Read an image from disk, keeping the leaf name for upload and display.
    pub fn read_from(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "heightmap.png".to_string());
        Ok(Self { bytes, file_name })
    }
}

/// Immutable snapshot of one image and one parameter set at submit time.
pub struct GenerationRequest {
    pub image: ImageAsset,
    pub params: GenerationParameters,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub file_url: String,
    pub file_type: MeshFormat,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no image selected")]
    NoImage,

    #[error("{field} must be positive, got {value}")]
    InvalidParameter { field: &'static str, value: f64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}

/// Where the generation service lives. Explicit configuration, handed to the
/// engine at construction and editable in the UI.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    /// Result file URLs are usually absolute; a server that hands back a
    /// bare path gets resolved against the configured base.
    pub fn resolve(&self, file_url: &str) -> String {
        if file_url.contains("://") {
            file_url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                file_url.trim_start_matches('/')
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_use_literal_strings() {
        let params = GenerationParameters {
            invert: true,
            mode: ExtrusionMode::Carve,
            ..Default::default()
        };
        let fields = params.form_fields();

        assert_eq!(fields[0], ("block_width", "100".to_string()));
        assert_eq!(fields[3], ("depth", "5".to_string()));
        assert_eq!(fields[5], ("mode", "carve".to_string()));
        assert_eq!(fields[6], ("invert", "true".to_string()));
    }

    #[test]
    fn fractional_values_keep_decimal_form() {
        let params = GenerationParameters {
            depth: 2.5,
            ..Default::default()
        };
        assert_eq!(params.form_fields()[3].1, "2.5");
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        let params = GenerationParameters {
            block_width: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SubmitError::InvalidParameter {
                field: "block_width",
                ..
            })
        ));

        let params = GenerationParameters {
            depth: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(GenerationParameters::default().validate().is_ok());
    }

    #[test]
    fn result_json_is_camel_case() {
        let result: GenerationResult =
            serde_json::from_str(r#"{"fileUrl":"http://x/outputs/a.ply","fileType":"ply"}"#)
                .unwrap();
        assert_eq!(result.file_url, "http://x/outputs/a.ply");
        assert_eq!(result.file_type, MeshFormat::Ply);
    }

    #[test]
    fn unknown_file_type_is_rejected() {
        let result: Result<GenerationResult, _> =
            serde_json::from_str(r#"{"fileUrl":"x","fileType":"obj"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn url_resolution() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:5000/".to_string(),
        };
        assert_eq!(config.generate_url(), "http://127.0.0.1:5000/api/generate");
        assert_eq!(
            config.resolve("http://other/outputs/a.stl"),
            "http://other/outputs/a.stl"
        );
        assert_eq!(
            config.resolve("/outputs/a.stl"),
            "http://127.0.0.1:5000/outputs/a.stl"
        );
    }
}
