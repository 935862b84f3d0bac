pub mod error;
pub mod geometry;
pub mod loader;
pub mod ply;
pub mod stl;

pub use error::{DecodeError, LoadError};
pub use geometry::Geometry;
pub use loader::{LoadEvent, MeshLoader};
pub use ply::decode_ply;
pub use stl::decode_stl;

/// The two mesh formats the generation service can return.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    Stl,
    Ply,
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stl => write!(f, "stl"),
            Self::Ply => write!(f, "ply"),
        }
    }
}
