//! Model artifact persistence.
//!
//! The artifact is a JSON document (see [`schema::ArtifactSchema`]) holding
//! the preprocessing stage and the tree ensemble. It is read once at
//! startup; any failure here is fatal for the service.
//!
//! ```text
//! bytes ──serde_json──▶ ArtifactSchema ──version check──▶ TryFrom ──▶ PipelineModel
//! ```

mod convert;
pub mod schema;

use std::fs;
use std::path::Path;

pub use convert::ConversionError;
pub use schema::ArtifactSchema;

use crate::model::PipelineModel;

/// Artifact format version this build reads and writes.
pub const FORMAT_VERSION: u32 = 1;

/// Errors reading or writing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid artifact JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid artifact: {0}")]
    Invalid(#[from] ConversionError),
}

/// Parse an artifact from bytes.
pub fn parse_artifact(bytes: &[u8]) -> Result<PipelineModel, ArtifactError> {
    let schema: ArtifactSchema = serde_json::from_slice(bytes)?;
    if schema.format_version != FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            found: schema.format_version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(PipelineModel::try_from(schema)?)
}

/// Read an artifact from disk.
pub fn read_artifact(path: &Path) -> Result<PipelineModel, ArtifactError> {
    let bytes = fs::read(path)?;
    parse_artifact(&bytes)
}

/// Serialize a model as pretty-printed artifact JSON.
pub fn to_json(model: &PipelineModel) -> Result<String, ArtifactError> {
    Ok(serde_json::to_string_pretty(&ArtifactSchema::from(model))?)
}

/// Write a model to disk.
pub fn write_artifact(model: &PipelineModel, path: &Path) -> Result<(), ArtifactError> {
    fs::write(path, to_json(model)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(version: u32) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "format_version": version,
            "features": [{"kind": "numeric", "name": "x", "impute": 1.0}],
            "forest": {"trees": [{
                "split_indices": [-2],
                "thresholds": [0.0],
                "children_left": [-1],
                "children_right": [-1],
                "leaf_values": [42.0]
            }]}
        }))
        .unwrap()
    }

    #[test]
    fn parse_supported_version() {
        let model = parse_artifact(&document(1)).unwrap();
        assert_eq!(model.num_trees(), 1);
    }

    #[test]
    fn reject_other_versions() {
        let err = parse_artifact(&document(2)).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        ));
    }

    #[test]
    fn reject_garbage() {
        assert!(matches!(
            parse_artifact(b"not json"),
            Err(ArtifactError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = parse_artifact(&document(1)).unwrap();

        write_artifact(&model, &path).unwrap();
        let reloaded = read_artifact(&path).unwrap();
        assert_eq!(reloaded.num_trees(), 1);
        assert_eq!(reloaded.encoder().width(), 1);
    }
}
