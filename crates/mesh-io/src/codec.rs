use std::fs;
use std::path::Path;

use mesh_types::Solid;

use crate::errors::CodecError;

/// Converts solids to and from an interchange file format.
///
/// Implementations only provide the byte-level encoding; file access comes
/// from the default methods.
pub trait MeshCodec: Send + Sync {
    /// File extension without the leading dot, e.g. `"stl"`.
    fn extension(&self) -> &str;

    /// Encode a solid into the file body.
    fn encode(&self, solid: &Solid) -> Result<Vec<u8>, CodecError>;

    /// Decode a file body into a new solid.
    fn decode(&self, bytes: &[u8]) -> Result<Solid, CodecError>;

    fn write_file(&self, solid: &Solid, path: &Path) -> Result<(), CodecError> {
        let bytes = self.encode(solid)?;
        fs::write(path, bytes).map_err(|source| CodecError::Io {
            action: "write",
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_file(&self, path: &Path) -> Result<Solid, CodecError> {
        let bytes = fs::read(path).map_err(|source| CodecError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        self.decode(&bytes)
    }
}
