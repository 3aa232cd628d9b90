//! Interchange mesh files.
//!
//! [`MeshCodec`] is the seam between the pipeline and the on-disk format the
//! repair engine reads and writes. [`StlCodec`] is the implementation used in
//! production.

pub mod codec;
pub mod errors;
pub mod stl;

pub use codec::MeshCodec;
pub use errors::CodecError;
pub use stl::{StlCodec, StlFormat};
