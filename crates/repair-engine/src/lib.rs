pub mod mock_engine;
pub mod subprocess;
pub mod traits;
pub mod types;

pub use mock_engine::{MeshTransform, MockBehavior, MockCall, MockEngine};
pub use subprocess::SubprocessEngine;
pub use traits::MeshRepairEngine;
pub use types::*;
