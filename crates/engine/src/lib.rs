pub mod asset;
pub mod compiler;
pub mod error;
pub mod job;
pub mod overlay;
pub mod render;
pub mod retry;
pub mod sanitize;
pub mod script;
pub mod timeline;

pub use asset::*;
pub use compiler::*;
pub use error::EngineError;
pub use job::*;
pub use script::*;
pub use timeline::*;
