pub mod context;
pub mod entities;
pub mod enums;
pub mod money;

pub use context::CallContext;
