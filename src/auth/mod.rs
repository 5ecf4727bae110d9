// Scoped CLI token authentication
mod lifecycle;
mod resolver;
mod session;

pub use lifecycle::{LoginRequest, RevokeOptions, TokenLifecycle};
pub use session::SystemClock;
