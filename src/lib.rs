/// Kejmiltube client core
///
/// Session state, video and comment access, view counting and reactions
/// for the Kejmiltube video site, backed by Supabase or an in-memory mock.

pub mod backend;
pub mod config;
pub mod content;
pub mod context;
pub mod engagement;
pub mod error;
pub mod forms;
pub mod models;
pub mod session;
pub mod validation;

pub use config::ClientConfig;
pub use context::AppContext;
pub use error::{TubeError, TubeResult};
