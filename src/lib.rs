//! Messenger replay
//!
//! Rebuilds the local store of a messenger account from the per-group
//! metadata and message logs held by its protocol service.

pub mod client;
pub mod config;
pub mod projection;
pub mod proto;
pub mod replay;
pub mod storage;
pub mod test_utils;
pub mod transport;
pub mod utils;

pub use replay::{replay_logs_to_store, ErrorKind, ReplayError, ReplaySummary, Replayer};
