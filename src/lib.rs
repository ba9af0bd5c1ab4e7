pub mod config;
pub mod ic_client;
pub mod identity;

pub use ic_client::governance::{CanisterReply, GovernanceCanister, GovernanceCell, GovernanceError};
