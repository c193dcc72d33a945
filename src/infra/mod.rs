//! External collaborators: node RPC, on-disk config, hardware-wallet export
//! parsing.

pub mod config;
pub mod core_rpc;
pub mod import;
pub mod rpc;
