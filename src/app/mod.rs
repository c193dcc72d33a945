//! Scene state machine: controller loop, home menu, onboarding wizard,
//! dashboard.

pub mod controller;
pub mod dashboard;
pub mod home;
pub mod setup;
pub mod wait;

use thiserror::Error;

use crate::infra::config::ConfigError;
use crate::infra::rpc::RpcError;

/// Scene transition token returned by every draw step. Exhaustively matched
/// in the controller, so every scene handles every declared transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneAction {
    Home,
    Setup,
    Dashboard,
    Quit,
}

/// One entry in the home menu. Immutable; the scene only tracks a cursor.
#[derive(Debug, Clone, Copy)]
pub struct MenuItem {
    pub label: &'static str,
    pub action: SceneAction,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no wallet configured")]
    NoWallet,
}
