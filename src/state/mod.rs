//! Shared state published by the background pollers: the snapshot data
//! types and the poller loops that produce them.

pub mod poller;
pub mod snapshot;

pub use poller::{StopSignal, run_block_poller, run_utxo_poller};
pub use snapshot::{Amount, BlockSnapshot, Utxo, UtxoSet};
