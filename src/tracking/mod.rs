/*!
 * State Tracking
 * Runtime-learned kernel layout and per-path initialization state
 */

pub mod init;
pub mod kernel;

pub use init::InitTracker;
pub use kernel::{KernelLayout, KernelTracker};
