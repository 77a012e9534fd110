pub mod process;

pub use process::{player_command, AudioProcess};
