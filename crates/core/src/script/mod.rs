pub mod command;
pub mod script;

pub use command::Command;
pub use script::Script;
