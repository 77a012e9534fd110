pub mod player;

pub use player::play_script;
