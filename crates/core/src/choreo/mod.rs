pub mod choreographer;
pub mod midi;

pub use choreographer::Choreographer;
pub use midi::{read_note_events, NoteEvent, NoteEventKind};
