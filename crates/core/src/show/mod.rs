pub mod dispatcher;

pub use dispatcher::{ShowDispatcher, ShowNode, ShowReport};
