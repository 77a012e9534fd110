pub mod sink;

pub use sink::{LogBus, MemoryBus, PinBus, RelayBank, RelaySink};
