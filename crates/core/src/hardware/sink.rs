use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use garland_rig::{Channel, ChannelId};
use parking_lot::Mutex;

use crate::error::ShowError;

/// Channel-level writes for one node's relays. Each node service owns
/// exactly one sink; the player drives it a command at a time.
pub trait RelaySink: Send {
    fn set_channel(&mut self, channel: &ChannelId, on: bool) -> Result<(), ShowError>;

    /// Drive every owned channel to one state. Used for the end-of-show
    /// gesture and for failure recovery, where leaving relays latched on
    /// is the one outcome that must not happen.
    fn set_all(&mut self, on: bool) -> Result<(), ShowError>;
}

/// Pin-level write seam under the relay bank, standing in for whatever
/// drives the actual GPIO lines.
pub trait PinBus: Send {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()>;
}

/// Logs pin writes instead of touching hardware. The default bus when no
/// driver is wired up, and what a dry run plays against.
pub struct LogBus;

impl PinBus for LogBus {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()> {
        log::debug!("pin {} -> {}", pin, if high { "high" } else { "low" });
        Ok(())
    }
}

/// Records pin states in shared memory so tests can watch a show happen.
#[derive(Clone, Default)]
pub struct MemoryBus {
    pins: Arc<Mutex<BTreeMap<u8, bool>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus::default()
    }

    pub fn pin(&self, pin: u8) -> Option<bool> {
        self.pins.lock().get(&pin).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<u8, bool> {
        self.pins.lock().clone()
    }
}

impl PinBus for MemoryBus {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()> {
        self.pins.lock().insert(pin, high);
        Ok(())
    }
}

/// Resolves channel ids to pin writes, applying per-channel active-low
/// inversion on the way down. Scripts stay in logical on/off terms; the
/// wiring polarity never leaks above this point.
pub struct RelayBank<B: PinBus> {
    channels: BTreeMap<ChannelId, Channel>,
    bus: B,
}

impl<B: PinBus> RelayBank<B> {
    pub fn new(channels: BTreeMap<ChannelId, Channel>, bus: B) -> Self {
        RelayBank { channels, bus }
    }

    fn write_pin(&mut self, channel: &ChannelId, pin: u8, high: bool) -> Result<(), ShowError> {
        self.bus
            .write(pin, high)
            .map_err(|e| ShowError::HardwareWrite {
                channel: channel.clone(),
                message: e.to_string(),
            })
    }
}

impl<B: PinBus> RelaySink for RelayBank<B> {
    fn set_channel(&mut self, channel: &ChannelId, on: bool) -> Result<(), ShowError> {
        let wiring = match self.channels.get(channel) {
            Some(wiring) => wiring,
            None => {
                return Err(ShowError::HardwareWrite {
                    channel: channel.clone(),
                    message: "channel is not wired on this node".to_string(),
                })
            }
        };

        let (pin, high) = (wiring.pin, wiring.active_low != on);
        self.write_pin(channel, pin, high)
    }

    fn set_all(&mut self, on: bool) -> Result<(), ShowError> {
        let writes: Vec<(ChannelId, u8, bool)> = self
            .channels
            .iter()
            .map(|(id, wiring)| (id.clone(), wiring.pin, wiring.active_low != on))
            .collect();

        for (channel, pin, high) in writes {
            self.write_pin(&channel, pin, high)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(bus: MemoryBus) -> RelayBank<MemoryBus> {
        let channels = [
            (ChannelId::new("1"), Channel { pin: 17, active_low: false }),
            (ChannelId::new("2"), Channel { pin: 27, active_low: true }),
        ]
        .into_iter()
        .collect();
        RelayBank::new(channels, bus)
    }

    #[test]
    fn test_set_channel_drives_the_mapped_pin() {
        let bus = MemoryBus::new();
        let mut bank = bank(bus.clone());

        bank.set_channel(&ChannelId::new("1"), true).unwrap();
        assert_eq!(bus.pin(17), Some(true));

        bank.set_channel(&ChannelId::new("1"), false).unwrap();
        assert_eq!(bus.pin(17), Some(false));
    }

    #[test]
    fn test_active_low_inverts_at_the_pin() {
        let bus = MemoryBus::new();
        let mut bank = bank(bus.clone());

        bank.set_channel(&ChannelId::new("2"), true).unwrap();
        assert_eq!(bus.pin(27), Some(false));

        bank.set_channel(&ChannelId::new("2"), false).unwrap();
        assert_eq!(bus.pin(27), Some(true));
    }

    #[test]
    fn test_set_all_covers_every_channel() {
        let bus = MemoryBus::new();
        let mut bank = bank(bus.clone());

        bank.set_all(true).unwrap();
        assert_eq!(bus.pin(17), Some(true));
        assert_eq!(bus.pin(27), Some(false));

        bank.set_all(false).unwrap();
        assert_eq!(bus.pin(17), Some(false));
        assert_eq!(bus.pin(27), Some(true));
    }

    #[test]
    fn test_unwired_channel_is_a_hardware_error() {
        let mut bank = bank(MemoryBus::new());
        let err = bank.set_channel(&ChannelId::new("9"), true).unwrap_err();
        assert!(matches!(err, ShowError::HardwareWrite { .. }));
    }

    #[test]
    fn test_bus_failures_carry_the_channel() {
        struct DeadBus;
        impl PinBus for DeadBus {
            fn write(&mut self, _pin: u8, _high: bool) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "gpio gone"))
            }
        }

        let channels = [(ChannelId::new("5"), Channel { pin: 4, active_low: false })]
            .into_iter()
            .collect();
        let mut bank = RelayBank::new(channels, DeadBus);

        match bank.set_channel(&ChannelId::new("5"), true).unwrap_err() {
            ShowError::HardwareWrite { channel, message } => {
                assert_eq!(channel, ChannelId::new("5"));
                assert!(message.contains("gpio gone"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
