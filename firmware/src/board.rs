//! On-board LED and power relay.

use defmt::Format;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;
use gateway_core::{Hardware, HardwareError, Indication};
use radio_proto::StateDevice;

/// LED off time during an activity pulse.
const PULSE_MS: u64 = 10;

/// Half period of the pairing blink.
const BLINK_MS: u64 = 500;

/// Requests handled by [`run_led`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum LedCommand {
    /// Steady state requested by the host.
    Set(bool),
    /// Short flash on radio activity.
    Pulse,
    /// Start or stop blinking.
    Blink(bool),
}

pub type LedQueue = Channel<CriticalSectionRawMutex, LedCommand, 4>;

/// The gateway's own outputs.
///
/// The relay is switched directly. The LED belongs to [`run_led`], which
/// applies requests without blocking the gateway.
pub struct BoardHardware {
    led: &'static LedQueue,
    led_on: bool,
    relay: Output<'static>,
}

impl BoardHardware {
    #[must_use]
    pub fn new(led: &'static LedQueue, relay: Output<'static>) -> Self {
        Self {
            led,
            led_on: false,
            relay,
        }
    }
}

impl Hardware for BoardHardware {
    fn set_state(&mut self, device: StateDevice, on: bool) -> Result<(), HardwareError> {
        match device {
            StateDevice::Led => {
                self.led
                    .try_send(LedCommand::Set(on))
                    .map_err(|_| HardwareError::Busy)?;
                self.led_on = on;
                Ok(())
            }
            StateDevice::PowerRelay => {
                self.relay.set_level(Level::from(on));
                Ok(())
            }
            StateDevice::ModuleRelay(_) => Err(HardwareError::Unsupported),
        }
    }

    fn state(&self, device: StateDevice) -> Result<Option<bool>, HardwareError> {
        match device {
            StateDevice::Led => Ok(Some(self.led_on)),
            StateDevice::PowerRelay => Ok(Some(self.relay.is_set_high())),
            StateDevice::ModuleRelay(_) => Err(HardwareError::Unsupported),
        }
    }

    fn indicate(&mut self, indication: Indication) {
        let command = match indication {
            Indication::Activity => LedCommand::Pulse,
            Indication::Pairing(on) => LedCommand::Blink(on),
        };
        // Indications are cosmetic; a full queue skips them.
        let _ = self.led.try_send(command);
    }
}

/// Drive the LED from queued commands.
pub async fn run_led(mut led: Output<'static>, commands: &'static LedQueue) -> ! {
    let mut on = false;
    let mut blinking = false;

    loop {
        let command = if blinking {
            let next = select(commands.receive(), Timer::after_millis(BLINK_MS)).await;
            match next {
                Either::First(command) => command,
                Either::Second(()) => {
                    led.toggle();
                    continue;
                }
            }
        } else {
            commands.receive().await
        };

        match command {
            LedCommand::Set(state) => {
                on = state;
                if !blinking {
                    led.set_level(Level::from(on));
                }
            }
            LedCommand::Pulse if !blinking => {
                led.set_level(Level::from(!on));
                Timer::after_millis(PULSE_MS).await;
                led.set_level(Level::from(on));
            }
            LedCommand::Pulse => {}
            LedCommand::Blink(enable) => {
                blinking = enable;
                led.set_level(Level::from(on));
            }
        }
    }
}
