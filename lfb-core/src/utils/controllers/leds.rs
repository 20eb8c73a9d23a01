//! Turn signal LEDs for the Line-Follower Bot.
//!
//! Drives the LED ring through `SmartLedsWrite`. Turn signals are requested
//! fire-and-forget over `LED_CHANNEL`; the LED task does the blinking.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use serde::{Deserialize, Serialize};
use smart_leds_trait::{SmartLedsWrite, RGB8};

use crate::utils::config::ManeuverConfig;

/// Channel used to receive LED commands (`LEDCommand` messages).
pub static LED_CHANNEL: embassy_sync::channel::Channel<CriticalSectionRawMutex, LEDCommand, 4> =
    embassy_sync::channel::Channel::new();

/// Number of LEDs in the ring.
pub const LED_COUNT: usize = 8;
/// Ring index of the left indicator (LED7).
const LEFT_LED: usize = 6;
/// Ring index of the right indicator (LED3).
const RIGHT_LED: usize = 2;

const AMBER: RGB8 = RGB8 {
    r: 255,
    g: 120,
    b: 0,
};
const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Which indicator to blink. A U-turn blinks both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lc", rename_all = "snake_case")]
pub enum LEDCommand {
    /// Blink the indicator for `side` the configured number of times.
    Signal { side: Side },
}

/// Something that can be asked to show a turn signal without waiting for it.
pub trait TurnSignal {
    fn indicate(
        &mut self,
        side: Side,
    );
}

/// `TurnSignal` that forwards requests to the LED task.
pub struct ChannelSignal;

impl TurnSignal for ChannelSignal {
    fn indicate(
        &mut self,
        side: Side,
    ) {
        if LED_CHANNEL.try_send(LEDCommand::Signal { side }).is_err() {
            tracing::warn!(?side, "LED channel full, turn signal dropped");
        }
    }
}

/// LED pattern for one indicator state.
pub fn indicator_frame(
    side: Side,
    lit: bool,
) -> [RGB8; LED_COUNT] {
    let mut frame = [BLACK; LED_COUNT];
    if lit {
        if matches!(side, Side::Left | Side::Both) {
            frame[LEFT_LED] = AMBER;
        }
        if matches!(side, Side::Right | Side::Both) {
            frame[RIGHT_LED] = AMBER;
        }
    }
    frame
}

pub struct LedModule<Driver> {
    driver: Driver,
    config: ManeuverConfig,
}

impl<Driver, E> LedModule<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
{
    pub fn new(
        driver: Driver,
        config: ManeuverConfig,
    ) -> Self {
        Self { driver, config }
    }

    /// Execute an incoming `LEDCommand`.
    pub async fn ex_command(
        &mut self,
        cmd: LEDCommand,
    ) -> Result<(), E> {
        match cmd {
            LEDCommand::Signal { side } => {
                for _ in 0..self.config.blink_nb {
                    self.driver.write(indicator_frame(side, true))?;
                    Timer::after_millis(self.config.blink_on_ms as u64).await;
                    self.driver.write(indicator_frame(side, false))?;
                    Timer::after_millis(self.config.blink_off_ms as u64).await;
                }
            }
        }
        Ok(())
    }

    /// LED task body: serve `LED_CHANNEL` forever.
    pub async fn run(&mut self) -> !
    where
        E: core::fmt::Debug,
    {
        loop {
            let cmd = LED_CHANNEL.receiver().receive().await;
            if let Err(e) = self.ex_command(cmd).await {
                tracing::error!("LED command failed: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_frames() {
        let left = indicator_frame(Side::Left, true);
        assert_eq!(left[LEFT_LED], AMBER);
        assert_eq!(left[RIGHT_LED], BLACK);

        let both = indicator_frame(Side::Both, true);
        assert_eq!(both[LEFT_LED], AMBER);
        assert_eq!(both[RIGHT_LED], AMBER);

        assert!(indicator_frame(Side::Right, false).iter().all(|&c| c == BLACK));
    }

    #[test]
    fn led_command_json_shape() {
        let cmd: LEDCommand = serde_json::from_str(r#"{"lc":"signal","side":"left"}"#).unwrap();
        assert_eq!(cmd, LEDCommand::Signal { side: Side::Left });
    }
}
