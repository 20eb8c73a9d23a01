//! Differential drive over a PCA9685 PWM controller.
//!
//! Each motor is driven through an H-bridge with a phase (direction) channel
//! and an enable (duty) channel. The control loop and the maneuver executor
//! share the drive through [`SharedMotors`]; whoever holds the lock owns the
//! wheels.

use core::cell::RefCell;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use crate::utils::control::steering::WheelSpeeds;

/// Default I2C address of the PWM controller.
pub const PWM_ADDRESS: u8 = 0x55;

/// Motor collaborator: takes a signed speed per wheel every tick.
pub trait MotorDriver {
    type Error: core::fmt::Debug;

    fn set_speeds(
        &mut self,
        speeds: WheelSpeeds,
    ) -> Result<(), Self::Error>;
}

/// Motor driver guarded for the control loop and the maneuver executor.
pub type SharedMotors<M> = Mutex<CriticalSectionRawMutex, M>;

/// Errors that can occur when driving the PWM controller.
#[derive(Debug)]
pub enum DriveError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
    PwmNotInitialized,
}

pub struct Pca9685Drive<'a, I2C: 'static> {
    i2c: &'a RefCell<I2C>,
    pub pwm: Option<Pca9685<RefCellDevice<'a, I2C>>>,
    /// (phase, enable) for the left then the right motor.
    motor_channels: [(Channel, Channel); 2],
    speed_limit: i16,
}

impl<'a, I2C, E> Pca9685Drive<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Create a drive whose full duty corresponds to `speed_limit` steps/s.
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        speed_limit: i16,
    ) -> Self {
        Pca9685Drive {
            i2c: i2c_bus,
            pwm: None,
            motor_channels: [(Channel::C2, Channel::C3), (Channel::C4, Channel::C5)],
            speed_limit,
        }
    }

    /// Attach the PWM controller at `PWM_ADDRESS`. Call before `configure_pwm`.
    pub fn init_device(&mut self) -> Result<(), DriveError<E>> {
        let pwm = Pca9685::new(RefCellDevice::new(self.i2c), PwmAddress::from(PWM_ADDRESS))
            .map_err(DriveError::PwmError)?;
        self.pwm = Some(pwm);
        Ok(())
    }

    /// Enable the outputs and set the PWM prescale.
    pub fn configure_pwm(&mut self) -> Result<(), DriveError<E>> {
        let pca = self.pwm.as_mut().ok_or(DriveError::PwmNotInitialized)?;
        pca.enable().map_err(DriveError::PwmError)?;
        pca.set_prescale(100).map_err(DriveError::PwmError)?;
        tracing::info!("PWM enabled, prescale 100");
        Ok(())
    }

    /// Put the controller to sleep, releasing both motors.
    pub fn disable(&mut self) -> Result<(), DriveError<E>> {
        if let Some(pca) = self.pwm.as_mut() {
            pca.disable().map_err(DriveError::PwmError)?;
        }
        Ok(())
    }

    fn duty(
        &self,
        speed: i16,
    ) -> u16 {
        const MAX_DUTY: u16 = 4095;
        let limit = self.speed_limit.max(1) as u32;
        let magnitude = (speed.unsigned_abs() as u32).min(limit);
        (magnitude * MAX_DUTY as u32 / limit) as u16
    }
}

impl<'a, I2C, E> MotorDriver for Pca9685Drive<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    type Error = DriveError<E>;

    fn set_speeds(
        &mut self,
        speeds: WheelSpeeds,
    ) -> Result<(), Self::Error> {
        const MAX_DUTY: u16 = 4095;

        let targets = [speeds.left, speeds.right];
        let duties = [self.duty(speeds.left), self.duty(speeds.right)];
        let channels = self.motor_channels;
        let pca = self.pwm.as_mut().ok_or(DriveError::PwmNotInitialized)?;

        for (i, &(phase_channel, enable_channel)) in channels.iter().enumerate() {
            let forward = targets[i] >= 0;
            pca.set_channel_on_off(phase_channel, 0, if forward { 0 } else { MAX_DUTY })
                .map_err(DriveError::PwmError)?;
            pca.set_channel_on_off(enable_channel, 0, duties[i])
                .map_err(DriveError::PwmError)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::Mock as I2cMock;

    #[test]
    fn duty_scales_to_speed_limit() {
        let mock = I2cMock::new(&[]);
        let bus = RefCell::new(mock);
        let drive = Pca9685Drive::new(&bus, 1100);
        assert_eq!(drive.duty(0), 0);
        assert_eq!(drive.duty(1100), 4095);
        assert_eq!(drive.duty(-1100), 4095);
        assert_eq!(drive.duty(550), 2047);
        assert_eq!(drive.duty(i16::MIN), 4095);
        bus.borrow_mut().done();
    }
}
