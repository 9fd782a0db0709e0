//! Register level driver for the ams CCS811 air quality sensor.
//!
//! The sensor boots into its bootloader. [`Ccs811::configure`] walks it through
//! detection, the application start command and drive mode selection, checking
//! the error flag after every step. Once [`State::Ready`] the driver is polled
//! with [`Ccs811::data_available`] and [`Ccs811::read_measurement`].
//!
//! `APP_START` is only accepted by the bootloader, so a sensor that already
//! runs its application has to go through [`Ccs811::reset`] first.

use {
    crate::sensors::Measurement,
    chrono::Utc,
    embedded_hal::blocking::{
        delay::DelayMs,
        i2c::{Write, WriteRead},
    },
    log::debug,
    registers::*,
};

pub mod fault;
pub mod registers;

pub use {
    fault::{Error, Fault, FaultKind},
    registers::{DriveMode, Versions, ADDRESS},
};

/// Startup progress of the sensor. Only moves forward, except for `Faulted`
/// which any failure leads to and which only `configure` leaves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unopened,
    Detected,
    /// Error flag read and clear after detection.
    StartupChecked,
    AppValid,
    AppStarted,
    ConfiguredDriveMode,
    Ready,
    Faulted,
}

pub struct Ccs811<I2C> {
    i2c: I2C,
    address: u8,
    drive_mode: DriveMode,
    state: State,
}

impl<I2C> Ccs811<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            drive_mode: DriveMode::default(),
            state: State::Unopened,
        }
    }

    /// Drive mode applied by `configure`. Values above 4 saturate.
    pub fn with_drive_mode(mut self, mode: u8) -> Self {
        self.drive_mode = DriveMode::from(mode);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Releases the underlying I2C bus and destroys the driver.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> Ccs811<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Checks the hardware ID register. A faulted driver stays faulted.
    pub fn detect(&mut self) -> Result<(), Error<E>> {
        let id = self.read_byte(HW_ID)?;
        if id != HW_ID_CODE {
            self.state = State::Faulted;
            return Err(Error::NotFound(id));
        }

        if self.state == State::Unopened {
            self.state = State::Detected;
        }
        Ok(())
    }

    /// Software reset back into the bootloader, followed by the boot delay.
    ///
    /// Allowed in any state and leaves the state untouched, `configure` has to
    /// follow.
    pub fn reset<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.write_register([SW_RESET, 0x11, 0xE5, 0x72, 0x8A])?;
        delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Returns whether the sensor has an error pending in ERROR_ID.
    pub fn check_error(&mut self) -> Result<bool, Error<E>> {
        self.guard()?;
        Ok(self.status()?.error())
    }

    /// Reads ERROR_ID. Reading clears the register on the sensor side.
    pub fn read_error(&mut self) -> Result<Fault, Error<E>> {
        self.guard()?;
        self.read_byte(ERROR_ID).map(Fault::from)
    }

    pub fn decode_error(&mut self) -> Result<FaultKind, Error<E>> {
        self.read_error().map(|fault| fault.kind)
    }

    /// Returns whether a valid application firmware is loaded.
    pub fn app_valid(&mut self) -> Result<bool, Error<E>> {
        self.guard()?;
        Ok(self.status()?.app_valid())
    }

    /// Read-modify-write of the drive mode field of MEAS_MODE.
    pub fn set_drive_mode(&mut self, mode: u8) -> Result<(), Error<E>> {
        self.guard()?;
        self.write_drive_mode(DriveMode::from(mode))
    }

    /// Runs the startup sequence from detection to `Ready`.
    ///
    /// The first failing step aborts the sequence and leaves the driver
    /// `Faulted`. Calling this again is the only way to recover from that.
    pub fn configure(&mut self) -> Result<(), Error<E>> {
        self.state = State::Unopened;

        let result = self.startup();
        if result.is_err() {
            self.state = State::Faulted;
        }
        result
    }

    fn startup(&mut self) -> Result<(), Error<E>> {
        self.detect()?;

        if let Some(fault) = self.pending_fault()? {
            return Err(Error::StartupFault(fault));
        }
        self.state = State::StartupChecked;

        if !self.status()?.app_valid() {
            return Err(Error::AppNotValid);
        }
        self.state = State::AppValid;

        self.command(APP_START)?;
        if let Some(fault) = self.pending_fault()? {
            return Err(Error::AppStartFault(fault));
        }
        self.state = State::AppStarted;

        self.write_drive_mode(self.drive_mode)?;
        self.state = State::ConfiguredDriveMode;
        if let Some(fault) = self.pending_fault()? {
            return Err(Error::DriveModeFault(fault));
        }

        self.state = State::Ready;
        Ok(())
    }

    /// Reads the 16 bit baseline, MSB first.
    pub fn read_baseline(&mut self) -> Result<u16, Error<E>> {
        self.guard()?;
        self.read_block::<2>(BASELINE).map(u16::from_be_bytes)
    }

    pub fn versions(&mut self) -> Result<Versions, Error<E>> {
        self.guard()?;
        Ok(Versions {
            hardware: self.read_byte(HW_VERSION)?,
            boot: self.read_block::<2>(FW_BOOT_VERSION)?.into(),
            application: self.read_block::<2>(FW_APP_VERSION)?.into(),
        })
    }

    /// Returns whether a new algorithm result is ready.
    pub fn data_available(&mut self) -> Result<bool, Error<E>> {
        self.guard()?;
        Ok(self.status()?.data_ready())
    }

    /// Reads the latest eCO2 and TVOC values.
    ///
    /// Only meaningful after `data_available` returned true in the same
    /// cycle. Otherwise the sensor returns whatever it last computed.
    pub fn read_measurement(&mut self) -> Result<Measurement, Error<E>> {
        self.guard()?;
        let b = self.read_block::<4>(ALG_RESULT_DATA)?;

        Ok(Measurement {
            co2_ppm: u16::from_be_bytes([b[0], b[1]]),
            tvoc_ppb: u16::from_be_bytes([b[2], b[3]]),
            timestamp: Utc::now(),
        })
    }

    fn guard(&self) -> Result<(), Error<E>> {
        match self.state {
            State::Faulted => Err(Error::Faulted),
            _ => Ok(()),
        }
    }

    fn pending_fault(&mut self) -> Result<Option<Fault>, Error<E>> {
        if self.status()?.error() {
            let fault = self.read_byte(ERROR_ID).map(Fault::from)?;
            debug!("CCS811 reported {}", fault);
            Ok(Some(fault))
        } else {
            Ok(None)
        }
    }

    fn write_drive_mode(&mut self, mode: DriveMode) -> Result<(), Error<E>> {
        let mut setting = MeasMode::from(self.read_byte(MEAS_MODE)?);
        setting.set_drive_mode(mode as u8);
        self.write_register([MEAS_MODE, setting.into()])
    }

    fn status(&mut self) -> Result<Status, Error<E>> {
        self.read_byte(STATUS).map(Status::from)
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, Error<E>> {
        let [value] = self.read_block::<1>(register)?;
        Ok(value)
    }

    fn read_block<const N: usize>(&mut self, register: u8) -> Result<[u8; N], Error<E>> {
        let mut buffer = [0u8; N];
        let result = self.i2c.write_read(self.address, &[register], &mut buffer);
        self.transport(result)?;
        Ok(buffer)
    }

    fn write_register<const N: usize>(&mut self, buffer: [u8; N]) -> Result<(), Error<E>> {
        let result = self.i2c.write(self.address, &buffer);
        self.transport(result)
    }

    /// Register address only, no payload.
    fn command(&mut self, register: u8) -> Result<(), Error<E>> {
        self.write_register([register])
    }

    fn transport<T>(&mut self, result: Result<T, E>) -> Result<T, Error<E>> {
        result.map_err(|e| {
            self.state = State::Faulted;
            Error::Transport(e)
        })
    }
}
