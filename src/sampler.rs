use {
    crate::sensors::{
        ccs811::{Ccs811, Error, Fault, State},
        Measurement,
    },
    async_channel::Sender,
    embedded_hal::blocking::{
        delay::DelayMs,
        i2c::{Write, WriteRead},
    },
    log::{info, warn},
};

/// What a single poll tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A new result was read and queued for publishing.
    Sampled(Measurement),
    /// No data yet, but the sensor flagged an error.
    DeviceFault(Fault),
    /// No data yet and no error.
    Idle,
    /// The driver was faulted and has been reset and configured again.
    Recovered,
}

/// Polls the sensor and hands new results to the outbound queue.
pub struct Sampler<I2C, D> {
    sensor: Ccs811<I2C>,
    delay: D,
    queue: Sender<Measurement>,
}

impl<I2C, D> Sampler<I2C, D> {
    pub fn new(sensor: Ccs811<I2C>, delay: D, queue: Sender<Measurement>) -> Self {
        Self {
            sensor,
            delay,
            queue,
        }
    }

    pub fn state(&self) -> State {
        self.sensor.state()
    }

    pub fn into_sensor(self) -> Ccs811<I2C> {
        self.sensor
    }
}

impl<I2C, D, E> Sampler<I2C, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
{
    /// Device faults are returned as a [`Tick`], only bus failures and failed
    /// recoveries are errors.
    pub fn tick(&mut self) -> Result<Tick, Error<E>> {
        if self.sensor.state() == State::Faulted {
            // The sensor most likely still runs its application, which
            // rejects APP_START.
            self.sensor.reset(&mut self.delay)?;
            self.sensor.configure()?;
            info!("CCS811 configured again after fault");
            return Ok(Tick::Recovered);
        }

        if self.sensor.data_available()? {
            let measurement = self.sensor.read_measurement()?;
            info!(
                "CO2[{}] tVOC[{}]",
                measurement.co2_ppm, measurement.tvoc_ppb
            );

            // Unbounded, so this only fails once the publisher is gone.
            if self.queue.try_send(measurement).is_err() {
                warn!("Publish queue closed, dropping measurement");
            }
            return Ok(Tick::Sampled(measurement));
        }

        if self.sensor.check_error()? {
            let fault = self.sensor.read_error()?;
            warn!("CCS811 error: {}", fault);
            return Ok(Tick::DeviceFault(fault));
        }

        Ok(Tick::Idle)
    }
}
