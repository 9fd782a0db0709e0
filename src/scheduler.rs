use {
    crate::sampler::Sampler,
    embedded_hal::blocking::{
        delay::DelayMs,
        i2c::{Write, WriteRead},
    },
    log::{error, info},
    std::{fmt::Debug, time::Duration},
    tokio::{
        signal::unix::{signal, SignalKind},
        sync::watch,
        time,
    },
};

/// Listens for the shutdown flag.
///
/// Once the flag is seen, or the sending half is gone, every further `recv`
/// returns immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(notify: watch::Receiver<bool>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.notify.wait_for(|flag| *flag).await;
        self.is_shutdown = true;
    }
}

/// Flips the shutdown flag on SIGINT or SIGTERM.
pub fn signals() -> std::io::Result<Shutdown> {
    let (tx, rx) = watch::channel(false);
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => info!("Received SIGTERM"),
            _ = interrupt.recv() => info!("Received SIGINT"),
        }
        let _ = tx.send(true);
    });

    Ok(Shutdown::new(rx))
}

/// Ticks the sampler every `delay` until shutdown.
///
/// A tick always runs to completion, shutdown only interrupts the wait
/// between ticks.
pub async fn run<I2C, D, E>(
    sampler: &mut Sampler<I2C, D>,
    delay: Duration,
    shutdown: &mut Shutdown,
) where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
    E: Debug,
{
    while !shutdown.is_shutdown() {
        if let Err(e) = sampler.tick() {
            error!("{}", e);
        }

        tokio::select! {
            biased;
            _ = shutdown.recv() => {}
            _ = time::sleep(delay) => {}
        }
    }

    info!("Polling stopped");
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::sensors::{
            ccs811::{registers::*, testing::*, Ccs811, State},
            Measurement,
        },
        async_channel::{unbounded, Receiver},
        embedded_hal_mock::{delay::MockNoop, i2c::Mock as I2cMock},
        std::time::Instant,
    };

    fn ready_sampler(i2c: &I2cMock) -> (Sampler<I2cMock, MockNoop>, Receiver<Measurement>) {
        let mut sensor = Ccs811::new(i2c.clone(), ADDRESS);
        sensor.configure().unwrap();
        let (tx, rx) = unbounded();
        (Sampler::new(sensor, MockNoop::new(), tx), rx)
    }

    #[tokio::test]
    async fn stops_after_current_tick_when_already_signalled() {
        let mut expectations = configure_ok();
        expectations.push(read(STATUS, &[0x98]));
        expectations.push(read(ALG_RESULT_DATA, &[0x01, 0x90, 0x00, 0x0F]));
        let mut i2c = I2cMock::new(&expectations);
        let (mut sampler, rx) = ready_sampler(&i2c);

        let (tx, notify) = watch::channel(false);
        tx.send(true).unwrap();
        let mut shutdown = Shutdown::new(notify);

        run(&mut sampler, Duration::from_secs(3600), &mut shutdown).await;

        assert!(shutdown.is_shutdown());
        assert_eq!(rx.len(), 1);
        assert_eq!(sampler.state(), State::Ready);
        i2c.done();
    }

    #[tokio::test]
    async fn signal_interrupts_sleep() {
        let mut expectations = configure_ok();
        expectations.push(read(STATUS, &[0x90]));
        expectations.push(read(STATUS, &[0x90]));
        let mut i2c = I2cMock::new(&expectations);
        let (mut sampler, _rx) = ready_sampler(&i2c);

        let (tx, notify) = watch::channel(false);
        let mut shutdown = Shutdown::new(notify);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        let started = Instant::now();
        time::timeout(
            Duration::from_secs(5),
            run(&mut sampler, Duration::from_secs(3600), &mut shutdown),
        )
        .await
        .expect("shutdown did not interrupt the sleep");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(sampler.state(), State::Ready);
        i2c.done();
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, notify) = watch::channel(false);
        let mut shutdown = Shutdown::new(notify);
        drop(tx);

        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
        shutdown.recv().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_interval() {
        let mut expectations = configure_ok();
        for _ in 0..3 {
            expectations.push(read(STATUS, &[0x98]));
            expectations.push(read(ALG_RESULT_DATA, &[0x01, 0x90, 0x00, 0x0F]));
        }
        let mut i2c = I2cMock::new(&expectations);
        let (mut sampler, rx) = ready_sampler(&i2c);

        let (tx, notify) = watch::channel(false);
        let mut shutdown = Shutdown::new(notify);
        tokio::spawn(async move {
            // Ticks at 0s, 10s and 20s, stop during the third wait.
            time::sleep(Duration::from_secs(25)).await;
            tx.send(true).unwrap();
        });

        run(&mut sampler, Duration::from_secs(10), &mut shutdown).await;

        assert_eq!(rx.len(), 3);
        i2c.done();
    }
}
