use {
    anyhow::{Context, Result},
    async_channel::unbounded,
    config::Config,
    linux_embedded_hal::{Delay, I2cdev},
    log::info,
    rumqttc::AsyncClient,
    sampler::Sampler,
    sensors::ccs811::Ccs811,
    std::time::Duration,
    telemetry::Publisher,
    tokio::task,
};

pub mod config;
pub mod sampler;
pub mod scheduler;
pub mod sensors;
pub mod telemetry;

const REQUEST_CAPACITY: usize = 10;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn client() -> Result<()> {
    pretty_env_logger::init();
    color_backtrace::install();

    let config = Config::from_env()?;
    let mut shutdown = scheduler::signals().context("Failed to install signal handlers")?;

    info!(
        "Starting CCS811 read at 0x{:02X} on {}",
        config.address,
        config.i2c_dev.display()
    );
    let dev = I2cdev::new(&config.i2c_dev)
        .with_context(|| format!("Failed to open {}", config.i2c_dev.display()))?;

    let mut sensor = Ccs811::new(dev, config.address).with_drive_mode(config.drive_mode);
    // The sensor keeps running its application across restarts of this
    // process, and only the bootloader accepts APP_START.
    sensor.reset(&mut Delay).context("Failed to reset CCS811")?;
    sensor.configure().context("Failed to configure CCS811")?;

    let versions = sensor.versions()?;
    info!(
        "CCS811 hardware version 0x{:02X}, bootloader {}, application {}",
        versions.hardware, versions.boot, versions.application
    );
    info!("Baseline for this sensor: 0x{:04X}", sensor.read_baseline()?);

    info!(
        "MQTT connecting to {}:{} as {}",
        config.broker.host, config.broker.port, config.broker.client_name
    );
    let (mqtt, eventloop) =
        AsyncClient::new(telemetry::mqtt_options(&config.broker)?, REQUEST_CAPACITY);
    let connection = task::spawn(telemetry::connection(
        eventloop,
        mqtt.clone(),
        config.subscription_topic.clone(),
    ));

    // Unbounded: nothing is dropped while the broker is unreachable, at the
    // cost of memory growing until it comes back.
    let (queue, pending) = unbounded();
    let publisher = task::spawn(
        Publisher::new(
            mqtt.clone(),
            config.publish_topic.clone(),
            config.device_id.clone(),
        )
        .run(pending),
    );

    info!("Initialization complete");

    let mut sampler = Sampler::new(sensor, Delay, queue);
    scheduler::run(&mut sampler, config.measure_delay, &mut shutdown).await;

    // Dropping the sampler drops the only sender, which closes the queue.
    let sensor = sampler.into_sensor();

    telemetry::close(&mqtt, publisher, connection, DRAIN_TIMEOUT).await;

    drop(sensor.release());
    info!("Shutdown complete");

    Ok(())
}
