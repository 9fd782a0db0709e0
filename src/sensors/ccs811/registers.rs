use bitfield::bitfield;

pub const ADDRESS: u8 = 0x5B;

/// Value of the hardware ID register on every CCS811.
pub const HW_ID_CODE: u8 = 0x81;

pub const STATUS: u8 = 0x00;
pub const MEAS_MODE: u8 = 0x01;
pub const ALG_RESULT_DATA: u8 = 0x02;
pub const BASELINE: u8 = 0x11;
pub const HW_ID: u8 = 0x20;
pub const HW_VERSION: u8 = 0x21;
pub const FW_BOOT_VERSION: u8 = 0x23;
pub const FW_APP_VERSION: u8 = 0x24;
pub const ERROR_ID: u8 = 0xE0;
pub const APP_START: u8 = 0xF4;
pub const SW_RESET: u8 = 0xFF;

/// Time the bootloader needs after a software reset.
pub const RESET_DELAY_MS: u8 = 20;

bitfield! {
    /// STATUS register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status(u8);
    impl Debug;
    pub bool, error, _: 0;
    pub bool, data_ready, _: 3;
    pub bool, app_valid, _: 4;
    pub bool, firmware_mode, _: 7;
}

impl From<u8> for Status {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

bitfield! {
    /// MEAS_MODE register. Only the drive mode field is touched by the driver,
    /// everything else is written back as read.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MeasMode(u8);
    impl Debug;
    pub u8, drive_mode, set_drive_mode: 6, 4;
    pub bool, interrupt_on_data_ready, _: 3;
    pub bool, interrupt_on_threshold, _: 2;
}

impl From<u8> for MeasMode {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

impl From<MeasMode> for u8 {
    fn from(m: MeasMode) -> Self {
        m.0
    }
}

/// Measurement cadence of the sensor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DriveMode {
    /// No measurements, low power.
    Idle = 0,
    /// Constant power, one measurement per second.
    #[default]
    EverySecond = 1,
    /// Pulse heating, one measurement every 10 seconds.
    EveryTenSeconds = 2,
    /// Low power pulse heating, one measurement every 60 seconds.
    EveryMinute = 3,
    /// Constant power, raw data every 250ms. Algorithm results are not updated.
    Every250Millis = 4,
}

impl From<u8> for DriveMode {
    /// Anything above the highest defined mode saturates to it.
    fn from(mode: u8) -> Self {
        match mode {
            0 => Self::Idle,
            1 => Self::EverySecond,
            2 => Self::EveryTenSeconds,
            3 => Self::EveryMinute,
            _ => Self::Every250Millis,
        }
    }
}

/// Firmware version as packed by the sensor: major and minor nibbles followed
/// by a trivial byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub trivial: u8,
}

impl From<[u8; 2]> for FirmwareVersion {
    fn from(b: [u8; 2]) -> Self {
        Self {
            major: b[0] >> 4,
            minor: b[0] & 0x0F,
            trivial: b[1],
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.trivial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub hardware: u8,
    pub boot: FirmwareVersion,
    pub application: FirmwareVersion,
}
