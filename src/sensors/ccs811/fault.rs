use std::fmt;

/// Cause reported by the ERROR_ID register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    HeaterSupply,
    HeaterFault,
    MaxResistance,
    MeasModeInvalid,
    ReadRegInvalid,
    MsgInvalid,
    Unknown,
}

/// ERROR_ID bits, most severe first. The sensor signals a single cause, so
/// only the first set bit in this order is reported.
const PRIORITY: [(u8, FaultKind); 6] = [
    (5, FaultKind::HeaterSupply),
    (4, FaultKind::HeaterFault),
    (3, FaultKind::MaxResistance),
    (2, FaultKind::MeasModeInvalid),
    (1, FaultKind::ReadRegInvalid),
    (0, FaultKind::MsgInvalid),
];

impl FaultKind {
    pub fn from_error_id(raw: u8) -> Self {
        PRIORITY
            .iter()
            .find(|(bit, _)| raw & (1 << *bit) != 0)
            .map(|&(_, kind)| kind)
            .unwrap_or(FaultKind::Unknown)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::HeaterSupply => "HeaterSupply",
            FaultKind::HeaterFault => "HeaterFault",
            FaultKind::MaxResistance => "MaxResistance",
            FaultKind::MeasModeInvalid => "MeasModeInvalid",
            FaultKind::ReadRegInvalid => "ReadRegInvalid",
            FaultKind::MsgInvalid => "MsgInvalid",
            FaultKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A decoded ERROR_ID read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub raw: u8,
}

impl From<u8> for Fault {
    fn from(raw: u8) -> Self {
        Self {
            kind: FaultKind::from_error_id(raw),
            raw,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (error id 0x{:02X})", self.kind, self.raw)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    #[error("bus transport fault: {0:?}")]
    Transport(E),

    #[error("CCS811 not found, hardware id 0x{0:02X}. Please check wiring.")]
    NotFound(u8),

    #[error("error at startup: {0}")]
    StartupFault(Fault),

    #[error("application firmware not valid")]
    AppNotValid,

    #[error("error at app start: {0}")]
    AppStartFault(Fault),

    #[error("error at set drive mode: {0}")]
    DriveModeFault(Fault),

    #[error("sensor is faulted, it must be configured again")]
    Faulted,
}
