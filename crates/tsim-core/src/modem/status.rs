//! Typed views of SIM, network and signal status replies

use core::fmt;

use atat::atat_derive::AtatResp;

/// `+CPIN?` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Ready,
    PinRequired,
    PukRequired,
    NotInserted,
    Unknown,
}

impl SimStatus {
    pub fn parse(payload: &str) -> Self {
        match payload.trim() {
            "READY" => Self::Ready,
            "SIM PIN" => Self::PinRequired,
            "SIM PUK" => Self::PukRequired,
            _ => Self::Unknown,
        }
    }
}

/// 3GPP `<stat>` of `+CREG`/`+CGREG`/`+CEREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    NotRegistered,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl RegistrationStatus {
    pub const fn from_stat(stat: u8) -> Self {
        match stat {
            0 => Self::NotRegistered,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            5 => Self::Roaming,
            _ => Self::Unknown,
        }
    }

    pub const fn is_registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

/// `+CSQ: <rssi>,<ber>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatResp)]
pub struct SignalQuality {
    /// 0..=31, 99 when not known
    #[at_arg(position = 0)]
    pub rssi: u8,
    /// 0..=7, 99 when not known
    #[at_arg(position = 1)]
    pub ber: u8,
}

impl SignalQuality {
    /// `rssi`/`ber` value for "not known or not detectable"
    pub const UNKNOWN: u8 = 99;

    /// Received signal strength in dBm (`-113 + 2 * rssi`).
    pub const fn dbm(self) -> Option<i16> {
        if self.rssi == Self::UNKNOWN || self.rssi > 31 {
            None
        } else {
            Some(-113 + 2 * self.rssi as i16)
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dbm() {
            Some(dbm) => write!(f, "{} dBm (rssi {})", dbm, self.rssi),
            None => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::string::ToString;

    #[test]
    fn test_sim_status_parse() {
        assert_eq!(SimStatus::parse("READY"), SimStatus::Ready);
        assert_eq!(SimStatus::parse("SIM PIN"), SimStatus::PinRequired);
        assert_eq!(SimStatus::parse("SIM PUK"), SimStatus::PukRequired);
        assert_eq!(SimStatus::parse("PH-NET PIN"), SimStatus::Unknown);
    }

    #[test]
    fn test_registration_stat() {
        assert!(RegistrationStatus::from_stat(1).is_registered());
        assert!(RegistrationStatus::from_stat(5).is_registered());
        assert_eq!(RegistrationStatus::from_stat(2), RegistrationStatus::Searching);
        assert_eq!(RegistrationStatus::from_stat(4), RegistrationStatus::Unknown);
        assert_eq!(RegistrationStatus::from_stat(9), RegistrationStatus::Unknown);
        assert!(!RegistrationStatus::from_stat(3).is_registered());
    }

    #[test]
    fn test_signal_dbm() {
        assert_eq!(SignalQuality { rssi: 0, ber: 0 }.dbm(), Some(-113));
        assert_eq!(SignalQuality { rssi: 31, ber: 0 }.dbm(), Some(-51));
        assert_eq!(SignalQuality { rssi: 99, ber: 99 }.dbm(), None);
    }

    #[test]
    fn test_signal_unknown() {
        let unknown = SignalQuality {
            rssi: SignalQuality::UNKNOWN,
            ber: SignalQuality::UNKNOWN,
        };
        assert_eq!(unknown.dbm(), None);
        assert_eq!(unknown.to_string(), "unknown");
        // 32..=98 are reserved
        assert_eq!(SignalQuality { rssi: 40, ber: 0 }.dbm(), None);
        assert_eq!(SignalQuality { rssi: 20, ber: 0 }.to_string(), "-73 dBm (rssi 20)");
    }
}
