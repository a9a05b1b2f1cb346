use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub cellular: CellularConfig<'a>,
    /// Power up the GNSS receiver after attaching
    pub gps: bool,
}

/// Packet data settings; empty strings mean "not used".
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CellularConfig<'a> {
    pub apn: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub sim_pin: &'a str,
}

impl<'a> CellularConfig<'a> {
    pub fn sim_pin(&self) -> Option<&'a str> {
        (!self.sim_pin.is_empty()).then_some(self.sim_pin)
    }
}
