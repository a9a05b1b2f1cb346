use tsim_core::config::{CellularConfig, Config};

/// Settings baked in by `build.rs`.
pub fn config() -> Config<'static> {
    Config {
        cellular: CellularConfig {
            apn: env!("TSIM_APN"),
            username: env!("TSIM_APN_USER"),
            password: env!("TSIM_APN_PASSWORD"),
            sim_pin: env!("TSIM_SIM_PIN"),
        },
        gps: matches!(env!("TSIM_GPS"), "1" | "true" | "yes"),
    }
}
