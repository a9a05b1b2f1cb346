//! Bakes the cellular settings from `.env` (or the environment) into the
//! firmware image.

const SETTINGS: [&str; 5] = [
    "TSIM_APN",
    "TSIM_APN_USER",
    "TSIM_APN_PASSWORD",
    "TSIM_SIM_PIN",
    "TSIM_GPS",
];

fn main() {
    // A missing .env is fine; the variables may come from the shell
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for name in SETTINGS {
        println!("cargo:rerun-if-env-changed={name}");
        let value = std::env::var(name).unwrap_or_default();
        println!("cargo:rustc-env={name}={value}");
    }

    if std::env::var("TSIM_APN").map_or(true, |apn| apn.is_empty()) {
        println!("cargo:warning=TSIM_APN is not set; the modem will use the network default APN");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
