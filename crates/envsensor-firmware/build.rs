//! Bakes the network credentials from `.env` (or the environment) into the
//! firmware image.

const KEYS: [&str; 3] = ["WIFI_SSID", "WIFI_PASSWORD", "DATABASE_URL"];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // A missing .env is fine as long as the variables come from the shell.
    let _ = dotenvy::dotenv();

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = dotenvy::var(key).unwrap_or_else(|_| {
            println!("cargo:warning={key} is not set; using an empty value");
            String::new()
        });
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
