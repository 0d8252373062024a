use std::env;
use std::error;

use reqwest::Url;

fn main() -> Result<(), Box<dyn error::Error>> {
    let args: Vec<String> = env::args().collect();
    let endpoint = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("http://127.0.0.1:8000/");

    let url = Url::parse(endpoint)?;
    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(format!("Liveness check failed with status {}", response.status()).into());
    }

    Ok(())
}
