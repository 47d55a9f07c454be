use std::time::Duration;

use tollgate::Throttler;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/tollgate-demo/limits.json".to_string());
    let definitions = match tollgate_config::from_path(&path) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let throttler = Throttler::new();
    if let Err(e) = throttler.load_config(definitions) {
        eprintln!("bad configuration in {path}: {e}");
        std::process::exit(1);
    }
    throttler.start().expect("fresh throttler with config");

    // Fire a burst of requests per id every second and report how many got
    // through. With limits.json, "search" admits 10 per 5s and "upload"
    // admits 3 per 10s, so the bursts drain and snap back on refill.
    for second in 0..15u64 {
        for id in ["search", "upload"] {
            let admitted = (0..4).filter(|_| throttler.allow(id)).count();
            info!(second, id, admitted, "burst of 4");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    throttler.stop();
}
