//! Sweep the dial across the band on the default output device.
//!
//! ```bash
//! cargo run --example sweep -- stations.json assets/audio
//! ```

use std::time::Duration;

use radiodial::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let catalog_path = args.next().unwrap_or_else(|| "stations.json".into());
    let audio_root = args.next().unwrap_or_else(|| ".".into());

    let catalog = Catalog::from_json_file(&catalog_path)?;
    let max_dial = TunerConfig::default().max_dial;

    let engine = RadioEngine::builder()
        .catalog(catalog)
        .audio_root(audio_root)
        .debug_log_interval(Duration::from_secs(1))
        .build()?;

    engine.power_on();
    let steps = 400;
    for i in 0..=steps {
        engine.set_dial(max_dial * i as f32 / steps as f32);
        std::thread::sleep(Duration::from_millis(25));
    }

    println!("{}", engine.snapshot().summary());
    engine.power_off();
    Ok(())
}
