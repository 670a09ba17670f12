//! Measuring Station Service
//!
//! Finds the dimension sensor and the scale on the serial ports, runs the
//! automatic measurement loop and takes operator commands on stdin.

mod broadcast_layer;
mod console;
mod settings;
mod sink;

use std::sync::Arc;

use anyhow::{bail, Result};
use broadcast_layer::{BroadcastLayer, BroadcastLevel, ProjectCrateFilter};
use console::{BenchDevices, Console, PortSource};
use gauge_detect::{cancel_pair, CancelSignal, PortOpener, PortScanner, ScannerConfig, SerialOpener};
use gauge_protocol::Dimensions;
use gauge_sim::{SharedDevice, SimBench, VirtualScale, VirtualSensor};
use gauge_station::{LogBroadcaster, LogSubscription, MeasureLoop, Station};
use settings::Settings;
use sink::ConsoleSink;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

const USAGE: &str = "\
Usage: gauge [--simulate]

  --simulate   run against a virtual sensor and scale
  --help       show this text

Settings are read from $XDG_CONFIG_HOME/gauge/settings.json.";

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    simulate: bool,
}

impl Args {
    /// Returns `None` when only help was requested
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>> {
        let mut parsed = Args::default();
        for arg in args {
            match arg.as_str() {
                "--simulate" => parsed.simulate = true,
                "--help" | "-h" => return Ok(None),
                other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
            }
        }
        Ok(Some(parsed))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = Args::parse(std::env::args().skip(1))? else {
        println!("{}", USAGE);
        return Ok(());
    };

    let settings = Settings::load();
    let bus = Arc::new(LogBroadcaster::new(settings.log_capacity));
    let level = Arc::new(BroadcastLevel::new(settings.console_level()));

    // Console output goes to stderr; the live feed prints on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        "gauge=info,gauge_protocol=info,gauge_detect=info,gauge_station=info,gauge_sim=info".into()
                    }),
                ),
        )
        .with(BroadcastLayer::new(Arc::clone(&bus)).with_filter(ProjectCrateFilter::new(Arc::clone(&level))))
        .init();

    info!(source = "system", "Starting measuring station");

    if Settings::settings_path().is_some_and(|path| !path.exists()) {
        if let Err(e) = settings.save() {
            warn!(source = "system", "Could not write default settings: {}", e);
        }
    }

    if args.simulate {
        let devices = BenchDevices {
            scale: SharedDevice::scale(VirtualScale::new(0)),
            sensor: SharedDevice::sensor(VirtualSensor::new(Dimensions::UNKNOWN)),
        };
        let bench = SimBench::station(devices.scale.clone(), devices.sensor.clone());
        let ports = PortSource::Fixed(bench.port_names());
        info!(source = "system", "Simulation mode on {:?}", bench.port_names());
        run(bench, ports, Some(devices), &settings, bus, level).await
    } else {
        let scanner = PortScanner::with_config(ScannerConfig {
            skip_patterns: settings.skip_patterns.clone(),
        });
        run(
            SerialOpener::default(),
            PortSource::Scan(scanner),
            None,
            &settings,
            bus,
            level,
        )
        .await
    }
}

async fn run<O: PortOpener>(
    opener: O,
    ports: PortSource,
    bench: Option<BenchDevices>,
    settings: &Settings,
    bus: Arc<LogBroadcaster>,
    level: Arc<BroadcastLevel>,
) -> Result<()> {
    let mut station = Station::new(Arc::new(opener), settings.station.clone());
    station.connect(&ports.candidates()).await;
    let station = Arc::new(Mutex::new(station));

    let (shutdown, signal) = cancel_pair();

    let sink = Arc::new(ConsoleSink::new(settings.result_file.clone()));
    let measure = MeasureLoop::new(Arc::clone(&station), sink)
        .with_timing(settings.measure_loop)
        .with_threshold(settings.weight_threshold);
    let measure_task = tokio::spawn(measure.run(signal.clone()));
    let feed_task = tokio::spawn(print_feed(bus.subscribe(), signal));

    let mut console = Console::new(Arc::clone(&station), ports, level);
    if let Some(devices) = bench {
        console = console.with_bench(devices);
    }

    let outcome = tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin())) => result.map_err(anyhow::Error::from),
        result = tokio::signal::ctrl_c() => {
            info!(source = "system", "Interrupted");
            result.map_err(anyhow::Error::from)
        }
    };

    shutdown.cancel();
    if let Err(e) = measure_task.await {
        warn!(source = "system", "Measurement loop ended abnormally: {}", e);
    }
    if let Err(e) = feed_task.await {
        warn!(source = "system", "Log feed ended abnormally: {}", e);
    }

    station.lock().await.disconnect();
    info!(source = "system", "Station stopped");
    outcome
}

/// Print broadcast log lines until shutdown
async fn print_feed(mut feed: LogSubscription, shutdown: CancelSignal) {
    loop {
        tokio::select! {
            message = feed.rx.recv() => match message {
                Some(message) => println!("{}", message),
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_args() {
        assert_eq!(Args::parse(args(&[])).unwrap(), Some(Args { simulate: false }));
        assert_eq!(
            Args::parse(args(&["--simulate"])).unwrap(),
            Some(Args { simulate: true })
        );
        assert_eq!(Args::parse(args(&["--simulate", "--help"])).unwrap(), None);
        assert!(Args::parse(args(&["--port"])).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_stops_on_shutdown() {
        let bus = LogBroadcaster::new(4);
        let (shutdown, signal) = cancel_pair();
        let task = tokio::spawn(print_feed(bus.subscribe(), signal));

        bus.log(gauge_station::LogCategory::Scale, "Scale found");
        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(bus.log(gauge_station::LogCategory::System, "after"), 0);
    }
}
