//! Operator console
//!
//! Reads one command per line. Console commands act on the station as a
//! whole; everything else is handed to the dimension sensor dispatcher.

use std::sync::Arc;

use gauge_detect::{PortOpener, PortScanner};
use gauge_protocol::Dimensions;
use gauge_sim::SharedDevice;
use gauge_station::{Candidates, Station};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::broadcast_layer::{parse_level, BroadcastLevel};

const HELP: &str = "\
Console commands:
  status                  device status as JSON
  reconnect               search for both devices again
  weight                  read the scale once
  measure                 weight plus dimensions
  log <level>             live log feed: off, error, warn, info, debug, trace
  place <grams> [l w h]   put an object on the simulated bench
  help                    this text
  quit                    stop the station
Sensor commands:
  ping, get_dimensions, start, reset_sensors, led_on, led_off,
  set_top_max:N, set_width_max:N, set_length_max:N (N = 1-255)";

/// Errors from parsing a console line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown log level '{0}' (off, error, warn, info, debug, trace)")]
    InvalidLevel(String),

    #[error("usage: place <grams> [<length> <width> <height>]")]
    InvalidPlace,

    #[error("no simulated bench; start with --simulate")]
    NotSimulated,
}

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Reconnect,
    Weight,
    Measure,
    Log(Option<tracing::Level>),
    Place {
        grams: u32,
        dimensions: Option<Dimensions>,
    },
    Help,
    Quit,
    /// Passed through to the sensor dispatcher
    Device(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let command = match words.next().unwrap_or("").to_ascii_lowercase().as_str() {
            "status" => ConsoleCommand::Status,
            "reconnect" => ConsoleCommand::Reconnect,
            "weight" => ConsoleCommand::Weight,
            "measure" => ConsoleCommand::Measure,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            "log" => {
                let name = words.next().unwrap_or("");
                let level =
                    parse_level(name).ok_or_else(|| ConsoleError::InvalidLevel(name.to_string()))?;
                ConsoleCommand::Log(level)
            }
            "place" => Self::parse_place(words.collect())?,
            _ => ConsoleCommand::Device(line.to_string()),
        };
        Ok(command)
    }

    fn parse_place(args: Vec<&str>) -> Result<Self, ConsoleError> {
        let grams = args
            .first()
            .and_then(|g| g.parse().ok())
            .ok_or(ConsoleError::InvalidPlace)?;

        let dimensions = match args.len() {
            1 => None,
            4 => {
                let sides: Vec<u8> = args[1..]
                    .iter()
                    .map(|s| s.parse().map_err(|_| ConsoleError::InvalidPlace))
                    .collect::<Result<_, _>>()?;
                Some(Dimensions::new(sides[0], sides[1], sides[2]))
            }
            _ => return Err(ConsoleError::InvalidPlace),
        };

        Ok(ConsoleCommand::Place { grams, dimensions })
    }
}

/// Where reconnect gets its candidate ports
pub enum PortSource {
    Scan(PortScanner),
    Fixed(Vec<String>),
}

impl PortSource {
    pub fn candidates(&self) -> Candidates {
        match self {
            PortSource::Scan(scanner) => Candidates::scan(scanner),
            PortSource::Fixed(ports) => Candidates::from_ports(ports.clone()),
        }
    }
}

/// Virtual devices behind a simulated bench
#[derive(Clone)]
pub struct BenchDevices {
    pub scale: SharedDevice,
    pub sensor: SharedDevice,
}

/// What the console loop does after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Reply(String),
    Quit,
}

pub struct Console<O: PortOpener> {
    station: Arc<Mutex<Station<O>>>,
    ports: PortSource,
    level: Arc<BroadcastLevel>,
    bench: Option<BenchDevices>,
}

impl<O: PortOpener> Console<O> {
    pub fn new(station: Arc<Mutex<Station<O>>>, ports: PortSource, level: Arc<BroadcastLevel>) -> Self {
        Self {
            station,
            ports,
            level,
            bench: None,
        }
    }

    pub fn with_bench(mut self, bench: BenchDevices) -> Self {
        self.bench = Some(bench);
        self
    }

    /// Execute one line
    pub async fn handle(&self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Reply(String::new());
        }

        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(e) => return Flow::Reply(e.to_string()),
        };
        debug!(source = "system", "Console command: {:?}", command);

        let reply = match command {
            ConsoleCommand::Quit => return Flow::Quit,
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Status => {
                let station = self.station.lock().await;
                serde_json::to_string_pretty(station.status())
                    .unwrap_or_else(|e| format!("could not encode status: {}", e))
            }
            ConsoleCommand::Reconnect => {
                let candidates = self.ports.candidates();
                let mut station = self.station.lock().await;
                station.connect(&candidates).await.summary()
            }
            ConsoleCommand::Weight => {
                let mut station = self.station.lock().await;
                match station.read_weight().await {
                    Ok(grams) => {
                        station.record_weight(grams);
                        format!("Weight: {} g", grams)
                    }
                    Err(e) => e.to_string(),
                }
            }
            ConsoleCommand::Measure => match self.station.lock().await.measure().await {
                Ok(measurement) => measurement.to_string(),
                Err(e) => e.to_string(),
            },
            ConsoleCommand::Log(level) => {
                self.level.set_level(level);
                match level {
                    Some(level) => format!("Live log at {}", level),
                    None => "Live log off".to_string(),
                }
            }
            ConsoleCommand::Place { grams, dimensions } => match self.place(grams, dimensions) {
                Ok(()) => format!("Placed {} g", grams),
                Err(e) => e.to_string(),
            },
            ConsoleCommand::Device(input) => {
                match self.station.lock().await.sensor_command(&input).await {
                    Ok(reply) => reply,
                    Err(e) => e.to_string(),
                }
            }
        };
        Flow::Reply(reply)
    }

    fn place(&self, grams: u32, dimensions: Option<Dimensions>) -> Result<(), ConsoleError> {
        let bench = self.bench.as_ref().ok_or(ConsoleError::NotSimulated)?;
        bench.scale.with_scale(|scale| scale.set_grams(grams));
        if let Some(dimensions) = dimensions {
            bench
                .sensor
                .with_sensor(|sensor| sensor.set_dimensions(dimensions));
        }
        Ok(())
    }

    /// Read lines from `input` until quit or end of input
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> std::io::Result<()> {
        info!(source = "system", "Console ready, type 'help' for commands");
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            match self.handle(&line).await {
                Flow::Quit => break,
                Flow::Reply(reply) if reply.is_empty() => {}
                Flow::Reply(reply) => println!("{}", reply),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_sim::{SimBench, VirtualScale, VirtualSensor};
    use gauge_station::StationConfig;
    use tracing::Level;

    fn simulated_console(grams: u32, dims: Dimensions) -> Console<SimBench> {
        let devices = BenchDevices {
            scale: SharedDevice::scale(VirtualScale::new(grams)),
            sensor: SharedDevice::sensor(VirtualSensor::new(dims)),
        };
        let bench = SimBench::station(devices.scale.clone(), devices.sensor.clone());
        let ports = PortSource::Fixed(bench.port_names());
        let station = Station::new(Arc::new(bench), StationConfig::default());

        Console::new(
            Arc::new(Mutex::new(station)),
            ports,
            Arc::new(BroadcastLevel::new(None)),
        )
        .with_bench(devices)
    }

    fn reply(flow: Flow) -> String {
        match flow {
            Flow::Reply(text) => text,
            Flow::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_parse_console_commands() {
        assert_eq!(ConsoleCommand::parse(" STATUS "), Ok(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("exit"), Ok(ConsoleCommand::Quit));
        assert_eq!(
            ConsoleCommand::parse("log debug"),
            Ok(ConsoleCommand::Log(Some(Level::DEBUG)))
        );
        assert_eq!(ConsoleCommand::parse("log off"), Ok(ConsoleCommand::Log(None)));
        assert_eq!(
            ConsoleCommand::parse("log loud"),
            Err(ConsoleError::InvalidLevel("loud".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("place 1200 30 20 10"),
            Ok(ConsoleCommand::Place {
                grams: 1200,
                dimensions: Some(Dimensions::new(30, 20, 10)),
            })
        );
        assert_eq!(
            ConsoleCommand::parse("place 0"),
            Ok(ConsoleCommand::Place {
                grams: 0,
                dimensions: None,
            })
        );
        assert_eq!(ConsoleCommand::parse("place 5 1"), Err(ConsoleError::InvalidPlace));
        assert_eq!(ConsoleCommand::parse("place 5 1 2 300"), Err(ConsoleError::InvalidPlace));
        assert_eq!(
            ConsoleCommand::parse("set_top_max:40"),
            Ok(ConsoleCommand::Device("set_top_max:40".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_station() {
        let console = simulated_console(0, Dimensions::UNKNOWN);

        assert_eq!(reply(console.handle("weight").await), "scale not connected");
        assert_eq!(
            reply(console.handle("led_on").await),
            "dimension sensor not connected"
        );
        let status = reply(console.handle("status").await);
        assert!(status.contains("\"arduino_connected\": false"));
        assert_eq!(console.handle("quit").await, Flow::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_then_measure() {
        let console = simulated_console(0, Dimensions::UNKNOWN);

        let summary = reply(console.handle("reconnect").await);
        assert_eq!(
            summary,
            "Sensor: connected (/dev/ttySIM0), Scale: connected (/dev/ttySIM2)"
        );

        assert_eq!(reply(console.handle("place 1250 30 20 10").await), "Placed 1250 g");
        assert_eq!(reply(console.handle("weight").await), "Weight: 1250 g");
        assert_eq!(reply(console.handle("measure").await), "1250:30:20:10");
        assert_eq!(reply(console.handle("ping").await), "OK");

        let station = console.station.lock().await;
        assert_eq!(station.status().last_dimensions, "1250:30:20:10");
    }

    #[tokio::test]
    async fn test_log_level_and_place_without_bench() {
        let bench = SimBench::new();
        let level = Arc::new(BroadcastLevel::new(None));
        let console = Console::new(
            Arc::new(Mutex::new(Station::new(Arc::new(bench), StationConfig::default()))),
            PortSource::Fixed(Vec::new()),
            Arc::clone(&level),
        );

        assert_eq!(reply(console.handle("log info").await), "Live log at INFO");
        assert_eq!(level.get_level(), Some(Level::INFO));
        assert_eq!(reply(console.handle("log off").await), "Live log off");
        assert_eq!(level.get_level(), None);

        assert_eq!(
            reply(console.handle("place 100").await),
            "no simulated bench; start with --simulate"
        );
        assert_eq!(reply(console.handle("   ").await), "");
    }

    #[tokio::test]
    async fn test_run_stops_at_quit() {
        let console = Console::new(
            Arc::new(Mutex::new(Station::new(
                Arc::new(SimBench::new()),
                StationConfig::default(),
            ))),
            PortSource::Fixed(Vec::new()),
            Arc::new(BroadcastLevel::new(None)),
        );
        let input: &[u8] = b"log warn\nquit\nlog info\n";

        console.run(input).await.unwrap();
        assert_eq!(console.level.get_level(), Some(Level::WARN));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn place_accepts_any_object(grams: u32, l: u8, w: u8, h: u8) {
                let line = format!("place {} {} {} {}", grams, l, w, h);
                prop_assert_eq!(
                    ConsoleCommand::parse(&line),
                    Ok(ConsoleCommand::Place { grams, dimensions: Some(Dimensions::new(l, w, h)) })
                );
            }

            #[test]
            fn sensor_words_pass_through(line in "[a-z_]{1,12}(:[0-9]{1,3})?") {
                let console_words = ["status", "reconnect", "weight", "measure", "help", "quit", "exit", "log", "place"];
                prop_assume!(!console_words.contains(&line.as_str()));
                prop_assert_eq!(ConsoleCommand::parse(&line), Ok(ConsoleCommand::Device(line.clone())));
            }
        }
    }
}
