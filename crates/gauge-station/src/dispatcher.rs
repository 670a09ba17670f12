//! Operator command dispatch
//!
//! Turns a textual command such as `led_on` or `set_width_max:120` into
//! sensor traffic and a one-line human-readable reply. Nothing is written to
//! the sensor when the command does not parse.

use gauge_protocol::SensorCommand;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::sensor::DimensionSensor;

/// Execute one operator command and describe the outcome
pub async fn execute<T>(sensor: &mut DimensionSensor<T>, input: &str) -> String
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let command: SensorCommand = match input.parse() {
        Ok(command) => command,
        Err(e) => {
            warn!(source = "arduino", "Rejected command {:?}: {}", input.trim(), e);
            return e.to_string();
        }
    };
    info!(source = "arduino", "Executing {}", command);

    let outcome = match command {
        SensorCommand::GetDimensions => sensor
            .get_dimensions()
            .await
            .map(|dims| format!("Dimensions: {}", dims)),
        SensorCommand::Ping => sensor.ping().await.map(|reply| reply.to_string()),
        other => sensor
            .send_command(&other)
            .await
            .map(|()| confirmation(&other)),
    };

    outcome.unwrap_or_else(|e| {
        warn!(source = "arduino", "{} failed: {}", command, e);
        format!("{} failed: {}", command, e)
    })
}

fn confirmation(command: &SensorCommand) -> String {
    match command {
        SensorCommand::Start => "Measurement started".to_string(),
        SensorCommand::ResetSensors => "Sensors reset".to_string(),
        SensorCommand::LedOn => "LEDs on".to_string(),
        SensorCommand::LedOff => "LEDs off".to_string(),
        SensorCommand::SetMax { threshold, value } => {
            format!("Maximum {} set to {}", threshold.dimension(), value)
        }
        SensorCommand::GetDimensions | SensorCommand::Ping => format!("{} sent", command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_detect::{Link, SENSOR_LINK};
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn recording_sensor() -> (DimensionSensor<DuplexStream>, tokio::task::JoinHandle<Vec<u8>>) {
        let (io, mut peer) = tokio::io::duplex(64);
        let task = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 16];
            while let Ok(n) = peer.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            seen
        });
        let sensor = DimensionSensor::new(Link::new(io, "/dev/ttyACM0", SENSOR_LINK));
        (sensor, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_commands_write_nothing() {
        let (mut sensor, task) = recording_sensor();

        assert_eq!(
            execute(&mut sensor, "set_top_max:300").await,
            "invalid value \"300\" for set_top_max (expected 1-255)"
        );
        assert_eq!(
            execute(&mut sensor, "set_width_max").await,
            "no value given for set_width_max"
        );
        assert_eq!(
            execute(&mut sensor, "launch").await,
            "unrecognized command: launch"
        );

        sensor.close();
        assert!(task.await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simple_commands() {
        let (mut sensor, task) = recording_sensor();

        assert_eq!(execute(&mut sensor, "led_on").await, "LEDs on");
        assert_eq!(
            execute(&mut sensor, "set_length_max:75").await,
            "Maximum length set to 75"
        );
        assert_eq!(execute(&mut sensor, "start").await, "Measurement started");

        sensor.close();
        assert_eq!(task.await.unwrap(), vec![0x66, 0x92, 75, 0x95]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_sensor_reports() {
        let (mut sensor, _task) = recording_sensor();
        assert_eq!(execute(&mut sensor, "ping").await, "no response");
        assert_eq!(
            execute(&mut sensor, "get_dimensions").await,
            "Dimensions: L=0, W=0, H=0"
        );
    }
}
