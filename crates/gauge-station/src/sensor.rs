//! Dimension sensor handle
//!
//! Wraps the established link to the microcontroller. Single-shot operations
//! drain stale bytes, write one command and collect the reply over a fixed
//! window, since the firmware sends no end-of-reply marker that can be
//! relied on.

use std::fmt;
use std::time::Duration;

use gauge_detect::poll::{collect_for, drain};
use gauge_detect::{CancelSignal, Link, PollWindow};
use gauge_protocol::dimension::decode_dimensions;
use gauge_protocol::display::format_data_for_log;
use gauge_protocol::{sensor_op, Dimensions, EncodeCommand, SensorCommand};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::StationError;

/// Timing of sensor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorTiming {
    /// Pause after a command that expects no reply
    pub command_settle: Duration,
    pub drain_timeout: Duration,
    pub drain_limit: Duration,
    /// Collection of the GET_DIMENSIONS reply
    pub dimensions: PollWindow,
    /// Collection of the PING reply
    pub ping: PollWindow,
}

impl Default for SensorTiming {
    fn default() -> Self {
        Self {
            command_settle: Duration::from_millis(200),
            drain_timeout: Duration::from_millis(50),
            drain_limit: Duration::from_secs(2),
            dimensions: PollWindow {
                window: Duration::from_millis(600),
                read_timeout: Duration::from_millis(50),
                poll_delay: Duration::from_millis(10),
            },
            ping: PollWindow {
                window: Duration::from_millis(700),
                read_timeout: Duration::from_millis(50),
                poll_delay: Duration::from_millis(10),
            },
        }
    }
}

/// Outcome of an operator PING
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingReply {
    NoResponse,
    Ok,
    /// Something other than "OK" came back
    Unexpected { text: String, bytes: usize },
}

impl PingReply {
    /// Classify the bytes collected after PING
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.is_empty() {
            return PingReply::NoResponse;
        }
        let text = String::from_utf8_lossy(data);
        if text.contains("OK") {
            PingReply::Ok
        } else {
            PingReply::Unexpected {
                text: text.trim().to_string(),
                bytes: data.len(),
            }
        }
    }
}

impl fmt::Display for PingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingReply::NoResponse => f.write_str("no response"),
            PingReply::Ok => f.write_str("OK"),
            PingReply::Unexpected { text, bytes } => {
                write!(f, "{} ({} bytes, no OK)", text, bytes)
            }
        }
    }
}

/// Open connection to the dimension sensor
pub struct DimensionSensor<T> {
    link: Link<T>,
    timing: SensorTiming,
}

impl<T> DimensionSensor<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(link: Link<T>) -> Self {
        Self::with_timing(link, SensorTiming::default())
    }

    pub fn with_timing(link: Link<T>, timing: SensorTiming) -> Self {
        Self { link, timing }
    }

    pub fn port_name(&self) -> &str {
        self.link.port_name()
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), StationError> {
        let io = self.link.io_mut();
        io.write_all(bytes).await?;
        io.flush().await?;
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), StationError> {
        drain(
            self.link.io_mut(),
            self.timing.drain_timeout,
            self.timing.drain_limit,
            &CancelSignal::never(),
        )
        .await?;
        Ok(())
    }

    /// Write a command that expects no reply
    ///
    /// Single-opcode commands then wait for the firmware to settle; threshold
    /// writes return at once.
    pub async fn send_command(&mut self, command: &SensorCommand) -> Result<(), StationError> {
        let bytes = command.encode();
        debug!(source = "arduino", "Sending {} ({:02X?})", command, bytes);
        self.write(&bytes).await?;
        if !matches!(command, SensorCommand::SetMax { .. }) {
            tokio::time::sleep(self.timing.command_settle).await;
        }
        Ok(())
    }

    /// Request and decode one dimension reading
    ///
    /// A reply that cannot be decoded yields [`Dimensions::UNKNOWN`].
    pub async fn get_dimensions(&mut self) -> Result<Dimensions, StationError> {
        self.drain().await?;
        self.write(&[sensor_op::GET_DIMENSIONS]).await?;

        let data = collect_for(self.link.io_mut(), self.timing.dimensions).await;
        debug!(source = "arduino", "Received {}", format_data_for_log(&data));

        let dims = decode_dimensions(&data);
        if dims.is_unknown() {
            info!(source = "arduino", "No dimensions recognised in reply");
        } else {
            info!(source = "arduino", "Dimensions recognised: {}", dims);
        }
        Ok(dims)
    }

    /// Send PING and report what came back
    pub async fn ping(&mut self) -> Result<PingReply, StationError> {
        self.drain().await?;
        self.write(&[sensor_op::PING]).await?;

        let data = collect_for(self.link.io_mut(), self.timing.ping).await;
        let reply = PingReply::from_bytes(&data);
        match &reply {
            PingReply::NoResponse => info!(source = "arduino", "No PING reply"),
            _ => info!(
                source = "arduino",
                "PING reply: {}",
                format_data_for_log(&data)
            ),
        }
        Ok(reply)
    }

    pub fn close(self) {
        self.link.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_detect::SENSOR_LINK;
    use gauge_protocol::dimension::encode_reply;
    use tokio::io::{AsyncReadExt, DuplexStream};

    /// A peer that answers GET_DIMENSIONS and PING and records everything else
    fn sensor_peer(mut peer: DuplexStream, dims: Dimensions) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 16];
            while let Ok(n) = peer.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                for &byte in &buf[..n] {
                    seen.push(byte);
                    let reply = match byte {
                        sensor_op::GET_DIMENSIONS => encode_reply(dims),
                        sensor_op::PING => b"OK\r\n".to_vec(),
                        _ => Vec::new(),
                    };
                    if peer.write_all(&reply).await.is_err() {
                        return seen;
                    }
                }
            }
            seen
        })
    }

    fn sensor(io: DuplexStream) -> DimensionSensor<DuplexStream> {
        DimensionSensor::new(Link::new(io, "/dev/ttyACM0", SENSOR_LINK))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_dimensions_decodes_reply() {
        let (io, peer) = tokio::io::duplex(256);
        let _peer = sensor_peer(peer, Dimensions::new(40, 30, 20));
        let dims = sensor(io).get_dimensions().await.unwrap();
        assert_eq!(dims, Dimensions::new(40, 30, 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_writes_opcode_and_value() {
        let (io, peer) = tokio::io::duplex(256);
        let task = sensor_peer(peer, Dimensions::UNKNOWN);

        let mut sensor = sensor(io);
        let command: SensorCommand = "set_top_max:50".parse().unwrap();
        sensor.send_command(&command).await.unwrap();
        sensor.close();

        assert_eq!(task.await.unwrap(), vec![0x90, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_simple_commands_settle() {
        let (io, peer) = tokio::io::duplex(256);
        let _peer = sensor_peer(peer, Dimensions::UNKNOWN);
        let mut sensor = sensor(io);

        let started = tokio::time::Instant::now();
        sensor
            .send_command(&"set_width_max:80".parse().unwrap())
            .await
            .unwrap();
        assert!(started.elapsed() < SensorTiming::default().command_settle);

        let started = tokio::time::Instant::now();
        sensor.send_command(&SensorCommand::LedOn).await.unwrap();
        assert!(started.elapsed() >= SensorTiming::default().command_settle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_reply_kinds() {
        let (io, peer) = tokio::io::duplex(256);
        let _peer = sensor_peer(peer, Dimensions::UNKNOWN);
        assert_eq!(sensor(io).ping().await.unwrap(), PingReply::Ok);

        let (io, _silent) = tokio::io::duplex(256);
        assert_eq!(sensor(io).ping().await.unwrap(), PingReply::NoResponse);

        assert_eq!(
            PingReply::from_bytes(b"ERR\r\n").to_string(),
            "ERR (5 bytes, no OK)"
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ping_reply_ok_iff_text_contains_ok(data in proptest::collection::vec(any::<u8>(), 0..32)) {
                let reply = PingReply::from_bytes(&data);
                let has_ok = String::from_utf8_lossy(&data).contains("OK");
                prop_assert_eq!(reply == PingReply::Ok, has_ok);
                prop_assert_eq!(reply == PingReply::NoResponse, data.is_empty());
            }
        }
    }
}
