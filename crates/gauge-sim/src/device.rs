//! Serving a virtual device over an async stream
//!
//! A device task owns one end of a duplex stream and plays the device behind
//! a serial port: every chunk written by the station is fed to the device
//! state machine and its reply is written back. Device state lives behind a
//! shared handle so it survives reconnects and can be changed while the
//! station is running.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use gauge_protocol::Device;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{VirtualScale, VirtualSensor};

/// Either simulated device
#[derive(Debug, Clone)]
pub enum VirtualDevice {
    Scale(VirtualScale),
    Sensor(VirtualSensor),
}

impl VirtualDevice {
    pub fn kind(&self) -> Device {
        match self {
            VirtualDevice::Scale(_) => Device::Scale,
            VirtualDevice::Sensor(_) => Device::DimensionSensor,
        }
    }

    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        match self {
            VirtualDevice::Scale(scale) => scale.process(data),
            VirtualDevice::Sensor(sensor) => sensor.process(data),
        }
    }
}

/// Cloneable handle to a device shared between its serving tasks and tests
#[derive(Debug, Clone)]
pub struct SharedDevice {
    inner: Arc<Mutex<VirtualDevice>>,
}

impl SharedDevice {
    pub fn new(device: VirtualDevice) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    pub fn scale(scale: VirtualScale) -> Self {
        Self::new(VirtualDevice::Scale(scale))
    }

    pub fn sensor(sensor: VirtualSensor) -> Self {
        Self::new(VirtualDevice::Sensor(sensor))
    }

    pub fn kind(&self) -> Device {
        self.lock().kind()
    }

    fn lock(&self) -> MutexGuard<'_, VirtualDevice> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feed bytes to the device and return its reply
    pub fn process(&self, data: &[u8]) -> Vec<u8> {
        self.lock().process(data)
    }

    /// Run `f` against the scale; `None` if this is not a scale
    pub fn with_scale<R>(&self, f: impl FnOnce(&mut VirtualScale) -> R) -> Option<R> {
        match &mut *self.lock() {
            VirtualDevice::Scale(scale) => Some(f(scale)),
            VirtualDevice::Sensor(_) => None,
        }
    }

    /// Run `f` against the sensor; `None` if this is not a sensor
    pub fn with_sensor<R>(&self, f: impl FnOnce(&mut VirtualSensor) -> R) -> Option<R> {
        match &mut *self.lock() {
            VirtualDevice::Sensor(sensor) => Some(f(sensor)),
            VirtualDevice::Scale(_) => None,
        }
    }
}

/// Serve `device` on `stream` until the other end closes it
pub async fn run_virtual_device<S>(mut stream: S, device: SharedDevice) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let kind = device.kind();
    info!("Starting virtual {}", kind.name());
    let mut buf = [0u8; 256];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                debug!("Virtual {} stream closed", kind.name());
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Virtual {} stream error: {}", kind.name(), e);
                return Err(e);
            }
        };

        let reply = device.process(&buf[..n]);
        if !reply.is_empty() {
            debug!(
                "Virtual {} replying with {} bytes",
                kind.name(),
                reply.len()
            );
            stream.write_all(&reply).await?;
            stream.flush().await?;
        }
    }

    Ok(())
}

/// Accept and discard everything written until the other end closes
///
/// Stands in for a port with nothing attached.
pub async fn run_silent_port<S>(mut stream: S) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    while stream.read(&mut buf).await? > 0 {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_protocol::scale::decode_weight;
    use gauge_protocol::scale_op;

    #[tokio::test]
    async fn test_device_task_answers_over_duplex() {
        let device = SharedDevice::scale(VirtualScale::new(800));
        let (mut station, far) = tokio::io::duplex(64);
        let task = tokio::spawn(run_virtual_device(far, device.clone()));

        station.write_all(&[scale_op::WEIGHT_REQUEST]).await.unwrap();
        let mut reply = [0u8; 5];
        station.read_exact(&mut reply).await.unwrap();
        assert_eq!(decode_weight(&reply).unwrap(), 800);

        device.with_scale(|scale| scale.set_grams(900));
        station.write_all(&[scale_op::WEIGHT_REQUEST]).await.unwrap();
        station.read_exact(&mut reply).await.unwrap();
        assert_eq!(decode_weight(&reply).unwrap(), 900);

        drop(station);
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_typed_access() {
        let device = SharedDevice::sensor(VirtualSensor::default());
        assert_eq!(device.kind(), Device::DimensionSensor);
        assert!(device.with_scale(|_| ()).is_none());
        assert_eq!(device.with_sensor(|s| s.led_on()), Some(false));
    }
}
