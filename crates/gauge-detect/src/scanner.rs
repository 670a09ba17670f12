//! Candidate port enumeration
//!
//! Ports are taken from OS enumeration. When the OS reports nothing (or the
//! query fails) a static per-platform list of conventional device names is
//! used instead. Names that cannot exist on the current OS family are
//! filtered out before anything is returned.

use serialport::{available_ports, SerialPortType};
use tracing::{info, warn};

use crate::error::DetectError;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Whether the port is USB-attached
    pub usb: bool,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                usb: true,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                usb: false,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }
}

/// Operating system family, as far as port naming is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl OsFamily {
    /// Family of the host we are running on
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "linux") {
            OsFamily::Linux
        } else if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else {
            OsFamily::Other
        }
    }

    /// Whether a port name can exist on this family
    ///
    /// Numbered `COM` names only exist on Windows.
    pub fn accepts(&self, port: &str) -> bool {
        *self == OsFamily::Windows || !port.starts_with("COM")
    }
}

/// Conventional serial device names for an OS family
pub fn fallback_ports(os: OsFamily) -> Vec<String> {
    match os {
        OsFamily::Windows => (1..=20).map(|i| format!("COM{}", i)).collect(),
        OsFamily::Linux => ["ttyUSB", "ttyACM", "ttyS"]
            .iter()
            .flat_map(|prefix| (0..4).map(move |i| format!("/dev/{}{}", prefix, i)))
            .collect(),
        OsFamily::MacOs => [
            "/dev/cu.usbserial",
            "/dev/cu.usbmodem",
            "/dev/tty.usbserial",
            "/dev/tty.usbmodem",
            "/dev/cu.SLAB_USBtoUART",
            "/dev/tty.SLAB_USBtoUART",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        OsFamily::Other => Vec::new(),
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
    os: OsFamily,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self::with_config(ScannerConfig {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
        })
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self {
            config,
            os: OsFamily::current(),
        }
    }

    /// Enumerate all available serial ports reported by the OS
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .collect())
    }

    /// Ordered candidate ports for discovery
    ///
    /// Never fails: an empty list means there is nothing to probe.
    pub fn candidate_ports(&self) -> Vec<String> {
        let names = match self.enumerate_ports() {
            Ok(ports) if !ports.is_empty() => ports.into_iter().map(|p| p.port).collect(),
            Ok(_) => {
                info!(source = "system", "OS reported no serial ports, using fallback list");
                fallback_ports(self.os)
            }
            Err(e) => {
                warn!(source = "system", "{}, using fallback list", e);
                fallback_ports(self.os)
            }
        };

        let candidates = self.filter_candidates(names);
        info!(source = "system", "Candidate ports: {:?}", candidates);
        candidates
    }

    /// USB-attached ports reported by the OS, without fallback
    pub fn usb_ports(&self) -> Vec<String> {
        let names = match self.enumerate_ports() {
            Ok(ports) => ports
                .into_iter()
                .filter(|p| p.usb)
                .inspect(|p| {
                    info!(
                        source = "system",
                        "USB port {} (VID: {:04X?}, PID: {:04X?}, product: {})",
                        p.port,
                        p.vid,
                        p.pid,
                        p.product.as_deref().unwrap_or("unknown")
                    )
                })
                .map(|p| p.port)
                .collect(),
            Err(e) => {
                warn!(source = "system", "{}", e);
                Vec::new()
            }
        };

        self.filter_candidates(names)
    }

    /// Drop invalid, skipped and duplicate names, keeping order
    pub fn filter_candidates(&self, names: Vec<String>) -> Vec<String> {
        let mut result: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !self.os.accepts(&name) || self.should_skip_port(&name) || result.contains(&name) {
                continue;
            }
            result.push(name);
        }
        result
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &str) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.contains(pattern.as_str()))
    }

    #[cfg(test)]
    fn for_os(os: OsFamily) -> Self {
        let mut scanner = Self::new();
        scanner.os = os;
        scanner
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x2341,
            pid: 0x0043,
            serial_number: Some("12345".to_string()),
            manufacturer: Some("Arduino".to_string()),
            product: Some("Uno".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyACM0".to_string(), &usb_info);

        assert!(info.usb);
        assert_eq!(info.vid, Some(0x2341));
        assert_eq!(info.pid, Some(0x0043));
        assert_eq!(info.product.as_deref(), Some("Uno"));
    }

    #[test]
    fn test_fallback_lists() {
        let windows = fallback_ports(OsFamily::Windows);
        assert_eq!(windows.len(), 20);
        assert_eq!(windows[0], "COM1");
        assert_eq!(windows[19], "COM20");

        let linux = fallback_ports(OsFamily::Linux);
        assert_eq!(linux.len(), 12);
        assert_eq!(linux[0], "/dev/ttyUSB0");
        assert!(linux.contains(&"/dev/ttyACM3".to_string()));
        assert!(linux.contains(&"/dev/ttyS2".to_string()));

        assert_eq!(fallback_ports(OsFamily::MacOs).len(), 6);
        assert!(fallback_ports(OsFamily::Other).is_empty());
    }

    #[test]
    fn test_com_names_filtered_off_windows() {
        let names = vec![
            "COM3".to_string(),
            "/dev/ttyUSB0".to_string(),
            "/dev/ttyUSB0".to_string(),
            "/dev/cu.Bluetooth-Incoming-Port".to_string(),
        ];

        let linux = PortScanner::for_os(OsFamily::Linux).filter_candidates(names.clone());
        assert_eq!(linux, vec!["/dev/ttyUSB0".to_string()]);

        let windows = PortScanner::for_os(OsFamily::Windows).filter_candidates(names);
        assert_eq!(windows, vec!["COM3".to_string(), "/dev/ttyUSB0".to_string()]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn filtered_candidates_are_unique_and_valid(
                names in prop::collection::vec("(COM[0-9]|/dev/tty(USB|ACM)[0-3])", 0..16)
            ) {
                let filtered = PortScanner::for_os(OsFamily::Linux).filter_candidates(names.clone());

                let mut unique = filtered.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), filtered.len());
                prop_assert!(filtered.iter().all(|p| !p.starts_with("COM")));
                prop_assert!(filtered.iter().all(|p| names.contains(p)));
            }
        }
    }
}
