//! FTDI MPSSE transport implementation
//!
//! This module provides the `FtdiTransport` struct that hands an MPSSE
//! engine to the calibration sequencer through the `Transport` trait.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use nusb::MaybeFuture;
use osccal_core::error::{Error as CoreError, Result as CoreResult};
use osccal_core::mpsse::opcodes::SET_BITS_LOW;
use osccal_core::transport::Transport;

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Configuration for opening the calibration cable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiConfig {
    /// Latency timer in ms
    pub latency_ms: u8,
    /// Give up on a read after this long without data
    pub read_timeout: Duration,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        FtdiConfig {
            latency_ms: DEFAULT_LATENCY_MS,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// FTDI MPSSE engine in a state ready for calibration commands
///
/// Opening resets the USB device and selects MPSSE mode; the clock and GPIO
/// setup is left to the command batches.
pub struct FtdiTransport {
    /// libftdi device context
    device: Device,
    read_timeout: Duration,
}

impl FtdiTransport {
    /// Open the calibration cable (FT2232H, channel A)
    pub fn open(config: &FtdiConfig) -> Result<Self> {
        let (vid, pid) = (FTDI_VID, FTDI_FT2232H_PID);

        log::info!("Opening FTDI {} channel A", DEVICE_NAME);
        log::debug!("Looking for FTDI device VID={:04X} PID={:04X}", vid, pid);

        let mut device = match find_by_vid_pid(vid, pid).interface(Interface::A).open() {
            Ok(device) => device,
            Err(e) => {
                // Tell "not plugged in" apart from "plugged in but unusable"
                let present = list_devices()
                    .map(|devices| !devices.is_empty())
                    .unwrap_or(true);
                return Err(if present {
                    FtdiError::OpenFailed(format!("{}", e))
                } else {
                    FtdiError::DeviceNotFound
                });
            }
        };

        log::debug!("Opened FTDI device VID={:04X} PID={:04X}", vid, pid);

        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        device
            .set_latency_timer(config.latency_ms)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set latency timer failed: {}", e)))?;

        device
            .set_bitmode(MPSSE_BITMODE_MASK, BitMode::Mpsse)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set MPSSE mode failed: {}", e)))?;

        log::info!("FTDI ready in MPSSE mode");

        Ok(FtdiTransport {
            device,
            read_timeout: config.read_timeout,
        })
    }

    /// Open the calibration cable with default link settings
    pub fn open_default() -> Result<Self> {
        Self::open(&FtdiConfig::default())
    }

    /// Send data to the FTDI device
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.device
            .write_all(data)
            .map_err(|e| FtdiError::TransferFailed(format!("Write failed: {}", e)))?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Receive exactly `buf.len()` bytes
    ///
    /// Returns the number of bytes received before the read timeout, which
    /// is less than `buf.len()` only if the adapter went quiet.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        let mut total = 0;
        let mut last_data = Instant::now();

        while total < len {
            match self.device.read(&mut buf[total..]) {
                Ok(0) => {
                    if last_data.elapsed() > self.read_timeout {
                        break;
                    }
                    // No data available, wait a bit
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => {
                    total += n;
                    last_data = Instant::now();
                }
                Err(e) => {
                    return Err(FtdiError::TransferFailed(format!("Read failed: {}", e)));
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(total)
    }

    /// Release I/O pins (set all as inputs)
    fn release_pins(&mut self) -> Result<()> {
        let buf = [SET_BITS_LOW, 0x00, 0x00];
        self.send(&buf)
    }
}

impl Drop for FtdiTransport {
    fn drop(&mut self) {
        // Release I/O pins on close
        if let Err(e) = self.release_pins() {
            log::warn!("Failed to release pins on close: {}", e);
        }
    }
}

impl Transport for FtdiTransport {
    fn write(&mut self, data: &[u8]) -> CoreResult<()> {
        self.send(data)
            .map_err(|e| CoreError::WriteFailed(e.to_string()))
    }

    fn read(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        let got = self
            .recv(buf)
            .map_err(|e| CoreError::ReadFailed(e.to_string()))?;
        if got < buf.len() {
            return Err(CoreError::ShortRead {
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }
}

/// Information about a connected FTDI device
#[derive(Debug, Clone)]
pub struct FtdiDeviceInfo {
    /// USB bus identifier
    pub bus: String,
    /// USB device address
    pub address: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// Product string (if the OS exposes it)
    pub product: Option<String>,
    /// Serial number (if the OS exposes it)
    pub serial: Option<String>,
}

impl std::fmt::Display for FtdiDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at bus {} address {} ({:04X}:{:04X})",
            self.product.as_deref().unwrap_or(DEVICE_NAME),
            self.bus,
            self.address,
            self.vendor_id,
            self.product_id
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " serial {}", serial)?;
        }
        Ok(())
    }
}

/// List attached calibration cables (0403:6010)
pub fn list_devices() -> Result<Vec<FtdiDeviceInfo>> {
    let mut devices = Vec::new();

    for dev in nusb::list_devices().wait()? {
        let vid = dev.vendor_id();
        let pid = dev.product_id();

        if is_calibration_cable(vid, pid) {
            devices.push(FtdiDeviceInfo {
                bus: dev.bus_id().to_string(),
                address: dev.device_address(),
                vendor_id: vid,
                product_id: pid,
                product: dev.product_string().map(str::to_string),
                serial: dev.serial_number().map(str::to_string),
            });
        }
    }

    Ok(devices)
}

/// Parse programmer options
///
/// Format: "latency=<ms>,timeout=<ms>"
pub fn parse_options(options: &[(&str, &str)]) -> Result<FtdiConfig> {
    let mut config = FtdiConfig::default();

    for (key, value) in options {
        match *key {
            "latency" => {
                config.latency_ms = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid latency '{}'", value))
                })?;
            }
            "timeout" => {
                let ms: u64 = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid timeout '{}'", value))
                })?;
                config.read_timeout = Duration::from_millis(ms);
            }
            _ => {
                log::warn!("Unknown FTDI option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = parse_options(&[]).unwrap();
        assert_eq!(config.latency_ms, 2);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("latency", "16"), ("timeout", "250")]).unwrap();
        assert_eq!(config.latency_ms, 16);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_adapter_selection_is_not_configurable() {
        // Identity options are not recognised; the cable is always 0403:6010 channel A
        let config = parse_options(&[("type", "4232h"), ("port", "B")]).unwrap();
        assert_eq!(config, FtdiConfig::default());
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            parse_options(&[("latency", "300")]),
            Err(FtdiError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_options(&[("timeout", "soon")]),
            Err(FtdiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_device_info_display() {
        let info = FtdiDeviceInfo {
            bus: "1".to_string(),
            address: 7,
            vendor_id: FTDI_VID,
            product_id: FTDI_FT2232H_PID,
            product: None,
            serial: Some("FT1234".to_string()),
        };
        assert_eq!(
            info.to_string(),
            "FT2232H at bus 1 address 7 (0403:6010) serial FT1234"
        );
    }
}
