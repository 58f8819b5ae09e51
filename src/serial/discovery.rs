//! # Radio Port Discovery
//!
//! Picks the serial device node that belongs to the radio peripheral by
//! matching USB descriptors against a [`SerialDescriptorFilter`].
//!
//! ## Matching Rules
//!
//! Checks run in a fixed order and stop at the first mismatch:
//!
//! 1. Vendor ID absent on the candidate: rejected (not a USB-serial device)
//! 2. Vendor ID: equality
//! 3. Product ID: equality
//! 4. Manufacturer string: prefix
//! 5. Serial number: prefix
//! 6. Interface descriptor: substring
//!
//! The first candidate in enumeration order that passes wins.

use tracing::{debug, info};

use crate::error::{FieldlinkError, Result};

/// USB descriptor criteria for picking the radio's device node
///
/// Every field is optional; an absent field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialDescriptorFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub manufacturer_prefix: Option<String>,
    pub serial_number_prefix: Option<String>,
    pub interface_substring: Option<String>,
}

impl SerialDescriptorFilter {
    pub fn with_vendor_id(mut self, vid: u16) -> Self {
        self.vendor_id = Some(vid);
        self
    }

    pub fn with_product_id(mut self, pid: u16) -> Self {
        self.product_id = Some(pid);
        self
    }

    pub fn with_manufacturer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manufacturer_prefix = Some(prefix.into());
        self
    }

    pub fn with_serial_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.serial_number_prefix = Some(prefix.into());
        self
    }

    pub fn with_interface_substring(mut self, needle: impl Into<String>) -> Self {
        self.interface_substring = Some(needle.into());
        self
    }

    /// True when no field is set (any USB-serial device matches)
    pub fn is_unconstrained(&self) -> bool {
        self.vendor_id.is_none()
            && self.product_id.is_none()
            && self.manufacturer_prefix.is_none()
            && self.serial_number_prefix.is_none()
            && self.interface_substring.is_none()
    }
}

/// One enumerated serial device and the descriptors it exposes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortCandidate {
    /// Device node, e.g. `/dev/ttyUSB0`
    pub path: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
    pub interface: Option<String>,
}

impl PortCandidate {
    /// Check this candidate against `filter`
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldlink::serial::discovery::{PortCandidate, SerialDescriptorFilter};
    ///
    /// let port = PortCandidate {
    ///     path: "/dev/ttyUSB0".to_string(),
    ///     vendor_id: Some(0x0403),
    ///     manufacturer: Some("FTDI".to_string()),
    ///     ..Default::default()
    /// };
    ///
    /// assert!(port.matches(&SerialDescriptorFilter::default().with_manufacturer_prefix("FT")));
    /// assert!(!port.matches(&SerialDescriptorFilter::default().with_vendor_id(0x10c4)));
    /// ```
    pub fn matches(&self, filter: &SerialDescriptorFilter) -> bool {
        let Some(vid) = self.vendor_id else {
            return false;
        };

        if let Some(wanted) = filter.vendor_id {
            if vid != wanted {
                return false;
            }
        }

        if let Some(wanted) = filter.product_id {
            if self.product_id != Some(wanted) {
                return false;
            }
        }

        if let Some(prefix) = &filter.manufacturer_prefix {
            match &self.manufacturer {
                Some(m) if m.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(prefix) = &filter.serial_number_prefix {
            match &self.serial_number {
                Some(s) if s.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(needle) = &filter.interface_substring {
            match &self.interface {
                Some(i) if i.contains(needle.as_str()) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Return the path of the first candidate matching `filter`
///
/// # Arguments
///
/// * `filter` - Descriptor criteria
/// * `candidates` - Devices in enumeration order
///
/// # Returns
///
/// * `Option<String>` - Device path, or `None` if nothing matched
pub fn resolve(filter: &SerialDescriptorFilter, candidates: &[PortCandidate]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| {
            let ok = candidate.matches(filter);
            debug!(target: "transceiver", "Port candidate {} matches={}", candidate.path, ok);
            ok
        })
        .map(|candidate| candidate.path.clone())
}

/// Source of serial device candidates
pub trait PortEnumerator {
    /// List currently visible serial devices in system order
    fn candidates(&self) -> Result<Vec<PortCandidate>>;
}

impl PortEnumerator for Vec<PortCandidate> {
    fn candidates(&self) -> Result<Vec<PortCandidate>> {
        Ok(self.clone())
    }
}

/// Enumerates the host's serial devices through `tokio-serial`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn candidates(&self) -> Result<Vec<PortCandidate>> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| FieldlinkError::Enumeration(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                tokio_serial::SerialPortType::UsbPort(info) => PortCandidate {
                    interface: usb_interface_name(&port.port_name),
                    path: port.port_name,
                    vendor_id: Some(info.vid),
                    product_id: Some(info.pid),
                    manufacturer: info.manufacturer,
                    serial_number: info.serial_number,
                },
                _ => PortCandidate {
                    path: port.port_name,
                    ..Default::default()
                },
            })
            .collect())
    }
}

/// Read the USB interface string for a tty from sysfs
///
/// `usb-serial` ttys (ttyUSB*) sit one level below the interface directory;
/// CDC-ACM ttys point at the interface directly.
#[cfg(target_os = "linux")]
fn usb_interface_name(port_name: &str) -> Option<String> {
    use std::path::Path;

    let tty = Path::new(port_name).file_name()?;
    let device = std::fs::canonicalize(Path::new("/sys/class/tty").join(tty).join("device")).ok()?;

    let subsystem = std::fs::read_link(device.join("subsystem")).ok()?;
    let interface_dir = if subsystem.file_name()? == "usb-serial" {
        device.parent()?.to_path_buf()
    } else {
        device
    };

    std::fs::read_to_string(interface_dir.join("interface"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(target_os = "linux"))]
fn usb_interface_name(_port_name: &str) -> Option<String> {
    None
}

/// Decide which device node to open
///
/// A non-empty `explicit` path is used as-is. Otherwise the enumerator's
/// candidates are resolved against `filter`.
///
/// # Errors
///
/// - `EmptyPort`: no explicit path and nothing matched
/// - `Enumeration`: the system device list could not be read
pub fn determine_path(
    explicit: Option<&str>,
    filter: &SerialDescriptorFilter,
    enumerator: &dyn PortEnumerator,
) -> Result<String> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return Ok(path.to_string());
    }

    let candidates = enumerator.candidates()?;
    debug!(target: "transceiver", "Resolving radio port among {} candidates", candidates.len());

    match resolve(filter, &candidates) {
        Some(path) => {
            info!(target: "transceiver", "Resolved radio port: {}", path);
            Ok(path)
        }
        None => Err(FieldlinkError::EmptyPort),
    }
}
