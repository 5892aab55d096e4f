//! Device identity keys
//!
//! A [`Device`] is a small comparable value naming one compute device:
//! the platform it belongs to, what kind of device it is, and its ordinal
//! within that kind. Devices are used as cache keys throughout the
//! workspace, so the type is `Copy + Eq + Ord + Hash` and nothing more.

use std::fmt;

/// Kind of compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    /// Host processor
    Cpu,
    /// Discrete or integrated GPU
    Gpu,
    /// Dedicated accelerator (FPGA, DSP, ...)
    Accelerator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Gpu => write!(f, "gpu"),
            DeviceKind::Accelerator => write!(f, "acc"),
        }
    }
}

/// Identity of one compute device: `{platform, kind, ordinal}`.
///
/// Two `Device` values compare equal exactly when they name the same
/// physical device, which makes the type usable as a map key for
/// per-device state (buffer caches, queues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Device {
    /// Platform index the device is enumerated under
    pub platform: u16,
    /// Device kind within the platform
    pub kind: DeviceKind,
    /// Ordinal of the device among devices of the same kind
    pub ordinal: u16,
}

impl Device {
    /// Create a device key from its three components.
    pub const fn new(platform: u16, kind: DeviceKind, ordinal: u16) -> Self {
        Self {
            platform,
            kind,
            ordinal,
        }
    }

    /// CPU device `ordinal` on platform 0.
    pub const fn cpu(ordinal: u16) -> Self {
        Self::new(0, DeviceKind::Cpu, ordinal)
    }

    /// GPU device `ordinal` on platform 0.
    pub const fn gpu(ordinal: u16) -> Self {
        Self::new(0, DeviceKind::Gpu, ordinal)
    }

    /// Accelerator device `ordinal` on platform 0.
    pub const fn accelerator(ordinal: u16) -> Self {
        Self::new(0, DeviceKind::Accelerator, ordinal)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}/{}{}", self.platform, self.kind, self.ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_device_display() {
        assert_eq!(Device::cpu(0).to_string(), "p0/cpu0");
        assert_eq!(Device::gpu(1).to_string(), "p0/gpu1");
        assert_eq!(Device::new(2, DeviceKind::Accelerator, 3).to_string(), "p2/acc3");
    }

    #[test]
    fn test_device_equality() {
        assert_eq!(Device::gpu(0), Device::new(0, DeviceKind::Gpu, 0));
        assert_ne!(Device::gpu(0), Device::gpu(1));
        assert_ne!(Device::gpu(0), Device::cpu(0));
    }

    #[test]
    fn test_device_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Device::cpu(0), "host");
        map.insert(Device::gpu(0), "discrete");

        assert_eq!(map.get(&Device::cpu(0)), Some(&"host"));
        assert_eq!(map.get(&Device::gpu(0)), Some(&"discrete"));
        assert_eq!(map.get(&Device::gpu(1)), None);
    }

    #[test]
    fn test_device_ordering() {
        let mut devices = vec![Device::gpu(1), Device::cpu(0), Device::gpu(0)];
        devices.sort();
        assert_eq!(devices, vec![Device::cpu(0), Device::gpu(0), Device::gpu(1)]);
    }
}
