use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

/// Output line to the EEG amplifier's event channel.
pub trait TriggerPort {
    /// Drives the eight data lines to `code`; 0 clears them.
    fn set_data(&mut self, code: u8) -> Result<()>;
    fn describe(&self) -> String;
}

impl<P: TriggerPort + ?Sized> TriggerPort for Box<P> {
    fn set_data(&mut self, code: u8) -> Result<()> {
        (**self).set_data(code)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Narrows a table trigger code to the port's eight bits.
pub fn trigger_byte(code: u16) -> Result<u8> {
    match u8::try_from(code) {
        Ok(byte) => Ok(byte),
        Err(_) => bail!("trigger code {code} does not fit an 8-bit port"),
    }
}

/// Port used when no trigger hardware is attached; codes only reach the log.
#[derive(Debug, Default)]
pub struct NullPort;

impl TriggerPort for NullPort {
    fn set_data(&mut self, code: u8) -> Result<()> {
        debug!("trigger {code} (port disabled)");
        Ok(())
    }
    fn describe(&self) -> String {
        "disabled".into()
    }
}

/// Writes each code as a single byte to a USB or serial trigger box that
/// latches every received byte onto its output lines.
///
/// Parallel-port nodes (`/dev/parport*`) are not supported: their data lines
/// are only driven through the `PPWDATA` ioctl, not by `write`.
pub struct DevicePort {
    path: PathBuf,
    file: File,
}

impl DevicePort {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open trigger device {}", path.display()))?;
        let mut port = Self {
            path: path.to_path_buf(),
            file,
        };
        port.set_data(0)?;
        Ok(port)
    }
}

impl TriggerPort for DevicePort {
    fn set_data(&mut self, code: u8) -> Result<()> {
        self.file
            .write_all(&[code])
            .and_then(|_| self.file.flush())
            .with_context(|| format!("failed to write trigger {code} to {}", self.path.display()))
    }
    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_above_255_are_rejected() {
        assert_eq!(trigger_byte(121).unwrap(), 121);
        assert_eq!(trigger_byte(255).unwrap(), 255);
        assert!(trigger_byte(256).is_err());
    }

    #[test]
    fn device_port_writes_raw_bytes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut port = DevicePort::open(file.path()).unwrap();
        port.set_data(121).unwrap();
        port.set_data(0).unwrap();
        drop(port);
        assert_eq!(std::fs::read(file.path()).unwrap(), [0, 121, 0]);
    }

    #[test]
    fn boxed_port_forwards() {
        let mut port: Box<dyn TriggerPort> = Box::new(NullPort);
        port.set_data(7).unwrap();
        assert_eq!(port.describe(), "disabled");
    }
}
