//! Character-special device drivers: `/dev/null`, `/dev/console`, and
//! `/dev/mem` (a process-listing pseudo-file). Behavior is dispatched by
//! `DeviceId` rather than through a trait object, since the set of
//! devices is closed and small — mirrors `filesystem/dev_files.py`.

use crate::errno::{errno, KernelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    Null,
    Console,
    Mem,
}

/// Context a device read may need that isn't available from the inode
/// alone. `/dev/mem` is the only device that needs it today.
#[derive(Debug, Default)]
pub struct DeviceContext {
    /// One `pid.uid.tty.command` line per live process, in process-table
    /// order.
    pub process_lines: Vec<String>,
}

pub fn device_read(
    device: DeviceId,
    size: usize,
    offset: usize,
    ctx: &DeviceContext,
) -> Vec<u8> {
    match device {
        DeviceId::Null => Vec::new(),
        DeviceId::Console => Vec::new(),
        DeviceId::Mem => {
            let contents = ctx.process_lines.join("\n");
            let bytes = contents.as_bytes();
            if offset >= bytes.len() {
                return Vec::new();
            }
            let end = (offset + size).min(bytes.len());
            bytes[offset..end].to_vec()
        }
    }
}

pub fn device_write(device: DeviceId, data: &[u8]) -> Result<usize, KernelError> {
    match device {
        DeviceId::Null => Ok(data.len()),
        DeviceId::Console => {
            print!("{}", String::from_utf8_lossy(data));
            Ok(data.len())
        }
        DeviceId::Mem => Err(errno!(Eacces, "/dev/mem is read-only")),
    }
}

pub fn device_append(device: DeviceId, data: &[u8]) -> Result<usize, KernelError> {
    device_write(device, data)
}

pub fn device_trunc(device: DeviceId) -> Result<(), KernelError> {
    match device {
        DeviceId::Null | DeviceId::Console => Ok(()),
        DeviceId::Mem => Err(errno!(Eacces, "/dev/mem is read-only")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_read_is_always_empty() {
        let ctx = DeviceContext::default();
        assert_eq!(device_read(DeviceId::Null, 100, 0, &ctx), Vec::<u8>::new());
    }

    #[test]
    fn mem_formats_pid_uid_tty_command() {
        let ctx = DeviceContext {
            process_lines: vec!["0.0.-1.swapper".to_string(), "1.0.-1.sh".to_string()],
        };
        let data = device_read(DeviceId::Mem, 1024, 0, &ctx);
        assert_eq!(String::from_utf8(data).unwrap(), "0.0.-1.swapper\n1.0.-1.sh");
    }

    #[test]
    fn mem_is_not_writable() {
        assert!(device_write(DeviceId::Mem, b"x").is_err());
    }

    #[test]
    fn null_write_discards_and_reports_full_length() {
        assert_eq!(device_write(DeviceId::Null, b"hello").unwrap(), 5);
    }
}
