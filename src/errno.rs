//! The kernel's closed error taxonomy.
//!
//! Every syscall handler returns `Result<T, KernelError>`. `Errno` is the
//! wire value that crosses back to the calling user task; `KernelError`
//! pairs it with a human-readable message for logging.

use thiserror::Error;

/// The full set of errno values the kernel can report. Closed by design:
/// user tasks match on this enum exhaustively rather than on raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    /// No error; the syscall succeeded.
    None,
    /// Operation not permitted.
    Eperm,
    /// Permission denied.
    Eacces,
    /// No such file or directory.
    Enoent,
    /// File exists.
    Eexist,
    /// Is a directory.
    Eisdir,
    /// Not a directory.
    Enotdir,
    /// Invalid argument.
    Einval,
    /// Function not implemented.
    Enosys,
    /// No child processes.
    Echild,
    /// No such process.
    Esrch,
    /// Cross-device link.
    Exdev,
    /// Exec format error.
    Enoexec,
    /// Interrupted system call. Reserved; `waitpid` never returns it
    /// because this kernel has no signals.
    Eintr,
    /// Bad file descriptor.
    Ebadf,
    /// A handler raised something other than a `KernelError`.
    Unspecified,
    /// Internal use: the owning process was killed while a syscall was
    /// in flight.
    Ekilled,
    /// Internal invariant violation caught at the dispatch boundary.
    Panic,
}

impl Errno {
    /// Short mnemonic, the way `strerror`-adjacent tables print them.
    pub fn as_str(self) -> &'static str {
        match self {
            Errno::None => "NONE",
            Errno::Eperm => "EPERM",
            Errno::Eacces => "EACCES",
            Errno::Enoent => "ENOENT",
            Errno::Eexist => "EEXIST",
            Errno::Eisdir => "EISDIR",
            Errno::Enotdir => "ENOTDIR",
            Errno::Einval => "EINVAL",
            Errno::Enosys => "ENOSYS",
            Errno::Echild => "ECHILD",
            Errno::Esrch => "ESRCH",
            Errno::Exdev => "EXDEV",
            Errno::Enoexec => "ENOEXEC",
            Errno::Eintr => "EINTR",
            Errno::Ebadf => "EBADF",
            Errno::Unspecified => "UNSPECIFIED",
            Errno::Ekilled => "EKILLED",
            Errno::Panic => "PANIC",
        }
    }
}

impl std::fmt::Display for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by a syscall handler. Carries the errno that is sent
/// back to the user task plus a free-form message used only for logging.
#[derive(Debug, Error, Clone)]
#[error("{errno}: {message}")]
pub struct KernelError {
    pub errno: Errno,
    pub message: String,
}

impl KernelError {
    pub fn new(errno: Errno, message: impl Into<String>) -> Self {
        KernelError {
            errno,
            message: message.into(),
        }
    }
}

/// Shorthand for constructing a `KernelError` inline at a call site, e.g.
/// `return Err(errno!(Enoent, "{}", path))`.
macro_rules! errno {
    ($variant:ident) => {
        $crate::errno::KernelError::new($crate::errno::Errno::$variant, "")
    };
    ($variant:ident, $($arg:tt)*) => {
        $crate::errno::KernelError::new($crate::errno::Errno::$variant, format!($($arg)*))
    };
}
pub(crate) use errno;

pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_display_is_mnemonic() {
        assert_eq!(Errno::Enoent.to_string(), "ENOENT");
    }

    #[test]
    fn kernel_error_display_includes_message() {
        let err = errno!(Eacces, "no write access on {}", "/etc/passwd");
        assert_eq!(err.to_string(), "EACCES: no write access on /etc/passwd");
    }
}
