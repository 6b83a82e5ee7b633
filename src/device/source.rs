use crate::error::DeviceError;
use crate::packet::PACKET_LEN;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A readable handle yielding raw motion packets.
pub trait MotionSource: Send {
    /// Wait up to `wait` for the next packet.
    ///
    /// `Ok(None)` means no packet arrived in time. Any error (closed handle,
    /// I/O failure, short read) is terminal for the reader that owns the source.
    fn next_packet(&mut self, wait: Duration) -> io::Result<Option<[u8; PACKET_LEN]>>;
}

/// An opened pointing device such as `/dev/input/mouse0` or a `by-path` link
pub struct DeviceFile {
    path: PathBuf,
    file: File,
}

impl DeviceFile {
    /// Open a device for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| DeviceError::Open {
            device: path.display().to_string(),
            source,
        })?;

        debug!("Opened motion device {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn wait_readable(&self, wait: Duration) -> io::Result<bool> {
        use std::os::unix::io::AsRawFd;

        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = wait.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `pollfd` is a single valid, initialised entry that outlives the call.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }

        if pollfd.revents & libc::POLLIN == 0
            && pollfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("device {} hung up", self.path.display()),
            ));
        }

        Ok(true)
    }

    #[cfg(not(unix))]
    fn wait_readable(&self, _wait: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

impl MotionSource for DeviceFile {
    fn next_packet(&mut self, wait: Duration) -> io::Result<Option<[u8; PACKET_LEN]>> {
        if !self.wait_readable(wait)? {
            return Ok(None);
        }

        let mut packet = [0u8; PACKET_LEN];
        self.file.read_exact(&mut packet)?;
        Ok(Some(packet))
    }
}

/// Adapts any blocking reader. The wait bound is ignored: every call blocks
/// until a whole packet is read or the reader fails.
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read + Send> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> MotionSource for ReadSource<R> {
    fn next_packet(&mut self, _wait: Duration) -> io::Result<Option<[u8; PACKET_LEN]>> {
        let mut packet = [0u8; PACKET_LEN];
        self.inner.read_exact(&mut packet)?;
        Ok(Some(packet))
    }
}

/// In-process source fed through a channel, for replaying captured packets.
/// Dropping every sender closes the source, which the reader sees as a failed handle.
pub struct ChannelSource {
    receiver: Receiver<[u8; PACKET_LEN]>,
}

impl ChannelSource {
    pub fn channel() -> (Sender<[u8; PACKET_LEN]>, Self) {
        let (sender, receiver) = unbounded();
        (sender, Self { receiver })
    }
}

impl MotionSource for ChannelSource {
    fn next_packet(&mut self, wait: Duration) -> io::Result<Option<[u8; PACKET_LEN]>> {
        match self.receiver.recv_timeout(wait) {
            Ok(packet) => Ok(Some(packet)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "packet channel closed",
            )),
        }
    }
}
