// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use std::ffi::CStr;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;

use super::{Errno, FdResult, IoLenResult, LibcResult, ifreq};
use super::linux::TunSetIf;
use crate::config::Config;
use crate::layer::Result;
use crate::nic::{Device, Link};

/// A static descriptor for interacting with a tun interface.
///
/// Contains the non-blocking file descriptor and a pre-filled `ifreq` structure with the interface
/// name that is required for `ioctl` calls. This offers the raw methods for reading and writing
/// but does not encapsulate an actual `nic::Device`. Wrap it in a [`TunInterface`] for this.
#[derive(Debug)]
pub struct TunInterfaceDesc {
    lower: libc::c_int,
    ifreq: ifreq,
}

/// A tun interface registered with the tokio reactor, usable as a network device.
///
/// Frames are bare IPv4 or IPv6 datagrams, the interface is configured without packet
/// information header.
#[derive(Debug)]
pub struct TunInterface {
    inner: AsyncFd<TunInterfaceDesc>,
}

impl AsRawFd for TunInterfaceDesc {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl AsRawFd for TunInterface {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.get_ref().as_raw_fd()
    }
}

static TUN_PATH: &[u8] = b"/dev/net/tun\0";

impl TunInterfaceDesc {
    /// Try to open the clone device for the named interface.
    ///
    /// Note that this does *not* yet set the interface for the file descriptor, it only creates
    /// the necessary structures involved in doing so. Call [`attach_interface`] afterwards.
    ///
    /// [`attach_interface`]: #method.attach_interface
    pub fn new(name: &str) -> core::result::Result<TunInterfaceDesc, Errno> {
        let ifreq = ifreq::new(name)?;
        let lower = unsafe {
            libc::open(
                TUN_PATH.as_ptr() as *const libc::c_char,
                libc::O_RDWR | libc::O_NONBLOCK | libc::O_CLOEXEC)
        };

        FdResult(lower).errno()?;

        Ok(TunInterfaceDesc {
            lower,
            ifreq,
        })
    }

    /// Update the file descriptor to the named interface, creating it if necessary.
    ///
    /// See `ioctl` with `TUNSETIFF` for details on errors. Creating an interface requires
    /// `CAP_NET_ADMIN`.
    pub fn attach_interface(&mut self) -> core::result::Result<(), Errno> {
        self.ifreq.tun_set_tun(self.lower)
    }

    /// The name of the interface, as assigned by the kernel after attaching.
    pub fn name(&self) -> String {
        // SAFETY: `ifreq::new` and the kernel both keep a terminating zero in the array.
        let name = unsafe { CStr::from_ptr(self.ifreq.ifr_name.as_ptr()) };
        name.to_string_lossy().into_owned()
    }

    /// Receive a single datagram into the buffer.
    pub fn recv(&self, buffer: &mut [u8]) -> core::result::Result<usize, Errno> {
        let len = unsafe {
            libc::read(
                self.lower,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len())
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Send a single datagram from the buffer.
    pub fn send(&self, buffer: &[u8]) -> core::result::Result<usize, Errno> {
        let len = unsafe {
            libc::write(
                self.lower,
                buffer.as_ptr() as *const libc::c_void,
                buffer.len())
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }
}

impl Drop for TunInterfaceDesc {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

impl TunInterface {
    /// Open a tun interface by name.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub fn new(name: &str) -> io::Result<Self> {
        let inner = TunInterfaceDesc::new(name)?;
        Self::with_descriptor(inner)
    }

    /// Register an existing descriptor with the reactor, attaching it to its interface.
    pub fn with_descriptor(mut inner: TunInterfaceDesc) -> io::Result<Self> {
        inner.attach_interface()?;
        net_debug!("tun: attached to {}", inner.name());
        Ok(TunInterface {
            inner: AsyncFd::new(inner)?,
        })
    }

    /// The name of the interface.
    pub fn name(&self) -> String {
        self.inner.get_ref().name()
    }
}

impl Device for TunInterface {
    async fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| inner.get_ref().recv(buffer).map_err(io::Error::from)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    async fn send(&self, buffer: &[u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send(buffer).map_err(io::Error::from)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

impl Link<TunInterface> {
    /// Open the tun interface named in the configuration as a link.
    ///
    /// Fails with `Error::Device` if the interface can not be created or configured.
    pub fn open(config: &Config, token: CancellationToken) -> Result<Arc<Self>> {
        let device = TunInterface::new(&config.name)?;
        Ok(Arc::new(Link::new(device, config, token)))
    }
}
