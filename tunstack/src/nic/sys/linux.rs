// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use super::{ifreq, Errno, LibcResult, IoctlResult};

/// Adds a method to open a tun.
///
/// This is an extension trait implemented for `ifreq` in Linux.
pub(crate) trait TunSetIf {
    /// Attach to an existing interface or create a new one.
    fn tun_set_if(&mut self, fd: libc::c_int, kind: libc::c_int) -> Result<(), Errno>;

    /// Convenience method over `tun_set_if` for a tun without packet information.
    ///
    /// Frames read and written are then bare IP datagrams.
    fn tun_set_tun(&mut self, fd: libc::c_int) -> Result<(), Errno>;
}

impl ifreq {
    pub(crate) const TUNSETIFF:    libc::Ioctl = 0x400454CA;
    pub(crate) const IFF_TUN:      libc::c_int  = 0x0001;
    pub(crate) const IFF_NO_PI:    libc::c_int  = 0x1000;
}

impl TunSetIf for ifreq {
    fn tun_set_if(&mut self, fd: libc::c_int, kind: libc::c_int) -> Result<(), Errno> {
        #[repr(C)]
        #[derive(Debug)]
        struct Request {
            interface: ifreq,
            kind: libc::c_short,
            // Pads to the size of the kernel's `struct ifreq`, which is what it copies.
            _union: [u8; 22],
        }

        let mut request = Request {
            interface: *self,
            kind: kind as libc::c_short,
            _union: [0; 22],
        };

        let res = unsafe {
            libc::ioctl(fd, Self::TUNSETIFF, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        // The kernel picks the name when ours was a pattern such as `tun%d`.
        self.ifr_name = request.interface.ifr_name;
        Ok(())
    }

    fn tun_set_tun(&mut self, fd: libc::c_int) -> Result<(), Errno> {
        self.tun_set_if(fd, Self::IFF_TUN | Self::IFF_NO_PI)
    }
}
