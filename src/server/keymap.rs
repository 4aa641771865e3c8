//! Keymap sharing
//!
//! The compiled keymap is written once into a sealed memfd. Every
//! wl_keyboard gets the same descriptor; the seals keep clients from
//! changing what others map.

use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::{AsFd, OwnedFd};

use rustix::fs::{MemfdFlags, SealFlags};
use wayland_server::protocol::wl_keyboard::{KeymapFormat, WlKeyboard};

#[derive(Debug)]
pub struct KeymapFile {
    fd: OwnedFd,
    /// Bytes including the trailing NUL
    size: u32,
    format: KeymapFormat,
}

impl KeymapFile {
    /// Share an xkb keymap in text form
    pub fn new(keymap: &str) -> io::Result<Self> {
        let fd = memfd(MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING)?;
        let mut file = File::from(fd);
        file.write_all(keymap.as_bytes())?;
        file.write_all(&[0])?;
        let fd = OwnedFd::from(file);
        rustix::fs::fcntl_add_seals(&fd, SealFlags::SHRINK | SealFlags::GROW | SealFlags::WRITE | SealFlags::SEAL)?;

        let size = u32::try_from(keymap.len() + 1).map_err(|_| io::Error::other("keymap too large"))?;
        Ok(Self {
            fd,
            size,
            format: KeymapFormat::XkbV1,
        })
    }

    /// Tell clients there is no keymap; keys arrive as raw keycodes
    pub fn none() -> io::Result<Self> {
        Ok(Self {
            fd: memfd(MemfdFlags::CLOEXEC)?,
            size: 0,
            format: KeymapFormat::NoKeymap,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn send(&self, keyboard: &WlKeyboard) {
        keyboard.keymap(self.format, self.fd.as_fd(), self.size);
    }
}

fn memfd(flags: MemfdFlags) -> io::Result<OwnedFd> {
    Ok(rustix::fs::memfd_create("kestrel-keymap", flags)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    #[test]
    fn test_keymap_is_sealed() {
        let keymap = KeymapFile::new("xkb_keymap {};").unwrap();
        assert_eq!(keymap.size(), 15);

        let mut file = File::from(keymap.fd.try_clone().unwrap());
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"xkb_keymap {};\0");
        assert!(file.write_all(b"x").is_err());
    }

    #[test]
    fn test_no_keymap() {
        let keymap = KeymapFile::none().unwrap();
        assert_eq!(keymap.size(), 0);
        assert_eq!(keymap.format, KeymapFormat::NoKeymap);
    }
}
