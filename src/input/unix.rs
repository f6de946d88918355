//! Raw-mode stdin reader for Unix terminals

use std::io;
use std::os::unix::io::RawFd;

use log::{debug, warn};

use super::console::ConsoleReader;
use crate::core::REPLACEMENT;
use crate::error::{Error, Result};

const READ_CHUNK: usize = 1024;

/// Reads characters from stdin with the terminal in raw mode. Raw mode is
/// restored when the reader is dropped.
pub struct UnixConsoleReader {
    fd: RawFd,
    /// Bytes of a UTF-8 sequence split across reads
    pending: Vec<u8>,
}

impl UnixConsoleReader {
    pub fn new() -> Result<Self> {
        crossterm::terminal::enable_raw_mode().map_err(Error::PlatformReadFailure)?;
        debug!("Raw mode enabled");
        Ok(Self {
            fd: libc::STDIN_FILENO,
            pending: Vec::with_capacity(READ_CHUNK),
        })
    }
}

impl ConsoleReader<char> for UnixConsoleReader {
    fn peek(&mut self) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd, zero timeout
        let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(Error::PlatformReadFailure(err));
        }
        Ok(ready > 0 && (pfd.revents & libc::POLLIN) != 0)
    }

    fn read(&mut self) -> Result<Vec<char>> {
        let mut buf = [0u8; READ_CHUNK];
        // SAFETY: buf is valid for READ_CHUNK bytes
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(Vec::new()),
                _ => Err(Error::PlatformReadFailure(err)),
            };
        }
        if n == 0 {
            return Err(Error::PlatformReadFailure(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed",
            )));
        }
        self.pending.extend_from_slice(&buf[..n as usize]);
        Ok(decode_utf8(&mut self.pending))
    }
}

impl Drop for UnixConsoleReader {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
    }
}

/// Decode as much of `pending` as possible. An incomplete trailing sequence
/// stays in `pending`; invalid bytes become U+FFFD.
fn decode_utf8(pending: &mut Vec<u8>) -> Vec<char> {
    let mut chars = Vec::with_capacity(pending.len());
    let mut rest: &[u8] = pending;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                chars.extend(s.chars());
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix is UTF-8
                chars.extend(String::from_utf8_lossy(valid).chars());
                match e.error_len() {
                    Some(bad) => {
                        chars.push(REPLACEMENT);
                        rest = &after[bad..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }
    let consumed = pending.len() - rest.len();
    pending.drain(..consumed);
    chars
}
