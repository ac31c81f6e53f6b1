//! Logger setup for the binary.
//!
//! Уровень: debug для своего крейта при --verbose или dry-run, остальные
//! крейты (reqwest, hyper) остаются на info; RUST_LOG всегда имеет
//! приоритет. С --syslog записи уходят в /dev/log (RFC 3164-ish,
//! facility user) вместо stderr.

use std::io::{self, Write};

use env_logger::{Builder, Env, Target};
use log::Level;

use crate::error::{Error, Result};

pub const SYSLOG_SOCKET: &str = "/dev/log";
const SYSLOG_IDENT: &str = "do-snapshot";
/// LOG_USER << 3
const FACILITY_USER: u8 = 8;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool, dry_run: bool) -> &'static str {
    if verbose || dry_run {
        "do_snapshot=debug,info"
    } else {
        "info"
    }
}

pub fn init_logger(verbose: bool, dry_run: bool, syslog: bool) -> Result<()> {
    let env = Env::default().default_filter_or(default_filter(verbose, dry_run));
    let mut builder = Builder::from_env(env);
    if syslog {
        let pid = std::process::id();
        builder
            .target(Target::Pipe(Box::new(SyslogWriter::connect(SYSLOG_SOCKET)?)))
            .format(move |buf, record| {
                writeln!(
                    buf,
                    "<{}>{}[{}]: {}",
                    syslog_priority(record.level()),
                    SYSLOG_IDENT,
                    pid,
                    record.args()
                )
            });
    } else {
        builder.format_timestamp_millis();
    }
    builder
        .try_init()
        .map_err(|e| Error::config(format!("logger already initialized: {}", e)))
}

pub fn syslog_priority(level: Level) -> u8 {
    let severity = match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    };
    FACILITY_USER | severity
}

/// Sends one datagram per complete line.
#[cfg(unix)]
struct SyslogWriter {
    sock: std::os::unix::net::UnixDatagram,
    pending: Vec<u8>,
}

#[cfg(unix)]
impl SyslogWriter {
    fn connect(path: &str) -> Result<Self> {
        let sock = std::os::unix::net::UnixDatagram::unbound()
            .and_then(|s| s.connect(path).map(|_| s))
            .map_err(|e| Error::config(format!("connect syslog socket {}: {}", path, e)))?;
        Ok(Self {
            sock,
            pending: Vec::new(),
        })
    }
}

#[cfg(unix)]
impl Write for SyslogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            // без завершающего '\n'
            self.sock.send(&line[..line.len() - 1])?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.sock.send(&self.pending)?;
            self.pending.clear();
        }
        Ok(())
    }
}

#[cfg(not(unix))]
struct SyslogWriter;

#[cfg(not(unix))]
impl SyslogWriter {
    fn connect(_path: &str) -> Result<Self> {
        Err(Error::config("--syslog is only supported on unix"))
    }
}

#[cfg(not(unix))]
impl Write for SyslogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
