// # Syslog Forwarding
//
// A `MakeWriter` that turns each formatted log line into one RFC 3164 UDP
// datagram: `<PRI>sgsync: <line>`, facility daemon. Delivery is best effort;
// a dropped datagram never fails the pass.

use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use crate::config::SyslogTarget;

/// Program tag prefixed to every message
pub const TAG: &str = "sgsync";

const FACILITY_DAEMON: u8 = 3;

/// Shared UDP socket connected to the syslog server
#[derive(Debug, Clone)]
pub struct SyslogMakeWriter {
    socket: Arc<UdpSocket>,
}

impl SyslogMakeWriter {
    /// Bind an ephemeral local port and connect it to `target`
    ///
    /// Fails if the host name does not resolve.
    pub fn connect(target: &SyslogTarget) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect((target.host.as_str(), target.port))?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }
}

/// Writer for a single event
pub struct SyslogLine<'a> {
    socket: &'a UdpSocket,
    severity: u8,
}

impl io::Write for SyslogLine<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let datagram = format_datagram(self.severity, line.trim_end());
        if let Err(e) = self.socket.send(datagram.as_bytes()) {
            // Logging here would recurse into this writer
            eprintln!("syslog send failed: {}", e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogLine<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogLine {
            socket: &self.socket,
            severity: severity(&Level::INFO),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogLine {
            socket: &self.socket,
            severity: severity(meta.level()),
        }
    }
}

/// RFC 5424 severity for a tracing level
pub fn severity(level: &Level) -> u8 {
    if *level == Level::ERROR {
        3
    } else if *level == Level::WARN {
        4
    } else if *level == Level::INFO {
        6
    } else {
        7
    }
}

pub fn format_datagram(severity: u8, message: &str) -> String {
    format!("<{}>{}: {}", FACILITY_DAEMON * 8 + severity, TAG, message)
}
