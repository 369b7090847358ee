//! UDP sensor transport
//!
//! Each datagram carries one frame as UTF-8 text: channel values separated
//! by commas or whitespace, e.g. `"1024, 0.532, 0.0"`. Streams are declared
//! in the configuration rather than discovered on the network.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::sensor::{Frame, SensorStream, StreamInfo, StreamResolver};
use crate::error::{Error, Result};

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 2048;

/// A configured UDP stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpEndpoint {
    /// Stream name matched against the stream filter
    pub name: String,

    /// Local address to listen on, e.g. "0.0.0.0:5555"
    pub bind: String,

    /// Nominal sample rate in Hz (0 = unknown)
    #[serde(default)]
    pub sample_rate: f64,
}

/// Resolver over a fixed list of UDP endpoints
#[derive(Debug, Clone, Default)]
pub struct UdpResolver {
    endpoints: Vec<UdpEndpoint>,
}

impl UdpResolver {
    pub fn new(endpoints: Vec<UdpEndpoint>) -> Self {
        Self { endpoints }
    }
}

impl StreamResolver for UdpResolver {
    fn resolve(&self) -> Result<Vec<StreamInfo>> {
        Ok(self
            .endpoints
            .iter()
            .map(|e| StreamInfo {
                name: e.name.clone(),
                nominal_rate: e.sample_rate,
                locator: e.bind.clone(),
            })
            .collect())
    }

    fn open(&self, info: &StreamInfo) -> Result<Box<dyn SensorStream>> {
        Ok(Box::new(UdpStream::bind(info.clone())?))
    }
}

/// Non-blocking UDP sensor stream
pub struct UdpStream {
    info: StreamInfo,
    socket: UdpSocket,
    buf: [u8; MAX_DATAGRAM],
}

impl UdpStream {
    /// Listen on `info.locator`
    pub fn bind(info: StreamInfo) -> Result<Self> {
        let socket = UdpSocket::bind(&info.locator).map_err(|e| {
            Error::SourceUnavailable(format!("{} (cannot listen on {}: {})", info.name, info.locator, e))
        })?;
        socket.set_nonblocking(true)?;
        info!("Listening for '{}' on {}", info.name, socket.local_addr()?);

        Ok(Self {
            info,
            socket,
            buf: [0; MAX_DATAGRAM],
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl SensorStream for UdpStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        let len = match self.socket.recv(&mut self.buf) {
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };

        match parse_frame(&self.buf[..len]) {
            Some(values) => Ok(Some(Frame::new(values))),
            None => {
                debug!("ignoring malformed datagram on '{}'", self.info.name);
                Ok(None)
            }
        }
    }
}

/// Parse a datagram into channel values
fn parse_frame(bytes: &[u8]) -> Option<Vec<f64>> {
    let text = std::str::from_utf8(bytes).ok()?;
    let values: Option<Vec<f64>> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| field.parse::<f64>().ok())
        .collect();
    values.filter(|v| !v.is_empty())
}
