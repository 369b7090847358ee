//! Respiration sample sources
//!
//! Live runs pull frames from a discovered sensor stream; prerecorded runs
//! load a whole recording up front.

mod recording;
mod sensor;
mod udp;

pub use recording::load_recording;
pub use sensor::{select_stream, Frame, SensorStream, StreamInfo, StreamResolver, FALLBACK_RATE};
pub use udp::{UdpEndpoint, UdpResolver, UdpStream};
