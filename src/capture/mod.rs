pub mod capture_error;
pub mod captured_packet;
pub mod frame;
pub mod reader;
pub mod writer;

pub use capture_error::CaptureError;
pub use captured_packet::{CapturedPacket, Framing};
pub use frame::{Transport, TransportProtocol};
pub use reader::{CaptureFormat, CaptureHeader, CaptureReader, CaptureRecord};
pub use writer::CaptureWriter;
