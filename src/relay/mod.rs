pub mod framing;
pub mod server;

pub use framing::{FramedReader, FramedWriter};
pub use server::{RelayServer, RelayState};
