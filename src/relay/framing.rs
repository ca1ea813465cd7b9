//! Length-prefixed message framing for the camera and video channels.
//! One message is a 4-byte little-endian length followed by exactly one
//! compressed image payload.

use crate::error::FrameError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

pub struct FramedReader<R> {
    reader: BufReader<R>,
    max_frame_bytes: u32,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(inner: R, max_frame_bytes: u32) -> Self {
        Self {
            reader: BufReader::new(inner),
            max_frame_bytes,
        }
    }

    async fn read_length(&mut self) -> Result<u32, FrameError> {
        let mut length_buffer = [0u8; 4];
        self.reader
            .read_exact(&mut length_buffer)
            .await
            .map_err(FrameError::Read)?;
        Ok(u32::from_le_bytes(length_buffer))
    }

    /// Reads one complete message. An oversized length is an error so a
    /// corrupted prefix cannot make us allocate the moon.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        let length = self.read_length().await?;
        if length > self.max_frame_bytes {
            return Err(FrameError::Oversized(length, self.max_frame_bytes));
        }
        let mut payload = vec![0u8; length as usize];
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(FrameError::Read)?;
        Ok(payload)
    }
}

pub struct FramedWriter<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        self.writer
            .write_all(&(payload.len() as u32).to_le_bytes())
            .await
            .map_err(FrameError::Write)?;
        self.writer
            .write_all(payload)
            .await
            .map_err(FrameError::Write)?;
        self.writer.flush().await.map_err(FrameError::Write)
    }
}
