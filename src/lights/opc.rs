//! Open Pixel Control over TCP.
//!
//! Every message is a 4 byte header (channel, command, big endian data
//! length) followed by the data. We only ever send "set pixel colours",
//! whose data is one RGB triple per pixel.

use std::time::Duration;

use anyhow::{anyhow, Context, Error, Result};
use bytes::{BufMut, BytesMut};
use futures::sink::SinkExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_util::codec::{Encoder, FramedWrite};

use crate::color::{Color, OFF};
use crate::lights::LightCommand;

const HEADER_SIZE: usize = 4;
const SET_PIXEL_COLOURS: u8 = 0;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// How long to drop frames after a failed connection attempt
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
pub struct OpcMessage {
    pub channel: u8,
    pub pixels: Vec<Color>,
}

pub struct OpcCodec;

impl Encoder<OpcMessage> for OpcCodec {
    type Error = Error;

    fn encode(&mut self, item: OpcMessage, dst: &mut BytesMut) -> Result<(), Error> {
        let len: u16 = (item.pixels.len() * 3)
            .try_into()
            .context("Too many pixels for one OPC message")?;

        dst.reserve(HEADER_SIZE + len as usize);
        dst.put_u8(item.channel);
        dst.put_u8(SET_PIXEL_COLOURS);
        dst.put_u16(len);

        for pixel in item.pixels {
            dst.put_slice(&[pixel.r, pixel.g, pixel.b]);
        }

        Ok(())
    }
}

pub struct OpcBackend {
    address: String,
    channel: u8,
    /// Last color of every pixel, indexed by light id
    pixels: Vec<Color>,
    sink: Option<FramedWrite<TcpStream, OpcCodec>>,
    retry_at: Option<Instant>,
}

impl OpcBackend {
    pub fn new(address: &str, channel: u8) -> OpcBackend {
        OpcBackend {
            address: address.to_string(),
            channel,
            pixels: Vec::new(),
            sink: None,
            retry_at: None,
        }
    }

    pub async fn write(&mut self, batch: &[LightCommand]) -> Result<()> {
        for command in batch {
            let index = command.light as usize;
            if self.pixels.len() <= index {
                self.pixels.resize(index + 1, OFF);
            }
            self.pixels[index] = command.color;
        }

        let message = OpcMessage {
            channel: self.channel,
            pixels: self.pixels.clone(),
        };

        if self.sink.is_none() {
            self.connect().await?;
        }

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| anyhow!("Not connected to {}", self.address))?;

        if let Err(e) = sink.send(message).await {
            self.sink = None;
            return Err(e.context(format!("Failed to send frame to {}", self.address)));
        }

        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        if let Some(retry_at) = self.retry_at {
            if Instant::now() < retry_at {
                return Err(anyhow!("Not connected to {}", self.address));
            }
        }

        log::info!("Connecting to OPC server at {}", self.address);

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.retry_at = Some(Instant::now() + RECONNECT_DELAY);
                return Err(Error::new(e).context(format!("Failed to connect to {}", self.address)));
            }
            Err(_) => {
                self.retry_at = Some(Instant::now() + RECONNECT_DELAY);
                return Err(anyhow!("Timed out connecting to {}", self.address));
            }
        };

        stream.set_nodelay(true)?;
        self.retry_at = None;

        self.sink = Some(FramedWrite::new(stream, OpcCodec));

        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                log::warn!("Error closing connection to {}: {}", self.address, e);
            }
        }
    }
}
