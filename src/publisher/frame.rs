//! Length-prefixed MessagePack frames
//!
//! Each frame is a 4-byte big-endian body length followed by the body.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Result, SdkError};

const LEN_PREFIX: usize = 4;

/// Largest body accepted when decoding
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serialize `value` into one frame
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    // MessagePack maps, field names included
    let data = rmp_serde::to_vec_named(value)?;
    let len = u32::try_from(data.len())
        .map_err(|_| SdkError::Serialization(format!("frame of {} bytes is too large", data.len())))?;

    let mut message = BytesMut::with_capacity(LEN_PREFIX + data.len());
    message.put_u32(len);
    message.extend_from_slice(&data);
    Ok(message.freeze())
}

/// Take one complete frame off the front of `buf`
///
/// Returns `Ok(None)` and leaves `buf` untouched when the frame is incomplete.
pub fn decode_frame<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>> {
    if buf.len() < LEN_PREFIX {
        return Ok(None);
    }
    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&buf[..LEN_PREFIX]);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SdkError::Serialization(format!(
            "frame length {len} exceeds limit of {MAX_FRAME_LEN}"
        )));
    }
    if buf.len() < LEN_PREFIX + len {
        return Ok(None);
    }

    buf.advance(LEN_PREFIX);
    let body = buf.split_to(len);
    Ok(Some(rmp_serde::from_slice(&body)?))
}

/// Writes frames to any async sink
pub struct FrameWriter<W> {
    inner: W,
    frames_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    pub async fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let frame = encode_frame(value)?;
        self.inner.write_all(&frame).await?;
        self.frames_written += 1;
        debug!(bytes = frame.len(), frames = self.frames_written, "Wrote frame");
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{AggregatedLevel, AggregatedView, AggregationConfig, OrderBookMetrics};
    use rust_decimal_macros::dec;

    fn view() -> AggregatedView {
        AggregatedView {
            symbol: "BTCUSDT".to_string(),
            bids: vec![AggregatedLevel {
                price: dec!(100),
                quantity: dec!(2),
                cumulative_quantity: dec!(2),
            }],
            asks: vec![],
            max_cumulative_quantity: dec!(2),
            last_update_id: Some(7),
            event_time: None,
            resync_needed: false,
            config: AggregationConfig::default(),
            metrics: OrderBookMetrics::default(),
        }
    }

    #[test]
    fn test_length_prefix() {
        let frame = encode_frame(&view()).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }

    #[test]
    fn test_partial_frames() {
        let frame = encode_frame(&view()).unwrap();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&frame[..3]);
        assert!(decode_frame::<AggregatedView>(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[3..frame.len() - 1]);
        assert!(decode_frame::<AggregatedView>(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[frame.len() - 1..]);
        buf.extend_from_slice(&frame);
        assert_eq!(decode_frame::<AggregatedView>(&mut buf).unwrap(), Some(view()));
        assert_eq!(decode_frame::<AggregatedView>(&mut buf).unwrap(), Some(view()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        assert!(decode_frame::<AggregatedView>(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_frame_writer() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write(&view()).await.unwrap();
        writer.write(&view()).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.frames_written(), 2);

        let mut buf = BytesMut::from(&writer.into_inner()[..]);
        let mut decoded = 0;
        while let Some(v) = decode_frame::<AggregatedView>(&mut buf).unwrap() {
            assert_eq!(v.symbol, "BTCUSDT");
            decoded += 1;
        }
        assert_eq!(decoded, 2);
    }
}
