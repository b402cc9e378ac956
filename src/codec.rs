//! Length-delimited envelope framing.
//!
//! Each message on the wire is a canonical varint (base-128 little-endian,
//! high bit set on every byte but the last) giving the byte length of the
//! encoded envelope, followed by exactly that many bytes.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Messages larger than this are refused on read (default 1 MiB, see
/// [`crate::config`]).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed varint length prefix")]
    MalformedVarint,
    #[error("declared message length {0} exceeds max {1}")]
    TooLarge(usize, usize),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, CodecError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(CodecError::MalformedVarint);
        }
        let byte = reader.read_u8().await?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

/// Serialize `msg` and write it as a varint-length-prefixed frame.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    let mut framed = Vec::with_capacity(payload.len() + 10);
    encode_varint(payload.len() as u64, &mut framed);
    framed.extend_from_slice(&payload);
    writer.write_all(&framed).await?;
    Ok(())
}

/// Read one varint-length-prefixed frame and decode it.
pub async fn read_message<R, T>(
    reader: &mut R,
    max_message_size: usize,
) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = read_varint(reader).await? as usize;
    if len > max_message_size {
        return Err(CodecError::TooLarge(len, max_message_size));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let msg = bincode::deserialize(&buf)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[tokio::test]
    async fn round_trips_through_a_cursor() {
        let sample = Sample {
            a: 42,
            b: "hello".to_string(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &sample).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: Sample = read_message(&mut cursor, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(decoded, sample);
    }

    #[tokio::test]
    async fn refuses_oversized_declared_length() {
        let mut buf = Vec::new();
        encode_varint(10_000_000, &mut buf);
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_message::<_, Sample>(&mut cursor, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::TooLarge(_, _)));
    }

    #[test]
    fn varint_round_trips_large_values() {
        let mut out = Vec::new();
        encode_varint(300, &mut out);
        // 300 = 0b1_0010_1100 -> low 7 bits 0101100 | 0x80, then 0b10 = 2
        assert_eq!(out, vec![0b1010_1100, 0b0000_0010]);
    }
}
