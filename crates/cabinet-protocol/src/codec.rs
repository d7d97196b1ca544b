use bytes::{BufMut, Bytes, BytesMut};
use cabinet_store::{DataType, Table};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::MAX_FRAME_SIZE;

/// Frames of a streamed table: one `Header`, any number of `Batch`es, one
/// `End`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamFrame {
    Header {
        schema: Vec<(String, DataType)>,
        num_rows: u64,
    },
    Batch(Table),
    End {
        batches: u32,
    },
}

impl StreamFrame {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Header { .. } => 1,
            Self::Batch(_) => 2,
            Self::End { .. } => 3,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Header { .. } => "Header",
            Self::Batch(_) => "Batch",
            Self::End { .. } => "End",
        }
    }
}

/// Codec for streamed tables.
pub struct StreamCodec;

impl StreamCodec {
    /// Encode one frame: `[4 bytes BE len][1 byte tag][bincode payload]`,
    /// where `len` counts the tag and the payload.
    pub fn encode(frame: &StreamFrame) -> ProtocolResult<Bytes> {
        let payload =
            bincode::serialize(frame).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32(len);
        buf.put_u8(frame.type_tag());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode one frame. Returns the frame and the bytes consumed.
    pub fn decode(data: &[u8]) -> ProtocolResult<(StreamFrame, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len - 1,
                max: MAX_FRAME_SIZE,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let tag = data[4];
        if !(1..=3).contains(&tag) {
            return Err(ProtocolError::InvalidFrameType(tag));
        }
        let frame: StreamFrame = bincode::deserialize(&data[5..total])
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if frame.type_tag() != tag {
            return Err(ProtocolError::FramingError(format!(
                "tag {tag} does not match {} frame",
                frame.type_name()
            )));
        }
        Ok((frame, total))
    }

    /// Encode a whole table as header, row batches and end marker.
    pub fn encode_table(table: &Table, batch_rows: usize) -> ProtocolResult<Bytes> {
        let batches = table.row_batches(batch_rows);
        let mut buf = BytesMut::new();
        buf.put(Self::encode(&StreamFrame::Header {
            schema: table.schema(),
            num_rows: table.num_rows() as u64,
        })?);
        for batch in &batches {
            buf.put(Self::encode(&StreamFrame::Batch(batch.clone()))?);
        }
        buf.put(Self::encode(&StreamFrame::End {
            batches: batches.len() as u32,
        })?);
        Ok(buf.freeze())
    }

    /// Reassemble a table from a complete stream, checking the schema and
    /// row count announced by the header.
    pub fn decode_table(mut data: &[u8]) -> ProtocolResult<Table> {
        let (first, used) = Self::decode(data)?;
        data = &data[used..];
        let StreamFrame::Header { schema, num_rows } = first else {
            return Err(ProtocolError::FramingError(format!(
                "expected Header, got {}",
                first.type_name()
            )));
        };

        let mut table = Table::empty();
        let mut seen = 0u32;
        loop {
            let (frame, used) = Self::decode(data)?;
            data = &data[used..];
            match frame {
                StreamFrame::Batch(batch) => {
                    if batch.schema() != schema {
                        return Err(ProtocolError::FramingError("batch schema mismatch".into()));
                    }
                    table
                        .append(batch)
                        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
                    seen += 1;
                }
                StreamFrame::End { batches } => {
                    if batches != seen || table.num_rows() as u64 != num_rows {
                        return Err(ProtocolError::FramingError(format!(
                            "stream ended after {seen} batches and {} rows, expected {batches} and {num_rows}",
                            table.num_rows()
                        )));
                    }
                    if !data.is_empty() {
                        return Err(ProtocolError::FramingError("trailing bytes after End".into()));
                    }
                    return Ok(table);
                }
                StreamFrame::Header { .. } => {
                    return Err(ProtocolError::FramingError("duplicate Header".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_store::Payload;
    use serde_json::json;

    fn table(n: i64) -> Table {
        Payload::Array {
            name: Some("n".into()),
            values: (0..n).map(|i| json!(i)).collect(),
        }
        .normalize()
        .unwrap()
    }

    #[test]
    fn table_stream_reassembles() {
        let original = table(10);
        let bytes = StreamCodec::encode_table(&original, 3).unwrap();
        assert_eq!(StreamCodec::decode_table(&bytes).unwrap(), original);
    }

    #[test]
    fn empty_table_still_carries_schema() {
        let original = table(0);
        let bytes = StreamCodec::encode_table(&original, 3).unwrap();
        let decoded = StreamCodec::decode_table(&bytes).unwrap();
        assert_eq!(decoded.num_rows(), 0);
        assert_eq!(decoded.schema(), original.schema());
    }

    #[test]
    fn frame_consumes_exact_length() {
        let frame = StreamFrame::End { batches: 4 };
        let encoded = StreamCodec::encode(&frame).unwrap();
        let (decoded, used) = StreamCodec::decode(&encoded).unwrap();
        assert_eq!(used, encoded.len());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let bytes = StreamCodec::encode_table(&table(5), 2).unwrap();
        let err = StreamCodec::decode_table(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn stream_must_start_with_header() {
        let bytes = StreamCodec::encode(&StreamFrame::End { batches: 0 }).unwrap();
        assert!(StreamCodec::decode_table(&bytes).is_err());
    }

    #[test]
    fn unknown_tag_and_zero_length() {
        let mut bytes = StreamCodec::encode(&StreamFrame::End { batches: 0 }).unwrap().to_vec();
        bytes[4] = 9;
        assert!(matches!(
            StreamCodec::decode(&bytes).unwrap_err(),
            ProtocolError::InvalidFrameType(9)
        ));
        let err = StreamCodec::decode(&[0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }
}
