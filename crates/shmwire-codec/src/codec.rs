use std::io::{BufRead, Write};

use bytes::Bytes;
use shmwire_frame::{read_frame, write_frame, FrameConfig, WireFormat};
use shmwire_segment::OffloadBuffer;
use tracing::trace;

use crate::config::CodecConfig;
use crate::descriptor::Descriptor;
use crate::error::{CodecError, Result};
use crate::offload::{ArrayOffload, EncodeHook};
use crate::value::Value;
use crate::{binary, text};

/// Encodes and decodes [`Value`]s in one wire format and moves them over a
/// byte stream one frame at a time.
///
/// The format is fixed at construction. `H` decides what happens to values
/// the format cannot carry natively; the default moves arrays into a shared
/// segment when one is attached.
///
/// Not synchronized: callers driving both directions from different threads
/// must serialize access themselves.
#[derive(Debug)]
pub struct MessageCodec<H = ArrayOffload> {
    format: WireFormat,
    frame_config: FrameConfig,
    hook: H,
}

impl MessageCodec<ArrayOffload> {
    /// Codec without an offload segment.
    pub fn new(format: WireFormat) -> Self {
        Self::with_hook(format, ArrayOffload::disabled())
    }

    /// Codec that offloads arrays into `buffer`.
    pub fn with_offload(format: WireFormat, buffer: OffloadBuffer) -> Self {
        Self::with_hook(format, ArrayOffload::new(buffer))
    }

    /// Build a codec, mapping the offload segment if one is configured.
    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        let hook = match &config.offload {
            Some(offload) => ArrayOffload::new(offload.open_buffer()?),
            None => ArrayOffload::disabled(),
        };
        Ok(Self::with_hook(config.format, hook).with_frame_config(config.frame.clone()))
    }

    /// Release an offload chunk once the peer has consumed its bytes.
    pub fn release(&mut self, offset: usize) -> Result<()> {
        self.hook.release(offset)
    }

    /// Copy the bytes a descriptor names and release its chunk.
    pub fn take(&mut self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        self.hook.take(descriptor)
    }

    pub fn offload(&self) -> &ArrayOffload {
        &self.hook
    }
}

impl<H: EncodeHook> MessageCodec<H> {
    pub fn with_hook(format: WireFormat, hook: H) -> Self {
        Self {
            format,
            frame_config: FrameConfig::default(),
            hook,
        }
    }

    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn frame_config(&self) -> &FrameConfig {
        &self.frame_config
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn hook_mut(&mut self) -> &mut H {
        &mut self.hook
    }

    /// Encode `value` into one complete frame.
    ///
    /// Text frames include the line terminator. On failure the hook is
    /// aborted, so any segment space taken for this value is returned.
    pub fn encode(&mut self, value: &Value) -> Result<Bytes> {
        let encoded = match self.format {
            WireFormat::Text => text::encode(value, &mut self.hook),
            WireFormat::Binary => binary::encode(value, &mut self.hook),
        }
        .and_then(|frame| {
            self.frame_config.check_size(frame.len())?;
            Ok(frame)
        });

        match encoded {
            Ok(frame) => {
                self.hook.commit();
                Ok(Bytes::from(frame))
            }
            Err(err) => {
                self.hook.abort();
                Err(err)
            }
        }
    }

    /// Decode one complete frame.
    pub fn decode(&self, frame: &[u8]) -> Result<Value> {
        match self.format {
            WireFormat::Text => text::decode(frame),
            WireFormat::Binary => binary::decode(frame),
        }
    }

    /// Encode `value` and write it to `stream`, then flush.
    ///
    /// Encoding finishes before the first byte is written, so an encode
    /// failure leaves the stream untouched.
    pub fn send<W: Write + ?Sized>(&mut self, value: &Value, stream: &mut W) -> Result<()> {
        let frame = self.encode(value)?;
        write_frame(stream, &frame, &self.frame_config)?;
        trace!(format = %self.format, len = frame.len(), "sent message");
        Ok(())
    }

    /// Read and decode the next frame from `stream`.
    ///
    /// Returns `Ok(None)` at end of stream. A stream that closes partway
    /// through a frame is reported the same way.
    ///
    /// [`CodecError::Decode`] means one bad frame body and the stream is
    /// still aligned on the next frame. Framing failures come back as
    /// [`CodecError::Frame`]; after an invalid binary header the stream
    /// cannot be resynchronised.
    pub fn recv<R: BufRead + ?Sized>(&self, stream: &mut R) -> Result<Option<Value>> {
        let Some(frame) = read_frame(stream, self.format, &self.frame_config)? else {
            return Ok(None);
        };
        self.decode(&frame).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use shmwire_frame::FrameError;
    use shmwire_segment::Segment;

    use super::*;
    use crate::array::{MemoryOrder, NdArray};
    use crate::config::OffloadConfig;
    use crate::descriptor::InlineCarrier;
    use crate::offload::RejectUnsupported;
    use crate::value::Map;

    fn message(id: i64) -> Value {
        [
            ("type", Value::from("call")),
            ("id", Value::Int(id)),
            ("args", Value::List(vec![Value::from(1.25), Value::Null])),
        ]
        .into_iter()
        .collect()
    }

    fn codec_with_segment(format: WireFormat, size: usize) -> MessageCodec {
        let buffer = OffloadBuffer::new(Segment::anonymous(size).unwrap()).unwrap();
        MessageCodec::with_offload(format, buffer)
    }

    #[test]
    fn round_trip_both_formats() {
        for format in [WireFormat::Text, WireFormat::Binary] {
            let mut codec = MessageCodec::new(format);
            let frame = codec.encode(&message(1)).unwrap();
            assert_eq!(codec.decode(&frame).unwrap(), message(1), "{format}");
        }
    }

    #[test]
    fn two_frames_then_end_of_stream() {
        for format in [WireFormat::Text, WireFormat::Binary] {
            let mut codec = MessageCodec::new(format);
            let mut wire = Vec::new();
            codec.send(&message(1), &mut wire).unwrap();
            codec.send(&message(2), &mut wire).unwrap();

            let mut stream = BufReader::with_capacity(3, Cursor::new(wire));
            assert_eq!(codec.recv(&mut stream).unwrap(), Some(message(1)));
            assert_eq!(codec.recv(&mut stream).unwrap(), Some(message(2)));
            assert_eq!(codec.recv(&mut stream).unwrap(), None);
        }
    }

    #[test]
    fn text_send_appends_single_terminator() {
        let mut codec = MessageCodec::new(WireFormat::Text);
        let mut wire = Vec::new();
        codec.send(&Value::from("hi"), &mut wire).unwrap();
        assert_eq!(wire, b"\"hi\"\n");
    }

    #[test]
    fn failed_encode_writes_nothing() {
        let mut codec = MessageCodec::with_hook(WireFormat::Text, RejectUnsupported);
        let value: Value = [("raw", Value::Bytes(vec![1]))].into_iter().collect();
        let mut wire = Vec::new();

        let err = codec.send(&value, &mut wire).unwrap_err();

        assert!(matches!(err, CodecError::UnsupportedType(_)));
        assert!(wire.is_empty());
    }

    #[test]
    fn array_is_offloaded_and_released() {
        let mut codec = codec_with_segment(WireFormat::Text, 1024);
        let array =
            NdArray::from_elements(&[1.0f64, 2.0, 3.0, 4.0], vec![2, 2], MemoryOrder::RowMajor)
                .unwrap();
        let value: Value = [("data", Value::Array(array.clone()))].into_iter().collect();

        let frame = codec.encode(&value).unwrap();
        let decoded = codec.decode(&frame).unwrap();

        let Some(Value::Offloaded(descriptor)) = decoded.get("data") else {
            panic!("expected descriptor, got {decoded:?}");
        };
        assert_eq!(descriptor.length, 32);
        assert_eq!(descriptor.shape, vec![2, 2]);
        assert_eq!(codec.offload().bytes(descriptor).unwrap(), array.data());

        codec.release(descriptor.offset).unwrap();
        assert_eq!(
            codec.offload().buffer().unwrap().allocator().allocated_count(),
            0
        );
    }

    #[test]
    fn full_segment_falls_back_to_frame_payload() {
        let array = NdArray::from_vec(&[9u16; 8]);
        let value: Value = [("data", Value::Array(array.clone()))].into_iter().collect();

        let mut text = codec_with_segment(WireFormat::Text, 8);
        let frame = text.encode(&value).unwrap();
        let decoded = text.decode(&frame).unwrap();
        assert_eq!(
            decoded.get("data"),
            Some(&Value::List(vec![Value::Int(9); 8]))
        );

        let mut binary = codec_with_segment(WireFormat::Binary, 8);
        let frame = binary.encode(&value).unwrap();
        let decoded = binary.decode(&frame).unwrap();
        assert_eq!(
            decoded.get("data"),
            Some(&Value::Inline(InlineCarrier::from_array(&array)))
        );
    }

    #[test]
    fn failed_encode_rolls_back_offloads() {
        let mut codec = codec_with_segment(WireFormat::Text, 1024);
        let mut map = Map::new();
        map.insert("a".into(), Value::Array(NdArray::from_vec(&[1i32; 4])));
        map.insert("b".into(), Value::Bytes(vec![0]));

        let err = codec.encode(&Value::Map(map)).unwrap_err();

        assert!(matches!(err, CodecError::UnsupportedType(_)));
        let allocator = codec.offload().buffer().unwrap().allocator();
        assert_eq!(allocator.allocated_count(), 0);
        assert_eq!(allocator.free_bytes(), 1024);
    }

    #[test]
    fn oversized_frame_rolls_back_and_writes_nothing() {
        let mut codec = codec_with_segment(WireFormat::Text, 1024).with_frame_config(FrameConfig {
            max_frame_size: Some(16),
        });
        let value: Value = [("data", Value::Array(NdArray::from_vec(&[1u8; 4])))]
            .into_iter()
            .collect();
        let mut wire = Vec::new();

        let err = codec.send(&value, &mut wire).unwrap_err();

        assert!(matches!(
            err,
            CodecError::Frame(FrameError::FrameTooLarge { max: 16, .. })
        ));
        assert!(wire.is_empty());
        assert_eq!(
            codec.offload().buffer().unwrap().allocator().allocated_count(),
            0
        );
    }

    #[test]
    fn recv_reports_malformed_frames() {
        let codec = MessageCodec::new(WireFormat::Text);
        let mut stream = Cursor::new(b"{not json}\n".to_vec());
        assert!(matches!(
            codec.recv(&mut stream),
            Err(CodecError::Decode(_))
        ));

        let codec = MessageCodec::new(WireFormat::Binary);
        let mut stream = Cursor::new(2i32.to_le_bytes().to_vec());
        assert!(matches!(
            codec.recv(&mut stream),
            Err(CodecError::Frame(FrameError::InvalidLength(2)))
        ));
    }

    #[test]
    fn bad_body_keeps_stream_aligned() {
        let mut codec = MessageCodec::new(WireFormat::Binary);
        let mut wire = 9i32.to_le_bytes().to_vec();
        wire.extend_from_slice(b"abcde");
        wire.extend_from_slice(&codec.encode(&message(3)).unwrap());
        let mut stream = Cursor::new(wire);

        assert!(matches!(
            codec.recv(&mut stream),
            Err(CodecError::Decode(_))
        ));
        assert_eq!(codec.recv(&mut stream).unwrap(), Some(message(3)));
    }

    #[test]
    fn reserved_tag_in_user_map_round_trips() {
        let value: Value = [
            ("offload", Value::from("shmem")),
            ("note", Value::from("user data")),
        ]
        .into_iter()
        .collect();
        let inline: Value = [("offload", Value::from("inline")), ("shape", Value::Null)]
            .into_iter()
            .collect();

        for format in [WireFormat::Text, WireFormat::Binary] {
            let mut codec = codec_with_segment(format, 256);
            for original in [&value, &inline] {
                let frame = codec.encode(original).unwrap();
                assert_eq!(&codec.decode(&frame).unwrap(), original, "{format}");
            }
        }
    }

    #[test]
    fn worker_offloads_into_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.shm");
        let host = Segment::create(&path, 4096).unwrap();

        let config = CodecConfig::new(WireFormat::Text).with_offload(OffloadConfig::file(&path));
        let mut worker = MessageCodec::from_config(&config).unwrap();
        let value: Value = [("data", Value::Array(NdArray::from_vec(&[1.0f64, 2.0])))]
            .into_iter()
            .collect();

        let frame = worker.encode(&value).unwrap();
        let decoded = worker.decode(&frame).unwrap();
        let descriptor = decoded.descriptors()[0].clone();

        let expected = [1.0f64.to_ne_bytes(), 2.0f64.to_ne_bytes()].concat();
        assert_eq!(
            host.read(descriptor.offset, descriptor.length).unwrap(),
            expected.as_slice()
        );
        assert_eq!(worker.take(&descriptor).unwrap(), expected);

        drop(worker);
        assert!(path.exists());
    }

    #[test]
    fn truncated_frame_reads_as_end_of_stream() {
        let mut codec = MessageCodec::new(WireFormat::Binary);
        let frame = codec.encode(&message(5)).unwrap();
        let mut stream = Cursor::new(frame[..frame.len() - 2].to_vec());

        assert_eq!(codec.recv(&mut stream).unwrap(), None);
    }

    #[test]
    fn from_config_attaches_segment() {
        let config = CodecConfig::new(WireFormat::Binary).with_offload(OffloadConfig::anonymous(256));
        let mut codec = MessageCodec::from_config(&config).unwrap();
        let value: Value = [("data", Value::Array(NdArray::from_vec(&[5i64, 6])))]
            .into_iter()
            .collect();

        let frame = codec.encode(&value).unwrap();
        let decoded = codec.decode(&frame).unwrap();
        let descriptor = decoded.descriptors()[0].clone();

        assert_eq!(
            codec.take(&descriptor).unwrap(),
            [5i64.to_ne_bytes(), 6i64.to_ne_bytes()].concat()
        );
        assert!(codec.release(descriptor.offset).is_err());
    }
}
