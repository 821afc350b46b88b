//! Length delimited streams of messages. Every element is the length data of its message followed
//! by the message itself, so a reader can tell a complete element from one which is still
//! arriving.

use crate::codable::{Decode, Encode};
use crate::decoder::{Decoder, Source};
use crate::encoder::Encoder;
use crate::error::{DecodeError, DecoderError, EncoderError, StreamError};
use crate::key::CodingPath;
use log::{debug, trace};
use std::fmt;
use std::marker::PhantomData;

/// Consumed bytes are dropped from the front of the buffer once there are at least this many.
pub const COMPACTION_THRESHOLD: usize = 4096;

/// Accumulates chunks of a stream and hands out complete elements.
#[derive(Debug, Clone, Default)]
pub struct StreamingBuffer {
    buffer: Vec<u8>,
    pos: usize,
}

impl StreamingBuffer {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn has_more_bytes(&self) -> bool {
        self.pos < self.buffer.len()
    }

    /// Bytes which have been added but not yet consumed by an element.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Bytes held in memory, including consumed ones not compacted away yet.
    pub fn capacity_used(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pos = 0;
    }

    /// Hands the unconsumed bytes to `f`, which returns an element and the number of bytes it
    /// took up. If `f` runs out of data, nothing is consumed and `None` is returned so the same
    /// bytes can be retried once more arrived. Other errors leave the cursor in place as well.
    pub fn try_decode_one<T, E, F>(&mut self, f: F) -> Result<Option<T>, E>
    where
        E: StreamError,
        F: FnOnce(&[u8]) -> Result<(T, usize), E>,
    {
        if !self.has_more_bytes() {
            return Ok(None);
        }
        match f(&self.buffer[self.pos..]) {
            Ok((element, consumed)) => {
                trace!("stream element of {} bytes at offset {}", consumed, self.pos);
                self.consume(consumed);
                Ok(Some(element))
            },
            Err(e) if e.is_insufficient_data() => {
                trace!("waiting for more data, {} bytes buffered", self.buffered_len());
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buffer.len());
        if self.pos == self.buffer.len() {
            self.clear();
        } else if self.pos >= COMPACTION_THRESHOLD {
            trace!("compacting stream buffer, dropping {} consumed bytes", self.pos);
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
    }

}

/// Encodes values as elements of a stream.
#[derive(Debug, Clone)]
pub struct StreamEncoder<T: ?Sized> {
    encoder: Encoder,
    marker: PhantomData<fn(&T)>,
}

impl<T: Encode + ?Sized> StreamEncoder<T> {

    pub fn new() -> Self {
        Self::with_encoder(Encoder::new())
    }

    pub fn with_encoder(encoder: Encoder) -> Self {
        Self { encoder, marker: PhantomData }
    }

    pub fn encode(&self, value: &T) -> Result<Vec<u8>, EncoderError> {
        let mut out = Vec::new();
        self.encode_into(value, &mut out)?;
        Ok(out)
    }

    pub fn encode_into(&self, value: &T, out: &mut Vec<u8>) -> Result<(), EncoderError> {
        self.encoder.encode_frame_with(|slot| value.encode(slot), out)
    }

    /// Encodes every value, in order, into one buffer.
    pub fn encode_all<'a, I>(&self, values: I) -> Result<Vec<u8>, EncoderError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut out = Vec::new();
        for value in values {
            self.encode_into(value, &mut out)?;
        }
        Ok(out)
    }

}

impl<T: Encode + ?Sized> Default for StreamEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of a decode which does not stop at the first error.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecode<T, E = DecoderError> {
    /// Every element decoded before the error
    pub elements: Vec<T>,
    pub error: Option<E>,
}

/// Decodes the elements of a stream as its chunks arrive.
#[derive(Clone)]
pub struct StreamDecoder<T, E = DecoderError> {
    decoder: Decoder,
    buffer: StreamingBuffer,
    decode: fn(Source<'_>) -> Result<T, E>,
}

impl<T, E> fmt::Debug for StreamDecoder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("decoder", &self.decoder)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl<T: Decode> StreamDecoder<T> {

    pub fn new() -> Self {
        Self::with_decoder(Decoder::new())
    }

    pub fn with_decoder(decoder: Decoder) -> Self {
        Self::with_fn(decoder, T::decode)
    }

}

impl<T: Decode> Default for StreamDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E: StreamError> StreamDecoder<T, E> {

    /// A decoder which turns every element's root into a `T` with `decode`.
    pub fn with_fn(decoder: Decoder, decode: fn(Source<'_>) -> Result<T, E>) -> Self {
        Self { decoder, buffer: StreamingBuffer::new(), decode }
    }

    /// Adds `bytes` to the stream and returns every element completed by them. Stops at the
    /// first error. The failing element stays in the buffer, elements decoded earlier in the
    /// same call are lost.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<T>, E> {
        self.buffer.add_bytes(bytes);
        let mut elements = Vec::new();
        while let Some(element) = self.next_element()? {
            elements.push(element);
        }
        Ok(elements)
    }

    /// Like `feed`, but keeps the elements decoded before an error. After an error the rest of
    /// the buffer is discarded, since the stream can not be resynchronized.
    pub fn feed_returning_partial_on_error(&mut self, bytes: &[u8]) -> PartialDecode<T, E> {
        self.buffer.add_bytes(bytes);
        let mut elements = Vec::new();
        loop {
            match self.next_element() {
                Ok(Some(element)) => elements.push(element),
                Ok(None) => return PartialDecode { elements, error: None },
                Err(error) => {
                    debug!("discarding {} buffered bytes after a stream error", self.buffer.buffered_len());
                    self.buffer.clear();
                    return PartialDecode { elements, error: Some(error) };
                },
            }
        }
    }

    pub fn has_pending_bytes(&self) -> bool {
        self.buffer.has_more_bytes()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.buffered_len()
    }

    /// Ends the stream. Fails if an incomplete element is left over.
    pub fn finish(self) -> Result<(), E> {
        if self.has_pending_bytes() {
            Err(DecodeError::InsufficientData.at(&CodingPath::root()).into())
        } else {
            Ok(())
        }
    }

    fn next_element(&mut self) -> Result<Option<T>, E> {
        let decoder = &self.decoder;
        let decode = self.decode;
        self.buffer.try_decode_one(|bytes| decoder.decode_element_with(bytes, decode))
    }

}

/// The undecoded message of one stream element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    pub nil: bool,
    pub message: Vec<u8>,
}

impl RawElement {

    /// Splits the element at the start of `bytes` off, returning it and the number of bytes its
    /// frame occupies.
    pub fn split(decoder: &Decoder, bytes: &[u8]) -> Result<(Self, usize), DecoderError> {
        let (message, nil, consumed) = decoder.frame(bytes)?;
        Ok((RawElement { nil, message: message.to_vec() }, consumed))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Corruption;
    use std::collections::BTreeMap;

    fn elements() -> Vec<Vec<u32>> {
        vec![vec![1, 2, 3], vec![], vec![300, u32::MAX], vec![0]]
    }

    #[test]
    fn framing() {
        let encoder = StreamEncoder::<u32>::new();
        assert_eq!(encoder.encode(&5).unwrap(), [0x02, 0x05]);
        let encoder = StreamEncoder::<Option<u32>>::new();
        assert_eq!(encoder.encode(&None).unwrap(), [0x01]);
        assert_eq!(encoder.encode(&Some(5)).unwrap(), [0x04, 0x00, 0x05]);
    }

    #[test]
    fn byte_at_a_time() {
        let bytes = StreamEncoder::new().encode_all(&elements()).unwrap();
        let mut all_at_once = StreamDecoder::<Vec<u32>>::new();
        assert_eq!(all_at_once.feed(&bytes).unwrap(), elements());

        let mut decoder = StreamDecoder::<Vec<u32>>::new();
        let mut decoded = Vec::new();
        for b in bytes.iter() {
            decoded.extend(decoder.feed(&[*b]).unwrap());
        }
        assert_eq!(decoded, elements());
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn concatenation() {
        let encoder = StreamEncoder::<Vec<u32>>::new();
        let concatenated: Vec<u8> = elements().iter().flat_map(|e| encoder.encode(e).unwrap()).collect();
        assert_eq!(concatenated, encoder.encode_all(&elements()).unwrap());
    }

    #[test]
    fn nil_elements() {
        let values = vec![Some("a".to_owned()), None, Some(String::new()), None];
        let bytes = StreamEncoder::new().encode_all(&values).unwrap();
        let mut decoder = StreamDecoder::<Option<String>>::new();
        assert_eq!(decoder.feed(&bytes).unwrap(), values);
    }

    #[test]
    fn incomplete_element_is_retried() {
        let bytes = StreamEncoder::<String>::new().encode(&"hello".to_owned()).unwrap();
        let mut decoder = StreamDecoder::<String>::new();
        assert!(decoder.feed(&bytes[..3]).unwrap().is_empty());
        assert!(decoder.has_pending_bytes());
        assert_eq!(decoder.buffered_len(), 3);
        assert_eq!(decoder.feed(&bytes[3..]).unwrap(), ["hello".to_owned()]);
        assert!(!decoder.has_pending_bytes());
    }

    #[test]
    fn finish_with_leftovers() {
        let mut decoder = StreamDecoder::<u32>::new();
        decoder.feed(&[0x04]).unwrap();
        let e = decoder.finish().unwrap_err();
        assert_eq!(e.kind(), &DecodeError::InsufficientData);
    }

    #[test]
    fn truncated_inside_complete_frame() {
        // a frame of two bytes holding a field which claims five bytes of payload
        let mut decoder = StreamDecoder::<BTreeMap<u64, String>>::new();
        let e = decoder.feed(&[0x04, 0x12, 0x0a]).unwrap_err();
        assert_eq!(e.kind(), &DecodeError::Corrupted(Corruption::Truncated));
    }

    #[test]
    fn abort_keeps_the_buffer() {
        let mut bytes = StreamEncoder::<bool>::new().encode(&true).unwrap();
        bytes.extend_from_slice(&[0x02, 0x07]);
        let mut decoder = StreamDecoder::<bool>::new();
        let e = decoder.feed(&bytes).unwrap_err();
        assert_eq!(e.kind(), &DecodeError::Corrupted(Corruption::InvalidBool(7)));
        assert_eq!(decoder.buffered_len(), 2);
    }

    #[test]
    fn partial_results() {
        let encoder = StreamEncoder::<bool>::new();
        let mut bytes = encoder.encode_all(&[true, false]).unwrap();
        bytes.extend_from_slice(&[0x02, 0x07]);
        bytes.extend(encoder.encode(&true).unwrap());

        let mut decoder = StreamDecoder::<bool>::new();
        let partial = decoder.feed_returning_partial_on_error(&bytes);
        assert_eq!(partial.elements, [true, false]);
        assert_eq!(partial.error.map(DecoderError::into_inner), Some(DecodeError::Corrupted(Corruption::InvalidBool(7))));
        assert!(!decoder.has_pending_bytes());

        let partial = decoder.feed_returning_partial_on_error(&encoder.encode(&false).unwrap());
        assert_eq!(partial, PartialDecode { elements: vec![false], error: None });
    }

    #[test]
    fn compaction() {
        let encoder = StreamEncoder::<String>::new();
        let element = encoder.encode(&"x".repeat(100)).unwrap();
        let mut buffer = StreamingBuffer::new();
        let decoder = Decoder::new();
        for _ in 0..100 {
            buffer.add_bytes(&element);
        }
        buffer.add_bytes(&element[..10]);
        let mut count = 0;
        while let Some(s) = buffer.try_decode_one(|b| decoder.decode_element_with(b, String::decode)).unwrap() {
            assert_eq!(s.len(), 100);
            count += 1;
            assert!(buffer.capacity_used() - buffer.buffered_len() < COMPACTION_THRESHOLD);
        }
        assert_eq!(count, 100);
        assert_eq!(buffer.buffered_len(), 10);
    }

    #[test]
    fn raw_elements() {
        let bytes = StreamEncoder::<Option<u32>>::new().encode_all(&[Some(1), None]).unwrap();
        let decoder = Decoder::new();
        let mut buffer = StreamingBuffer::new();
        buffer.add_bytes(&bytes);
        let first = buffer.try_decode_one(|b| RawElement::split(&decoder, b)).unwrap();
        assert_eq!(first, Some(RawElement { nil: false, message: vec![0x00, 0x01] }));
        let second = buffer.try_decode_one(|b| RawElement::split(&decoder, b)).unwrap();
        assert_eq!(second, Some(RawElement { nil: true, message: vec![] }));
        assert_eq!(buffer.try_decode_one(|b| RawElement::split(&decoder, b)).unwrap(), None);
    }

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Encode for Point {
        fn encode(&self, slot: &mut crate::encoder::Slot<'_>) -> Result<(), EncoderError> {
            let mut keyed = slot.begin_keyed()?;
            keyed.put(1, &self.x)?;
            keyed.put(2, &self.y)
        }
    }

    impl Decode for Point {
        fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
            let keyed = source.keyed()?;
            Ok(Point { x: keyed.decode(1)?, y: keyed.decode(2)? })
        }
    }

    #[test]
    fn protobuf_stream() {
        let points = vec![Point { x: 1, y: -1 }, Point { x: 0, y: 0 }, Point { x: 150, y: 0 }];
        let bytes = StreamEncoder::with_encoder(Encoder::protobuf()).encode_all(&points).unwrap();
        assert_eq!(&bytes[..3], [0x0d, 0x08, 0x01]);
        assert_eq!(&bytes[14..16], [0x00, 0x03]);
        let mut decoder = StreamDecoder::<Point>::with_decoder(Decoder::protobuf());
        assert_eq!(decoder.feed(&bytes).unwrap(), points);
    }

}
