//! The decode side of the container interface.
//!
//! Nothing is parsed up front. A `Source` is a view of the bytes of one node, and only turns into
//! a keyed, unkeyed or single value container when the decoded type asks for one. A keyed
//! container scans its span once to find its fields, everything below a field stays untouched
//! until it is requested.

use crate::codable::Decode;
use crate::encoder::{UserInfo, SUPER_KEY};
use crate::error::{Corruption, DecodeError, DecoderError, StreamError, Unsupported};
use crate::key::{CodingPath, Key};
use crate::varint;
use crate::wire::{self, Format, WireType};
use std::collections::{BTreeSet, HashMap};
use std::convert::TryFrom;
use std::rc::Rc;
use std::sync::Arc;

/// Decodes messages into values. A `Decoder` is configuration only and can be reused for any
/// number of messages.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    format: Format,
    user_info: Arc<UserInfo>,
}

impl Decoder {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn protobuf() -> Self {
        Self::with_format(Format::Protobuf)
    }

    pub fn with_format(format: Format) -> Self {
        Self { format, ..Self::default() }
    }

    pub fn with_user_info(mut self, user_info: UserInfo) -> Self {
        self.user_info = Arc::new(user_info);
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    pub fn decode<T: Decode>(&self, bytes: &[u8]) -> Result<T, DecoderError> {
        self.decode_with(bytes, T::decode)
    }

    /// Hands the root of the message in `bytes` to `f`.
    pub fn decode_with<'de, T, E, F>(&self, bytes: &'de [u8], f: F) -> Result<T, E>
    where
        E: From<DecoderError>,
        F: FnOnce(Source<'de>) -> Result<T, E>,
    {
        f(self.root(bytes, false))
    }

    /// Decodes the stream element at the start of `bytes`. Returns the value and the number of
    /// consumed bytes. Fails with insufficient data only if the frame itself is incomplete.
    pub fn decode_element_with<'de, T, E, F>(&self, bytes: &'de [u8], f: F) -> Result<(T, usize), E>
    where
        E: StreamError,
        F: FnOnce(Source<'de>) -> Result<T, E>,
    {
        let (body, nil, consumed) = self.frame(bytes)?;
        let value = f(self.root(body, nil)).map_err(E::into_truncated)?;
        Ok((value, consumed))
    }

    /// Splits the stream element at the start of `bytes` into its body, its nil flag and the
    /// number of bytes the whole frame occupies.
    pub fn frame<'de>(&self, bytes: &'de [u8]) -> Result<(&'de [u8], bool, usize), DecoderError> {
        let root = CodingPath::root();
        let (len, nil, c) = wire::read_length(self.format, bytes).map_err(|e| e.at(&root))?;
        let body = bytes[c..].get(..len).ok_or_else(|| DecodeError::InsufficientData.at(&root))?;
        Ok((body, nil, c + len))
    }

    fn root<'de>(&self, bytes: &'de [u8], nil: bool) -> Source<'de> {
        Source {
            format: self.format,
            user_info: self.user_info.clone(),
            path: CodingPath::root(),
            data: Data::Root { bytes, nil },
        }
    }

}

/// One occurrence of a field. `bytes` holds the payload without its length prefix, for varints it
/// holds the varint itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'de> {
    pub wire: WireType,
    pub bytes: &'de [u8],
    pub nil: bool,
}

#[derive(Debug, Clone)]
enum Data<'de> {
    /// A whole message, delimited by the end of the buffer
    Root { bytes: &'de [u8], nil: bool },
    Field(Field<'de>),
    /// All occurrences of a protobuf field
    Repeated(Vec<Field<'de>>),
    Nil,
    /// The fields of a protobuf message, viewed as the cases of a one-of
    OneOf(Rc<FieldTable<'de>>),
}

/// The fields of a keyed container, in the order of their first occurrence.
#[derive(Debug, Default)]
struct FieldTable<'de> {
    entries: Vec<(Key, Vec<Field<'de>>)>,
    index: HashMap<Key, usize>,
}

impl<'de> FieldTable<'de> {

    fn scan(format: Format, bytes: &'de [u8], path: &CodingPath) -> Result<Self, DecoderError> {
        let mut table = FieldTable::default();
        let mut pos = 0;
        while pos < bytes.len() {
            let (key, wire, c) = wire::read_tag(format, &bytes[pos..]).map_err(|e| e.at(path))?;
            pos += c;
            let payload = wire::read_payload(format, wire, &bytes[pos..]).map_err(|e| e.at(&path.child(key.clone())))?;
            pos += payload.consumed;
            let field = Field { wire, bytes: payload.bytes, nil: payload.nil };
            match table.index.get(&key).copied() {
                Some(i) if format.is_protobuf() => {
                    if let Some((_, fields)) = table.entries.get_mut(i) {
                        fields.push(field);
                    }
                },
                Some(_) => return Err(DecodeError::from(Corruption::DuplicateKey(key.clone())).at(&path.child(key))),
                None => {
                    table.index.insert(key.clone(), table.entries.len());
                    table.entries.push((key, vec![field]));
                },
            }
        }
        Ok(table)
    }

    fn get(&self, key: &Key) -> Option<&[Field<'de>]> {
        self.index.get(key).and_then(|i| self.entries.get(*i)).map(|(_, fields)| fields.as_slice())
    }

}

/// A view of the bytes of one node.
#[derive(Debug, Clone)]
pub struct Source<'de> {
    format: Format,
    user_info: Arc<UserInfo>,
    path: CodingPath,
    data: Data<'de>,
}

impl<'de> Source<'de> {

    fn child(&self, path: CodingPath, data: Data<'de>) -> Self {
        Source { format: self.format, user_info: self.user_info.clone(), path, data }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    /// Builds an error located at this source.
    pub fn error(&self, e: impl Into<DecodeError>) -> DecoderError {
        e.into().at(&self.path)
    }

    /// The wire type of the underlying field, if the wire carries one.
    pub fn wire_type(&self) -> Option<WireType> {
        match &self.data {
            Data::Field(f)     => Some(f.wire),
            Data::Repeated(fs) => fs.last().map(|f| f.wire),
            Data::OneOf(_)     => Some(WireType::LengthPrefixed),
            Data::Root { .. } | Data::Nil => None,
        }
    }

    /// True if the node is nil or a nil root.
    pub fn is_nil(&self) -> bool {
        match &self.data {
            Data::Nil                    => true,
            Data::Field(f)               => f.nil,
            Data::Root { nil, .. }       => *nil,
            Data::Repeated(_) | Data::OneOf(_) => false,
        }
    }

    pub fn keyed(&self) -> Result<KeyedSource<'de>, DecoderError> {
        let bytes = match &self.data {
            Data::OneOf(table) => return Ok(self.keyed_source(table.clone())),
            Data::Root { bytes, nil: false } => *bytes,
            _ => self.field(WireType::LengthPrefixed)?.bytes,
        };
        Ok(self.keyed_source(Rc::new(FieldTable::scan(self.format, bytes, &self.path)?)))
    }

    fn keyed_source(&self, table: Rc<FieldTable<'de>>) -> KeyedSource<'de> {
        KeyedSource { format: self.format, user_info: self.user_info.clone(), path: self.path.clone(), table }
    }

    pub fn unkeyed(&self) -> Result<UnkeyedSource<'de>, DecoderError> {
        let items = match (&self.data, self.format) {
            (Data::Root { .. }, Format::Protobuf) => return Err(self.error(Unsupported::RootNotKeyed)),
            (Data::Repeated(fields), Format::Protobuf) => Items::Protobuf { fields: fields.clone(), next: 0, packed: None },
            (_, Format::Protobuf) => Items::Protobuf { fields: vec![self.field(WireType::LengthPrefixed)?], next: 0, packed: None },
            (Data::Root { bytes, nil: false }, Format::Native) => Items::native(*bytes, &self.path)?,
            (_, Format::Native) => Items::native(self.field(WireType::LengthPrefixed)?.bytes, &self.path)?,
        };
        Ok(UnkeyedSource { format: self.format, user_info: self.user_info.clone(), path: self.path.clone(), items, index: 0 })
    }

    pub fn single_value(&self) -> Result<ValueSource<'de>, DecoderError> {
        let (data, nil) = match &self.data {
            Data::Root { .. } if self.format.is_protobuf() => return Err(self.error(Unsupported::RootNotKeyed)),
            Data::Root { nil: true, .. } => (Data::Nil, true),
            Data::Root { bytes, nil: false } => match bytes.first() {
                None       => return Err(self.error(DecodeError::InsufficientData)),
                Some(0x00) => (Data::Root { bytes: &bytes[1..], nil: false }, false),
                Some(0x01) if bytes.len() == 1 => (Data::Nil, true),
                Some(0x01) => return Err(self.error(Corruption::TrailingBytes(bytes.len() - 1))),
                Some(x)    => return Err(self.error(Corruption::InvalidNilIndicator(*x))),
            },
            data => (data.clone(), self.is_nil()),
        };
        Ok(ValueSource { source: self.child(self.path.clone(), data), nil })
    }

    /// Returns the field holding the payload of a primitive of type `expected`.
    pub fn field(&self, expected: WireType) -> Result<Field<'de>, DecoderError> {
        expected.check(self.format).map_err(|e| self.error(e))?;
        let field = match &self.data {
            Data::Root { .. } if self.format.is_protobuf() => return Err(self.error(Unsupported::RootNotKeyed)),
            Data::Root { nil: true, .. } | Data::Nil => return Err(self.error(Corruption::UnexpectedNil)),
            Data::Root { bytes, nil: false } => return self.root_field(expected, *bytes),
            Data::Field(f) => *f,
            Data::Repeated(fields) => match fields.last() {
                Some(f) => *f,
                None    => return Err(self.error(Corruption::UnexpectedNil)),
            },
            Data::OneOf(_) => return Err(self.error(Corruption::UnexpectedWireType { expected, found: WireType::LengthPrefixed })),
        };
        if field.nil {
            Err(self.error(Corruption::UnexpectedNil))
        } else if field.wire != expected {
            Err(self.error(Corruption::UnexpectedWireType { expected, found: field.wire }))
        } else {
            Ok(field)
        }
    }

    fn root_field(&self, expected: WireType, bytes: &'de [u8]) -> Result<Field<'de>, DecoderError> {
        match expected.fixed_size() {
            Some(size) if size != bytes.len() => {
                return Err(self.error(Corruption::InvalidDataSize { expected: size, actual: bytes.len() }));
            },
            Some(_) => {},
            None if expected == WireType::VarInt => {
                let (_, c) = varint::decode_for(self.format, bytes).map_err(|e| self.error(e))?;
                if c != bytes.len() {
                    return Err(self.error(Corruption::TrailingBytes(bytes.len() - c)));
                }
            },
            None => {},
        }
        Ok(Field { wire: expected, bytes, nil: false })
    }

    pub fn varint(&self) -> Result<u64, DecoderError> {
        let field = self.field(WireType::VarInt)?;
        varint::decode_for(self.format, field.bytes).map(|(v, _)| v).map_err(|e| self.error(e))
    }

    pub fn zigzag(&self) -> Result<i64, DecoderError> {
        self.varint().map(varint::zigzag_decode)
    }

    pub fn byte(&self) -> Result<u8, DecoderError> {
        self.fixed::<1>(WireType::Byte).map(|[b]| b)
    }

    pub fn two_bytes(&self) -> Result<[u8; 2], DecoderError> {
        self.fixed(WireType::TwoByte)
    }

    pub fn four_bytes(&self) -> Result<[u8; 4], DecoderError> {
        self.fixed(WireType::FourByte)
    }

    pub fn eight_bytes(&self) -> Result<[u8; 8], DecoderError> {
        self.fixed(WireType::EightByte)
    }

    fn fixed<const N: usize>(&self, wire: WireType) -> Result<[u8; N], DecoderError> {
        let field = self.field(wire)?;
        <[u8; N]>::try_from(field.bytes)
            .map_err(|_| self.error(Corruption::InvalidDataSize { expected: N, actual: field.bytes.len() }))
    }

    pub fn bytes(&self) -> Result<&'de [u8], DecoderError> {
        self.field(WireType::LengthPrefixed).map(|f| f.bytes)
    }

    pub fn str(&self) -> Result<&'de str, DecoderError> {
        std::str::from_utf8(self.bytes()?).map_err(|e| self.error(Corruption::from(e)))
    }

}

/// Reads the fields of a keyed container by key.
#[derive(Debug, Clone)]
pub struct KeyedSource<'de> {
    format: Format,
    user_info: Arc<UserInfo>,
    path: CodingPath,
    table: Rc<FieldTable<'de>>,
}

impl<'de> KeyedSource<'de> {

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    fn source(&self, key: Key, data: Data<'de>) -> Source<'de> {
        Source { format: self.format, user_info: self.user_info.clone(), path: self.path.child(key), data }
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<Source<'de>> {
        let key = key.into();
        let fields = self.table.get(&key)?;
        let data = match (self.format, fields) {
            (Format::Native, [field]) => Data::Field(*field),
            _ => Data::Repeated(fields.to_vec()),
        };
        Some(self.source(key, data))
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.table.get(&key.into()).is_some()
    }

    /// Nil entries are not written, so a key is nil exactly if it is absent or explicitly
    /// flagged as nil.
    pub fn is_nil_at(&self, key: impl Into<Key>) -> bool {
        match self.table.get(&key.into()) {
            None         => true,
            Some(fields) => fields.iter().all(|f| f.nil),
        }
    }

    /// Keys in the order of their first occurrence.
    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.table.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }

    /// Every key with all of its occurrences.
    pub fn fields(&self) -> impl Iterator<Item = (&Key, &[Field<'de>])> + '_ {
        self.table.entries.iter().map(|(k, fields)| (k, fields.as_slice()))
    }

    /// Decodes the field under `key`. Absent fields decode to `T::absent`, if the type and the
    /// format allow for it.
    pub fn decode<T: Decode>(&self, key: impl Into<Key>) -> Result<T, DecoderError> {
        let key = key.into();
        match self.get(key.clone()) {
            Some(source) => T::decode(source),
            None => T::absent(self.format).ok_or_else(|| self.missing(key)),
        }
    }

    fn missing(&self, key: Key) -> DecoderError {
        let path = self.path.child(key.clone());
        DecodeError::from(Corruption::MissingKey(key)).at(&path)
    }

    /// The source of a sum type written with `KeyedSink::put_one_of`. Under protobuf its cases
    /// are fields of this container.
    pub fn one_of(&self, key: impl Into<Key>) -> Result<Source<'de>, DecoderError> {
        let key = key.into();
        match self.format {
            Format::Native => self.get(key.clone()).ok_or_else(|| self.missing(key)),
            Format::Protobuf => Ok(self.source(key, Data::OneOf(self.table.clone()))),
        }
    }

    pub fn decode_one_of<T: Decode>(&self, key: impl Into<Key>) -> Result<T, DecoderError> {
        T::decode(self.one_of(key)?)
    }

    /// The source of a base type nested with `KeyedSink::put_super_with`.
    pub fn super_source(&self, key: impl Into<Key>) -> Result<Source<'de>, DecoderError> {
        let key = key.into();
        if self.format.is_protobuf() {
            return Err(DecodeError::from(Unsupported::SuperEncoder).at(&self.path.child(key)));
        }
        self.get(key.clone()).ok_or_else(|| self.missing(key))
    }

    /// Decodes a base type nested with `KeyedSink::put_super`.
    pub fn decode_super<T: Decode>(&self) -> Result<T, DecoderError> {
        T::decode(self.super_source(SUPER_KEY)?)
    }

}

#[derive(Debug, Clone)]
enum Items<'de> {
    Native {
        bytes: &'de [u8],
        pos: usize,
        nils: BTreeSet<u64>,
    },
    Protobuf {
        fields: Vec<Field<'de>>,
        next: usize,
        /// A packed run of scalars and the read position inside of it
        packed: Option<(&'de [u8], usize)>,
    },
}

impl<'de> Items<'de> {

    fn native(bytes: &'de [u8], path: &CodingPath) -> Result<Self, DecoderError> {
        let (count, mut pos) = varint::decode(bytes).map_err(|e| e.at(path))?;
        if count > (bytes.len() - pos) as u64 {
            return Err(DecodeError::from(Corruption::Length(count)).at(path));
        }
        let mut nils = BTreeSet::new();
        for _ in 0..count {
            let (index, c) = varint::decode(&bytes[pos..]).map_err(|e| e.at(path))?;
            pos += c;
            if !nils.insert(index) {
                return Err(DecodeError::from(Corruption::NilIndex(index)).at(path));
            }
        }
        Ok(Items::Native { bytes, pos, nils })
    }

}

/// Pulls the elements of an unkeyed container in order.
#[derive(Debug, Clone)]
pub struct UnkeyedSource<'de> {
    format: Format,
    user_info: Arc<UserInfo>,
    path: CodingPath,
    items: Items<'de>,
    index: usize,
}

impl<'de> UnkeyedSource<'de> {

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    /// Index of the element the next call to `next` returns.
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn is_nil_at(&self, index: usize) -> bool {
        match &self.items {
            Items::Native { nils, .. } => nils.contains(&(index as u64)),
            Items::Protobuf { .. }     => false,
        }
    }

    /// True if no element is left. Under protobuf a trailing empty packed field is only
    /// detected by `next`.
    pub fn is_at_end(&self) -> bool {
        match &self.items {
            Items::Native { bytes, pos, nils } => *pos >= bytes.len() && nils.is_empty(),
            Items::Protobuf { fields, next, packed } => {
                *next >= fields.len() && packed.map_or(true, |(bytes, pos)| pos >= bytes.len())
            },
        }
    }

    /// Returns the next element, which the caller expects to be of type `wire`. Nil elements are
    /// returned as nil sources without consuming any bytes.
    pub fn next(&mut self, wire: WireType) -> Result<Option<Source<'de>>, DecoderError> {
        let path = self.path.child(Key::index(self.index));
        let data = match &mut self.items {
            Items::Native { bytes, pos, nils } => {
                if nils.remove(&(self.index as u64)) {
                    Data::Nil
                } else if *pos >= bytes.len() {
                    return match nils.iter().next() {
                        Some(index) => Err(DecodeError::from(Corruption::NilIndex(*index)).at(&self.path)),
                        None        => Ok(None),
                    };
                } else {
                    let payload = wire::read_payload(Format::Native, wire, &bytes[*pos..]).map_err(|e| e.at(&path))?;
                    *pos += payload.consumed;
                    Data::Field(Field { wire, bytes: payload.bytes, nil: payload.nil })
                }
            },
            Items::Protobuf { fields, next, packed } => {
                wire.check(Format::Protobuf).map_err(|e| DecodeError::from(e).at(&path))?;
                loop {
                    if let Some((run, pos)) = packed {
                        if *pos < run.len() {
                            let payload = wire::read_payload(Format::Protobuf, wire, &run[*pos..]).map_err(|e| e.at(&path))?;
                            *pos += payload.consumed;
                            break Data::Field(Field { wire, bytes: payload.bytes, nil: false });
                        }
                        *packed = None;
                    }
                    let field = match fields.get(*next) {
                        Some(field) => *field,
                        None        => return Ok(None),
                    };
                    *next += 1;
                    if field.wire == wire {
                        break Data::Field(field);
                    } else if field.wire == WireType::LengthPrefixed && wire != WireType::LengthPrefixed {
                        *packed = Some((field.bytes, 0));
                    } else {
                        return Err(DecodeError::from(Corruption::UnexpectedWireType { expected: wire, found: field.wire }).at(&path));
                    }
                }
            },
        };
        self.index += 1;
        Ok(Some(Source { format: self.format, user_info: self.user_info.clone(), path, data }))
    }

    pub fn decode_next<T: Decode>(&mut self) -> Result<Option<T>, DecoderError> {
        match self.next(T::wire_type(self.format))? {
            Some(source) => T::decode(source).map(Some),
            None         => Ok(None),
        }
    }

}

/// The content of a single value container.
#[derive(Debug, Clone)]
pub struct ValueSource<'de> {
    source: Source<'de>,
    nil: bool,
}

impl<'de> ValueSource<'de> {

    pub fn is_nil(&self) -> bool {
        self.nil
    }

    pub fn get(&self) -> Result<Source<'de>, DecoderError> {
        if self.nil {
            Err(self.source.error(Corruption::UnexpectedNil))
        } else {
            Ok(self.source.clone())
        }
    }

    pub fn decode<T: Decode>(&self) -> Result<Option<T>, DecoderError> {
        if self.nil {
            Ok(None)
        } else {
            T::decode(self.source.clone()).map(Some)
        }
    }

}
