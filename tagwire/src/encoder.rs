//! The encode side of the container interface.
//!
//! Every value is written into a `Slot`. A slot turns into exactly one node: a primitive, a keyed
//! container, an unkeyed container or a single value container. Containers hand out fresh slots for
//! their children, so the types being encoded only ever see the slot of their own node.

use crate::codable::Encode;
use crate::error::{EncodeError, EncoderError, Misuse, Unsupported};
use crate::key::{CodingPath, Key};
use crate::value::{self, EncodedValue, Keyed, Primitive, Unkeyed};
use crate::wire::{self, Format, WireType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Opaque context made available to every slot and source.
pub type UserInfo = HashMap<String, String>;

/// The key under which `KeyedSink::put_super` nests the encoding of a base type.
pub const SUPER_KEY: &str = "super";

/// Encodes values into messages. An `Encoder` is configuration only and can be reused for any
/// number of messages.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    format: Format,
    sort_keys: bool,
    user_info: Arc<UserInfo>,
}

impl Encoder {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn protobuf() -> Self {
        Self::with_format(Format::Protobuf)
    }

    pub fn with_format(format: Format) -> Self {
        Self { format, ..Self::default() }
    }

    /// Write the entries of keyed containers ordered by key instead of insertion order, which
    /// makes the output independent of the order in which fields were put.
    pub fn sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
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

    pub fn encode<T: Encode + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncoderError> {
        self.encode_with(|slot| value.encode(slot))
    }

    /// Encodes whatever `f` writes into the root slot.
    pub fn encode_with<E, F>(&self, f: F) -> Result<Vec<u8>, E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let (value, depth) = self.build(f)?;
        let mut out = Vec::new();
        value::write_root(self.format, self.sort_keys, &value, depth, &mut out);
        Ok(out)
    }

    /// Like `encode_with`, but frames the message as one element of a stream.
    pub fn encode_frame_with<E, F>(&self, f: F, out: &mut Vec<u8>) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let (value, depth) = self.build(f)?;
        value::write_frame(self.format, self.sort_keys, &value, depth, out);
        Ok(())
    }

    fn build<E, F>(&self, f: F) -> Result<(EncodedValue, usize), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let mut slot = Slot::new(self, CodingPath::root(), Position::Root);
        f(&mut slot)?;
        Ok(slot.finish()?)
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Root,
    Field,
    Element,
}

enum SlotState {
    Empty,
    Primitive(Primitive),
    Keyed(KeyedBuilder),
    Unkeyed(Unkeyed),
    Single(Option<(EncodedValue, usize)>),
}

#[derive(Default)]
struct KeyedBuilder {
    keyed: Keyed,
    keys: HashSet<Key>,
}

/// The place a single node gets written to.
pub struct Slot<'c> {
    encoder: &'c Encoder,
    path: CodingPath,
    position: Position,
    state: SlotState,
}

impl<'c> Slot<'c> {

    fn new(encoder: &'c Encoder, path: CodingPath, position: Position) -> Self {
        Self { encoder, path, position, state: SlotState::Empty }
    }

    pub fn format(&self) -> Format {
        self.encoder.format
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.encoder.user_info
    }

    /// Builds an error located at this slot.
    pub fn error(&self, e: impl Into<EncodeError>) -> EncoderError {
        e.into().at(&self.path)
    }

    pub fn primitive(&mut self, value: Primitive) -> Result<(), EncoderError> {
        self.enter()?;
        self.root_must_be_keyed()?;
        value.wire_type().check(self.format()).map_err(|e| self.error(e))?;
        if let Primitive::LengthPrefixed(bytes) = &value {
            wire::check_length(self.format(), bytes.len()).map_err(|e| e.at(&self.path))?;
        }
        self.state = SlotState::Primitive(value);
        Ok(())
    }

    pub fn begin_keyed(&mut self) -> Result<KeyedSink<'_, 'c>, EncoderError> {
        self.enter()?;
        let Slot { encoder, path, state, .. } = self;
        *state = SlotState::Keyed(KeyedBuilder::default());
        match state {
            SlotState::Keyed(builder) => Ok(KeyedSink { encoder: *encoder, path, builder }),
            _ => Err(EncodeError::from(Misuse::ContainerRequestedTwice).at(path)),
        }
    }

    pub fn begin_unkeyed(&mut self) -> Result<UnkeyedSink<'_, 'c>, EncoderError> {
        self.enter()?;
        self.root_must_be_keyed()?;
        if self.format().is_protobuf() && self.position == Position::Element {
            return Err(self.error(Unsupported::NestedUnkeyed));
        }
        let Slot { encoder, path, state, .. } = self;
        *state = SlotState::Unkeyed(Unkeyed::default());
        match state {
            SlotState::Unkeyed(unkeyed) => Ok(UnkeyedSink { encoder: *encoder, path, unkeyed }),
            _ => Err(EncodeError::from(Misuse::ContainerRequestedTwice).at(path)),
        }
    }

    pub fn begin_single_value(&mut self) -> Result<ValueSink<'_, 'c>, EncoderError> {
        self.enter()?;
        self.root_must_be_keyed()?;
        let position = match self.position {
            Position::Root => Position::Field,
            p => p,
        };
        let Slot { encoder, path, state, .. } = self;
        *state = SlotState::Single(None);
        match state {
            SlotState::Single(value) => Ok(ValueSink { encoder: *encoder, path, position, value }),
            _ => Err(EncodeError::from(Misuse::ContainerRequestedTwice).at(path)),
        }
    }

    fn enter(&self) -> Result<(), EncoderError> {
        match self.state {
            SlotState::Empty => Ok(()),
            _ => Err(self.error(Misuse::ContainerRequestedTwice)),
        }
    }

    fn root_must_be_keyed(&self) -> Result<(), EncoderError> {
        if self.format().is_protobuf() && self.position == Position::Root {
            Err(self.error(Unsupported::RootNotKeyed))
        } else {
            Ok(())
        }
    }

    /// A detached slot for the value of `key` below this one, for writers which can not nest
    /// their writes in closures. Move it into place with `adopt` once it is complete.
    pub fn child(&self, key: impl Into<Key>) -> Slot<'c> {
        Slot::new(self.encoder, self.path.child(key.into()), Position::Field)
    }

    /// Makes the content of a detached slot the content of this one.
    pub fn adopt(&mut self, child: Slot<'_>) -> Result<(), EncoderError> {
        self.enter()?;
        if !matches!(child.state, SlotState::Keyed(_)) {
            self.root_must_be_keyed()?;
        }
        self.state = child.state;
        Ok(())
    }

    /// Returns a sink for the keyed container this slot already holds, or begins one.
    pub fn resume_keyed(&mut self) -> Result<KeyedSink<'_, 'c>, EncoderError> {
        if let SlotState::Empty = self.state {
            return self.begin_keyed();
        }
        let Slot { encoder, path, state, .. } = self;
        match state {
            SlotState::Keyed(builder) => Ok(KeyedSink { encoder: *encoder, path, builder }),
            _ => Err(EncodeError::from(Misuse::ContainerRequestedTwice).at(path)),
        }
    }

    /// Returns a sink for the unkeyed container this slot already holds, or begins one.
    pub fn resume_unkeyed(&mut self) -> Result<UnkeyedSink<'_, 'c>, EncoderError> {
        if let SlotState::Empty = self.state {
            return self.begin_unkeyed();
        }
        let Slot { encoder, path, state, .. } = self;
        match state {
            SlotState::Unkeyed(unkeyed) => Ok(UnkeyedSink { encoder: *encoder, path, unkeyed }),
            _ => Err(EncodeError::from(Misuse::ContainerRequestedTwice).at(path)),
        }
    }

    /// Returns the node and the number of single value containers wrapped around it.
    fn finish(self) -> Result<(EncodedValue, usize), EncoderError> {
        match self.state {
            SlotState::Empty                   => Err(EncodeError::from(Misuse::NoContainer).at(&self.path)),
            SlotState::Primitive(p)            => Ok((EncodedValue::Primitive(p), 0)),
            SlotState::Keyed(b)                => Ok((EncodedValue::Keyed(b.keyed), 0)),
            SlotState::Unkeyed(u)              => Ok((EncodedValue::Unkeyed(u), 0)),
            SlotState::Single(None)            => Err(EncodeError::from(Misuse::NoValue).at(&self.path)),
            SlotState::Single(Some((v, depth))) => Ok((v, depth + 1)),
        }
    }

}

fn encode_child<E, F>(encoder: &Encoder, path: CodingPath, position: Position, f: F) -> Result<(EncodedValue, usize), E>
where
    E: From<EncoderError>,
    F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
{
    let mut slot = Slot::new(encoder, path, position);
    f(&mut slot)?;
    Ok(slot.finish()?)
}

/// Writes the entries of a keyed container.
pub struct KeyedSink<'s, 'c> {
    encoder: &'c Encoder,
    path: &'s CodingPath,
    builder: &'s mut KeyedBuilder,
}

impl<'s, 'c> KeyedSink<'s, 'c> {

    pub fn format(&self) -> Format {
        self.encoder.format
    }

    pub fn path(&self) -> &CodingPath {
        self.path
    }

    pub fn len(&self) -> usize {
        self.builder.keyed.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.keyed.entries.is_empty()
    }

    pub fn put<T: Encode + ?Sized>(&mut self, key: impl Into<Key>, value: &T) -> Result<(), EncoderError> {
        self.put_with(key, |slot| value.encode(slot))
    }

    pub fn put_with<E, F>(&mut self, key: impl Into<Key>, f: F) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let key = key.into();
        let path = self.path.child(key.clone());
        wire::check_key(self.format(), &key).map_err(|e| e.at(&path))?;
        self.reserve(&key, &path)?;
        let (value, _) = encode_child(self.encoder, path, Position::Field, f)?;
        self.builder.keyed.entries.push((key, value));
        Ok(())
    }

    /// Records a nil entry. Nil entries are not written, so on the wire they can not be told
    /// apart from absent keys.
    pub fn put_nil(&mut self, key: impl Into<Key>) -> Result<(), EncoderError> {
        let key = key.into();
        let path = self.path.child(key.clone());
        wire::check_key(self.format(), &key).map_err(|e| e.at(&path))?;
        self.reserve(&key, &path)?;
        self.builder.keyed.entries.push((key, EncodedValue::Nil));
        Ok(())
    }

    pub fn put_one_of<T: Encode + ?Sized>(&mut self, key: impl Into<Key>, value: &T) -> Result<(), EncoderError> {
        self.put_one_of_with(key, |slot| value.encode(slot))
    }

    /// Puts a sum type whose encoding is a keyed container holding the populated case. Protobuf
    /// has no container for it: the case becomes a field of this container and `key` is unused.
    pub fn put_one_of_with<E, F>(&mut self, key: impl Into<Key>, f: F) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let key = key.into();
        let path = self.path.child(key.clone());
        let protobuf = self.format().is_protobuf();
        if !protobuf {
            wire::check_key(self.format(), &key).map_err(|e| e.at(&path))?;
            self.reserve(&key, &path)?;
        }
        let mut keyed = match encode_child(self.encoder, path.clone(), Position::Field, f)? {
            (EncodedValue::Keyed(keyed), 0) => keyed,
            _ => return Err(EncodeError::from(Misuse::OneOfNotKeyed).at(&path).into()),
        };
        if protobuf {
            let populated = keyed.populated();
            if populated > 1 {
                return Err(EncodeError::from(Unsupported::MultipleOneOfCases(populated)).at(&path).into());
            }
            for (case, _) in keyed.entries.iter() {
                let case_path = self.path.child(case.clone());
                self.reserve(case, &case_path)?;
            }
        }
        keyed.one_of = true;
        self.builder.keyed.entries.push((key, EncodedValue::Keyed(keyed)));
        Ok(())
    }

    /// Nests the encoding of a base type under `SUPER_KEY`.
    pub fn put_super<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), EncoderError> {
        self.put_super_with(SUPER_KEY, |slot| value.encode(slot))
    }

    /// Nests the encoding of a base type under a key of the caller's choice.
    pub fn put_super_with<E, F>(&mut self, key: impl Into<Key>, f: F) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let key = key.into();
        if self.format().is_protobuf() {
            return Err(EncodeError::from(Unsupported::SuperEncoder).at(&self.path.child(key)).into());
        }
        self.put_with(key, f)
    }

    fn reserve(&mut self, key: &Key, path: &CodingPath) -> Result<(), EncoderError> {
        if self.builder.keys.insert(key.clone()) {
            Ok(())
        } else {
            Err(EncodeError::from(Misuse::KeyReassigned(key.clone())).at(path))
        }
    }

}

/// Appends the elements of an unkeyed container.
pub struct UnkeyedSink<'s, 'c> {
    encoder: &'c Encoder,
    path: &'s CodingPath,
    unkeyed: &'s mut Unkeyed,
}

impl<'s, 'c> UnkeyedSink<'s, 'c> {

    pub fn format(&self) -> Format {
        self.encoder.format
    }

    pub fn path(&self) -> &CodingPath {
        self.path
    }

    /// Number of elements appended so far, nil elements included.
    pub fn len(&self) -> usize {
        self.unkeyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unkeyed.is_empty()
    }

    pub fn append<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), EncoderError> {
        self.append_with(|slot| value.encode(slot))
    }

    pub fn append_with<E, F>(&mut self, f: F) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        let path = self.path.child(Key::index(self.len()));
        let (value, _) = encode_child(self.encoder, path.clone(), Position::Element, f)?;
        self.push(value, &path)?;
        Ok(())
    }

    pub fn append_nil(&mut self) -> Result<(), EncoderError> {
        let path = self.path.child(Key::index(self.len()));
        self.push(EncodedValue::Nil, &path)
    }

    fn push(&mut self, value: EncodedValue, path: &CodingPath) -> Result<(), EncoderError> {
        let protobuf = self.format().is_protobuf();
        match value {
            EncodedValue::Nil if protobuf => Err(EncodeError::from(Unsupported::Nil).at(path)),
            EncodedValue::Nil => {
                let index = self.len();
                self.unkeyed.nil_indices.push(index);
                Ok(())
            },
            value => {
                if protobuf {
                    check_homogeneous(self.unkeyed.items.first().map(EncodedValue::wire_type), value.wire_type())
                        .map_err(|e| EncodeError::from(e).at(path))?;
                }
                self.unkeyed.items.push(value);
                Ok(())
            },
        }
    }

}

fn check_homogeneous(first: Option<WireType>, found: WireType) -> Result<(), Unsupported> {
    match first {
        Some(first) if first != found => Err(Unsupported::MultipleTypesInUnkeyedContainer { first, found }),
        _ => Ok(()),
    }
}

/// Sets the value of a single value container. Setting it again replaces the previous value.
pub struct ValueSink<'s, 'c> {
    encoder: &'c Encoder,
    path: &'s CodingPath,
    position: Position,
    value: &'s mut Option<(EncodedValue, usize)>,
}

impl<'s, 'c> ValueSink<'s, 'c> {

    pub fn format(&self) -> Format {
        self.encoder.format
    }

    pub fn path(&self) -> &CodingPath {
        self.path
    }

    pub fn set<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), EncoderError> {
        self.set_with(|slot| value.encode(slot))
    }

    pub fn set_with<E, F>(&mut self, f: F) -> Result<(), E>
    where
        E: From<EncoderError>,
        F: FnOnce(&mut Slot<'_>) -> Result<(), E>,
    {
        *self.value = Some(encode_child(self.encoder, self.path.clone(), self.position, f)?);
        Ok(())
    }

    pub fn set_nil(&mut self) -> Result<(), EncoderError> {
        *self.value = Some((EncodedValue::Nil, 0));
        Ok(())
    }

}
