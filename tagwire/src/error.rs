use crate::key::{CodingPath, Key};
use crate::wire::WireType;
use std::str::Utf8Error;
use thiserror::Error;

/// A `DecodeError` together with the coding path at which it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{inner} at {path}")]
pub struct DecoderError {
    inner: DecodeError,
    path: CodingPath,
}

impl DecoderError {

    pub fn kind(&self) -> &DecodeError {
        &self.inner
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn into_inner(self) -> DecodeError {
        self.inner
    }

    /// True if more input could turn this error into a successful decode.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self.inner, DecodeError::InsufficientData)
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A declared length or a varint continuation ran past the available bytes
    #[error("Unexpected end of data")]
    InsufficientData,
    #[error("Corrupted data: {0}")]
    Corrupted(#[from] Corruption),
    #[error("Not supported by the protobuf format: {0}")]
    Unsupported(#[from] Unsupported),
}

impl DecodeError {
    pub fn at(self, path: &CodingPath) -> DecoderError {
        DecoderError { inner: self, path: path.clone() }
    }
}

/// The reasons why bytes can not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),
    #[error("invalid field number {0}")]
    FieldNumber(u64),
    #[error("integer out of range")]
    IntegerOutOfRange,
    #[error("expected {expected} bytes, found {actual}")]
    InvalidDataSize { expected: usize, actual: usize },
    #[error("key {0} occurs more than once")]
    DuplicateKey(Key),
    #[error("key {0} not found")]
    MissingKey(Key),
    #[error("key {0} has the wrong kind")]
    InvalidKey(Key),
    #[error("invalid Utf-8: {0}")]
    Utf8(Utf8Error),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    #[error("expected wire type {expected}, found {found}")]
    UnexpectedWireType { expected: WireType, found: WireType },
    #[error("invalid boolean {0}")]
    InvalidBool(u64),
    #[error("invalid nil indicator {0:#04x}")]
    InvalidNilIndicator(u8),
    #[error("nil index {0} is out of range or repeated")]
    NilIndex(u64),
    #[error("nil marker followed by {0} payload bytes")]
    NilWithPayload(u64),
    #[error("unexpected nil")]
    UnexpectedNil,
    #[error("declared length runs past the end of its element")]
    Truncated,
    #[error("length {0} exceeds the addressable maximum")]
    Length(u64),
    #[error("an allocation failed")]
    Allocation,
    #[error("{0}")]
    Invalid(String),
}

impl From<Utf8Error> for Corruption {
    fn from(e: Utf8Error) -> Corruption {
        Corruption::Utf8(e)
    }
}

impl From<std::collections::TryReserveError> for Corruption {
    fn from(_e: std::collections::TryReserveError) -> Corruption {
        Corruption::Allocation
    }
}

/// Native features that have no representation in the protobuf format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unsupported {
    #[error("wire type {0} has no protobuf equivalent")]
    WireType(WireType),
    #[error("nil outside of an optional field")]
    Nil,
    #[error("unkeyed container mixes wire types {first} and {found}")]
    MultipleTypesInUnkeyedContainer { first: WireType, found: WireType },
    #[error("unkeyed containers can not be nested")]
    NestedUnkeyed,
    #[error("key {0} is not a field number between 1 and 2^29-1")]
    FieldNumber(Key),
    #[error("the root value must be a keyed container")]
    RootNotKeyed,
    #[error("chained base encoding")]
    SuperEncoder,
    #[error("{0} cases of a one-of are populated")]
    MultipleOneOfCases(usize),
}

/// Defects in the code driving the containers, as opposed to problems with the data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Misuse {
    #[error("a container was requested twice for the same value")]
    ContainerRequestedTwice,
    #[error("no container was requested for a value")]
    NoContainer,
    #[error("a single value container was never assigned")]
    NoValue,
    #[error("key {0} was assigned twice")]
    KeyReassigned(Key),
    #[error("a one-of must be encoded as a keyed container")]
    OneOfNotKeyed,
}

/// An `EncodeError` together with the coding path at which it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{inner} at {path}")]
pub struct EncoderError {
    inner: EncodeError,
    path: CodingPath,
}

impl EncoderError {

    pub fn kind(&self) -> &EncodeError {
        &self.inner
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn into_inner(self) -> EncodeError {
        self.inner
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Not supported by the protobuf format: {0}")]
    Unsupported(#[from] Unsupported),
    #[error("Programmer error: {0}")]
    Misuse(#[from] Misuse),
    #[error("Key {0} can not be represented in a tag")]
    InvalidKey(Key),
    #[error("Length {0} exceeds the maximum encodable length")]
    Length(usize),
}

impl EncodeError {
    pub fn at(self, path: &CodingPath) -> EncoderError {
        EncoderError { inner: self, path: path.clone() }
    }
}

/// Errors which a streaming buffer can tell apart from corruption.
pub trait StreamError: From<DecoderError> {

    /// True if the error only means that the element is not complete yet.
    fn is_insufficient_data(&self) -> bool;

    /// Turns an insufficient-data error raised inside a complete frame into corruption, since
    /// waiting for more input can not fix it.
    fn into_truncated(self) -> Self;

}

impl StreamError for DecoderError {

    fn is_insufficient_data(&self) -> bool {
        DecoderError::is_insufficient_data(self)
    }

    fn into_truncated(self) -> Self {
        match self.inner {
            DecodeError::InsufficientData => DecodeError::Corrupted(Corruption::Truncated).at(&self.path),
            _ => self,
        }
    }

}
