use std;
use std::fmt::{self, Display};
use serde::{de, ser};
use tagwire::{DecoderError, EncoderError, StreamError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    // Decode
    Decode(DecoderError),
    Untyped(&'static str),
    NoVariant,
    // Encode
    Encode(EncoderError),
    KeyType,
    VariantInSequence(&'static str),
    Io(std::io::Error),
    // Both
    Message(String),
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Message(msg) => fmt.write_str(msg),
            Error::Encode(e) => write!(fmt, "Encoding error: {}", e),
            Error::Decode(e) => write!(fmt, "Decoding error: {}", e),
            Error::Untyped(what) => write!(fmt, "The wire type of {} is not known, a typed request is required", what),
            Error::NoVariant => fmt.write_str("Enum message without a populated variant"),
            Error::KeyType => write!(fmt, "Map key must be a string, a char or an integer. Maybe use crate `serde_with` to transform the map into a vec of tuples"),
            Error::VariantInSequence(v) => write!(fmt, "Variant `{}` carries data and can not be an element of a protobuf repeated field", v),
            Error::Io(e) => write!(fmt, "Could not write message: {}", e),
        }
    }
}

impl From<EncoderError> for Error {
    fn from(e: EncoderError) -> Error {
        Error::Encode(e)
    }
}

impl From<DecoderError> for Error {
    fn from(e: DecoderError) -> Error {
        Error::Decode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl StreamError for Error {

    fn is_insufficient_data(&self) -> bool {
        matches!(self, Error::Decode(e) if e.is_insufficient_data())
    }

    fn into_truncated(self) -> Self {
        match self {
            Error::Decode(e) => Error::Decode(e.into_truncated()),
            e => e,
        }
    }

}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}
