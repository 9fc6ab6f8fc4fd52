//! Boxed types as `enum`s implementing [`Deserializable`](crate::Deserializable).
//!
//! A boxed type serializes the constructor ID of whichever variant it holds,
//! so the receiver can dispatch on the wire without context.

use crate::types;

/// Outcome of the second key-exchange round: either the server committed to
/// the derived key, or it refused the client's public value.
#[derive(Clone, Debug, PartialEq)]
pub enum DhAnswer {
    Done(types::DhDone),
    Abort(types::DhAbort),
}

impl crate::Serializable for DhAnswer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        use crate::Identifiable;
        match self {
            Self::Done(x) => {
                types::DhDone::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
            Self::Abort(x) => {
                types::DhAbort::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
        }
    }
}

impl crate::Deserializable for DhAnswer {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        use crate::Identifiable;
        let id = u32::deserialize(buf)?;
        Ok(match id {
            types::DhDone::CONSTRUCTOR_ID => Self::Done(types::DhDone::deserialize(buf)?),
            types::DhAbort::CONSTRUCTOR_ID => Self::Abort(types::DhAbort::deserialize(buf)?),
            _ => return Err(crate::deserialize::Error::UnexpectedConstructor { id }),
        })
    }
}

impl From<types::DhDone> for DhAnswer {
    fn from(x: types::DhDone) -> Self { Self::Done(x) }
}

impl From<types::DhAbort> for DhAnswer {
    fn from(x: types::DhAbort) -> Self { Self::Abort(x) }
}
