//! RPC functions as `struct`s implementing [`RemoteCall`](crate::RemoteCall).
//!
//! Functions always serialize their constructor ID first — the server
//! dispatches on it. With the `deserializable-functions` feature they can
//! also be read back, for server-side use.

use crate::{enums, types};

/// Fetches the current server configuration table.
///
/// Always answered by the data center that received it, even when the
/// caller's account lives elsewhere — which is what makes it usable from a
/// session that has just been told to migrate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetConfig {}

impl crate::Identifiable for GetConfig {
    const CONSTRUCTOR_ID: u32 = 0x6b1fd9a4;
}

impl crate::Serializable for GetConfig {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        use crate::Identifiable;
        Self::CONSTRUCTOR_ID.serialize(buf);
    }
}

#[cfg(feature = "deserializable-functions")]
impl crate::Deserializable for GetConfig {
    fn deserialize(_buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        Ok(Self {})
    }
}

impl crate::RemoteCall for GetConfig {
    type Return = types::Config;
}

/// Asks the server to send a login code to `phone_number`.
#[derive(Clone, Debug, PartialEq)]
pub struct SendCode {
    pub phone_number: String,
    pub api_id: i32,
    pub api_hash: String,
}

impl crate::Identifiable for SendCode {
    const CONSTRUCTOR_ID: u32 = 0x2d7e88c5;
}

impl crate::Serializable for SendCode {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        use crate::Identifiable;
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.phone_number.serialize(buf);
        self.api_id.serialize(buf);
        self.api_hash.serialize(buf);
    }
}

#[cfg(feature = "deserializable-functions")]
impl crate::Deserializable for SendCode {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let phone_number = String::deserialize(buf)?;
        let api_id = i32::deserialize(buf)?;
        let api_hash = String::deserialize(buf)?;
        Ok(Self {
            phone_number,
            api_id,
            api_hash,
        })
    }
}

impl crate::RemoteCall for SendCode {
    type Return = types::SentCode;
}

/// Opens a key exchange: the client's nonce plus the target DC binding.
#[derive(Clone, Debug, PartialEq)]
pub struct ReqDhNonce {
    pub nonce: [u8; 16],
    pub dc_id: i32,
    pub test_mode: bool,
}

impl crate::Identifiable for ReqDhNonce {
    const CONSTRUCTOR_ID: u32 = 0x8f44a0e2;
}

impl crate::Serializable for ReqDhNonce {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        use crate::Identifiable;
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.nonce.serialize(buf);
        self.dc_id.serialize(buf);
        self.test_mode.serialize(buf);
    }
}

#[cfg(feature = "deserializable-functions")]
impl crate::Deserializable for ReqDhNonce {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let nonce = <[u8; 16]>::deserialize(buf)?;
        let dc_id = i32::deserialize(buf)?;
        let test_mode = bool::deserialize(buf)?;
        Ok(Self {
            nonce,
            dc_id,
            test_mode,
        })
    }
}

impl crate::RemoteCall for ReqDhNonce {
    type Return = types::DhServerNonce;
}

/// Second key-exchange round: the client's public value `g_b`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReqDhExchange {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub g_b: Vec<u8>,
}

impl crate::Identifiable for ReqDhExchange {
    const CONSTRUCTOR_ID: u32 = 0x54c9073d;
}

impl crate::Serializable for ReqDhExchange {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        use crate::Identifiable;
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.g_b.serialize(buf);
    }
}

#[cfg(feature = "deserializable-functions")]
impl crate::Deserializable for ReqDhExchange {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let nonce = <[u8; 16]>::deserialize(buf)?;
        let server_nonce = <[u8; 16]>::deserialize(buf)?;
        let g_b = Vec::<u8>::deserialize(buf)?;
        Ok(Self {
            nonce,
            server_nonce,
            g_b,
        })
    }
}

impl crate::RemoteCall for ReqDhExchange {
    type Return = enums::DhAnswer;
}
