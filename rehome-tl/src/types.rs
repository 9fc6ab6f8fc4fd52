//! Concrete constructors (bare types) as `struct`s.
//!
//! Bare types serialize without their constructor ID; the ID is written by
//! the boxed [`enums`](crate::enums) wrappers or implied by context (a
//! function's declared return type).

/// One server-advertised endpoint for a data center.
///
/// Received fresh with every configuration fetch; never cached client-side.
#[derive(Clone, Debug, PartialEq)]
pub struct DcOption {
    pub ipv6: bool,
    pub media_only: bool,
    pub this_port_only: bool,
    pub id: i32,
    pub ip_address: String,
    pub port: i32,
}

impl crate::Identifiable for DcOption {
    const CONSTRUCTOR_ID: u32 = 0x7a3c1d52;
}

impl crate::Serializable for DcOption {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (if self.ipv6 { 1 << 0 } else { 0 }
            | if self.media_only { 1 << 1 } else { 0 }
            | if self.this_port_only { 1 << 2 } else { 0 })
        .serialize(buf);
        self.id.serialize(buf);
        self.ip_address.serialize(buf);
        self.port.serialize(buf);
    }
}

impl crate::Deserializable for DcOption {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let _flags = u32::deserialize(buf)?;
        let ipv6 = (_flags & (1 << 0)) != 0;
        let media_only = (_flags & (1 << 1)) != 0;
        let this_port_only = (_flags & (1 << 2)) != 0;
        let id = i32::deserialize(buf)?;
        let ip_address = String::deserialize(buf)?;
        let port = i32::deserialize(buf)?;
        Ok(Self {
            ipv6,
            media_only,
            this_port_only,
            id,
            ip_address,
            port,
        })
    }
}

/// The server configuration table.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub date: i32,
    pub this_dc: i32,
    pub dc_options: Vec<DcOption>,
}

impl crate::Identifiable for Config {
    const CONSTRUCTOR_ID: u32 = 0x9b2e44f7;
}

impl crate::Serializable for Config {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.date.serialize(buf);
        self.this_dc.serialize(buf);
        self.dc_options.serialize(buf);
    }
}

impl crate::Deserializable for Config {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let date = i32::deserialize(buf)?;
        let this_dc = i32::deserialize(buf)?;
        let dc_options = Vec::<DcOption>::deserialize(buf)?;
        Ok(Self {
            date,
            this_dc,
            dc_options,
        })
    }
}

/// Confirmation that a login code was dispatched.
#[derive(Clone, Debug, PartialEq)]
pub struct SentCode {
    pub phone_code_hash: String,
    /// Seconds until the code may be re-requested, when the server says so.
    pub timeout: Option<i32>,
}

impl crate::Identifiable for SentCode {
    const CONSTRUCTOR_ID: u32 = 0x41d06a28;
}

impl crate::Serializable for SentCode {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (if self.timeout.is_some() { 1 << 0 } else { 0 }).serialize(buf);
        self.phone_code_hash.serialize(buf);
        if let Some(ref v) = self.timeout { v.serialize(buf); }
    }
}

impl crate::Deserializable for SentCode {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let _flags = u32::deserialize(buf)?;
        let phone_code_hash = String::deserialize(buf)?;
        let timeout = if (_flags & (1 << 0)) != 0 { Some(i32::deserialize(buf)?) } else { None };
        Ok(Self {
            phone_code_hash,
            timeout,
        })
    }
}

/// Server half of the first key-exchange round: its nonce and DH parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DhServerNonce {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub g: i32,
    pub dh_prime: Vec<u8>,
    pub g_a: Vec<u8>,
}

impl crate::Identifiable for DhServerNonce {
    const CONSTRUCTOR_ID: u32 = 0xc60e51a9;
}

impl crate::Serializable for DhServerNonce {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.g.serialize(buf);
        self.dh_prime.serialize(buf);
        self.g_a.serialize(buf);
    }
}

impl crate::Deserializable for DhServerNonce {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let nonce = <[u8; 16]>::deserialize(buf)?;
        let server_nonce = <[u8; 16]>::deserialize(buf)?;
        let g = i32::deserialize(buf)?;
        let dh_prime = Vec::<u8>::deserialize(buf)?;
        let g_a = Vec::<u8>::deserialize(buf)?;
        Ok(Self {
            nonce,
            server_nonce,
            g,
            dh_prime,
            g_a,
        })
    }
}

/// Server confirmation that the exchange succeeded. `key_check` commits to
/// the derived key without revealing it.
#[derive(Clone, Debug, PartialEq)]
pub struct DhDone {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub key_check: [u8; 16],
}

impl crate::Identifiable for DhDone {
    const CONSTRUCTOR_ID: u32 = 0x3f8a21b4;
}

impl crate::Serializable for DhDone {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.key_check.serialize(buf);
    }
}

impl crate::Deserializable for DhDone {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let nonce = <[u8; 16]>::deserialize(buf)?;
        let server_nonce = <[u8; 16]>::deserialize(buf)?;
        let key_check = <[u8; 16]>::deserialize(buf)?;
        Ok(Self {
            nonce,
            server_nonce,
            key_check,
        })
    }
}

/// Server rejection of the exchange (malformed or out-of-range `g_b`).
#[derive(Clone, Debug, PartialEq)]
pub struct DhAbort {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
}

impl crate::Identifiable for DhAbort {
    const CONSTRUCTOR_ID: u32 = 0xe51b97c3;
}

impl crate::Serializable for DhAbort {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
    }
}

impl crate::Deserializable for DhAbort {
    fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
        let nonce = <[u8; 16]>::deserialize(buf)?;
        let server_nonce = <[u8; 16]>::deserialize(buf)?;
        Ok(Self {
            nonce,
            server_nonce,
        })
    }
}
