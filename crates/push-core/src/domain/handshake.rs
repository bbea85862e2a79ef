//! Parsed handshake metadata attached to a connection.
//!
//! The handshake collaborator reads the client's opening request and stores
//! the negotiation fields it recognises here.  Only a fixed set of fields is
//! kept; anything else in the request is ignored.  An absent field means the
//! client did not send it, which is not an error.

use std::fmt;

/// The closed set of negotiation fields a handshake may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    Host,
    Connection,
    Upgrade,
    Origin,
    Protocol,
    /// Current-style key material.
    Key,
    /// First legacy key.
    Key1,
    /// Second legacy key.
    Key2,
    Version,
    ContentType,
    Extensions,
}

impl HeaderField {
    /// Every recognised field, in declaration order.
    pub const ALL: [HeaderField; 11] = [
        HeaderField::Host,
        HeaderField::Connection,
        HeaderField::Upgrade,
        HeaderField::Origin,
        HeaderField::Protocol,
        HeaderField::Key,
        HeaderField::Key1,
        HeaderField::Key2,
        HeaderField::Version,
        HeaderField::ContentType,
        HeaderField::Extensions,
    ];

    /// Maps a request header name to its field, ignoring ASCII case.
    ///
    /// Returns `None` for any header that is not part of the negotiation.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.header_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Canonical request header name for the field.
    pub fn header_name(self) -> &'static str {
        match self {
            HeaderField::Host => "Host",
            HeaderField::Connection => "Connection",
            HeaderField::Upgrade => "Upgrade",
            HeaderField::Origin => "Origin",
            HeaderField::Protocol => "Sec-WebSocket-Protocol",
            HeaderField::Key => "Sec-WebSocket-Key",
            HeaderField::Key1 => "Sec-WebSocket-Key1",
            HeaderField::Key2 => "Sec-WebSocket-Key2",
            HeaderField::Version => "Sec-WebSocket-Version",
            HeaderField::ContentType => "Content-Type",
            HeaderField::Extensions => "Sec-WebSocket-Extensions",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// Negotiation metadata collected before a connection is fully established.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeHeaders {
    pub host: Option<String>,
    pub connection: Option<String>,
    pub upgrade: Option<String>,
    pub origin: Option<String>,
    pub protocol: Option<String>,
    pub key: Option<String>,
    pub key1: Option<String>,
    pub key2: Option<String>,
    /// Third legacy key: eight raw bytes that follow the request headers.
    pub key3: Option<Vec<u8>>,
    pub version: Option<String>,
    pub content_type: Option<String>,
    /// Requested resource path from the request line.
    pub resource: Option<String>,
    /// Accept token computed by the handshake in response to the key.
    pub accept: Option<String>,
    pub extensions: Option<String>,
}

impl HandshakeHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under the field named `name`.
    ///
    /// Returns `false`, storing nothing, when `name` is not a recognised
    /// negotiation header.  A repeated header overwrites the earlier value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> bool {
        match HeaderField::from_name(name) {
            Some(field) => {
                *self.slot_mut(field) = Some(value.into());
                true
            }
            None => false,
        }
    }

    /// Returns the value stored for `field`, if the client sent it.
    pub fn get(&self, field: HeaderField) -> Option<&str> {
        let slot = match field {
            HeaderField::Host => &self.host,
            HeaderField::Connection => &self.connection,
            HeaderField::Upgrade => &self.upgrade,
            HeaderField::Origin => &self.origin,
            HeaderField::Protocol => &self.protocol,
            HeaderField::Key => &self.key,
            HeaderField::Key1 => &self.key1,
            HeaderField::Key2 => &self.key2,
            HeaderField::Version => &self.version,
            HeaderField::ContentType => &self.content_type,
            HeaderField::Extensions => &self.extensions,
        };
        slot.as_deref()
    }

    /// `true` when key material in the three-part legacy form is present.
    pub fn is_legacy(&self) -> bool {
        self.key1.is_some() && self.key2.is_some() && self.key3.is_some()
    }

    /// Drops the accept token.
    pub fn release_accept(&mut self) {
        self.accept = None;
    }

    fn slot_mut(&mut self, field: HeaderField) -> &mut Option<String> {
        match field {
            HeaderField::Host => &mut self.host,
            HeaderField::Connection => &mut self.connection,
            HeaderField::Upgrade => &mut self.upgrade,
            HeaderField::Origin => &mut self.origin,
            HeaderField::Protocol => &mut self.protocol,
            HeaderField::Key => &mut self.key,
            HeaderField::Key1 => &mut self.key1,
            HeaderField::Key2 => &mut self.key2,
            HeaderField::Version => &mut self.version,
            HeaderField::ContentType => &mut self.content_type,
            HeaderField::Extensions => &mut self.extensions,
        }
    }
}
