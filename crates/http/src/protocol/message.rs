use bytes::{Buf, Bytes};

/// A transport-agnostic frame of an HTTP exchange.
///
/// Both wire protocols are translated into this shape before they reach the
/// request assembler, and every response leaves the response writer in this
/// shape before a transport turns it back into wire frames:
///
/// - `Header(T)`: the head of the message (request head, or response head plus size)
/// - `Payload(PayloadItem::Chunk(_))`: one body chunk
/// - `Payload(PayloadItem::Eof)`: the end-of-message marker
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the header information of type `T`
    Header(T),
    /// Contains a chunk of payload data or the end marker
    Payload(PayloadItem<Data>),
}

/// Represents an item in the HTTP message payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// The size of a payload as declared by its head.
///
/// Bodies in this server are always length-delimited: a request body is bounded
/// by its declared `content-length`, and a response body is fully buffered before
/// its head is written.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Empty payload (no body)
    Empty,
}

impl PayloadSize {
    /// Builds a size from a declared length, mapping zero to [`PayloadSize::Empty`].
    #[inline]
    pub fn from_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    /// Returns true if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Returns the declared length, zero for an empty payload
    #[inline]
    pub fn length(&self) -> u64 {
        match self {
            PayloadSize::Length(length) => *length,
            PayloadSize::Empty => 0,
        }
    }
}

impl<T, D: Buf> Message<T, D> {
    /// Returns true if this message contains payload data
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns true if this message contains header information
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Maps the header of this message, leaving payload frames untouched
    pub fn map_header<U, F: FnOnce(T) -> U>(self, f: F) -> Message<U, D> {
        match self {
            Message::Header(header) => Message::Header(f(header)),
            Message::Payload(item) => Message::Payload(item),
        }
    }
}

impl<T> Message<T> {
    /// Converts the message into a PayloadItem if it contains payload data
    ///
    /// Returns None if the message contains header information
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_size_from_length() {
        assert_eq!(PayloadSize::from_length(0), PayloadSize::Empty);
        assert_eq!(PayloadSize::from_length(12), PayloadSize::Length(12));
        assert_eq!(PayloadSize::Length(12).length(), 12);
        assert_eq!(PayloadSize::Empty.length(), 0);
    }

    #[test]
    fn map_header_keeps_payload() {
        let message: Message<u8> = Message::from(Bytes::from_static(b"abc"));
        let mapped = message.map_header(|h| h.to_string());
        assert!(mapped.is_payload());
        assert_eq!(mapped.into_payload_item().and_then(PayloadItem::into_bytes), Some(Bytes::from_static(b"abc")));

        let message: Message<u8> = Message::Header(7);
        assert!(message.map_header(|h| h + 1).is_header());
    }
}
