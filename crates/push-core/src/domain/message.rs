//! Outbound protocol frame model.
//!
//! A [`Message`] holds one frame in both of its forms: the decoded payload
//! (`msg`) and the ready-to-send wire bytes (`enc`).  The frame codec fills
//! these in; the registry only ever reads `enc`.
//!
//! Large payloads may be split into fragments.  Each fragment after the
//! first hangs off the previous one through `next`, forming a singly linked
//! continuation chain.
//!
//! ```text
//! Message ──next──► Message ──next──► Message ──next──► None
//!  (first)          (continuation)    (continuation)
//! ```

/// The fixed two-byte close control frame (FIN + opcode 0x8, empty payload).
///
/// Sent by [`Registry::close_all`](crate::Registry::close_all) independently
/// of any `Message`.
pub const CLOSE_FRAME: [u8; 2] = [0x88, 0x00];

/// One outbound protocol unit.
///
/// `msg`, `enc` and `next` are independently optional.  A freshly created
/// message has all three absent and every length at zero.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Frame opcode, as set by the codec.
    pub opcode: u8,
    /// Masking key.  Only meaningful when the frame is masked.
    pub mask: [u8; 4],
    /// Decoded payload length declared by the frame.
    pub payload_len: u64,
    /// Total payload length carried by the continuation chain.
    pub next_len: u64,
    /// Decoded payload.
    pub msg: Option<Vec<u8>>,
    /// Encoded wire bytes, sent verbatim by broadcasts.
    pub enc: Option<Vec<u8>>,
    /// Continuation frame, for fragmented sends.
    pub next: Option<Box<Message>>,
}

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message whose encoded bytes are already known.
    pub fn with_encoded(opcode: u8, enc: Vec<u8>) -> Self {
        let mut message = Self::new();
        message.opcode = opcode;
        message.enc = Some(enc);
        message
    }

    /// Number of encoded bytes a broadcast of this message sends.
    pub fn enc_len(&self) -> usize {
        self.enc.as_ref().map_or(0, Vec::len)
    }

    /// Returns the encoded bytes, treating an absent buffer as nothing to send.
    pub fn encoded(&self) -> Option<&[u8]> {
        self.enc.as_deref().filter(|bytes| !bytes.is_empty())
    }

    /// Appends `fragment` at the tail of the continuation chain.
    ///
    /// `next_len` on this (head) message grows by the fragment's declared
    /// payload length.
    pub fn push_continuation(&mut self, fragment: Message) {
        self.next_len += fragment.payload_len;

        let mut tail = &mut self.next;
        while let Some(node) = tail {
            tail = &mut node.next;
        }
        *tail = Some(Box::new(fragment));
    }

    /// Number of frames in the chain, including this one.
    pub fn chain_len(&self) -> usize {
        self.fragments().count()
    }

    /// Iterates over this message followed by every continuation frame.
    pub fn fragments(&self) -> Fragments<'_> {
        Fragments { cursor: Some(self) }
    }

    /// Releases the payload, the wire bytes, and the whole continuation chain.
    ///
    /// The message itself stays valid (and empty) afterwards, so it can be
    /// refilled by the codec.
    pub fn release(&mut self) {
        self.msg = None;
        self.enc = None;
        self.next_len = 0;
        release_chain(self.next.take());
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        // The default drop of `Option<Box<Message>>` recurses once per frame;
        // unlinking in a loop keeps stack depth constant for long chains.
        release_chain(self.next.take());
    }
}

fn release_chain(mut link: Option<Box<Message>>) {
    while let Some(mut node) = link {
        link = node.next.take();
    }
}

/// Iterator over a message and its continuation frames.
pub struct Fragments<'a> {
    cursor: Option<&'a Message>,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = &'a Message;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = current.next.as_deref();
        Some(current)
    }
}
