use crate::store::MessageKey;

/// Marker used in place of a sender address for anonymous messages
pub const ANONYMOUS: &str = "anon";

/// Who a message is sent as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender<'a> {
    Anonymous,
    Address(&'a str),
}

impl<'a> Sender<'a> {
    /// Parse an operator-supplied sender, where `"anon"` means anonymous
    pub fn parse(from: &'a str) -> Self {
        if from == ANONYMOUS {
            Sender::Anonymous
        } else {
            Sender::Address(from)
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            Sender::Anonymous => ANONYMOUS,
            Sender::Address(address) => address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxMode {
    All,
    Unread,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxMode {
    All,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub key: MessageKey,
    /// Local receipt time; for outbox entries, the time of sending
    pub received: i64,
    /// Sender-claimed send time
    pub sent: i64,
    pub from: String,
    pub to: String,
    pub text: String,
}

/// One listed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageView {
    Decrypted(DecryptedMessage),
    /// Placeholder for a message that could not be opened
    Undecryptable {
        key: MessageKey,
        received: i64,
        code: u32,
    },
}

impl MessageView {
    pub fn key(&self) -> &MessageKey {
        match self {
            MessageView::Decrypted(message) => &message.key,
            MessageView::Undecryptable { key, .. } => key,
        }
    }

    pub fn decrypted(&self) -> Option<&DecryptedMessage> {
        match self {
            MessageView::Decrypted(message) => Some(message),
            MessageView::Undecryptable { .. } => None,
        }
    }
}

/// Result of an inbox or outbox listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Messages(Vec<MessageView>),
    /// Number of messages erased by a clear
    Cleared(usize),
}

impl Listing {
    /// Listed messages; empty for a clear
    pub fn messages(&self) -> &[MessageView] {
        match self {
            Listing::Messages(messages) => messages,
            Listing::Cleared(_) => &[],
        }
    }
}

/// A message that was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Key of the outbox entry, also its bucket token
    pub key: MessageKey,
    /// Propagation copy, sealed to the recipient
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Stored(MessageKey),
    Duplicate(MessageKey),
    /// No receiving address could accept the message
    NotForUs,
}
