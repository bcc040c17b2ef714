//! Integration tests for receiving and the inbox

mod common;

use ::common::crypto::{CryptoError, CryptoProvider, SealedBoxProvider};
use ::common::directory::AddressDirectory;
use ::common::service::{
    InboxMode, Listing, MessageError, MessageService, MessageView, ReceiveOutcome, Sender,
    ANONYMOUS, MAX_FUTURE_SKEW_SECS,
};
use ::common::store::Partition;
use tempfile::TempDir;

/// Two enabled services, with the sender knowing the receiver's key
struct Pair {
    sender: MessageService,
    sender_address: String,
    receiver: MessageService,
    receiver_address: String,
    _sender_dir: TempDir,
    _receiver_dir: TempDir,
}

fn setup_pair() -> Pair {
    let (sender, sender_address, sender_dir) = common::setup_test_env();
    let (receiver, receiver_address, receiver_dir) = common::setup_test_env();
    let receiver_key = receiver
        .resolve_public_key(&receiver_address)
        .unwrap()
        .to_base58();
    sender
        .add_external_key(&receiver_address, &receiver_key)
        .unwrap();
    Pair {
        sender,
        sender_address,
        receiver,
        receiver_address,
        _sender_dir: sender_dir,
        _receiver_dir: receiver_dir,
    }
}

#[test]
fn test_receive_then_list_unread() {
    let pair = setup_pair();
    let sent = pair
        .sender
        .send(
            Sender::Address(&pair.sender_address),
            &pair.receiver_address,
            "are you there?",
        )
        .unwrap();

    let outcome = pair.receiver.receive(&sent.payload).unwrap();
    let ReceiveOutcome::Stored(key) = outcome else {
        panic!("expected the message to be stored, got {outcome:?}");
    };
    assert_eq!(key.partition(), Partition::Inbox);
    assert_eq!(key.timestamp(), sent.key.timestamp());

    let listing = pair.receiver.list_inbox(InboxMode::Unread).unwrap();
    assert_eq!(listing.messages().len(), 1);
    let message = listing.messages()[0].decrypted().unwrap();
    assert_eq!(message.key, key);
    assert_eq!(message.from, pair.sender_address);
    assert_eq!(message.to, pair.receiver_address);
    assert_eq!(message.text, "are you there?");
    assert_eq!(message.sent, sent.key.timestamp());

    common::assert_buckets_consistent(&pair.receiver);
}

#[test]
fn test_unread_listing_is_idempotent() {
    let pair = setup_pair();
    for text in ["first", "second"] {
        let sent = pair
            .sender
            .send(Sender::Anonymous, &pair.receiver_address, text)
            .unwrap();
        pair.receiver.receive(&sent.payload).unwrap();
    }

    let first = pair.receiver.list_inbox(InboxMode::Unread).unwrap();
    assert_eq!(first.messages().len(), 2);
    let second = pair.receiver.list_inbox(InboxMode::Unread).unwrap();
    assert!(second.messages().is_empty());

    // read messages still show up in a full listing
    let all = pair.receiver.list_inbox(InboxMode::All).unwrap();
    assert_eq!(all.messages().len(), 2);
    assert!(all
        .messages()
        .iter()
        .all(|view| view.decrypted().unwrap().from == ANONYMOUS));
}

#[test]
fn test_all_listing_does_not_mark_read() {
    let pair = setup_pair();
    let sent = pair
        .sender
        .send(Sender::Anonymous, &pair.receiver_address, "peek")
        .unwrap();
    pair.receiver.receive(&sent.payload).unwrap();

    assert_eq!(
        pair.receiver
            .list_inbox(InboxMode::All)
            .unwrap()
            .messages()
            .len(),
        1
    );
    assert_eq!(
        pair.receiver
            .list_inbox(InboxMode::Unread)
            .unwrap()
            .messages()
            .len(),
        1
    );
}

#[test]
fn test_inbox_clear() {
    let pair = setup_pair();
    let sent = pair
        .sender
        .send(Sender::Anonymous, &pair.receiver_address, "short lived")
        .unwrap();
    let ReceiveOutcome::Stored(key) = pair.receiver.receive(&sent.payload).unwrap() else {
        panic!("expected the message to be stored");
    };

    assert_eq!(
        pair.receiver.list_inbox(InboxMode::Clear).unwrap(),
        Listing::Cleared(1)
    );
    assert!(pair
        .receiver
        .list_inbox(InboxMode::All)
        .unwrap()
        .messages()
        .is_empty());

    let bucket = pair.receiver.buckets().bucket_of(&key);
    let summary = pair.receiver.buckets().summary(bucket).unwrap();
    assert!(!summary.tokens.contains(&key));
    common::assert_buckets_consistent(&pair.receiver);
}

#[test]
fn test_duplicate_receive() {
    let pair = setup_pair();
    let sent = pair
        .sender
        .send(Sender::Anonymous, &pair.receiver_address, "twice")
        .unwrap();

    let ReceiveOutcome::Stored(key) = pair.receiver.receive(&sent.payload).unwrap() else {
        panic!("expected the message to be stored");
    };
    assert_eq!(
        pair.receiver.receive(&sent.payload).unwrap(),
        ReceiveOutcome::Duplicate(key)
    );
    assert_eq!(
        pair.receiver
            .list_inbox(InboxMode::All)
            .unwrap()
            .messages()
            .len(),
        1
    );
    assert_eq!(pair.receiver.bucket_stats().unwrap().total_messages, 1);
}

#[test]
fn test_receive_for_someone_else() {
    let pair = setup_pair();
    let (_, stranger, stranger_key) = common::remote_identity();
    pair.sender.add_external_key(&stranger, &stranger_key).unwrap();
    let sent = pair
        .sender
        .send(Sender::Anonymous, &stranger, "not yours")
        .unwrap();

    assert_eq!(
        pair.receiver.receive(&sent.payload).unwrap(),
        ReceiveOutcome::NotForUs
    );
    assert_eq!(pair.receiver.bucket_stats().unwrap().total_messages, 0);
}

#[test]
fn test_anonymous_rejected_without_anon_flag() {
    let pair = setup_pair();
    pair.receiver
        .set_anon_flag(&pair.receiver_address, false)
        .unwrap();

    let anonymous = pair
        .sender
        .send(Sender::Anonymous, &pair.receiver_address, "who am i")
        .unwrap();
    assert_eq!(
        pair.receiver.receive(&anonymous.payload).unwrap(),
        ReceiveOutcome::NotForUs
    );

    // signed messages still get through
    let signed = pair
        .sender
        .send(
            Sender::Address(&pair.sender_address),
            &pair.receiver_address,
            "it's me",
        )
        .unwrap();
    assert!(matches!(
        pair.receiver.receive(&signed.payload).unwrap(),
        ReceiveOutcome::Stored(_)
    ));
}

#[test]
fn test_receive_disabled_address() {
    let pair = setup_pair();
    pair.receiver
        .set_receive_flag(&pair.receiver_address, false)
        .unwrap();

    let sent = pair
        .sender
        .send(
            Sender::Address(&pair.sender_address),
            &pair.receiver_address,
            "muted",
        )
        .unwrap();
    assert_eq!(
        pair.receiver.receive(&sent.payload).unwrap(),
        ReceiveOutcome::NotForUs
    );
}

#[test]
fn test_receive_rejects_future_timestamp() {
    let (service, address, _temp) = common::setup_test_env();
    let recipient = service.resolve_public_key(&address).unwrap();
    let future = chrono::Utc::now().timestamp() + MAX_FUTURE_SKEW_SECS + 600;
    let payload = SealedBoxProvider
        .seal(None, &recipient, future, "from tomorrow")
        .unwrap();

    let err = service.receive(&payload).unwrap_err();
    assert!(matches!(
        err,
        MessageError::TimestampOutOfRange { timestamp, .. } if timestamp == future
    ));
    assert!(service
        .list_inbox(InboxMode::All)
        .unwrap()
        .messages()
        .is_empty());
}

#[test]
fn test_receive_rejects_time_before_epoch() {
    let (service, address, _temp) = common::setup_test_env();
    let recipient = service.resolve_public_key(&address).unwrap();
    let payload = SealedBoxProvider
        .seal(None, &recipient, -60, "from the past")
        .unwrap();

    assert!(matches!(
        service.receive(&payload).unwrap_err(),
        MessageError::TimestampOutOfRange { timestamp: -60, .. }
    ));
    assert_eq!(service.bucket_stats().unwrap().total_messages, 0);
}

#[test]
fn test_receive_rejects_garbage() {
    let (service, _, _temp) = common::setup_test_env();
    let err = service.receive(b"definitely not a payload").unwrap_err();
    assert!(matches!(err, MessageError::InvalidPayload(_)));
}

#[test]
fn test_inbox_placeholder_when_key_is_gone() {
    let pair = setup_pair();
    let sent = pair
        .sender
        .send(Sender::Anonymous, &pair.receiver_address, "orphaned")
        .unwrap();
    pair.receiver.receive(&sent.payload).unwrap();

    // reopen the receiver's store with a directory that lacks the wallet key
    let Pair {
        receiver,
        _receiver_dir: receiver_dir,
        ..
    } = pair;
    drop(receiver);
    let reopened = MessageService::with_sealed_box(
        common::enabled_config(&receiver_dir),
        AddressDirectory::in_memory(),
    )
    .unwrap();

    let listing = reopened.list_inbox(InboxMode::All).unwrap();
    assert_eq!(listing.messages().len(), 1);
    assert!(matches!(
        listing.messages()[0],
        MessageView::Undecryptable { code, .. } if code == CryptoError::KeyUnavailable.code()
    ));
    // the index was rebuilt from the store on startup
    common::assert_buckets_consistent(&reopened);
}
