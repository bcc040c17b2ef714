//! Integration tests for bucket administration

mod common;

use ::common::bucket::{bucket_timestamp, FileState, MismatchKind};
use ::common::service::{InboxMode, OutboxMode, ReceiveOutcome, Sender};

#[test]
fn test_stats_after_sending() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();

    let first = service.send(Sender::Anonymous, &remote, "one").unwrap();
    service.send(Sender::Anonymous, &remote, "two").unwrap();

    let stats = service.bucket_stats().unwrap();
    assert_eq!(stats.total_messages, 2);
    assert!(stats.total_buckets() >= 1);
    assert!(stats.total_bytes > 0);
    for bucket in &stats.buckets {
        assert!(matches!(bucket.file, FileState::Size(size) if size > 0));
        assert_eq!(bucket.timestamp % service.buckets().window(), 0);
    }

    let window = service.buckets().window();
    let bucket = bucket_timestamp(first.key.timestamp(), window);
    let summary = service.buckets().summary(bucket).unwrap();
    assert!(summary.tokens.contains(&first.key));
    assert_eq!(summary.combined_hash_hex().len(), 64);
}

#[test]
fn test_combined_hash_tracks_tokens() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();

    let sent = service.send(Sender::Anonymous, &remote, "hash me").unwrap();
    let bucket = service.buckets().bucket_of(&sent.key);
    let before = service.buckets().summary(bucket).unwrap().combined_hash;

    service.list_outbox(OutboxMode::Clear).unwrap();
    let after = service.buckets().summary(bucket).unwrap().combined_hash;
    assert_ne!(before, after);

    // rebuilding an unchanged store reproduces the same hash
    service.send(Sender::Anonymous, &remote, "again").unwrap();
    let expected = service.buckets().summary(bucket).map(|s| s.combined_hash);
    service.rescan_buckets().unwrap();
    assert_eq!(
        service.buckets().summary(bucket).map(|s| s.combined_hash),
        expected
    );
}

#[test]
fn test_dump_removes_files_and_summaries() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();
    let sent = service.send(Sender::Anonymous, &remote, "dumped").unwrap();
    let bucket = service.buckets().bucket_of(&sent.key);
    assert!(service.buckets().files().exists(bucket));

    let report = service.bucket_dump().unwrap();
    assert_eq!(report.buckets_evicted, 1);
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.failures, 0);

    let stats = service.bucket_stats().unwrap();
    assert_eq!(stats.total_buckets(), 0);
    assert_eq!(stats.total_messages, 0);
    assert!(!service.buckets().files().exists(bucket));

    // the message itself is still stored
    assert_eq!(
        service
            .list_outbox(OutboxMode::All)
            .unwrap()
            .messages()
            .len(),
        1
    );
}

#[test]
fn test_send_after_dump_indexes_whole_window() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();
    let first = service.send(Sender::Anonymous, &remote, "one").unwrap();

    service.bucket_dump().unwrap();
    let second = service.send(Sender::Anonymous, &remote, "two").unwrap();
    common::assert_buckets_consistent(&service);

    let bucket = service.buckets().bucket_of(&second.key);
    let summary = service.buckets().summary(bucket).unwrap();
    assert!(summary.tokens.contains(&second.key));
    if service.buckets().bucket_of(&first.key) == bucket {
        assert_eq!(summary.len(), 2);
    }
    // only the new message has a record in the fresh file
    assert_eq!(service.buckets().files().read(bucket).unwrap().len(), 1);
    assert!(service.bucket_audit().unwrap().iter().all(|m| m.timestamp != bucket));
}

#[test]
fn test_rescan_restores_summaries_after_dump() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();
    service.send(Sender::Anonymous, &remote, "one").unwrap();
    service.send(Sender::Anonymous, &remote, "two").unwrap();

    service.bucket_dump().unwrap();
    assert_eq!(service.rescan_buckets().unwrap(), 2);
    assert_eq!(service.bucket_stats().unwrap().total_messages, 2);
    common::assert_buckets_consistent(&service);

    // summaries are back but their files are gone
    let audit = service.bucket_audit().unwrap();
    assert!(!audit.is_empty());
    assert!(audit
        .iter()
        .all(|mismatch| mismatch.kind == MismatchKind::TokensWithoutFile));
}

#[test]
fn test_audit_after_clear_reports_leftover_files() {
    let (service, _, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();
    let sent = service.send(Sender::Anonymous, &remote, "cleared").unwrap();
    let bucket = service.buckets().bucket_of(&sent.key);

    assert!(service.bucket_audit().unwrap().is_empty());

    service.list_outbox(OutboxMode::Clear).unwrap();
    let audit = service.bucket_audit().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].timestamp, bucket);
    assert_eq!(audit[0].tokens, 0);
    assert_eq!(audit[0].kind, MismatchKind::FileWithoutTokens);

    let stats = service.bucket_stats().unwrap();
    assert!(matches!(stats.buckets[0].file, FileState::Orphaned(_)));

    service.bucket_dump().unwrap();
    assert!(service.bucket_audit().unwrap().is_empty());
}

#[test]
fn test_inbox_and_outbox_share_buckets() {
    let (sender, _, _sender_dir) = common::setup_test_env();
    let (receiver, receiver_address, _receiver_dir) = common::setup_test_env();
    let receiver_key = receiver
        .resolve_public_key(&receiver_address)
        .unwrap()
        .to_base58();
    sender
        .add_external_key(&receiver_address, &receiver_key)
        .unwrap();
    // the receiver also sends something to itself
    receiver
        .send(Sender::Anonymous, &receiver_address, "self")
        .unwrap();

    let sent = sender
        .send(Sender::Anonymous, &receiver_address, "incoming")
        .unwrap();
    assert!(matches!(
        receiver.receive(&sent.payload).unwrap(),
        ReceiveOutcome::Stored(_)
    ));
    assert_eq!(receiver.bucket_stats().unwrap().total_messages, 2);
    common::assert_buckets_consistent(&receiver);

    receiver.list_inbox(InboxMode::Clear).unwrap();
    assert_eq!(receiver.bucket_stats().unwrap().total_messages, 1);
    common::assert_buckets_consistent(&receiver);
}

#[test]
fn test_index_survives_restart() {
    let (_, remote, remote_key) = common::remote_identity();
    let temp = tempfile::TempDir::new().unwrap();
    let config = common::enabled_config(&temp);
    let expected = {
        let service = ::common::service::MessageService::with_sealed_box(
            config.clone(),
            ::common::directory::AddressDirectory::in_memory(),
        )
        .unwrap();
        service.add_external_key(&remote, &remote_key).unwrap();
        service.send(Sender::Anonymous, &remote, "persisted").unwrap();
        service.buckets().snapshot()
    };

    let service = ::common::service::MessageService::with_sealed_box(
        config,
        ::common::directory::AddressDirectory::in_memory(),
    )
    .unwrap();
    let restored = service.buckets().snapshot();
    assert_eq!(restored.len(), expected.len());
    for (restored, expected) in restored.iter().zip(&expected) {
        assert_eq!(restored.timestamp, expected.timestamp);
        assert_eq!(restored.tokens, expected.tokens);
        assert_eq!(restored.combined_hash, expected.combined_hash);
    }
}
