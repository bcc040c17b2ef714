//! Integration tests for the messaging flag, options and address directory

mod common;

use ::common::directory::{
    AddressDirectory, AddressFilter, DirectoryError, OptionError, NEW_ADDRESS_ANON,
    NEW_ADDRESS_RECV,
};
use ::common::service::{InboxMode, MessageError, MessageService, OutboxMode, Sender};
use tempfile::TempDir;

fn disabled_service() -> (MessageService, TempDir) {
    let temp = TempDir::new().unwrap();
    let mut config = common::enabled_config(&temp);
    config.enabled = false;
    let service = MessageService::with_sealed_box(config, AddressDirectory::in_memory()).unwrap();
    (service, temp)
}

#[test]
fn test_disabled_service_rejects_operations() {
    let (service, _temp) = disabled_service();
    let (_, remote, remote_key) = common::remote_identity();

    assert!(matches!(
        service.send(Sender::Anonymous, &remote, "x"),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.receive(b"payload"),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.list_inbox(InboxMode::All),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.list_outbox(OutboxMode::Clear),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.add_external_key(&remote, &remote_key),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.list_addresses(AddressFilter::All),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.bucket_stats(),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(matches!(
        service.bucket_dump(),
        Err(MessageError::MessagingDisabled)
    ));
    assert!(service.directory().is_empty());
}

#[test]
fn test_enable_and_disable() {
    let (service, _temp) = disabled_service();
    assert!(!service.is_enabled());
    assert!(matches!(
        service.disable(),
        Err(MessageError::AlreadyInRequestedState("disabled"))
    ));

    service.enable().unwrap();
    assert!(service.is_enabled());
    assert!(matches!(
        service.enable(),
        Err(MessageError::AlreadyInRequestedState("enabled"))
    ));
    assert!(service.bucket_stats().is_ok());

    service.disable().unwrap();
    assert!(!service.is_enabled());
}

#[test]
fn test_enable_reindexes_existing_messages() {
    let temp = TempDir::new().unwrap();
    let (_, remote, remote_key) = common::remote_identity();
    {
        let service = MessageService::with_sealed_box(
            common::enabled_config(&temp),
            AddressDirectory::in_memory(),
        )
        .unwrap();
        service.add_external_key(&remote, &remote_key).unwrap();
        service.send(Sender::Anonymous, &remote, "waiting").unwrap();
    }

    let mut config = common::enabled_config(&temp);
    config.enabled = false;
    let service = MessageService::with_sealed_box(config, AddressDirectory::in_memory()).unwrap();
    service.enable().unwrap();
    assert_eq!(service.bucket_stats().unwrap().total_messages, 1);
    common::assert_buckets_consistent(&service);
}

#[test]
fn test_options_work_while_disabled() {
    let (service, _temp) = disabled_service();
    let options = service.options();
    assert!(options.new_address_recv);
    assert!(options.new_address_anon);

    let updated = service.set_option(NEW_ADDRESS_ANON, false).unwrap();
    assert!(!updated.new_address_anon);
    assert_eq!(service.options(), updated);

    assert!(matches!(
        service.set_option("newAddressColor", true),
        Err(MessageError::Option(OptionError::OptionNotFound(name))) if name == "newAddressColor"
    ));
    assert_eq!(service.options(), updated);
}

#[test]
fn test_new_addresses_follow_options() {
    let (service, _, _temp) = common::setup_test_env();
    service.set_option(NEW_ADDRESS_RECV, false).unwrap();
    service.set_option(NEW_ADDRESS_ANON, false).unwrap();

    let entry = service.generate_address("quiet").unwrap();
    assert!(entry.owned);
    assert!(!entry.receive_enabled);
    assert!(!entry.anon_enabled);
}

#[test]
fn test_list_addresses_filters() {
    let (service, wallet, _temp) = common::setup_test_env();
    let muted = service.generate_address("muted").unwrap().address.to_string();
    service.set_receive_flag(&muted, false).unwrap();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();

    let collect = |filter| -> Vec<String> {
        service
            .list_addresses(filter)
            .unwrap()
            .iter()
            .map(|entry| entry.address.to_string())
            .collect()
    };
    let all = collect(AddressFilter::All);
    assert_eq!(all.len(), 3);
    assert_eq!(collect(AddressFilter::ReceiveEnabled), vec![wallet.clone()]);
    let mut owned = collect(AddressFilter::Wallet);
    owned.sort();
    let mut expected = vec![wallet, muted];
    expected.sort();
    assert_eq!(owned, expected);

    // a snapshot can be walked more than once
    let snapshot = service.list_addresses(AddressFilter::All).unwrap();
    assert_eq!(snapshot.iter().count(), snapshot.iter().count());
}

#[test]
fn test_flag_toggles() {
    let (service, wallet, _temp) = common::setup_test_env();
    let flags = service.set_anon_flag(&wallet, false).unwrap();
    assert!(flags.receive_enabled);
    assert!(!flags.anon_enabled);

    let flags = service.set_receive_flag(&wallet, false).unwrap();
    assert!(!flags.receive_enabled);
    let entry = service.directory().get(&wallet).unwrap();
    assert!(!entry.receive_enabled);
    assert!(!entry.anon_enabled);
}

#[test]
fn test_toggle_unknown_address_changes_nothing() {
    let (service, wallet, _temp) = common::setup_test_env();
    let (_, stranger, _) = common::remote_identity();
    let before = service.directory().get(&wallet).unwrap();

    assert!(matches!(
        service.set_receive_flag(&stranger, false),
        Err(MessageError::Directory(DirectoryError::AddressNotFound(_)))
    ));
    assert!(matches!(
        service.set_anon_flag(&stranger, false),
        Err(MessageError::Directory(DirectoryError::AddressNotFound(_)))
    ));
    assert_eq!(service.directory().len(), 1);
    assert_eq!(service.directory().get(&wallet).unwrap(), before);
}

#[test]
fn test_add_external_key_errors() {
    let (service, wallet, _temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    let (_, _, other_key) = common::remote_identity();

    assert!(matches!(
        service.add_external_key("bogus", &remote_key),
        Err(MessageError::Directory(DirectoryError::InvalidAddress { .. }))
    ));
    assert!(matches!(
        service.add_external_key(&remote, "not base58 !!"),
        Err(MessageError::Directory(DirectoryError::InvalidPublicKey(_)))
    ));
    assert!(matches!(
        service.add_external_key(&remote, &other_key),
        Err(MessageError::Directory(DirectoryError::PublicKeyAddressMismatch(_)))
    ));

    service.add_external_key(&remote, &remote_key).unwrap();
    assert!(matches!(
        service.add_external_key(&remote, &remote_key),
        Err(MessageError::Directory(DirectoryError::AddressAlreadyPresent(_)))
    ));
    let wallet_key = service.resolve_public_key(&wallet).unwrap().to_base58();
    assert!(matches!(
        service.add_external_key(&wallet, &wallet_key),
        Err(MessageError::Directory(DirectoryError::AddressAlreadyPresent(_)))
    ));
}

#[test]
fn test_directory_persists_across_reload() {
    let (service, wallet, temp) = common::setup_test_env();
    let (_, remote, remote_key) = common::remote_identity();
    service.add_external_key(&remote, &remote_key).unwrap();
    service.set_anon_flag(&wallet, false).unwrap();
    let path = service.directory().path().unwrap().to_path_buf();
    drop(service);

    let reloaded = AddressDirectory::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(!reloaded.get(&wallet).unwrap().anon_enabled);
    assert!(reloaded.local_secret(&wallet).is_ok());
    assert!(matches!(
        reloaded.local_secret(&remote),
        Err(DirectoryError::KeyNotFound(_))
    ));
    assert_eq!(
        reloaded.resolve_public_key(&remote).unwrap().to_base58(),
        remote_key
    );
    drop(temp);
}
