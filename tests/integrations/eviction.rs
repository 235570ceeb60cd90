#[path = "../helpers/mod.rs"]
mod helpers;

use chain_notify::config::NotificationConfig;
use chain_notify::{NotificationDispatcher, NotifierRegistry};
use helpers::mock_transport::ScriptedTransport;
use helpers::recording_notifier::{count, journal, recording_registry, Behavior};
use helpers::test_utils::{advancing_tip, sample_tx};

fn kinds(dispatcher: &NotificationDispatcher) -> Vec<String> {
    dispatcher
        .notifiers()
        .iter()
        .map(|n| n.kind().to_string())
        .collect()
}

#[test]
fn test_failing_middle_notifier_is_evicted_and_shut_down_once() {
    let journal = journal();
    let registry = recording_registry(
        &journal,
        &[
            ("pub1", Behavior::Healthy),
            ("pub2", Behavior::FailFrom(1)),
            ("pub3", Behavior::Healthy),
        ],
    );
    let config = NotificationConfig::default()
        .with("pub1", "a")
        .with("pub2", "b")
        .with("pub3", "c");
    let mut dispatcher =
        NotificationDispatcher::create(&config, &registry, ScriptedTransport::new().arc())
            .unwrap();

    dispatcher.on_transaction(&sample_tx(1));

    assert_eq!(kinds(&dispatcher), vec!["pub1", "pub3"]);
    assert_eq!(count(&journal, "pub2:shutdown"), 1);
    assert_eq!(count(&journal, "pub3:transaction"), 1);

    // Eviction is permanent: pub2 sees nothing more, even at shutdown.
    dispatcher.on_transaction(&sample_tx(2));
    dispatcher.shutdown();
    assert_eq!(count(&journal, "pub2:transaction"), 1);
    assert_eq!(count(&journal, "pub2:shutdown"), 1);
    assert_eq!(count(&journal, "pub1:transaction"), 2);
    assert_eq!(count(&journal, "pub1:shutdown"), 1);
    assert_eq!(count(&journal, "pub3:shutdown"), 1);
}

#[test]
fn test_eviction_after_several_successful_publishes() {
    let journal = journal();
    let registry = recording_registry(
        &journal,
        &[("a", Behavior::FailFrom(3)), ("b", Behavior::Healthy)],
    );
    let config = NotificationConfig::default().with("a", "x").with("b", "y");
    let mut dispatcher =
        NotificationDispatcher::create(&config, &registry, ScriptedTransport::new().arc())
            .unwrap();

    for i in 0..5 {
        dispatcher.on_block_tip(&advancing_tip(10 + i));
    }

    assert_eq!(kinds(&dispatcher), vec!["b"]);
    assert_eq!(count(&journal, "a:block"), 3);
    assert_eq!(count(&journal, "b:block"), 5);
}

#[test]
fn test_transport_failure_evicts_only_that_notifier() {
    let transport = ScriptedTransport::new();
    let config = NotificationConfig::default()
        .with("pubhashtx", "tcp://127.0.0.1:1")
        .with("pubrawtx", "tcp://127.0.0.1:2");
    let mut dispatcher =
        NotificationDispatcher::create(&config, &NotifierRegistry::builtin(), transport.arc())
            .unwrap();

    transport.fail_send("tcp://127.0.0.1:2");
    dispatcher.on_transaction(&sample_tx(1));
    assert_eq!(kinds(&dispatcher), vec!["pubhashtx"]);
    // The evicted notifier held the only reference to its socket.
    assert_eq!(transport.live_sockets(), 1);

    dispatcher.on_transaction(&sample_tx(2));
    let topics = transport.topics();
    assert_eq!(topics.len(), 2);
    assert!(topics
        .iter()
        .all(|(address, topic)| address == "tcp://127.0.0.1:1" && topic == "hashtx"));
}

#[test]
fn test_categories_a_notifier_ignores_never_evict_it() {
    let transport = ScriptedTransport::new();
    let config = NotificationConfig::default().with("pubhashtxlock", "tcp://127.0.0.1:1");
    let mut dispatcher =
        NotificationDispatcher::create(&config, &NotifierRegistry::builtin(), transport.arc())
            .unwrap();

    transport.fail_send("tcp://127.0.0.1:1");
    dispatcher.on_transaction(&sample_tx(1));
    dispatcher.on_block_tip(&advancing_tip(3));
    assert_eq!(dispatcher.len(), 1);

    dispatcher.on_transaction_lock(&sample_tx(1));
    assert!(dispatcher.is_empty());
}

#[test]
fn test_all_notifiers_evicted_leaves_an_active_empty_dispatcher() {
    let journal = journal();
    let registry = recording_registry(
        &journal,
        &[("a", Behavior::FailFrom(1)), ("b", Behavior::FailFrom(1))],
    );
    let config = NotificationConfig::default().with("a", "x").with("b", "y");
    let mut dispatcher =
        NotificationDispatcher::create(&config, &registry, ScriptedTransport::new().arc())
            .unwrap();

    dispatcher.on_transaction(&sample_tx(1));
    assert!(dispatcher.is_empty());
    assert!(dispatcher.is_active());

    dispatcher.on_transaction(&sample_tx(2));
    dispatcher.shutdown();
    assert_eq!(count(&journal, "a:transaction"), 1);
    assert_eq!(count(&journal, "a:shutdown"), 1);
    assert_eq!(count(&journal, "b:shutdown"), 1);
}
