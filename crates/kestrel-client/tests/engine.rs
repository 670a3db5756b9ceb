//! End-to-end engine tests against the scripted mock runtime.
//!
//! The connection backend is process-global and sessions are matched to
//! expectations in connection order, so every test takes the serial guard.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;

use kestrel_client::prelude::*;
use kestrel_client::{PubSubChannelMode, PubSubSubscriptions};
use kestrel_runtime::{cursor_is_registered, PushKind, MAX_REQUEST_ARGS_LEN};
use kestrel_testkit::{MockReply, MockRuntime, SessionHandle};

const UNEXPECTED_CLOSE: &str = "The communication layer was unexpectedly closed.";

fn serial() -> &'static tokio::sync::Mutex<()> {
    static GUARD: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| tokio::sync::Mutex::new(()))
}

fn base_config() -> ClientConfig {
    ClientConfig {
        addresses: vec![NodeAddress::new("localhost", 6379)],
        ..Default::default()
    }
}

fn pubsub_config() -> ClientConfig {
    let mut config = base_config();
    config.pubsub_subscriptions = Some(PubSubSubscriptions {
        channels_and_patterns: HashMap::from([(
            PubSubChannelMode::Exact,
            HashSet::from([b"updates".to_vec()]),
        )]),
        callback: None,
    });
    config
}

async fn expect_session() -> SessionHandle {
    MockRuntime::global().expect_session()
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("test step timed out")
}

#[tokio::test]
async fn basic_round_trip_recycles_the_slot() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| match request.request_type() {
        Some(RequestType::Get) => MockReply::Value(Value::BulkString(b"v".to_vec())),
        _ => MockReply::Null,
    });

    let client = within(Client::create(base_config())).await.unwrap();
    let value = within(client.get("k")).await.unwrap();
    assert_eq!(value, Value::BulkString(b"v".to_vec()));

    let requests = session.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request_type(), Some(RequestType::Get));
    assert_eq!(requests[0].single_args(), vec![b"k".to_vec()]);
    // Slot 0 went to the handshake; the first command takes slot 1.
    assert_eq!(requests[0].request.callback_idx, 1);

    // The slot returned to the free list and the next request reuses it.
    within(client.get("k")).await.unwrap();
    assert_eq!(session.requests()[1].request.callback_idx, 1);

    client.close(None).await;
}

#[tokio::test]
async fn handshake_carries_the_connection_configuration() {
    let _guard = serial().lock().await;
    let session = expect_session().await;

    let mut config = base_config();
    config.credentials = Some(ServerCredentials::with_username("user1", "passwordA"));
    config.database_id = 2;
    config.client_name = Some("kestrel-test".to_string());

    let client = within(Client::create(config)).await.unwrap();

    let handshake = session.connection_request().unwrap();
    assert_eq!(handshake.addresses.len(), 1);
    assert_eq!(handshake.addresses[0].host, "localhost");
    assert!(!handshake.cluster_mode_enabled);
    assert_eq!(handshake.database_id, 2);
    assert_eq!(handshake.client_name, "kestrel-test");
    let auth = handshake.authentication_info.unwrap();
    assert_eq!(auth.username, "user1");
    assert_eq!(auth.password, "passwordA");

    client.close(None).await;
}

#[tokio::test]
async fn rejected_handshake_fails_creation() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_handshake_reply(MockReply::Value(Value::SimpleString(
        "ERR invalid configuration".to_string(),
    )));

    let err = within(Client::create(base_config())).await.unwrap_err();
    assert!(err.is_closing());
    assert!(err.to_string().contains("invalid configuration"));
}

#[tokio::test]
async fn large_arguments_are_promoted_to_a_pointer() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|_| MockReply::Ok);

    let client = within(Client::create(base_config())).await.unwrap();
    let payload = vec![b'a'; MAX_REQUEST_ARGS_LEN];
    let value = within(client.set("k", payload.clone())).await.unwrap();
    assert_eq!(value, Value::Okay);

    let requests = session.requests();
    // The wire message carried a pointer, not inline args, and the runtime
    // reclaimed the exact payload once.
    let reclaimed = requests[0].pointer_args.as_ref().unwrap();
    assert_eq!(reclaimed.len(), 2);
    assert_eq!(reclaimed[0], b"k");
    assert_eq!(reclaimed[1], payload);
    match &requests[0].request.command {
        Some(kestrel_proto::command_request::Command::SingleCommand(command)) => {
            assert!(matches!(
                command.args,
                Some(kestrel_proto::command::Args::ArgsVecPointer(ptr)) if ptr != 0
            ));
        }
        other => panic!("unexpected command: {:?}", other),
    }

    client.close(None).await;
}

#[tokio::test]
async fn script_keys_and_args_move_to_pointers_together() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|_| MockReply::Null);

    let client = within(Client::create(base_config())).await.unwrap();
    let big_arg = vec![b'x'; MAX_REQUEST_ARGS_LEN];
    within(client.invoke_script("abc123", vec![b"key1".to_vec()], vec![big_arg.clone()]))
        .await
        .unwrap();

    let requests = session.requests();
    // Keys are tiny but still travel as a pointer: the union selects.
    assert_eq!(
        requests[0].script_pointer_keys.as_deref(),
        Some(&[b"key1".to_vec()][..])
    );
    assert_eq!(
        requests[0].script_pointer_args.as_deref(),
        Some(&[big_arg][..])
    );

    // A small script stays fully inline.
    within(client.invoke_script("abc123", vec![b"key1".to_vec()], vec![b"v".to_vec()]))
        .await
        .unwrap();
    let requests = session.requests();
    match &requests[1].request.command {
        Some(kestrel_proto::command_request::Command::ScriptInvocation(script)) => {
            assert_eq!(script.hash, "abc123");
            assert_eq!(script.keys, vec![b"key1".to_vec()]);
            assert_eq!(script.args, vec![b"v".to_vec()]);
        }
        other => panic!("unexpected command: {:?}", other),
    }

    client.close(None).await;
}

#[tokio::test]
async fn out_of_order_responses_resolve_their_own_awaiters() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|_| MockReply::None);

    let client = within(Client::create(base_config())).await.unwrap();

    let (r1, r2, r3) = {
        let fut1 = client.get("k1");
        let fut2 = client.get("k2");
        let fut3 = client.get("k3");
        let respond = async {
            session.wait_for_requests(3).await;
            // Complete in order 3, 1, 2.
            for idx in [3u32, 1, 2] {
                session
                    .send_response(
                        idx,
                        MockReply::Value(Value::BulkString(format!("v{idx}").into_bytes())),
                    )
                    .await;
            }
        };
        let joined = tokio::join!(fut1, fut2, fut3, respond);
        (joined.0, joined.1, joined.2)
    };

    // Each awaiter got the response for its own slot.
    assert_eq!(r1.unwrap(), Value::BulkString(b"v1".to_vec()));
    assert_eq!(r2.unwrap(), Value::BulkString(b"v2".to_vec()));
    assert_eq!(r3.unwrap(), Value::BulkString(b"v3".to_vec()));

    // Completion order 3, 1, 2 leaves the LIFO free list handing out 2, 1, 3.
    session.set_responder(|_| MockReply::None);
    let fut4 = client.get("k4");
    let fut5 = client.get("k5");
    let fut6 = client.get("k6");
    let respond = async {
        session.wait_for_requests(6).await;
        for idx in [2u32, 1, 3] {
            session.send_response(idx, MockReply::Null).await;
        }
    };
    let _ = tokio::join!(fut4, fut5, fut6, respond);

    let order: Vec<u32> = session.requests()[3..]
        .iter()
        .map(|r| r.request.callback_idx)
        .collect();
    assert_eq!(order, vec![2, 1, 3]);

    client.close(None).await;
}

#[tokio::test]
async fn atomic_batch_resolves_with_the_result_list() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| {
        match &request.request.command {
            Some(kestrel_proto::command_request::Command::Batch(batch)) => {
                assert!(batch.is_atomic);
                assert!(batch.raise_on_error);
                assert_eq!(batch.commands.len(), 3);
                MockReply::Value(Value::Array(vec![
                    Value::Okay,
                    Value::Int(2),
                    Value::BulkString(b"2".to_vec()),
                ]))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    });

    let client = within(Client::create(base_config())).await.unwrap();
    let mut batch = Batch::new(true);
    batch.set("k", "1").incr("k").get("k");
    let value = within(client.exec(batch, true)).await.unwrap();
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Okay,
            Value::Int(2),
            Value::BulkString(b"2".to_vec()),
        ])
    );

    client.close(None).await;
}

#[tokio::test]
async fn aborted_transaction_resolves_with_null() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    // A WATCH-triggered abort comes back as a null response.
    session.set_responder(|_| MockReply::Null);

    let client = within(Client::create(base_config())).await.unwrap();
    let mut batch = Batch::new(true);
    batch.set("k", "1").incr("k").get("k");
    let value = within(client.exec(batch, true)).await.unwrap();
    assert_eq!(value, Value::Nil);

    client.close(None).await;
}

#[tokio::test]
async fn request_errors_surface_with_their_kind() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| match request.request_type() {
        Some(RequestType::Get) => MockReply::Error(
            kestrel_proto::RequestErrorType::Timeout,
            "deadline exceeded".to_string(),
        ),
        _ => MockReply::Error(
            kestrel_proto::RequestErrorType::ExecAbort,
            "watched key changed".to_string(),
        ),
    });

    let client = within(Client::create(base_config())).await.unwrap();

    let err = within(client.get("k")).await.unwrap_err();
    assert_eq!(
        err.request_kind(),
        Some(kestrel_client::RequestErrorKind::Timeout)
    );
    assert!(err.to_string().contains("deadline exceeded"));

    let err = within(client.incr("k")).await.unwrap_err();
    assert_eq!(
        err.request_kind(),
        Some(kestrel_client::RequestErrorKind::ExecAbort)
    );

    // The session survives request errors.
    assert!(session.is_connected());
    client.close(None).await;
}

#[tokio::test]
async fn push_notification_in_pull_mode() {
    let _guard = serial().lock().await;
    let session = expect_session().await;

    let client = within(Client::create(pubsub_config())).await.unwrap();

    // Notification arrives before any awaiter exists.
    session
        .send_push(
            PushKind::Message,
            vec![
                Value::BulkString(b"updates".to_vec()),
                Value::BulkString(b"hello".to_vec()),
            ],
        )
        .await;

    let message = within(client.get_pubsub_message()).await.unwrap();
    assert_eq!(message.channel, b"updates");
    assert_eq!(message.message, b"hello");
    assert_eq!(message.pattern, None);

    // Exactly-once: nothing left to pull.
    assert_eq!(client.try_get_pubsub_message().unwrap(), None);

    // Subscription confirmations are consumed silently.
    session
        .send_push(
            PushKind::Subscribe,
            vec![Value::BulkString(b"updates".to_vec()), Value::Int(1)],
        )
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.try_get_pubsub_message().unwrap(), None);

    client.close(None).await;
}

#[tokio::test]
async fn pubsub_without_subscriptions_is_a_configuration_error() {
    let _guard = serial().lock().await;
    let _session = expect_session().await;

    let client = within(Client::create(base_config())).await.unwrap();
    let err = client.try_get_pubsub_message().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    let err = within(client.get_pubsub_message()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    client.close(None).await;
}

#[tokio::test]
async fn stream_eof_closes_everything() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|_| MockReply::None);

    let client = std::sync::Arc::new(within(Client::create(pubsub_config())).await.unwrap());

    let cmd1 = {
        let client = client.clone();
        tokio::spawn(async move { client.get("k1").await })
    };
    let cmd2 = {
        let client = client.clone();
        tokio::spawn(async move { client.get("k2").await })
    };
    let push_waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.get_pubsub_message().await })
    };
    within(session.wait_for_requests(2)).await;
    // Let the push awaiter park before the stream drops.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The runtime goes away mid-flight.
    session.shutdown().await;

    for err in [
        within(cmd1).await.unwrap().unwrap_err(),
        within(cmd2).await.unwrap().unwrap_err(),
        within(push_waiter).await.unwrap().unwrap_err(),
    ] {
        assert!(
            matches!(&err, Error::Closing(msg) if msg.contains(UNEXPECTED_CLOSE)),
            "unexpected error: {err}"
        );
    }

    // Subsequent calls fail synchronously with a closing error.
    let err = within(client.get("k3")).await.unwrap_err();
    assert!(err.is_closing());

    // Close is idempotent after the reader-triggered close.
    client.close(None).await;
    client.close(None).await;
}

#[tokio::test]
async fn runtime_closing_error_poisons_the_session() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|_| MockReply::None);

    let client = std::sync::Arc::new(within(Client::create(base_config())).await.unwrap());
    let cmd1 = {
        let client = client.clone();
        tokio::spawn(async move { client.get("k1").await })
    };
    let cmd2 = {
        let client = client.clone();
        tokio::spawn(async move { client.get("k2").await })
    };
    within(session.wait_for_requests(2)).await;

    // A closing error on one slot takes the whole session down.
    session
        .send_response(1, MockReply::Closing("fatal runtime error".to_string()))
        .await;

    let err1 = within(cmd1).await.unwrap().unwrap_err();
    assert!(matches!(&err1, Error::Closing(msg) if msg.contains("fatal runtime error")));
    let err2 = within(cmd2).await.unwrap().unwrap_err();
    assert!(err2.is_closing());

    let err = within(client.get("k3")).await.unwrap_err();
    assert!(err.is_closing());
}

#[tokio::test]
async fn password_update_refreshes_the_credentials_snapshot() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| {
        match &request.request.command {
            Some(kestrel_proto::command_request::Command::UpdateConnectionPassword(update)) => {
                assert_eq!(update.password.as_deref(), Some("s3cret"));
                assert!(update.immediate_auth);
                MockReply::Ok
            }
            other => panic!("unexpected command: {:?}", other),
        }
    });

    let mut config = base_config();
    config.credentials = Some(ServerCredentials::new("old"));
    let client = within(Client::create(config)).await.unwrap();

    let value = within(client.update_connection_password(Some("s3cret".to_string()), true))
        .await
        .unwrap();
    assert_eq!(value, Value::Okay);
    assert_eq!(client.current_credentials().unwrap().password, "s3cret");

    client.close(None).await;
}

#[tokio::test]
async fn refresh_iam_token_round_trips() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| {
        match &request.request.command {
            Some(kestrel_proto::command_request::Command::RefreshIamToken(_)) => MockReply::Ok,
            other => panic!("unexpected command: {:?}", other),
        }
    });

    let client = within(Client::create(base_config())).await.unwrap();
    let value = within(client.refresh_iam_token()).await.unwrap();
    assert_eq!(value, Value::Okay);

    client.close(None).await;
}

#[tokio::test]
async fn cluster_scan_advances_and_releases_the_cursor() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| {
        match &request.request.command {
            Some(kestrel_proto::command_request::Command::ClusterScan(scan)) => {
                if scan.cursor == "0" {
                    // First page: mint server-side scan state.
                    kestrel_runtime::register_cluster_scan_cursor("scan-state-42");
                    MockReply::Value(Value::Array(vec![
                        Value::BulkString(b"scan-state-42".to_vec()),
                        Value::Array(vec![
                            Value::BulkString(b"k1".to_vec()),
                            Value::BulkString(b"k2".to_vec()),
                        ]),
                    ]))
                } else {
                    assert_eq!(scan.cursor, "scan-state-42");
                    MockReply::Value(Value::Array(vec![
                        Value::BulkString(b"finished".to_vec()),
                        Value::Array(vec![Value::BulkString(b"k3".to_vec())]),
                    ]))
                }
            }
            other => panic!("unexpected command: {:?}", other),
        }
    });

    let client = within(ClusterClient::create(base_config())).await.unwrap();
    assert!(session.connection_request().unwrap().cluster_mode_enabled);

    let start = ClusterScanCursor::default();
    let (cursor, keys) = within(client.cluster_scan(&start, None, Some(10), None, false))
        .await
        .unwrap();
    assert_eq!(cursor.get_cursor(), "scan-state-42");
    assert_eq!(keys.len(), 2);
    assert!(cursor_is_registered("scan-state-42"));

    let (cursor2, keys2) = within(client.cluster_scan(&cursor, None, None, None, false))
        .await
        .unwrap();
    assert!(cursor2.is_finished());
    assert_eq!(keys2, vec![Value::BulkString(b"k3".to_vec())]);

    // Dropping the cursor releases the runtime's scan state.
    drop(cursor);
    assert!(!cursor_is_registered("scan-state-42"));

    client.close(None).await;
}

#[tokio::test]
async fn concurrent_commands_each_resolve_exactly_once() {
    let _guard = serial().lock().await;
    let session = expect_session().await;
    session.set_responder(|request| {
        let args = request.single_args();
        MockReply::Value(Value::BulkString(args[0].clone()))
    });

    let client = std::sync::Arc::new(within(Client::create(base_config())).await.unwrap());
    let mut tasks = Vec::new();
    for i in 0..32 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let key = format!("key-{i}").into_bytes();
            let value = client.get(key.clone()).await.unwrap();
            assert_eq!(value, Value::BulkString(key));
        }));
    }
    for task in tasks {
        within(task).await.unwrap();
    }

    // In-flight slot ids were unique per request.
    let requests = session.requests();
    assert_eq!(requests.len(), 32);

    client.close(None).await;
}
