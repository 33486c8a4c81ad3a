use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mpcall_client::kvs::{Entry, Kvs};
use mpcall_client::{
    CallError, ClientBase, Endpoint, KvsService, RemoteErrorKind, RpcServer, ServerHandle,
};
use mpcall_types::{TypeDescriptor, Typed, Value};
use mpcall_wire::WireValue;

fn start_kvs() -> (ServerHandle, Endpoint) {
    let server = KvsService::new("127.0.0.1_0")
        .with_config(r#"{"param1": 1, "param2": "x"}"#)
        .into_server();
    let handle = server.bind("127.0.0.1:0").expect("server should bind");
    let endpoint = Endpoint::new("127.0.0.1", handle.local_addr().port())
        .with_name("kvs")
        .with_timeout(Duration::from_secs(5));
    (handle, endpoint)
}

#[test]
fn stub_round_trips_over_tcp() {
    let (server, endpoint) = start_kvs();
    let kvs = Kvs::connect(endpoint);

    assert!(kvs.put("a".to_string(), 10).expect("put should succeed"));
    assert!(kvs.put("b".to_string(), 20).expect("put should succeed"));
    assert_eq!(
        kvs.get("a".to_string()).expect("get should succeed"),
        Entry::new("a".to_string(), 10)
    );
    assert_eq!(kvs.get_average().expect("get_average should succeed"), 15.0);
    assert!(kvs.transport().is_connected());

    server.shutdown();
}

#[test]
fn generic_call_with_descriptors() {
    let (server, endpoint) = start_kvs();
    let client = ClientBase::connect(endpoint);

    let put = client
        .call(
            "put",
            &[Value::from("k"), Value::from(42i32)],
            &[TypeDescriptor::string(), TypeDescriptor::int32()],
            &TypeDescriptor::bool(),
        )
        .expect("put should succeed");
    assert_eq!(put, Value::Bool(true));

    let entry = client
        .call("get", &[Value::from("k")], &[TypeDescriptor::string()], &Entry::descriptor())
        .expect("get should succeed");
    assert_eq!(entry.to_string(), "entry{key: k, value: 42}");

    server.shutdown();
}

#[test]
fn admin_calls_over_tcp() {
    let (server, endpoint) = start_kvs();
    let kvs = Kvs::connect(endpoint);
    kvs.put("k".to_string(), 1).expect("put should succeed");

    assert_eq!(
        kvs.get_config().expect("get_config should succeed"),
        r#"{"param1": 1, "param2": "x"}"#
    );
    let status = kvs.get_status().expect("get_status should succeed");
    assert_eq!(status["127.0.0.1_0"]["local_size"], "1");

    let saved = kvs.save("snap").expect("save should succeed");
    assert_eq!(saved["127.0.0.1_0"], "memory:snap");
    kvs.clear().expect("clear should succeed");
    assert!(kvs.get("k".to_string()).is_err());
    assert!(kvs.load("snap").expect("load should succeed"));
    assert_eq!(kvs.get("k".to_string()).expect("get should succeed").value, 1);
    assert!(kvs.do_mix().expect("do_mix should succeed"));

    server.shutdown();
}

#[test]
fn remote_errors_are_classified() {
    let (server, endpoint) = start_kvs();
    let client = ClientBase::connect(endpoint);

    let err = client
        .call("no_such_method", &[], &[], &TypeDescriptor::unit())
        .expect_err("unknown method should fail");
    assert!(matches!(
        err,
        CallError::Remote(ref remote) if remote.kind == RemoteErrorKind::UnknownMethod
    ));

    let err = client
        .call("get", &[Value::from(7i64)], &[TypeDescriptor::int64()], &Entry::descriptor())
        .expect_err("wrong argument type should fail");
    assert!(matches!(
        err,
        CallError::Remote(ref remote) if remote.kind == RemoteErrorKind::TypeMismatch
    ));

    let err = client
        .call("get", &[Value::from("missing")], &[TypeDescriptor::string()], &Entry::descriptor())
        .expect_err("missing key should fail");
    match err {
        CallError::Remote(remote) => {
            assert_eq!(remote.kind, RemoteErrorKind::Application);
            assert_eq!(remote.message(), Some("missing not found"));
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    // Remote errors leave the connection usable.
    assert!(client.transport().is_connected());
    server.shutdown();
}

#[test]
fn timeout_then_reconnect() {
    let server = RpcServer::new()
        .method("slow", |_| {
            thread::sleep(Duration::from_millis(400));
            Ok(WireValue::Nil)
        })
        .method("fast", |params| Ok(params.into_iter().nth(1).unwrap_or(WireValue::Nil)))
        .bind("127.0.0.1:0")
        .expect("server should bind");
    let endpoint = Endpoint::new("127.0.0.1", server.local_addr().port())
        .with_timeout(Duration::from_millis(100));
    let client = ClientBase::connect(endpoint);

    let err = client
        .call("slow", &[], &[], &TypeDescriptor::unit())
        .expect_err("slow call should time out");
    assert!(err.is_timeout(), "{err}");
    assert!(!client.transport().is_connected());

    let echoed: String = client
        .call_as("fast", &[Value::from("again")], &[TypeDescriptor::string()])
        .expect("next call should reconnect");
    assert_eq!(echoed, "again");

    server.shutdown();
}

#[test]
fn shared_client_across_threads() {
    let (server, endpoint) = start_kvs();
    let kvs = Arc::new(Kvs::connect(endpoint));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let kvs = Arc::clone(&kvs);
            thread::spawn(move || {
                let key = format!("key-{i}");
                kvs.put(key.clone(), i).expect("put should succeed");
                kvs.get(key).expect("get should succeed")
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let entry = handle.join().expect("caller thread should finish");
        assert_eq!(entry, Entry::new(format!("key-{i}"), i as i32));
    }
    server.shutdown();
}

#[test]
fn connection_refused_is_a_transport_error() {
    let (server, endpoint) = start_kvs();
    server.shutdown();

    let kvs = Kvs::connect(endpoint.with_timeout(Duration::from_secs(1)));
    let err = kvs.get_average().expect_err("call should fail");
    assert!(err.is_retryable(), "{err}");
}
