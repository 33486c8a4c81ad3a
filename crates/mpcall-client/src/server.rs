//! A minimal threaded MessagePack-RPC responder.
//!
//! Used by the `serve` command and by integration tests. Every connection
//! gets its own thread; requests on one connection are answered in order.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mpcall_transport::{RpcListener, RpcStream, TransportError};
use mpcall_types::Typed;
use mpcall_wire::{Message, MessageReader, MessageWriter, Response, WireConfig, WireError, WireValue};
use tracing::{debug, info, warn};

use crate::error::{ERROR_TYPE_MISMATCH, ERROR_UNKNOWN_METHOD};
use crate::kvs::Entry;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A method implementation: full request params in, result or error payload
/// out.
pub type Handler = Arc<dyn Fn(Vec<WireValue>) -> Result<WireValue, WireValue> + Send + Sync>;

/// Method table plus codec limits.
#[derive(Clone, Default)]
pub struct RpcServer {
    methods: HashMap<String, Handler>,
    wire: WireConfig,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wire_config(mut self, wire: WireConfig) -> Self {
        self.wire = wire;
        self
    }

    /// Register `name`; a later registration replaces an earlier one.
    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<WireValue>) -> Result<WireValue, WireValue> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Answer one request. Unknown methods get error code 1.
    pub fn dispatch(&self, method: &str, params: Vec<WireValue>) -> Result<WireValue, WireValue> {
        match self.methods.get(method) {
            Some(handler) => handler(params),
            None => Err(WireValue::from(ERROR_UNKNOWN_METHOD)),
        }
    }

    /// Bind `addr` and serve on a background thread until the handle is
    /// shut down or dropped.
    pub fn bind(self, addr: &str) -> Result<ServerHandle, TransportError> {
        let listener = RpcListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr();
        let shutdown = Arc::new(AtomicBool::new(false));

        let server = Arc::new(self);
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name(format!("mpcall-accept-{}", local_addr.port()))
            .spawn(move || accept_loop(&listener, &server, &flag))?;

        Ok(ServerHandle {
            local_addr,
            shutdown,
            thread: Some(thread),
        })
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("RpcServer")
            .field("methods", &names)
            .finish()
    }
}

fn accept_loop(listener: &RpcListener, server: &Arc<RpcServer>, shutdown: &Arc<AtomicBool>) {
    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    while !shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok(stream) => {
                let server = Arc::clone(server);
                let shutdown = Arc::clone(shutdown);
                let peer = stream.peer_addr();
                match thread::Builder::new()
                    .name("mpcall-conn".to_string())
                    .spawn(move || serve_connection(&server, stream, &shutdown))
                {
                    Ok(worker) => workers.push(worker),
                    Err(err) => warn!(?peer, error = %err, "failed to spawn connection thread"),
                }
                workers.retain(|w| !w.is_finished());
            }
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    for worker in workers {
        let _ = worker.join();
    }
    info!(addr = %listener.local_addr(), "server stopped");
}

fn serve_connection(server: &RpcServer, stream: RpcStream, shutdown: &AtomicBool) {
    let peer = stream.peer_addr();
    let setup = stream
        .set_read_timeout(Some(POLL_INTERVAL))
        .and_then(|()| stream.try_clone());
    let reader_stream = match setup {
        Ok(s) => s,
        Err(err) => {
            warn!(?peer, error = %err, "connection setup failed");
            return;
        }
    };
    let mut reader = MessageReader::with_config(reader_stream, server.wire.clone());
    let mut writer = MessageWriter::with_config(stream, server.wire.clone());
    debug!(?peer, "serving connection");

    while !shutdown.load(Ordering::Acquire) {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(err) if err.is_timeout() => continue,
            Err(WireError::ConnectionClosed) => break,
            Err(err) => {
                warn!(?peer, error = %err, "dropping connection");
                break;
            }
        };
        match message {
            Message::Request(req) => {
                let response = match server.dispatch(&req.method, req.params) {
                    Ok(result) => Response::ok(req.msgid, result),
                    Err(error) => {
                        debug!(?peer, method = %req.method, %error, "request failed");
                        Response::err(req.msgid, error)
                    }
                };
                if let Err(err) = writer.write_message(response.into()) {
                    warn!(?peer, error = %err, "failed to write response");
                    break;
                }
            }
            Message::Notification(note) => {
                let _ = server.dispatch(&note.method, note.params);
            }
            Message::Response(resp) => {
                debug!(?peer, msgid = resp.msgid, "ignoring unexpected response");
            }
        }
    }
    let _ = writer.get_ref().shutdown();
    debug!(?peer, "connection closed");
}

/// A running server. Dropping it stops the server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address, with the real port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close all connections and wait for the threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Block until the server stops.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Flag that stops the server when set; for signal handlers.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Split off the leading service name and check the argument count.
fn args_of(mut params: Vec<WireValue>, count: usize) -> Result<Vec<WireValue>, WireValue> {
    if params.len() != count + 1 {
        return Err(WireValue::from(ERROR_TYPE_MISMATCH));
    }
    params.remove(0);
    Ok(params)
}

fn arg<T: Typed>(wire: WireValue) -> Result<T, WireValue> {
    T::decode(wire).map_err(|_| WireValue::from(ERROR_TYPE_MISMATCH))
}

fn reply<T: Typed>(value: T) -> Result<WireValue, WireValue> {
    value.encode().map_err(|err| WireValue::from(err.to_string()))
}

#[derive(Debug, Default, Clone)]
struct KvsModel {
    data: BTreeMap<String, i32>,
    sum: i64,
}

/// In-memory key-value service with the administrative methods.
#[derive(Debug)]
pub struct KvsService {
    id: String,
    config: String,
    model: Mutex<KvsModel>,
    saved: Mutex<HashMap<String, KvsModel>>,
}

impl KvsService {
    /// `id` names this server in status and save replies.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: "{}".to_string(),
            model: Mutex::new(KvsModel::default()),
            saved: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    fn model(&self) -> std::sync::MutexGuard<'_, KvsModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, key: String, value: i32) -> bool {
        let mut model = self.model();
        let old = model.data.insert(key, value).unwrap_or(0);
        model.sum += i64::from(value) - i64::from(old);
        true
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        self.model()
            .data
            .get(key)
            .map(|&value| Entry::new(key.to_string(), value))
    }

    /// Mean of all values; NaN when empty.
    pub fn get_average(&self) -> f64 {
        let model = self.model();
        model.sum as f64 / model.data.len() as f64
    }

    pub fn len(&self) -> usize {
        self.model().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.model() = KvsModel::default();
    }

    fn status(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let status = BTreeMap::from([
            ("type".to_string(), "kvs".to_string()),
            ("local_size".to_string(), self.len().to_string()),
            ("global_size".to_string(), "0".to_string()),
        ]);
        BTreeMap::from([(self.id.clone(), status)])
    }

    fn save(&self, id: String) -> BTreeMap<String, String> {
        let snapshot = self.model().clone();
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), snapshot);
        BTreeMap::from([(self.id.clone(), format!("memory:{id}"))])
    }

    fn load(&self, id: &str) -> Result<bool, String> {
        let saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = saved
            .get(id)
            .cloned()
            .ok_or_else(|| format!("model {id} not found"))?;
        *self.model() = snapshot;
        Ok(true)
    }

    /// Method table for this service.
    pub fn into_server(self) -> RpcServer {
        let svc = Arc::new(self);
        KVS_METHODS
            .iter()
            .fold(RpcServer::new(), |server, &(name, arity)| {
                let svc = Arc::clone(&svc);
                server.method(name, move |params| svc.handle(name, args_of(params, arity)?))
            })
    }

    fn handle(&self, method: &str, args: Vec<WireValue>) -> Result<WireValue, WireValue> {
        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(WireValue::Nil);
        match method {
            "put" => {
                let key: String = arg(next())?;
                let value: i32 = arg(next())?;
                reply(self.put(key, value))
            }
            "get" => {
                let key: String = arg(next())?;
                match self.get(&key) {
                    Some(entry) => reply(entry),
                    None => Err(WireValue::from(format!("{key} not found"))),
                }
            }
            "get_average" => reply(self.get_average()),
            "get_config" => reply(self.config.clone()),
            "get_status" => reply(self.status()),
            "clear" => {
                self.clear();
                reply(true)
            }
            // Standalone server: there is nothing to mix with.
            "do_mix" => reply(true),
            "save" => {
                let id: String = arg(next())?;
                reply(self.save(id))
            }
            "load" => {
                let id: String = arg(next())?;
                self.load(&id).map_err(WireValue::from).and_then(reply)
            }
            "get_proxy_status" => Err(WireValue::from(format!("{} is not a proxy", self.id))),
            _ => Err(WireValue::from(ERROR_UNKNOWN_METHOD)),
        }
    }
}

/// Served methods and their argument counts, excluding the service name.
const KVS_METHODS: [(&str, usize); 10] = [
    ("put", 2),
    ("get", 1),
    ("get_average", 0),
    ("get_config", 0),
    ("get_status", 0),
    ("clear", 0),
    ("do_mix", 0),
    ("save", 1),
    ("load", 1),
    ("get_proxy_status", 0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::Kvs;

    fn params(items: Vec<WireValue>) -> Vec<WireValue> {
        let mut params = vec![WireValue::from("kvs")];
        params.extend(items);
        params
    }

    #[test]
    fn unknown_method_is_code_one() {
        let server = RpcServer::new();
        assert_eq!(
            server.dispatch("nope", vec![]),
            Err(WireValue::from(ERROR_UNKNOWN_METHOD))
        );
    }

    #[test]
    fn wrong_arity_is_code_two() {
        let server = KvsService::new("local").into_server();
        assert_eq!(
            server.dispatch("put", params(vec![WireValue::from("k")])),
            Err(WireValue::from(ERROR_TYPE_MISMATCH))
        );
        assert_eq!(
            server.dispatch("put", params(vec![WireValue::from(1u64), WireValue::from(1u64)])),
            Err(WireValue::from(ERROR_TYPE_MISMATCH))
        );
    }

    #[test]
    fn put_get_average() {
        let server = KvsService::new("local").into_server();
        for (key, value) in [("a", 10i64), ("b", 20), ("a", 30)] {
            let result = server.dispatch("put", params(vec![WireValue::from(key), WireValue::from(value)]));
            assert_eq!(result, Ok(WireValue::from(true)));
        }
        assert_eq!(
            server.dispatch("get", params(vec![WireValue::from("a")])),
            Ok(WireValue::Array(vec![WireValue::from("a"), WireValue::from(30i64)]))
        );
        assert_eq!(server.dispatch("get_average", params(vec![])), Ok(WireValue::F64(25.0)));
        assert!(server.dispatch("get", params(vec![WireValue::from("zz")])).is_err());
    }

    #[test]
    fn save_clear_load() {
        let service = Arc::new(KvsService::new("local"));
        service.put("k".to_string(), 1);
        let saved = service.save("snap".to_string());
        assert_eq!(saved["local"], "memory:snap");
        service.clear();
        assert!(service.is_empty());
        assert!(service.get_average().is_nan());
        assert_eq!(service.load("snap"), Ok(true));
        assert_eq!(service.get("k"), Some(Entry::new("k".to_string(), 1)));
        assert!(service.load("missing").is_err());
    }

    #[test]
    fn status_reports_size() {
        let service = KvsService::new("127.0.0.1_9199");
        service.put("k".to_string(), 1);
        let server = service.into_server();
        let status = server.dispatch("get_status", params(vec![])).expect("status should succeed");
        let status = <BTreeMap<String, BTreeMap<String, String>>>::decode(status).expect("status should decode");
        assert_eq!(status["127.0.0.1_9199"]["local_size"], "1");
    }

    #[test]
    fn serves_every_stub_method() {
        let server = KvsService::new("local").into_server();
        for (name, args, _) in Kvs::methods() {
            assert!(server.has_method(name), "{name} should be served");
            let arity = KVS_METHODS.iter().find(|(n, _)| *n == name).map(|(_, a)| *a);
            assert_eq!(arity, Some(args.len()), "{name} arity");
        }
    }
}
