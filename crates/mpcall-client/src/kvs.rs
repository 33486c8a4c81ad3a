//! Stub for the key-value example service.

mpcall_types::record! {
    /// One stored pair, as returned by `get`.
    pub struct Entry as "entry" {
        pub key: String,
        pub value: i32,
    }
}

crate::service! {
    /// Client for the key-value service.
    pub struct Kvs {
        /// Store `value` under `key`, replacing any previous value.
        fn put(key: String, value: i32) -> bool;
        /// Look up `key`. Unknown keys are a remote error.
        fn get(key: String) -> Entry;
        /// Mean of all stored values.
        fn get_average() -> f64;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use mpcall_types::Typed;
    use mpcall_wire::WireValue;

    use super::*;
    use crate::error::InvokeError;
    use crate::{ClientBase, Endpoint, Transport};

    /// Answers from a fixed table and records what was sent.
    #[derive(Default)]
    struct Scripted {
        sent: Mutex<Vec<(String, Vec<WireValue>)>>,
    }

    impl Transport for Scripted {
        fn invoke(
            &self,
            method: &str,
            params: Vec<WireValue>,
            _timeout: Duration,
        ) -> Result<WireValue, InvokeError> {
            self.sent
                .lock()
                .expect("lock should not be poisoned")
                .push((method.to_string(), params.clone()));
            match method {
                "put" => Ok(WireValue::from(true)),
                "get" => Ok(WireValue::Array(vec![params[1].clone(), WireValue::from(42i64)])),
                "get_average" => Ok(WireValue::F32(1.5)),
                _ => Err(InvokeError::Remote(WireValue::from(1u64))),
            }
        }
    }

    fn stub() -> Kvs<Scripted> {
        let endpoint = Endpoint::new("127.0.0.1", 9199).with_name("kvs");
        Kvs::from_base(ClientBase::with_transport(endpoint, Scripted::default()))
    }

    #[test]
    fn put_sends_typed_arguments() {
        let kvs = stub();
        assert!(kvs.put("k".to_string(), 42).expect("put should succeed"));
        let sent = kvs.transport().sent.lock().expect("lock should not be poisoned").clone();
        assert_eq!(
            sent,
            vec![(
                "put".to_string(),
                vec![WireValue::from("kvs"), WireValue::from("k"), WireValue::from(42i64)]
            )]
        );
    }

    #[test]
    fn get_returns_entry() {
        let kvs = stub();
        let entry = kvs.get("k".to_string()).expect("get should succeed");
        assert_eq!(entry, Entry::new("k".to_string(), 42));
        assert_eq!(entry.to_string(), "entry{key: k, value: 42}");
    }

    #[test]
    fn get_average_accepts_single_precision() {
        let kvs = stub();
        assert_eq!(kvs.get_average().expect("get_average should succeed"), 1.5);
    }

    #[test]
    fn admin_calls_go_through_the_stub() {
        let kvs = stub();
        assert!(kvs.get_status().is_err());
        assert_eq!(kvs.get_name(), "kvs");
    }

    #[test]
    fn method_table_describes_the_service() {
        let methods = Kvs::methods();
        let rendered: Vec<String> = methods
            .iter()
            .map(|(name, args, result)| {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                format!("{result} {name}({})", args.join(", "))
            })
            .collect();
        assert_eq!(
            rendered,
            [
                "bool put(string, int32)",
                "entry get(string)",
                "float get_average()",
            ]
        );
        assert_eq!(Entry::descriptor().to_string(), "entry");
    }
}
