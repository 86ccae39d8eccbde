//! OVSDB JSON-RPC connection
//!
//! Read-only client for the subset of RFC 7047 the monitor needs:
//! `list_dbs`, `get_schema` and `monitor`, plus answering the server's
//! `echo` keepalives. Messages are concatenated JSON texts with no
//! delimiter, so incoming bytes are buffered and scanned for the end of
//! the next text before it is parsed.

use crate::config::Endpoint;
use crate::error::{MonitorError, MonitorResult};
use crate::models::DatabaseSchema;
use crate::replica::ReplicaCache;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Any bidirectional byte stream the client can speak over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// A JSON-RPC session with an OVSDB server
pub struct OvsdbClient {
    stream: Box<dyn Transport>,
    framer: MessageFramer,
    next_id: u64,
    /// Update notifications received before the cache was attached
    pending_updates: VecDeque<serde_json::Value>,
}

impl OvsdbClient {
    /// Open a connection to the given endpoint
    pub async fn connect(endpoint: &Endpoint) -> MonitorResult<Self> {
        let stream: Box<dyn Transport> = match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Box::new(tokio::net::UnixStream::connect(path).await?),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(MonitorError::Protocol(
                    "unix sockets are not supported on this platform".to_string(),
                ))
            }
            Endpoint::Tcp { host, port } => {
                Box::new(tokio::net::TcpStream::connect((host.as_str(), *port)).await?)
            }
        };

        info!("Connected to {}", endpoint);
        Ok(Self::from_transport(stream))
    }

    pub fn from_transport(stream: Box<dyn Transport>) -> Self {
        Self {
            stream,
            framer: MessageFramer::default(),
            next_id: 1,
            pending_updates: VecDeque::new(),
        }
    }

    /// Names of the databases served by the endpoint
    pub async fn list_dbs(&mut self) -> MonitorResult<Vec<String>> {
        let result = self.call("list_dbs", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// First user database of the endpoint (skips `_Server`)
    pub async fn discover_database(&mut self) -> MonitorResult<String> {
        self.list_dbs()
            .await?
            .into_iter()
            .find(|db| !db.starts_with('_'))
            .ok_or_else(|| MonitorError::Schema("server exposes no database".to_string()))
    }

    pub async fn get_schema(&mut self, database: &str) -> MonitorResult<DatabaseSchema> {
        let result = self.call("get_schema", json!([database])).await?;
        let schema = DatabaseSchema::from_json(result)?;
        info!(
            "Discovered schema {} {} with {} tables",
            schema.name,
            schema.version,
            schema.tables.len()
        );
        Ok(schema)
    }

    /// Subscribe to every column of `tables`. Returns the initial
    /// `<table-updates>` describing the current content.
    pub async fn monitor(
        &mut self,
        schema: &DatabaseSchema,
        tables: &[String],
    ) -> MonitorResult<serde_json::Value> {
        let mut requests = serde_json::Map::new();
        for table in tables {
            let columns: Vec<&String> = schema
                .tables
                .get(table)
                .map(|t| t.columns.keys().collect())
                .unwrap_or_default();
            requests.insert(table.clone(), json!({ "columns": columns }));
        }

        let monitor_id = Uuid::new_v4().to_string();
        let result = self
            .call("monitor", json!([schema.name, monitor_id, requests]))
            .await?;
        info!("Monitoring {} tables of {}", tables.len(), schema.name);
        Ok(result)
    }

    /// Feed update notifications into the cache until the connection
    /// closes.
    pub async fn run(mut self, cache: Arc<ReplicaCache>) -> MonitorResult<()> {
        let result = self.receive_updates(&cache).await;
        cache.mark_disconnected();
        result
    }

    async fn receive_updates(&mut self, cache: &ReplicaCache) -> MonitorResult<()> {
        while let Some(updates) = self.pending_updates.pop_front() {
            Self::apply(cache, &updates);
        }

        loop {
            let message = self.read_message().await?;
            match message.get("method").and_then(|m| m.as_str()) {
                Some("update") => {
                    if let Some(updates) = message.get("params").and_then(|p| p.get(1)) {
                        Self::apply(cache, updates);
                    }
                }
                _ => self.handle_request(message).await?,
            }
        }
    }

    fn apply(cache: &ReplicaCache, updates: &serde_json::Value) {
        if let Err(e) = cache.apply(updates) {
            warn!("Failed to apply update notification: {}", e);
        }
    }

    async fn call(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> MonitorResult<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;
        debug!("-> {} (id {})", method, id);
        self.send(&json!({"method": method, "params": params, "id": id}))
            .await?;

        loop {
            let message = self.read_message().await?;
            let is_reply = message.get("method").is_none()
                && message.get("id").and_then(|i| i.as_u64()) == Some(id);
            if !is_reply {
                self.handle_request(message).await?;
                continue;
            }

            if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
                return Err(MonitorError::Protocol(format!("{} failed: {}", method, error)));
            }
            return Ok(message
                .get("result")
                .cloned()
                .unwrap_or(serde_json::Value::Null));
        }
    }

    /// Server-initiated messages other than the reply being waited for
    async fn handle_request(&mut self, message: serde_json::Value) -> MonitorResult<()> {
        match message.get("method").and_then(|m| m.as_str()) {
            Some("echo") => {
                let reply = json!({
                    "result": message.get("params").cloned().unwrap_or_else(|| json!([])),
                    "error": null,
                    "id": message.get("id").cloned().unwrap_or(serde_json::Value::Null),
                });
                self.send(&reply).await
            }
            Some("update") => {
                if let Some(updates) = message.get("params").and_then(|p| p.get(1)) {
                    self.pending_updates.push_back(updates.clone());
                }
                Ok(())
            }
            Some(other) => {
                debug!("Ignoring unexpected request {}", other);
                Ok(())
            }
            None => {
                debug!("Ignoring unexpected reply {}", message);
                Ok(())
            }
        }
    }

    async fn send(&mut self, message: &serde_json::Value) -> MonitorResult<()> {
        let bytes = serde_json::to_vec(message)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> MonitorResult<serde_json::Value> {
        loop {
            if let Some(message) = self.framer.next_message()? {
                return Ok(message);
            }
            let read = self.stream.read_buf(&mut self.framer.buffer).await?;
            if read == 0 {
                return Err(MonitorError::Protocol(
                    "connection closed by server".to_string(),
                ));
            }
        }
    }
}

/// Splits the incoming byte stream into JSON texts.
///
/// Bytes are scanned once for bracket depth outside of strings; a text is
/// only handed to serde_json when its closing bracket has arrived.
#[derive(Debug, Default)]
struct MessageFramer {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already scanned
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl MessageFramer {
    /// Pop one complete JSON text off the buffer, if there is one
    fn next_message(&mut self) -> MonitorResult<Option<serde_json::Value>> {
        while self.scanned < self.buffer.len() {
            let byte = self.buffer[self.scanned];
            self.scanned += 1;

            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }

            match byte {
                b'{' | b'[' => self.depth += 1,
                _ if self.depth == 0 => {
                    if !byte.is_ascii_whitespace() {
                        return Err(MonitorError::Protocol(format!(
                            "unexpected byte {:?} between messages",
                            byte as char
                        )));
                    }
                }
                b'"' => self.in_string = true,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let end = self.scanned;
                        let message =
                            serde_json::from_slice::<serde_json::Value>(&self.buffer[..end]);
                        self.buffer.drain(..end);
                        self.scanned = 0;
                        return Ok(Some(message?));
                    }
                }
                _ => {}
            }
        }

        // Only whitespace since the last message
        if self.depth == 0 {
            self.buffer.clear();
            self.scanned = 0;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::replica::Replica;
    use tokio::io::duplex;

    fn pair() -> (OvsdbClient, OvsdbClient) {
        let (a, b) = duplex(64 * 1024);
        (
            OvsdbClient::from_transport(Box::new(a)),
            OvsdbClient::from_transport(Box::new(b)),
        )
    }

    #[test]
    fn test_framing_handles_split_and_joined_messages() {
        let mut framer = MessageFramer::default();
        framer.buffer.extend_from_slice(br#"{"id":1,"result":[]} {"id":2,"#);

        let first = framer.next_message().unwrap().unwrap();
        assert_eq!(first["id"], 1);
        assert!(framer.next_message().unwrap().is_none());

        framer.buffer.extend_from_slice(br#""result":null}"#);
        let second = framer.next_message().unwrap().unwrap();
        assert_eq!(second["id"], 2);
        assert!(framer.next_message().unwrap().is_none());
        assert!(framer.buffer.is_empty());
    }

    #[test]
    fn test_framing_rejects_garbage() {
        let mut framer = MessageFramer::default();
        framer.buffer.extend_from_slice(b"}{");
        assert!(framer.next_message().is_err());
    }

    #[test]
    fn test_framing_ignores_brackets_inside_strings() {
        let mut framer = MessageFramer::default();
        framer
            .buffer
            .extend_from_slice(br#"{"id":1,"result":"a}]\"{["}"#);

        let message = framer.next_message().unwrap().unwrap();
        assert_eq!(message["result"], "a}]\"{[");
        assert!(framer.buffer.is_empty());
    }

    #[test]
    fn test_framing_scans_each_byte_once() {
        let mut framer = MessageFramer::default();
        let text = json!({"id": 7, "result": {"rows": vec!["x"; 2000]}}).to_string();
        let (head, tail) = text.as_bytes().split_at(text.len() / 2);

        framer.buffer.extend_from_slice(head);
        assert!(framer.next_message().unwrap().is_none());
        assert_eq!(framer.scanned, head.len());
        assert!(framer.depth > 0);

        framer.buffer.extend_from_slice(tail);
        let message = framer.next_message().unwrap().unwrap();
        assert_eq!(message["id"], 7);
        assert_eq!(framer.scanned, 0);
    }

    #[tokio::test]
    async fn test_get_schema() {
        let (mut client, mut server) = pair();

        let serve = tokio::spawn(async move {
            let request = server.read_message().await.unwrap();
            assert_eq!(request["method"], "get_schema");
            assert_eq!(request["params"], json!(["Test_DB"]));
            server
                .send(&json!({"id": request["id"], "result": fixtures::schema_json(), "error": null}))
                .await
                .unwrap();
        });

        let schema = client.get_schema("Test_DB").await.unwrap();
        assert_eq!(schema.name, "Test_DB");
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_is_answered_while_waiting() {
        let (mut client, mut server) = pair();

        let serve = tokio::spawn(async move {
            let request = server.read_message().await.unwrap();
            server
                .send(&json!({"method": "echo", "params": ["ping"], "id": "echo"}))
                .await
                .unwrap();
            let reply = server.read_message().await.unwrap();
            assert_eq!(reply["id"], "echo");
            assert_eq!(reply["result"], json!(["ping"]));
            server
                .send(&json!({"id": request["id"], "result": ["_Server", "OVN_Northbound"], "error": null}))
                .await
                .unwrap();
        });

        let db = client.discover_database().await.unwrap();
        assert_eq!(db, "OVN_Northbound");
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_reply_is_a_protocol_error() {
        let (mut client, mut server) = pair();

        let serve = tokio::spawn(async move {
            let request = server.read_message().await.unwrap();
            server
                .send(&json!({"id": request["id"], "result": null, "error": "unknown database"}))
                .await
                .unwrap();
        });

        let err = client.get_schema("Nope").await.unwrap_err();
        assert!(matches!(err, MonitorError::Protocol(_)));
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_monitor_then_run_feeds_cache() {
        let (mut client, mut server) = pair();
        let model = fixtures::model();
        let cache = Arc::new(ReplicaCache::new(model.clone()));

        let serve = tokio::spawn(async move {
            let request = server.read_message().await.unwrap();
            assert_eq!(request["method"], "monitor");
            assert!(request["params"][2]["Foo"]["columns"].is_array());
            server
                .send(&json!({
                    "id": request["id"],
                    "result": {"Foo": {"u1": {"new": {"bar": "a", "idnum": 1}}}},
                    "error": null
                }))
                .await
                .unwrap();
            server
                .send(&json!({
                    "method": "update",
                    "params": ["mon", {"Bridge": {"b1": {"new": {"name": "br0"}}}}],
                    "id": null
                }))
                .await
                .unwrap();
            // Dropping the server side closes the connection
        });

        let initial = client
            .monitor(model.schema(), &["Foo".to_string(), "Bridge".to_string()])
            .await
            .unwrap();
        cache.apply(&initial).unwrap();
        serve.await.unwrap();

        assert!(cache.is_connected());
        let result = client.run(cache.clone()).await;
        assert!(result.is_err());
        assert!(!cache.is_connected());
        assert_eq!(cache.list("Foo").unwrap().len(), 1);
        assert_eq!(cache.list("Bridge").unwrap().len(), 1);
    }
}
