// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::SocketError;
use crate::protocol::{
	Push, RemoteFailure, Request, ERR_AUTH_FAILED, OP_AUTH, OP_SESSION_SUBSCRIBE,
	OP_SESSION_UNSUBSCRIBE,
};

#[derive(Debug, Clone)]
pub struct SocketConfig {
	pub addr: String,
	pub token: Option<String>,
	pub connect_timeout: Duration,
	pub request_timeout: Duration,
	pub backoff: Backoff,
}

impl SocketConfig {
	pub fn new(addr: impl Into<String>) -> Self {
		Self {
			addr: addr.into(),
			token: None,
			connect_timeout: Duration::from_secs(10),
			request_timeout: Duration::from_secs(30),
			backoff: Backoff::default(),
		}
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}
}

type Pending = HashMap<u64, oneshot::Sender<Result<Value, SocketError>>>;

struct ConnState {
	writer: Option<BufWriter<OwnedWriteHalf>>,
	/// Auth handshake completed on the current connection. Requests are
	/// held in the queue until this is true so nothing outruns the
	/// handshake or the FIFO replay.
	authed: bool,
	/// Credentials were rejected server-side. All traffic fails fast with
	/// `SocketError::Auth` until `reauthenticate` supplies new ones.
	auth_invalid: bool,
	token: Option<String>,
	pending: Pending,
	/// Requests accepted while disconnected (or mid-handshake), FIFO.
	queue: VecDeque<(u64, String)>,
	subscriptions: HashMap<String, mpsc::UnboundedSender<Push>>,
}

impl ConnState {
	fn ready(&self) -> bool {
		self.writer.is_some() && self.authed
	}
}

struct ClientInner {
	config: SocketConfig,
	next_id: AtomicU64,
	state: Mutex<ConnState>,
	reauth: Notify,
}

/// Multiplexing client for the remote authority's socket protocol.
///
/// Cheap to clone; all clones share one connection, one correlation-id
/// space, and one offline queue. A background task owns the connection
/// lifecycle and reconnects with jittered exponential backoff for as long
/// as the client is alive.
#[derive(Clone)]
pub struct SocketClient {
	inner: Arc<ClientInner>,
}

impl SocketClient {
	pub fn new(config: SocketConfig) -> Self {
		let token = config.token.clone();
		let inner = Arc::new(ClientInner {
			config,
			next_id: AtomicU64::new(1),
			state: Mutex::new(ConnState {
				writer: None,
				authed: false,
				auth_invalid: false,
				token,
				pending: HashMap::new(),
				queue: VecDeque::new(),
				subscriptions: HashMap::new(),
			}),
			reauth: Notify::new(),
		});

		tokio::spawn(run_connection(inner.clone()));

		Self { inner }
	}

	pub async fn is_connected(&self) -> bool {
		self.inner.state.lock().await.ready()
	}

	/// Number of requests waiting for the connection to come back.
	pub async fn queued_requests(&self) -> usize {
		self.inner.state.lock().await.queue.len()
	}

	/// Issue a request and wait for the matching response.
	///
	/// While disconnected the request queues; the queue is replayed in
	/// submission order after the next successful reconnect. The timeout
	/// covers the whole call, queued time included.
	pub async fn call(&self, operation: &str, arguments: Value) -> Result<Value, SocketError> {
		let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
		let line = serde_json::to_string(&Request {
			id,
			operation,
			arguments,
		})?;

		let (tx, rx) = oneshot::channel();

		{
			let mut st = self.inner.state.lock().await;
			if st.auth_invalid {
				return Err(SocketError::Auth);
			}
			st.pending.insert(id, tx);

			if st.ready() {
				if let Err(e) = write_line_state(&mut st, &line).await {
					debug!(id, operation, error = %e, "send failed, queueing for replay");
					st.queue.push_back((id, line));
				}
			} else {
				debug!(id, operation, "queued while disconnected");
				st.queue.push_back((id, line));
			}
		}

		match timeout(self.inner.config.request_timeout, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(SocketError::Transport("request dropped".to_string())),
			Err(_) => {
				let mut st = self.inner.state.lock().await;
				st.pending.remove(&id);
				st.queue.retain(|(queued, _)| *queued != id);
				Err(SocketError::Timeout)
			}
		}
	}

	/// Register for pushes scoped to `session` and tell the server to
	/// stream them. The registration survives reconnects: it is re-sent on
	/// every successful reconnect until `unsubscribe`.
	pub async fn subscribe(
		&self,
		session: &str,
	) -> Result<mpsc::UnboundedReceiver<Push>, SocketError> {
		let (tx, rx) = mpsc::unbounded_channel();
		{
			let mut st = self.inner.state.lock().await;
			st.subscriptions.insert(session.to_string(), tx);
		}

		if let Err(e) = self
			.call(OP_SESSION_SUBSCRIBE, serde_json::json!({ "session": session }))
			.await
		{
			let mut st = self.inner.state.lock().await;
			st.subscriptions.remove(session);
			return Err(e);
		}

		Ok(rx)
	}

	pub async fn unsubscribe(&self, session: &str) {
		{
			let mut st = self.inner.state.lock().await;
			st.subscriptions.remove(session);
		}
		if let Err(e) = self
			.call(OP_SESSION_UNSUBSCRIBE, serde_json::json!({ "session": session }))
			.await
		{
			debug!(session, error = %e, "unsubscribe not acknowledged");
		}
	}

	/// Install fresh credentials after an `auth_failed` invalidation and
	/// wake the reconnect loop. Requests queued before the invalidation
	/// were discarded, not replayed.
	pub async fn reauthenticate(&self, token: impl Into<String>) {
		{
			let mut st = self.inner.state.lock().await;
			st.token = Some(token.into());
			st.auth_invalid = false;
		}
		self.inner.reauth.notify_one();
	}
}

async fn write_line_state(st: &mut ConnState, line: &str) -> Result<(), SocketError> {
	let Some(writer) = st.writer.as_mut() else {
		return Err(SocketError::Transport("disconnected".to_string()));
	};
	match write_line(writer, line).await {
		Ok(()) => Ok(()),
		Err(e) => {
			// The connection is going down; the read loop will finish the
			// cleanup when it notices.
			st.writer = None;
			Err(SocketError::Transport(e.to_string()))
		}
	}
}

async fn write_line(
	writer: &mut BufWriter<OwnedWriteHalf>,
	line: &str,
) -> Result<(), std::io::Error> {
	writer.write_all(line.as_bytes()).await?;
	writer.write_all(b"\n").await?;
	writer.flush().await
}

/// Connection lifecycle: connect, authenticate, replay the offline queue,
/// re-establish subscriptions, then pump incoming lines until the
/// connection dies; back off and repeat.
async fn run_connection(inner: Arc<ClientInner>) {
	let mut attempt: u32 = 0;

	loop {
		// Park while credentials are known-bad; reauthenticate() wakes us.
		loop {
			let invalid = inner.state.lock().await.auth_invalid;
			if !invalid {
				break;
			}
			inner.reauth.notified().await;
		}

		let connected = timeout(
			inner.config.connect_timeout,
			TcpStream::connect(&inner.config.addr),
		)
		.await;

		let stream = match connected {
			Ok(Ok(stream)) => stream,
			Ok(Err(e)) => {
				let delay = inner.config.backoff.delay(attempt);
				debug!(addr = %inner.config.addr, error = %e, attempt, "connect failed");
				attempt = attempt.saturating_add(1);
				tokio::time::sleep(delay).await;
				continue;
			}
			Err(_) => {
				let delay = inner.config.backoff.delay(attempt);
				debug!(addr = %inner.config.addr, attempt, "connect timed out");
				attempt = attempt.saturating_add(1);
				tokio::time::sleep(delay).await;
				continue;
			}
		};

		info!(addr = %inner.config.addr, "connected");

		let (read_half, write_half) = stream.into_split();
		{
			let mut st = inner.state.lock().await;
			st.writer = Some(BufWriter::new(write_half));
			st.authed = false;
		}

		let reader = tokio::spawn(read_loop(inner.clone(), BufReader::new(read_half)));

		match establish(&inner).await {
			Ok(()) => {
				attempt = 0;
				// The connection's lifetime is the reader's lifetime.
				let _ = reader.await;
			}
			Err(e) => {
				warn!(error = %e, "connection setup failed");
				reader.abort();
			}
		}

		disconnect_cleanup(&inner).await;

		let delay = inner.config.backoff.delay(attempt);
		attempt = attempt.saturating_add(1);
		tokio::time::sleep(delay).await;
	}
}

/// Post-connect handshake: authenticate, then flush the offline queue in
/// FIFO order, then re-establish push subscriptions.
async fn establish(inner: &Arc<ClientInner>) -> Result<(), SocketError> {
	let token = inner.state.lock().await.token.clone();

	if let Some(token) = token {
		authenticate(inner, &token).await?;
	}

	// Replay queued requests in original submission order, exactly once
	// each: a request leaves the queue only when it reaches the wire.
	// New calls keep queueing (the client is not `ready` yet) until the
	// same lock acquisition that sees an empty queue flips `authed`, so
	// nothing can slip in ahead of the replay.
	loop {
		let mut st = inner.state.lock().await;
		let Some((id, line)) = st.queue.pop_front() else {
			st.authed = true;
			break;
		};
		if !st.pending.contains_key(&id) {
			// Timed out while queued; nothing is waiting for it.
			continue;
		}
		if let Err(e) = write_line_state(&mut st, &line).await {
			st.queue.push_front((id, line));
			return Err(e);
		}
		debug!(id, "replayed queued request");
	}

	let sessions: Vec<String> = {
		let st = inner.state.lock().await;
		st.subscriptions.keys().cloned().collect()
	};
	for session in sessions {
		let resubscribe = request_on_wire(
			inner,
			OP_SESSION_SUBSCRIBE,
			serde_json::json!({ "session": session }),
		)
		.await;
		if let Err(e) = resubscribe {
			warn!(session = %session, error = %e, "failed to re-establish subscription");
		}
	}

	Ok(())
}

async fn authenticate(inner: &Arc<ClientInner>, token: &str) -> Result<(), SocketError> {
	let result = request_on_wire(inner, OP_AUTH, serde_json::json!({ "token": token })).await;

	match result {
		Ok(_) => {
			debug!("authenticated");
			Ok(())
		}
		Err(e) => {
			if matches!(e, SocketError::Auth) {
				invalidate_auth(inner).await;
			}
			Err(e)
		}
	}
}

/// Send one request directly on the current connection, bypassing the
/// offline queue. Used for the handshake and resubscriptions, which must
/// not wait behind (or reorder around) queued traffic.
async fn request_on_wire(
	inner: &Arc<ClientInner>,
	operation: &str,
	arguments: Value,
) -> Result<Value, SocketError> {
	let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
	let line = serde_json::to_string(&Request {
		id,
		operation,
		arguments,
	})?;

	let (tx, rx) = oneshot::channel();
	{
		let mut st = inner.state.lock().await;
		st.pending.insert(id, tx);
		if let Err(e) = write_line_state(&mut st, &line).await {
			st.pending.remove(&id);
			return Err(e);
		}
	}

	match timeout(inner.config.request_timeout, rx).await {
		Ok(Ok(result)) => result,
		Ok(Err(_)) => Err(SocketError::Transport("request dropped".to_string())),
		Err(_) => {
			let mut st = inner.state.lock().await;
			st.pending.remove(&id);
			Err(SocketError::Timeout)
		}
	}
}

async fn read_loop(inner: Arc<ClientInner>, mut reader: BufReader<OwnedReadHalf>) {
	let mut line = String::new();
	loop {
		line.clear();
		match reader.read_line(&mut line).await {
			Ok(0) => break,
			Ok(_) => {
				let trimmed = line.trim();
				if trimmed.is_empty() {
					continue;
				}
				match serde_json::from_str::<Value>(trimmed) {
					Ok(message) => handle_message(&inner, message).await,
					Err(e) => debug!(error = %e, "ignoring unparseable frame"),
				}
			}
			Err(e) => {
				debug!(error = %e, "read failed");
				break;
			}
		}
	}
}

async fn handle_message(inner: &Arc<ClientInner>, message: Value) {
	if let Some(id) = message.get("id").and_then(Value::as_u64) {
		let result = if let Some(result) = message.get("result") {
			Ok(result.clone())
		} else if let Some(error) = message.get("error") {
			match serde_json::from_value::<RemoteFailure>(error.clone()) {
				Ok(failure) if failure.code == ERR_AUTH_FAILED => {
					invalidate_auth(inner).await;
					Err(SocketError::Auth)
				}
				Ok(failure) => Err(SocketError::Remote {
					code: failure.code,
					message: failure.message,
					data: failure.data,
				}),
				Err(e) => Err(SocketError::Transport(format!("malformed error frame: {e}"))),
			}
		} else {
			Err(SocketError::Transport("malformed response frame".to_string()))
		};

		let sender = {
			let mut st = inner.state.lock().await;
			st.pending.remove(&id)
		};
		match sender {
			Some(sender) => {
				let _ = sender.send(result);
			}
			None => debug!(id, "response for unknown request"),
		}
		return;
	}

	match serde_json::from_value::<Push>(message) {
		Ok(push) => {
			let session = push.session.clone();
			let mut st = inner.state.lock().await;
			let gone = match st.subscriptions.get(&session) {
				Some(listener) => listener.send(push).is_err(),
				None => {
					debug!(session = %session, "push with no listener");
					false
				}
			};
			if gone {
				st.subscriptions.remove(&session);
			}
		}
		Err(e) => debug!(error = %e, "ignoring unroutable frame"),
	}
}

/// Server-side session invalidation: stale credentials must never be
/// replayed, so the queue is discarded, not kept.
async fn invalidate_auth(inner: &Arc<ClientInner>) {
	let mut st = inner.state.lock().await;
	st.auth_invalid = true;
	st.authed = false;

	let discarded: Vec<u64> = st.queue.drain(..).map(|(id, _)| id).collect();
	for id in discarded {
		if let Some(sender) = st.pending.remove(&id) {
			let _ = sender.send(Err(SocketError::Auth));
		}
	}

	warn!("session invalidated; queued requests discarded");
}

/// Fail in-flight requests (sent, unanswered) with a transport error;
/// queued-unsent requests survive for replay. The caller retries in-flight
/// work explicitly; it is never silently re-sent with stale assumptions.
async fn disconnect_cleanup(inner: &Arc<ClientInner>) {
	let mut st = inner.state.lock().await;
	st.writer = None;
	st.authed = false;

	let queued: Vec<u64> = st.queue.iter().map(|(id, _)| *id).collect();
	let in_flight: Vec<u64> = st
		.pending
		.keys()
		.copied()
		.filter(|id| !queued.contains(id))
		.collect();

	for id in in_flight {
		if let Some(sender) = st.pending.remove(&id) {
			let _ = sender.send(Err(SocketError::Transport(
				"connection lost".to_string(),
			)));
		}
	}

	warn!(retained = st.queue.len(), "disconnected");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::{PushKind, OP_COMPILE_RUN, OP_FILE_WRITE, OP_PROJECT_CREATE};
	use serde_json::json;
	use tokio::io::AsyncWriteExt;
	use tokio::net::TcpListener;

	fn test_config(addr: &str) -> SocketConfig {
		SocketConfig {
			addr: addr.to_string(),
			token: None,
			connect_timeout: Duration::from_secs(1),
			request_timeout: Duration::from_secs(3),
			backoff: Backoff {
				initial: Duration::from_millis(20),
				max: Duration::from_millis(80),
			},
		}
	}

	async fn read_request(
		reader: &mut BufReader<OwnedReadHalf>,
		line: &mut String,
	) -> Option<Value> {
		line.clear();
		match reader.read_line(line).await {
			Ok(0) | Err(_) => None,
			Ok(_) => serde_json::from_str(line.trim()).ok(),
		}
	}

	async fn send_frame(writer: &mut OwnedWriteHalf, frame: Value) {
		writer.write_all(frame.to_string().as_bytes()).await.unwrap();
		writer.write_all(b"\n").await.unwrap();
	}

	/// Answers every request with `{ok: true}` and reports each operation
	/// name in arrival order.
	async fn spawn_ok_server() -> (String, mpsc::UnboundedReceiver<String>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		let (seen_tx, seen_rx) = mpsc::unbounded_channel();

		tokio::spawn(async move {
			loop {
				let Ok((stream, _)) = listener.accept().await else {
					break;
				};
				let seen_tx = seen_tx.clone();
				tokio::spawn(async move {
					let (read_half, mut write_half) = stream.into_split();
					let mut reader = BufReader::new(read_half);
					let mut line = String::new();
					while let Some(request) = read_request(&mut reader, &mut line).await {
						let id = request["id"].as_u64().unwrap();
						let operation = request["operation"].as_str().unwrap().to_string();
						let _ = seen_tx.send(operation);
						send_frame(&mut write_half, json!({"id": id, "result": {"ok": true}}))
							.await;
					}
				});
			}
		});

		(addr, seen_rx)
	}

	#[tokio::test]
	async fn call_resolves_matching_response() {
		let (addr, _seen) = spawn_ok_server().await;
		let client = SocketClient::new(test_config(&addr));

		let result = client
			.call(OP_PROJECT_CREATE, json!({"name": "A1"}))
			.await
			.unwrap();
		assert_eq!(result, json!({"ok": true}));
	}

	#[tokio::test]
	async fn unanswered_request_times_out() {
		// Accepts and reads but never responds.
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		tokio::spawn(async move {
			loop {
				let Ok((stream, _)) = listener.accept().await else {
					break;
				};
				tokio::spawn(async move {
					let (read_half, _write_half) = stream.into_split();
					let mut reader = BufReader::new(read_half);
					let mut line = String::new();
					while read_request(&mut reader, &mut line).await.is_some() {}
				});
			}
		});

		let mut config = test_config(&addr);
		config.request_timeout = Duration::from_millis(200);
		let client = SocketClient::new(config);

		let result = client.call(OP_FILE_WRITE, json!({})).await;
		assert!(matches!(result, Err(SocketError::Timeout)));
	}

	#[tokio::test]
	async fn remote_rejection_surfaces_code_and_data() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let (read_half, mut write_half) = stream.into_split();
			let mut reader = BufReader::new(read_half);
			let mut line = String::new();
			while let Some(request) = read_request(&mut reader, &mut line).await {
				let id = request["id"].as_u64().unwrap();
				send_frame(
					&mut write_half,
					json!({"id": id, "error": {
						"code": "version_conflict",
						"message": "remote marker advanced",
						"data": {"version": 9, "contents": "remote"}
					}}),
				)
				.await;
			}
		});

		let client = SocketClient::new(test_config(&addr));
		let result = client.call(OP_FILE_WRITE, json!({})).await;

		match result {
			Err(SocketError::Remote { code, data, .. }) => {
				assert_eq!(code, "version_conflict");
				assert_eq!(data.unwrap()["version"], json!(9));
			}
			other => panic!("expected remote error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn offline_requests_replay_in_order_exactly_once() {
		// Reserve a port, then leave it unbound so the client starts out
		// disconnected.
		let parked = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = parked.local_addr().unwrap().to_string();
		drop(parked);

		let client = SocketClient::new(test_config(&addr));
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!client.is_connected().await);

		let mut calls = Vec::new();
		for name in ["first", "second", "third"] {
			let client = client.clone();
			calls.push(tokio::spawn(async move {
				client.call(OP_PROJECT_CREATE, json!({"name": name})).await
			}));
			// Give each call time to reach the queue so submission order
			// is deterministic.
			tokio::time::sleep(Duration::from_millis(30)).await;
		}
		assert_eq!(client.queued_requests().await, 3);

		// Bring the server up on the reserved address.
		let listener = TcpListener::bind(&addr).await.unwrap();
		let (order_tx, mut order_rx) = mpsc::unbounded_channel();
		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let (read_half, mut write_half) = stream.into_split();
			let mut reader = BufReader::new(read_half);
			let mut line = String::new();
			while let Some(request) = read_request(&mut reader, &mut line).await {
				let id = request["id"].as_u64().unwrap();
				let name = request["arguments"]["name"].as_str().unwrap().to_string();
				let _ = order_tx.send(name);
				send_frame(&mut write_half, json!({"id": id, "result": {}})).await;
			}
		});

		for call in calls {
			call.await.unwrap().unwrap();
		}

		let mut order = Vec::new();
		while let Ok(name) = order_rx.try_recv() {
			order.push(name);
		}
		assert_eq!(order, vec!["first", "second", "third"]);
		assert_eq!(client.queued_requests().await, 0);
	}

	#[tokio::test]
	async fn in_flight_request_fails_on_disconnect() {
		// Reads one request, then drops the connection without replying.
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let (read_half, _write_half) = stream.into_split();
			let mut reader = BufReader::new(read_half);
			let mut line = String::new();
			let _ = read_request(&mut reader, &mut line).await;
			// Connection drops here; no further accepts.
		});

		let client = SocketClient::new(test_config(&addr));
		let result = client.call(OP_COMPILE_RUN, json!({})).await;
		assert!(
			matches!(result, Err(SocketError::Transport(_))),
			"in-flight request must be cancelled, not replayed: {result:?}"
		);
	}

	#[tokio::test]
	async fn pushes_route_to_session_listener() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let (read_half, mut write_half) = stream.into_split();
			let mut reader = BufReader::new(read_half);
			let mut line = String::new();
			while let Some(request) = read_request(&mut reader, &mut line).await {
				let id = request["id"].as_u64().unwrap();
				send_frame(&mut write_half, json!({"id": id, "result": {}})).await;
				if request["operation"] == "session_subscribe" {
					let session = request["arguments"]["session"].clone();
					send_frame(
						&mut write_half,
						json!({"session": session, "type": "stdout",
							"payload": {"message": "hello\n"}}),
					)
					.await;
				}
			}
		});

		let client = SocketClient::new(test_config(&addr));
		let mut pushes = client.subscribe("run-1").await.unwrap();

		let push = pushes.recv().await.unwrap();
		assert_eq!(push.session, "run-1");
		assert_eq!(push.kind, PushKind::Stdout);
		assert_eq!(push.payload["message"], json!("hello\n"));
	}

	/// Auth server: rejects every connection whose first request does not
	/// carry the expected token, then keeps serving `{ok}` responses.
	async fn spawn_auth_server(expected: &'static str) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		tokio::spawn(async move {
			loop {
				let Ok((stream, _)) = listener.accept().await else {
					break;
				};
				tokio::spawn(async move {
					let (read_half, mut write_half) = stream.into_split();
					let mut reader = BufReader::new(read_half);
					let mut line = String::new();
					while let Some(request) = read_request(&mut reader, &mut line).await {
						let id = request["id"].as_u64().unwrap();
						if request["operation"] == "auth" {
							if request["arguments"]["token"] == expected {
								send_frame(
									&mut write_half,
									json!({"id": id, "result": {"ok": true}}),
								)
								.await;
							} else {
								send_frame(
									&mut write_half,
									json!({"id": id, "error": {
										"code": "auth_failed",
										"message": "bad token"
									}}),
								)
								.await;
							}
						} else {
							send_frame(&mut write_half, json!({"id": id, "result": {}})).await;
						}
					}
				});
			}
		});
		addr
	}

	#[tokio::test]
	async fn authenticates_before_serving_calls() {
		let addr = spawn_auth_server("sesame").await;
		let client = SocketClient::new(test_config(&addr).with_token("sesame"));

		client.call(OP_PROJECT_CREATE, json!({"name": "A1"})).await.unwrap();
		assert!(client.is_connected().await);
	}

	#[tokio::test]
	async fn rejected_credentials_discard_queue_until_reauth() {
		let addr = spawn_auth_server("sesame").await;
		let client = SocketClient::new(test_config(&addr).with_token("wrong"));

		let result = client.call(OP_PROJECT_CREATE, json!({"name": "A1"})).await;
		assert!(
			matches!(result, Err(SocketError::Auth)),
			"queued request must be discarded with an auth error: {result:?}"
		);

		// Fail-fast while invalidated.
		let result = client.call(OP_PROJECT_CREATE, json!({"name": "A1"})).await;
		assert!(matches!(result, Err(SocketError::Auth)));

		client.reauthenticate("sesame").await;
		client.call(OP_PROJECT_CREATE, json!({"name": "A1"})).await.unwrap();
	}
}
