//! Event-stream transport
//!
//! `GET /sse` opens a session whose first event names the companion POST endpoint.
//! Responses to calls posted there are pushed back as `message` events on the stream.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{stream, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::AppError,
    mcp::rpc::{json_rpc_error, PARSE_ERROR},
    AppState,
};

pub const SSE_PATH: &str = "/sse";
pub const SSE_MESSAGES_PATH: &str = "/sse/messages";

/// Open event-stream sessions keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>>,
}

impl SessionRegistry {
    pub fn open(&self) -> (String, mpsc::UnboundedReceiver<Value>) {
        let session_id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sessions.lock().insert(session_id.clone(), sender);
        (session_id, receiver)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Returns false when the session is gone or its stream has been dropped.
    pub fn send(&self, session_id: &str, message: Value) -> bool {
        self.sessions
            .lock()
            .get(session_id)
            .is_some_and(|sender| sender.send(message).is_ok())
    }

    pub fn close(&self, session_id: &str) {
        if self.sessions.lock().remove(session_id).is_some() {
            info!(session_id = %session_id, "event-stream session closed");
        }
    }

    /// Drops every sender so open streams terminate.
    pub fn close_all(&self) {
        let closed = {
            let mut sessions = self.sessions.lock();
            let count = sessions.len();
            sessions.clear();
            count
        };
        if closed > 0 {
            info!(sessions = closed, "event-stream sessions closed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its session when the stream owning it is dropped.
struct SessionGuard {
    registry: SessionRegistry,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.close(&self.session_id);
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn open_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session_id, receiver) = state.sessions.open();
    info!(session_id = %session_id, "event-stream session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{SSE_MESSAGES_PATH}?sessionId={session_id}"));
    let guard = SessionGuard {
        registry: state.sessions.clone(),
        session_id,
    };
    let messages = UnboundedReceiverStream::new(receiver).map(move |message| {
        let _session = &guard;
        Ok(Event::default().event("message").data(message.to_string()))
    });

    Sse::new(stream::once(async move { Ok(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let Some(session_id) = query
        .session_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return Err(AppError::bad_request(
            "missing_session_id",
            "sessionId query parameter is required",
        ));
    };

    if !state.sessions.contains(&session_id) {
        return Err(AppError::not_found("unknown_session", "session not found"));
    }

    let response = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => state.server.handle_message(payload).await,
        Err(_) => Some(json_rpc_error(None, PARSE_ERROR, "Parse error")),
    };

    if let Some(response) = response {
        if !state.sessions.send(&session_id, response) {
            return Err(AppError::not_found("unknown_session", "session not found"));
        }
    }

    Ok(StatusCode::ACCEPTED)
}
