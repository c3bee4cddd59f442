//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; we reply with a single JSON message per request.
//! Clips played by the shared audio queue are pushed to every socket as `audio`.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::error::AppError;
use crate::logic;
use crate::protocol::{ClientWsMessage, MatchingIn, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mrsdung_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "kind": "internal", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "mrsdung_backend", "WebSocket connected");
  let mut audio_rx = state.audio_tx.subscribe();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "mrsdung_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state).await
              }
              Err(e) => ServerWsMessage::Error { kind: "invalid_input".into(), message: format!("Invalid JSON: {}", e) },
            };
            if let Err(e) = send_json(&mut socket, &reply).await {
              error!(target: "mrsdung_backend", error = %e, "WS send error");
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      clip = audio_rx.recv() => match clip {
        Ok(chunk) => {
          if let Err(e) = send_json(&mut socket, &ServerWsMessage::Audio { chunk }).await {
            error!(target: "mrsdung_backend", error = %e, "WS audio send error");
            break;
          }
        }
        Err(RecvError::Lagged(skipped)) => {
          warn!(target: "audio", skipped, "WS listener fell behind the audio queue");
        }
        Err(RecvError::Closed) => break,
      },
    }
  }
  info!(target: "mrsdung_backend", "WebSocket disconnected");
}

fn reply<T>(result: Result<T, AppError>, ok: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match result {
    Ok(v) => ok(v),
    Err(e) => {
      warn!(target: "mrsdung_backend", kind = e.kind(), error = %e, "WS request failed");
      ServerWsMessage::Error { kind: e.kind().into(), message: e.to_string() }
    }
  }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Answer { session_id, zone, question_id, value } => {
      let r = logic::answer(state, &session_id, zone, &question_id, value).await;
      reply(r, |_| ServerWsMessage::Answered { question_id })
    }

    ClientWsMessage::Submit { session_id, zone, question_id } => {
      let r = logic::submit(state, &session_id, zone, &question_id).await;
      reply(r, |result| ServerWsMessage::AnswerResult { question_id, result })
    }

    ClientWsMessage::NextQuestion { session_id, zone } => {
      reply(logic::next_question(state, &session_id, zone).await, |index| ServerWsMessage::QuestionIndex { zone, index })
    }

    ClientWsMessage::Flashcard { session_id, action } => {
      reply(logic::flashcard(state, &session_id, action).await, |view| ServerWsMessage::Flashcard { view })
    }

    ClientWsMessage::Matching { session_id, side, pair_id } => {
      let req = MatchingIn { side: Some(side), pair_id: Some(pair_id), replay: false };
      reply(logic::matching(state, &session_id, req).await, |view| ServerWsMessage::Matching { view })
    }

    ClientWsMessage::MatchingReplay { session_id } => {
      let req = MatchingIn { side: None, pair_id: None, replay: true };
      reply(logic::matching(state, &session_id, req).await, |view| ServerWsMessage::Matching { view })
    }

    ClientWsMessage::Score { session_id } => {
      reply(logic::score(state, &session_id).await, |summary| ServerWsMessage::Score { summary })
    }

    ClientWsMessage::Speak { text } => {
      reply(logic::speak(state, &text).await, |q| ServerWsMessage::Queued { queued: q.queued })
    }
  }
}
