use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use shared_types::{AppError, MessageResponse, Notification, NotificationFeed};

use crate::auth::extractors::SessionRequired;
use crate::backend::rpc;
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::repo::notifications;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/notifications
// ---------------------------------------------------------------------------

/// The latest notifications and how many are unread.
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Notification feed", body = NotificationFeed),
        (status = 401, description = "No session", body = AppError)
    ),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Result<Json<NotificationFeed>, AppError> {
    let items = notifications::latest(session.conn(&state), &session.user_id).await?;
    Ok(Json(NotificationFeed::new(items)))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read",
    responses(
        (status = 200, description = "All marked as read", body = MessageResponse)
    ),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Result<Json<MessageResponse>, AppError> {
    rpc::mark_notifications_as_read(session.conn(&state)).await?;
    Ok(Json(MessageResponse::new("Notificaciones leídas")))
}

// ---------------------------------------------------------------------------
// GET /api/notifications/stream
// ---------------------------------------------------------------------------

/// A notification for `user_id` carried by an insert event.
fn addressed_to(event: &ChangeEvent, user_id: &str) -> Option<Notification> {
    if event.table != notifications::TABLE || event.kind != ChangeKind::Insert {
        return None;
    }
    let record = event.record.as_ref()?;
    let notification: Notification = serde_json::from_value(record.clone()).ok()?;
    (notification.student_id.as_deref() == Some(user_id)).then_some(notification)
}

/// Server-sent `notification` events for new rows addressed to the caller.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "text/event-stream of Notification")
    ),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn notification_stream(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();
    let user_id = session.user_id;

    let stream = futures::stream::unfold((rx, user_id), |(mut rx, user_id)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(notification) = addressed_to(&event, &user_id) {
                        let event = Event::default()
                            .event("notification")
                            .json_data(&notification)
                            .unwrap_or_else(|_| Event::default().comment("unencodable row"));
                        return Some((Ok(event), (rx, user_id)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
