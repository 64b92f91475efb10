use axum::extract::ws::Message::{Binary, Close, Text};
use axum::extract::ws::{self, WebSocket};
use axum::Extension;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use tokio::try_join;

use crate::auth;

use super::context;
use super::model::{Command, Event};
use super::service::{EventService, EventStream};

pub async fn ws(
    ws: WebSocketUpgrade,
    Extension(auth_user): Extension<auth::User>,
    State(event_service): State<EventService>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, auth_user, event_service))
}

async fn handle_socket(ws: WebSocket, auth_user: auth::User, event_service: EventService) {
    let (ctx, events) = event_service.connect(auth_user.sub().clone()).await;
    let (sender, receiver) = ws.split();

    let read_task = tokio::spawn(read(ctx.clone(), receiver, event_service.clone()));
    let write_task = tokio::spawn(write(ctx.clone(), sender, events));

    match try_join!(read_task, write_task) {
        Ok(_) => debug!("WS {} disconnected gracefully", ctx.handle().id()),
        Err(e) => error!("WS {} disconnected with error: {e}", ctx.handle().id()),
    }

    event_service.disconnect(&ctx).await;
}

async fn read(ctx: context::Ws, mut receiver: SplitStream<WebSocket>, event_service: EventService) {
    loop {
        tokio::select! {
            // close is notified => stop 'read' task
            _ = ctx.close.notified() => break,

            frame = receiver.next() => {
                match frame {
                    None => {
                        debug!("WS stream ended");
                        ctx.close.notify_one();
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Failed to read WS frame: {e}");
                        ctx.close.notify_one();
                        break;
                    }
                    Some(Ok(Close(frame))) => {
                        debug!("WS connection closed by client: {frame:?}");
                        ctx.close.notify_one();
                        break;
                    }
                    Some(Ok(Text(content))) => {
                        handle_text_frame(&ctx, content.as_str(), &event_service).await;
                    }
                    Some(Ok(Binary(content))) => {
                        warn!("Received binary WS frame of {} bytes", content.len());
                    }
                    // ping/pong are answered by the transport
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_text_frame(ctx: &context::Ws, content: &str, event_service: &EventService) {
    let command = match serde_json::from_str::<Command>(content) {
        Ok(command) => command,
        Err(e) => {
            warn!("Skipping text frame, content is malformed: {e}");
            return;
        }
    };

    if let Err(e) = event_service.handle_command(ctx, command).await {
        warn!("Failed to handle command on {}: {e}", ctx.handle().id());
    }
}

async fn write(
    ctx: context::Ws,
    mut sender: SplitSink<WebSocket, ws::Message>,
    mut events: EventStream,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'write' task
            _ = ctx.close.notified() => break,

            item = events.next() => {
                let Some(e) = item else { break };

                if let Err(e) = send_event(&mut sender, &e).await {
                    error!("Failed to send event to client: {e}");
                    ctx.close.notify_one();
                    break;
                }
            }
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, ws::Message>,
    e: &Event,
) -> super::Result<()> {
    let json = serde_json::to_string(e)?;
    sender.send(Text(json.into())).await?;
    Ok(())
}
