use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::warn;
use std::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::update_server::{Connect, ContentChanged, Disconnect, UpdateServer};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One connected feed client. Receives `ContentChanged` events from the hub
/// and pushes them down the socket as JSON.
pub struct FeedConnection {
    hb: Instant,
    hub: Addr<UpdateServer>,
}

impl FeedConnection {
    pub fn new(hub: Addr<UpdateServer>) -> Self {
        FeedConnection {
            hb: Instant::now(),
            hub,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("Feed client heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for FeedConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        self.hub.do_send(Connect {
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(Disconnect {
            addr: ctx.address().recipient(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for FeedConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("Feed socket error: {}", e);
                ctx.stop();
            }
            // The feed is one-way; client text frames are ignored.
            _ => {}
        }
    }
}

impl Handler<ContentChanged> for FeedConnection {
    type Result = ();

    fn handle(&mut self, msg: ContentChanged, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(serde_json::to_string(&msg).unwrap_or_default());
    }
}

/// GET /ws
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(FeedConnection::new(data.update_hub.clone()), &req, stream)
}
