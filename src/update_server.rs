//! Hub actor fanning content-change events out to every connected feed
//! client. Replaces the browser storage-change notification: a tab that
//! hears `ContentChanged` re-fetches the affected list.

use actix::prelude::*;
use log::info;
use serde::Serialize;

use crate::content::ContentKind;

#[derive(Message, Clone, Serialize)]
#[rtype(result = "()")]
pub struct ContentChanged {
    pub kind: ContentKind,
    pub version: u64,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub addr: Recipient<ContentChanged>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub addr: Recipient<ContentChanged>,
}

pub struct UpdateServer {
    sessions: Vec<Recipient<ContentChanged>>,
}

impl UpdateServer {
    pub fn new() -> Self {
        UpdateServer {
            sessions: Vec::new(),
        }
    }
}

impl Actor for UpdateServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for UpdateServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.sessions.push(msg.addr);
        info!("Feed client connected ({} total)", self.sessions.len());
    }
}

impl Handler<Disconnect> for UpdateServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        self.sessions.retain(|a| a != &msg.addr);
        info!("Feed client disconnected ({} total)", self.sessions.len());
    }
}

impl Handler<ContentChanged> for UpdateServer {
    type Result = ();

    fn handle(&mut self, msg: ContentChanged, _: &mut Context<Self>) {
        for addr in &self.sessions {
            addr.do_send(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Probe {
        seen: Arc<Mutex<Vec<(ContentKind, u64)>>>,
    }

    impl Actor for Probe {
        type Context = Context<Self>;
    }

    impl Handler<ContentChanged> for Probe {
        type Result = ();

        fn handle(&mut self, msg: ContentChanged, _: &mut Context<Self>) {
            self.seen.lock().unwrap().push((msg.kind, msg.version));
        }
    }

    #[derive(Message)]
    #[rtype(result = "()")]
    struct Flush;

    impl Handler<Flush> for Probe {
        type Result = ();

        fn handle(&mut self, _: Flush, _: &mut Context<Self>) {}
    }

    #[actix_web::test]
    async fn broadcasts_to_every_subscriber() {
        let hub = UpdateServer::new().start();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let probe_a = Probe {
            seen: seen_a.clone(),
        }
        .start();
        let probe_b = Probe {
            seen: seen_b.clone(),
        }
        .start();

        hub.send(Connect {
            addr: probe_a.clone().recipient(),
        })
        .await
        .unwrap();
        hub.send(Connect {
            addr: probe_b.clone().recipient(),
        })
        .await
        .unwrap();

        hub.send(ContentChanged {
            kind: ContentKind::Notes,
            version: 3,
        })
        .await
        .unwrap();

        // Mailbox ordering: once Flush is answered, the broadcast landed.
        probe_a.send(Flush).await.unwrap();
        probe_b.send(Flush).await.unwrap();

        assert_eq!(*seen_a.lock().unwrap(), vec![(ContentKind::Notes, 3)]);
        assert_eq!(*seen_b.lock().unwrap(), vec![(ContentKind::Notes, 3)]);
    }

    #[actix_web::test]
    async fn disconnected_client_stops_receiving() {
        let hub = UpdateServer::new().start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe { seen: seen.clone() }.start();

        hub.send(Connect {
            addr: probe.clone().recipient(),
        })
        .await
        .unwrap();
        hub.send(Disconnect {
            addr: probe.clone().recipient(),
        })
        .await
        .unwrap();
        hub.send(ContentChanged {
            kind: ContentKind::Videos,
            version: 1,
        })
        .await
        .unwrap();

        probe.send(Flush).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }
}
