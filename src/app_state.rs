use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::content::ContentKind;
use crate::db::MongoDB;
use crate::update_server::{ContentChanged, UpdateServer};
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub cache: Arc<SnapshotCache>,
    pub update_hub: Addr<UpdateServer>,
}

impl AppState {
    /// Invalidation contract: drop the snapshot first, then announce the new
    /// version so re-fetching clients always see post-mutation data.
    pub fn publish_change(&self, kind: ContentKind) {
        let version = self.cache.invalidate(kind);
        self.update_hub.do_send(ContentChanged { kind, version });
    }
}
