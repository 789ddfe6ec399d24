//! Session CRUD with a cache-aside read path.
//!
//! | Operation | Cache                                           |
//! |-----------|-------------------------------------------------|
//! | create    | invalidates `sessions:list`                     |
//! | list      | read-through `sessions:list` (list TTL)         |
//! | get       | read-through `session:<id>` (session TTL)       |
//! | update    | invalidates `session:<id>` and `sessions:list`  |
//! | segments  | never cached, segments are append-hot           |

use super::parse_session_id;
use crate::cache::{self, keys, CacheStore, CacheTtls};
use crate::error::AppResult;
use crate::model::{Segment, Session, SessionConfig, SessionUpdate};
use crate::store::SessionStore;
use std::sync::Arc;
use tracing::info;

pub struct SessionService {
    store: Arc<dyn SessionStore>,
    cache: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, cache: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self { store, cache, ttls }
    }

    pub async fn create(&self, config: SessionConfig) -> AppResult<Session> {
        let session = self.store.insert(config).await?;
        cache::invalidate(self.cache.as_ref(), &[keys::SESSIONS_LIST]).await;

        info!(session_id = %session.id, mode = session.config.mode.as_str(), "Session created");
        Ok(session)
    }

    pub async fn list(&self) -> AppResult<Vec<Session>> {
        let sessions = cache::read_through(self.cache.as_ref(), keys::SESSIONS_LIST, self.ttls.list, || {
            self.store.find_all()
        })
        .await?;
        Ok(sessions)
    }

    pub async fn get(&self, raw_id: &str) -> AppResult<Session> {
        let id = parse_session_id(raw_id)?;
        let session = cache::read_through(self.cache.as_ref(), &keys::session(&id), self.ttls.session, || {
            self.store.find_one(id)
        })
        .await?;
        Ok(session)
    }

    pub async fn update(&self, raw_id: &str, update: SessionUpdate) -> AppResult<Session> {
        let id = parse_session_id(raw_id)?;
        let session = self.store.update(id, update.config, update.status).await?;
        let session_key = keys::session(&id);
        cache::invalidate(self.cache.as_ref(), &[session_key.as_str(), keys::SESSIONS_LIST]).await;

        info!(session_id = %id, status = session.status.as_str(), "Session updated");
        Ok(session)
    }

    pub async fn segments(&self, raw_id: &str) -> AppResult<Vec<Segment>> {
        let id = parse_session_id(raw_id)?;
        Ok(self.store.find_one(id).await?.segments)
    }
}
