//! Command dispatcher
//!
//! Turns one request line into exactly one `Response`. A `SET` updates the
//! store and then rewrites the durable image from a fresh snapshot. The two
//! steps are not atomic together: concurrent writers race on the save and
//! the last save to finish is what ends up on disk. If the save fails the
//! in-memory write stays in place and the caller gets an error reply.

use crate::config::AuthPolicy;
use crate::persistence::Persistence;
use crate::protocol::{parse_request, Command, RequestError, Response};
use crate::store::{MemoryStore, Store};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct CommandDispatcher {
    store: Arc<MemoryStore>,
    persistence: Arc<Persistence>,
    auth: AuthPolicy,
}

impl CommandDispatcher {
    pub fn new(store: Arc<MemoryStore>, persistence: Arc<Persistence>, auth: AuthPolicy) -> Self {
        Self {
            store,
            persistence,
            auth,
        }
    }

    /// Process one request line
    pub async fn dispatch(&self, line: &str) -> Response {
        match parse_request(line, self.auth.token()) {
            Ok(command) => self.execute(command).await,
            Err(err) => {
                match &err {
                    RequestError::Unauthorized => warn!("unauthorized command rejected"),
                    RequestError::UnknownCommand(verb) => warn!(verb = %verb, "unknown command"),
                    RequestError::Empty => debug!("empty command"),
                    RequestError::WrongArity { verb } => debug!(verb = *verb, "wrong number of arguments"),
                }
                err.into()
            }
        }
    }

    async fn execute(&self, command: Command) -> Response {
        match command {
            Command::Set { key, value } => {
                self.store.set(key.clone(), value).await;

                let snapshot = self.store.snapshot().await;
                match self.persistence.save(&snapshot).await {
                    Ok(()) => {
                        info!(key = %key, "SET");
                        Response::Ok
                    }
                    Err(e) => {
                        error!(key = %key, error = %e, "failed to persist dataset after SET");
                        Response::PersistenceFailure
                    }
                }
            }
            Command::Lookup { key } => match self.store.get(&key).await {
                Some(value) => {
                    debug!(key = %key, "LOOKUP hit");
                    Response::Value(value)
                }
                None => {
                    debug!(key = %key, "LOOKUP miss");
                    Response::NotFound
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir, auth: AuthPolicy) -> CommandDispatcher {
        let persistence = Arc::new(Persistence::new(dir.path().join("db.kvc")));
        CommandDispatcher::new(Arc::new(MemoryStore::new()), persistence, auth)
    }

    #[tokio::test]
    async fn test_command_processing() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, AuthPolicy::Disabled);

        assert_eq!(dispatcher.dispatch("SET key1 value1").await, Response::Ok);
        assert_eq!(
            dispatcher.dispatch("LOOKUP key1").await,
            Response::Value("value1".to_string())
        );
        assert_eq!(dispatcher.dispatch("lookup missing").await, Response::NotFound);
        assert_eq!(dispatcher.dispatch("GET key1").await, Response::UnknownCommand);
        assert_eq!(dispatcher.dispatch("").await, Response::EmptyCommand);
        assert_eq!(dispatcher.dispatch("SET a").await, Response::WrongArity("SET"));
    }

    #[tokio::test]
    async fn test_set_is_persisted() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, AuthPolicy::Disabled);

        dispatcher.dispatch("SET a 1").await;
        dispatcher.dispatch("SET b 2").await;

        let reloaded = Persistence::new(dir.path().join("db.kvc")).load().await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("a"), Some(&"1".to_string()));
        assert_eq!(reloaded.get("b"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_auth_gating() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, AuthPolicy::Token("secret".to_string()));

        assert_eq!(dispatcher.dispatch("SET secret x 1").await, Response::Ok);
        assert_eq!(dispatcher.dispatch("SET wrong x 2").await, Response::Unauthorized);
        assert_eq!(dispatcher.dispatch("LOOKUP wrong x").await, Response::Unauthorized);
        assert_eq!(dispatcher.dispatch("SET x 3").await, Response::Unauthorized);
        assert_eq!(
            dispatcher.dispatch("LOOKUP secret x").await,
            Response::Value("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_write() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"plain file").unwrap();

        let persistence = Arc::new(Persistence::new(blocker.join("db.kvc")));
        let dispatcher =
            CommandDispatcher::new(Arc::new(MemoryStore::new()), persistence, AuthPolicy::Disabled);

        assert_eq!(dispatcher.dispatch("SET k v").await, Response::PersistenceFailure);
        assert_eq!(
            dispatcher.dispatch("LOOKUP k").await,
            Response::Value("v".to_string())
        );
    }
}
