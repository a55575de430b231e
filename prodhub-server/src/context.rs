use std::sync::Arc;

use axum::extract::FromRef;
use prodhub_collab::Collab;

/// Shared state for all handlers, generic over the backing store so
/// the HTTP layer can be exercised against an in-memory database.
pub struct ServerContext<Db> {
    pub collab: Arc<Collab<Db>>,
}

impl<Db> Clone for ServerContext<Db> {
    fn clone(&self) -> Self {
        Self {
            collab: self.collab.clone(),
        }
    }
}

impl<Db> FromRef<ServerContext<Db>> for Arc<Collab<Db>> {
    fn from_ref(context: &ServerContext<Db>) -> Self {
        context.collab.clone()
    }
}
