use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use prodhub_collab::{Collab, Database, PgDatabase};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod docs;
mod errors;
mod repos;
mod schemas;
mod serialized;
mod users;

pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

pub type Router<Db> = axum::Router<ServerContext<Db>>;

/// Assembles the full route surface over the given collab system
pub fn create_app<Db: Database>(collab: Arc<Collab<Db>>) -> axum::Router {
    let context = ServerContext { collab };

    Router::<Db>::new()
        .nest("/auth", auth::router())
        .nest("/user", users::router())
        .nest("/repo", repos::router())
        .route("/api.json", get(docs::docs))
        .with_state(context)
}

/// Starts the prodhub server
pub async fn run_server(collab: Arc<Collab<PgDatabase>>, port: u16) {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_app(collab).layer(cors);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    log::info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
