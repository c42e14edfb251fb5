//! Minimal spur example: a JSON item store, sessions, hooks and health checks.
//!
//! Run with:
//!   SPUR_DEBUG=1 cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/shop/items/1
//!   curl -X POST http://localhost:3000/shop/items \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"lamp"}'
//!   curl http://localhost:3000/shop/items/1/export.csv
//!   curl -i -X POST http://localhost:3000/shop/login?user=alice
//!   curl http://localhost:3000/shop/healthz

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spur::health::Health;
use spur::{
    App, AppConfig, Args, BoxError, Controller, HttpError, Json, Reply, Request, ResponseHandle,
    Routes, Server, ServerConfig, Session,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
    #[serde(default)]
    id: u64,
    name: String,
}

struct Shop {
    app: Arc<App>,
    items: RwLock<BTreeMap<u64, Item>>,
}

impl Controller for Shop {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("/items", Self::list);
        routes.get("/items/{id}", Self::show).path::<u64>("id");
        routes.post("/items", Self::create).json_body().response();
        routes.get("/items/{id}/export.csv", Self::export)
            .path::<u64>("id")
            .produces("export.csv");
        routes.post("/login", Self::login).query::<String>("user").response();
        routes.get("/whoami", Self::whoami).session();
        routes.post("/logout", Self::logout).request().response();
    }
}

impl Shop {
    async fn list(self: Arc<Self>, _args: Args) -> Json<Vec<Item>> {
        Json(self.items.read().values().cloned().collect())
    }

    async fn show(self: Arc<Self>, args: Args) -> Result<Json<Item>, BoxError> {
        let id: u64 = args.get(0)?;
        let item = self.items.read().get(&id).cloned();
        let item = item.ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("no item {id}")))?;
        Ok(Json(item))
    }

    async fn create(self: Arc<Self>, args: Args) -> Result<Json<Item>, BoxError> {
        let mut item: Item = args.json(0)?;
        let response: ResponseHandle = args.get(1)?;

        let mut items = self.items.write();
        item.id = items.keys().next_back().map_or(1, |id| id + 1);
        items.insert(item.id, item.clone());

        response.set_status(StatusCode::CREATED);
        response.add_header("location", &self.app.absolute_path(&format!("/items/{}", item.id)));
        Ok(Json(item))
    }

    async fn export(self: Arc<Self>, args: Args) -> Result<Reply, BoxError> {
        let id: u64 = args.get(0)?;
        let item = self.items.read().get(&id).cloned();
        let item = item.ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("no item {id}")))?;
        Ok(Reply::Text(format!("id,name\n{},{}\n", item.id, item.name)))
    }

    async fn login(self: Arc<Self>, args: Args) -> Result<String, BoxError> {
        let user: String = args.get(0)?;
        let response: ResponseHandle = args.get(1)?;
        let session = self.app.open_session(&response);
        session.set_login(Some(user.clone()));
        Ok(format!("welcome, {user}"))
    }

    async fn whoami(self: Arc<Self>, args: Args) -> Result<String, BoxError> {
        let session: Option<Arc<Session>> = args.get_opt(0)?;
        let login = session.and_then(|s| s.login());
        Ok(login.unwrap_or_else(|| "anonymous".to_owned()))
    }

    async fn logout(self: Arc<Self>, args: Args) -> Result<(), BoxError> {
        let request: Arc<Request> = args.get(0)?;
        let response: ResponseHandle = args.get(1)?;
        self.app.close_session(&request, &response);
        response.redirect(&self.app.absolute_path("/items"));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), spur::Error> {
    tracing_subscriber::fmt::init();

    let config = AppConfig {
        root_path: Some("/shop".to_owned()),
        server: ServerConfig { host: "0.0.0.0".to_owned(), port: 3000, ..ServerConfig::default() },
        ..AppConfig::default()
    }
    .with_env();

    let server = Server::from_config(&config.server)?;
    let app = Arc::new(App::with_config(config));
    app.add_output_formatter("export.csv", |reply: &Reply| -> Result<Bytes, BoxError> {
        match reply {
            Reply::Text(csv) => Ok(Bytes::from(csv.clone())),
            other => Err(format!("cannot export {other:?}").into()),
        }
    });
    app.add_error_handler(|status: StatusCode, request: &Request, err: &spur::Error| {
        tracing::info!(%status, path = request.path(), error = %err, "request failed");
    });

    app.scan(Arc::new(Shop { app: Arc::clone(&app), items: RwLock::new(BTreeMap::new()) }))
        .scan(Arc::new(Health::new()));

    server.serve(app).await
}
