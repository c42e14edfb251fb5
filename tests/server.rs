use std::sync::Arc;

use spur::health::Health;
use spur::{App, Args, Controller, Routes, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct Echo;

impl Controller for Echo {
    fn routes(routes: &mut Routes<Self>) {
        routes.post("/echo/{name}", Self::echo).path::<String>("name").body::<String>();
    }
}

impl Echo {
    async fn echo(self: Arc<Self>, args: Args) -> Result<String, spur::ArgError> {
        let name: String = args.get(0)?;
        let body: String = args.get(1)?;
        Ok(format!("{name}:{body}"))
    }
}

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw.as_bytes()).await.expect("write");
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.expect("read");
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down() {
    let app = Arc::new(App::mounted("/api"));
    app.scan(Arc::new(Echo)).scan(Arc::new(Health::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(Server::bind(addr).serve_listener(listener, Arc::clone(&app), async {
        let _ = stopped.await;
    }));

    let res = roundtrip(
        addr,
        "GET /api/healthz HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("ok"), "{res}");

    let res = roundtrip(
        addr,
        "POST /api/echo/bob HTTP/1.1\r\nhost: localhost\r\ncontent-length: 5\r\nconnection: close\r\n\r\nhello",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.to_ascii_lowercase().contains("content-type: text/plain"), "{res}");
    assert!(res.ends_with("bob:hello"), "{res}");

    let res = roundtrip(addr, "GET /elsewhere HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found"), "{res}");

    let res = roundtrip(addr, "BREW /api/healthz HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 405"), "{res}");

    assert_eq!(app.root_url(), format!("http://127.0.0.1:{}/api", addr.port()));

    let _ = stop.send(());
    let result = server.await.expect("server task");
    assert!(result.is_ok());
}

#[tokio::test]
async fn refuses_to_start_with_broken_routes() {
    struct Broken;

    impl Controller for Broken {
        fn routes(routes: &mut Routes<Self>) {
            routes.get("/x", Self::x).query::<u64>("n").parser("missing");
        }
    }

    impl Broken {
        async fn x(self: Arc<Self>, _args: Args) -> &'static str { "x" }
    }

    let app = Arc::new(App::new());
    app.scan(Arc::new(Broken));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let result = Server::bind(addr).serve_listener(listener, app, std::future::pending()).await;
    assert!(matches!(result, Err(spur::Error::Configuration(_))));
}

#[tokio::test]
async fn validates_before_binding() {
    struct Unformatted;

    impl Controller for Unformatted {
        fn routes(routes: &mut Routes<Self>) {
            routes.get("/x", Self::x).produces("missing");
        }
    }

    impl Unformatted {
        async fn x(self: Arc<Self>, _args: Args) -> &'static str { "x" }
    }

    let app = Arc::new(App::new());
    app.scan(Arc::new(Unformatted));

    // The port is taken: binding first would surface an io error instead.
    let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = taken.local_addr().expect("local addr");
    let result = Server::bind(addr).serve_with_shutdown(app, std::future::pending()).await;
    assert!(matches!(result, Err(spur::Error::Configuration(_))), "{result:?}");
}
