use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use spur::{App, Args, BoxError, Controller, Error, Method, Reply, Request, Routes};

struct Files;

impl Controller for Files {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("/files/{*rest}", Self::name).named("any file");
        routes.get("/files/{dir}/{name}", Self::name).named("dir and name");
        routes.get("/files/{dir}/readme", Self::name).named("dir readme");
        routes.get("/files/static/{name}", Self::name).named("static file");
        routes.get("/{a}/{b}", Self::name).named("first pair");
        routes.get("/{c}/{d}", Self::name).named("second pair");
        routes.get("/download/{*path}", Self::download).path::<String>("path");
    }
}

impl Files {
    async fn name(self: Arc<Self>, _args: Args) -> &'static str {
        "file"
    }

    async fn download(self: Arc<Self>, args: Args) -> Result<String, BoxError> {
        Ok(args.get::<String>(0)?)
    }
}

fn matched(app: &App, method: Method, path: &str) -> Option<String> {
    let table = app.handler_table();
    let found = table.lookup(method, path)?;
    Some(found.descriptor().operation().name().to_owned())
}

#[test]
fn most_specific_pattern_wins() {
    let app = App::new();
    app.scan(Arc::new(Files));

    assert_eq!(matched(&app, Method::Get, "/files/static/readme").as_deref(), Some("static file"));
    assert_eq!(matched(&app, Method::Get, "/files/docs/readme").as_deref(), Some("dir readme"));
    assert_eq!(matched(&app, Method::Get, "/files/docs/intro").as_deref(), Some("dir and name"));
    assert_eq!(matched(&app, Method::Get, "/files/a/b/c").as_deref(), Some("any file"));
    assert_eq!(matched(&app, Method::Get, "/files").as_deref(), Some("any file"));
    assert_eq!(matched(&app, Method::Post, "/files/a"), None);
}

#[test]
fn equally_specific_patterns_keep_registration_order() {
    let app = App::new();
    app.scan(Arc::new(Files));
    assert_eq!(matched(&app, Method::Get, "/x/y").as_deref(), Some("first pair"));
}

#[test]
fn matching_is_deterministic_across_tables() {
    let paths = ["/files/a/b", "/files/static/x", "/x/y", "/files/x/readme", "/download/a/b", "/none"];

    let first = App::new();
    first.scan(Arc::new(Files));
    let second = App::new();
    second.scan(Arc::new(Files));

    for path in paths {
        let a = matched(&first, Method::Get, path);
        for _ in 0..3 {
            assert_eq!(matched(&first, Method::Get, path), a);
        }
        assert_eq!(matched(&second, Method::Get, path), a, "{path}");
    }
}

#[tokio::test]
async fn wildcard_captures_are_decoded_and_joined() {
    let app = App::new();
    app.scan(Arc::new(Files));

    let res = app.dispatch(Request::new(Method::Get, "/download/docs/my%20file.txt")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"docs/my file.txt");

    let res = app.dispatch(Request::new(Method::Get, "/download")).await;
    assert_eq!(res.body().as_ref(), b"");
}

#[tokio::test]
async fn trailing_slash_does_not_bind_an_empty_variable() {
    let app = App::new();
    app.scan(Arc::new(Files));

    assert_eq!(matched(&app, Method::Get, "/files/docs/").as_deref(), Some("any file"));
    let res = app.dispatch(Request::new(Method::Get, "/x/")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    let res = app.dispatch(Request::new(Method::Get, "/x")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn rescanning_and_adding_converters_never_duplicates() {
    let app = App::new();
    let files = Arc::new(Files);
    app.scan(Arc::clone(&files));
    let len = app.handler_table().len();
    assert_eq!(len, 7);

    app.add_output_formatter("extra", |_: &Reply| -> Result<Bytes, BoxError> { Ok(Bytes::new()) });
    app.add_input_parser("upper", |raw: &[u8]| -> Result<spur::Arg, BoxError> {
        Ok(spur::Arg::new(String::from_utf8_lossy(raw).to_uppercase()))
    });
    app.scan(Arc::clone(&files));
    app.scan(files);

    assert_eq!(app.handler_table().len(), len);
    assert!(app.input_parser("upper").is_some());
    assert!(app.output_formatter("extra").is_some());
}

struct First;
struct Second;

impl Controller for First {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("/shared", Self::hello).named("first");
        routes.get("/only-first", Self::hello);
    }
}

impl Controller for Second {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("/shared", Self::hello).named("second");
    }
}

impl First {
    async fn hello(self: Arc<Self>, _args: Args) -> &'static str { "first" }
}

impl Second {
    async fn hello(self: Arc<Self>, _args: Args) -> &'static str { "second" }
}

#[tokio::test]
async fn last_registration_wins() {
    let app = App::new();
    app.scan(Arc::new(First)).scan(Arc::new(Second));

    assert_eq!(app.handler_table().len(), 2);
    let res = app.dispatch(Request::new(Method::Get, "/shared")).await;
    assert_eq!(res.body().as_ref(), b"second");
    let res = app.dispatch(Request::new(Method::Get, "/only-first")).await;
    assert_eq!(res.body().as_ref(), b"first");
}

struct Broken;

impl Controller for Broken {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("no-slash", Self::ok);
        routes.get("/items/{id}", Self::ok).path::<u64>("missing");
        routes.get("/custom/{id}", Self::ok).path::<String>("id").parser("hex");
        routes.get("/fine", Self::ok);
    }
}

impl Broken {
    async fn ok(self: Arc<Self>, _args: Args) -> &'static str { "ok" }
}

#[tokio::test]
async fn misconfigured_routes_are_reported_and_left_out() {
    let app = App::new();
    app.scan(Arc::new(Broken));

    let table = app.handler_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table.problems().len(), 3);
    assert!(table.problems().iter().any(|p| p.contains("hex")));
    match app.validate() {
        Err(Error::Configuration(message)) => assert!(message.contains("no-slash"), "{message}"),
        other => panic!("expected a configuration error, got {other:?}"),
    }

    let res = app.dispatch(Request::new(Method::Get, "/fine")).await;
    assert_eq!(res.status_code(), StatusCode::OK);

    app.add_input_parser("hex", |raw: &[u8]| -> Result<spur::Arg, BoxError> {
        let text = std::str::from_utf8(raw)?;
        Ok(spur::Arg::new(u64::from_str_radix(text, 16)?.to_string()))
    });
    assert_eq!(app.handler_table().problems().len(), 2);

    let res = app.dispatch(Request::new(Method::Get, "/custom/ff")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let res = app.dispatch(Request::new(Method::Get, "/custom/zz")).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[test]
fn mount_paths_are_inverse() {
    let app = App::mounted("/svc");
    for path in ["/", "/a", "/a/b/c", ""] {
        let absolute = app.absolute_path(path);
        assert_eq!(app.relative_path(&absolute), Some(path));
    }
    assert_eq!(app.path(), "/svc");
    assert_eq!(app.root_url(), "http://127.0.0.1:8080/svc");
}
