use crate::helpers::*;

#[tokio::test]
async fn run_success_returns_empty_ok() {
    let server = TestServer::with_scripts(&[("mark", r#"kv::upsert("ran", "yes");"#)]).await;

    let resp = server.post("/run/mark", "").await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "");
    assert_eq!(server.kv.get("ran").unwrap(), "yes");

    server.shutdown().await;
}

#[tokio::test]
async fn run_script_error_is_bad_request_with_text() {
    let server = TestServer::with_scripts(&[("fail", r#"throw "err1";"#)]).await;

    let resp = server.post("/run/fail", "").await;

    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "err1\n");

    server.shutdown().await;
}

#[tokio::test]
async fn run_unknown_script_is_bad_request() {
    let server = TestServer::with_scripts(&[]).await;

    let resp = server.post("/run/ghost", "").await;

    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "script 'ghost' not found\n");

    server.shutdown().await;
}

#[tokio::test]
async fn run_without_name_never_reaches_runner() {
    let server = TestServer::with_scripts(&[("", r#"kv::upsert("ran", "yes");"#)]).await;

    for path in ["/run/", "/run"] {
        let resp = server.post(path, "").await;
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.text().await.unwrap(), "empty name\n");
    }
    assert!(server.kv.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn run_forwards_request_to_script() {
    let script = r#"
        kv::upsert("method", request.method);
        kv::upsert("path", request.path);
        kv::upsert("env", request.query.env);
        kv::upsert("header", request.headers["x-check"]);
        kv::upsert("body", request.body);
    "#;
    let server = TestServer::with_scripts(&[("echo", script)]).await;

    let resp = server
        .client
        .post(server.url("/run/echo?env=prod"))
        .header("x-check", "disk")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(server.kv.get("method").unwrap(), "POST");
    assert_eq!(server.kv.get("path").unwrap(), "/run/echo");
    assert_eq!(server.kv.get("env").unwrap(), "prod");
    assert_eq!(server.kv.get("header").unwrap(), "disk");
    assert_eq!(server.kv.get("body").unwrap(), "payload");

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_runs_have_a_single_put_winner() {
    let server = TestServer::with_scripts(&[(
        "claim",
        r#"let r = kv::put("owner", "me"); if r.error != () { throw r.error; }"#,
    )])
    .await;

    let responses = futures::future::join_all((0..10).map(|_| server.post("/run/claim", ""))).await;

    let ok = responses.iter().filter(|r| r.status() == 200).count();
    assert_eq!(ok, 1);
    for resp in responses.into_iter().filter(|r| r.status() != 200) {
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.text().await.unwrap(), "key 'owner' already exists\n");
    }

    server.shutdown().await;
}
