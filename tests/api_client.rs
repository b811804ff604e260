use simrule::api::{ApiClient, ApiError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 只应答一次的 HTTP 桩，返回收到的原始请求
async fn serve_once(status: &str, headers: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        body.len(),
        headers,
        body
    );
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (base, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn header_value(request: &str, name: &str) -> Option<String> {
    request.lines().find_map(|l| {
        let (k, v) = l.split_once(':')?;
        k.eq_ignore_ascii_case(name).then(|| v.trim().to_string())
    })
}

/// 接受连接但永不应答
async fn hanging_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    base
}

#[tokio::test]
async fn http_error_carries_message_and_server_correlation_id() {
    let (base, server) = serve_once(
        "404 Not Found",
        "X-Correlation-ID: corr-from-server\r\n",
        r#"{"message":"Scenario not found","code":"NOT_FOUND"}"#,
    )
    .await;
    let api = ApiClient::with_base_url(&base, Duration::from_secs(5)).unwrap();

    let err = api.get_scenario("missing", None).await.unwrap_err();
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /api/scenarios/missing "));
    match &err {
        ApiError::Http {
            status,
            message,
            details,
            correlation_id,
        } => {
            assert_eq!(*status, 404);
            assert_eq!(message, "Scenario not found");
            assert_eq!(details.as_ref().unwrap()["code"], "NOT_FOUND");
            assert_eq!(correlation_id.as_deref(), Some("corr-from-server"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_abort());
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn ids_are_escaped_in_the_request_path() {
    let (base, server) = serve_once("404 Not Found", "", "{}").await;
    let api = ApiClient::with_base_url(&base, Duration::from_secs(5)).unwrap();

    let _ = api.get_scenario("a/b c?", None).await;
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /api/scenarios/a%2Fb%20c%3F "));
}

#[tokio::test]
async fn generated_correlation_id_is_reported_when_not_echoed() {
    let (base, server) = serve_once("500 Internal Server Error", "", "boom").await;
    let mut api = ApiClient::with_base_url(&base, Duration::from_secs(5)).unwrap();
    api.set_user_id(Some("qa-user".to_string()));

    let err = api.get_coverage(None).await.unwrap_err();
    let request = server.await.unwrap();

    let sent = header_value(&request, "x-correlation-id").unwrap();
    assert_eq!(sent.len(), 36);
    assert_eq!(err.correlation_id(), Some(sent.as_str()));
    assert_eq!(header_value(&request, "x-user-id").as_deref(), Some("qa-user"));
    assert!(matches!(err, ApiError::Http { status: 500, ref message, .. } if message == "boom"));
}

#[tokio::test]
async fn successful_call_decodes_body() {
    let (base, server) = serve_once(
        "200 OK",
        "",
        r#"[{"id":"s1","name":"Adults","factType":"Person","tags":["smoke"]}]"#,
    )
    .await;
    let api = ApiClient::with_base_url(&base, Duration::from_secs(5)).unwrap();

    let scenarios = api.list_scenarios(None).await.unwrap();
    server.await.unwrap();

    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].id.as_deref(), Some("s1"));
    assert_eq!(scenarios[0].fact_type, "Person");
    assert_eq!(scenarios[0].tags, vec!["smoke".to_string()]);
}

#[tokio::test]
async fn pre_cancelled_token_aborts() {
    let base = hanging_server().await;
    let api = ApiClient::with_base_url(&base, Duration::from_secs(5)).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = api.list_datasets(Some(&token)).await.unwrap_err();
    assert!(matches!(err, ApiError::Aborted));
    assert!(err.is_abort());
}

#[tokio::test]
async fn cancel_in_flight_request() {
    let base = hanging_server().await;
    let api = ApiClient::with_base_url(&base, Duration::from_secs(30)).unwrap();
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
    }

    let err = api.list_scenarios(Some(&token)).await.unwrap_err();
    assert!(err.is_abort());
}

#[tokio::test]
async fn slow_server_times_out() {
    let base = hanging_server().await;
    let api = ApiClient::with_base_url(&base, Duration::from_millis(200)).unwrap();

    let err = api.get_simulation("sim-1", None).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(!err.is_abort());
}
