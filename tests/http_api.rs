mod common;

use commission_link::api::{ApiError, HttpRecordApi, LinkRequest, RecordApi};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn request(commission_id: &str) -> LinkRequest {
    LinkRequest {
        commission_object_id: "obj_commission".into(),
        commission_id: commission_id.into(),
        link_field_id: "field_policy_link".into(),
        policy_object_id: "policy_001".into(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Accepts one connection, answers with `status`/`body`, returns the raw request.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    serve_raw(format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ))
}

/// Accepts one connection, writes `response` verbatim, returns the raw request.
fn serve_raw(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        stream.write_all(response.as_bytes()).expect("write");
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}/api"), handle)
}

#[test]
fn puts_link_field_with_headers() {
    let (base, server) = serve_once("200 OK", "{\"id\":\"x\"}");
    let api = HttpRecordApi::new(&base, Duration::from_secs(5)).unwrap();
    let resp = api
        .update_record(&common::creds(), &request("comm 001"))
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "{\"id\":\"x\"}");

    let raw = server.join().unwrap();
    let lower = raw.to_ascii_lowercase();
    assert!(raw.starts_with("PUT /api/records/obj_commission/comm%20001 HTTP/1.1"));
    assert!(lower.contains("x-api-key: test_key"));
    assert!(lower.contains("x-business-id: test_business"));
    assert!(lower.contains("x-user-id: test_user"));
    assert!(lower.contains("accept: application/json"));
    assert!(lower.contains("content-type: application/json"));

    let body_start = find(raw.as_bytes(), b"\r\n\r\n").unwrap() + 4;
    let body: serde_json::Value = serde_json::from_str(&raw[body_start..]).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"fields": [{"id": "field_policy_link", "value": {"id": "policy_001"}}]})
    );
}

#[test]
fn non_200_status_is_returned_not_raised() {
    let (base, server) = serve_once("404 Not Found", "{\"error\":\"no such record\"}");
    let api = HttpRecordApi::new(&base, Duration::from_secs(5)).unwrap();
    let resp = api.update_record(&common::creds(), &request("c1")).unwrap();
    assert_eq!(resp.status, 404);
    assert!(resp.body.contains("no such record"));
    server.join().unwrap();
}

#[test]
fn truncated_body_keeps_the_status() {
    let (base, server) = serve_raw(
        "HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial".into(),
    );
    let api = HttpRecordApi::new(&base, Duration::from_secs(5)).unwrap();
    let resp = api.update_record(&common::creds(), &request("c1")).unwrap();
    assert_eq!(resp.status, 502);
    assert_eq!(resp.body, "");
    server.join().unwrap();
}

#[test]
fn connection_failure_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpRecordApi::new(&format!("http://{addr}/api"), Duration::from_secs(2)).unwrap();
    let err = api
        .update_record(&common::creds(), &request("c1"))
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[test]
fn record_url_ignores_trailing_slash() {
    let api = HttpRecordApi::new("https://records.example/api/", Duration::from_secs(1)).unwrap();
    let url = api.record_url(&request("c1")).unwrap();
    assert_eq!(url.as_str(), "https://records.example/api/records/obj_commission/c1");
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(HttpRecordApi::new("not a url", Duration::from_secs(1)).is_err());
    assert!(HttpRecordApi::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
}
