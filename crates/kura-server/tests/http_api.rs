//! Integration tests for the kura HTTP API
//!
//! Each test serves a fresh temporary storage root on an ephemeral port.

use std::sync::Arc;

use kura_server::constants::DEFAULT_MAX_UPLOAD_BYTES;
use kura_store::{DiskOp, FailingDisk, LocalDisk, Storage};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    base: String,
    client: Client,
    storage: Arc<Storage<FailingDisk>>,
    _dir: TempDir,
}

/// Start a server on an ephemeral port over a temporary root
async fn start_server() -> TestServer {
    start_server_with_limit(DEFAULT_MAX_UPLOAD_BYTES).await
}

async fn start_server_with_limit(max_upload_bytes: usize) -> TestServer {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(
        Storage::with_disk(dir.path().join("storage"), FailingDisk::new(LocalDisk))
            .await
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let served = Arc::clone(&storage);
    tokio::spawn(async move {
        if let Err(e) = kura_server::serve(listener, served, max_upload_bytes).await {
            eprintln!("Server error: {e:#}");
        }
    });

    TestServer {
        base: format!("http://{addr}"),
        client: Client::new(),
        storage,
        _dir: dir,
    }
}

impl TestServer {
    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base, route)
    }

    async fn upload(&self, path: &str, content: &'static [u8]) -> (StatusCode, String) {
        let form = Form::new().part("file", Part::bytes(content).file_name("upload"));
        let response = self
            .client
            .post(self.url("/upload"))
            .query(&[("path", path)])
            .multipart(form)
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }

    async fn update(&self, path: &str, content: &'static [u8]) -> (StatusCode, String) {
        let form = Form::new().part("file", Part::bytes(content).file_name("update"));
        let response = self
            .client
            .put(self.url("/update"))
            .query(&[("path", path)])
            .multipart(form)
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }

    async fn mkdir(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .client
            .post(self.url("/directory"))
            .query(&[("path", path)])
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }

    async fn download(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url("/download"))
            .query(&[("path", path)])
            .send()
            .await
            .unwrap()
    }

    async fn list(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url("/list"))
            .query(&[("path", path)])
            .send()
            .await
            .unwrap();
        let status = response.status();
        let body = if status.is_success() {
            response.json().await.unwrap()
        } else {
            Value::String(response.text().await.unwrap())
        };
        (status, body)
    }

    async fn delete(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .client
            .delete(self.url("/delete"))
            .query(&[("path", path)])
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }

    async fn transfer(&self, route: &str, src: &str, dest: &str) -> (StatusCode, String) {
        let response = self
            .client
            .put(self.url(route))
            .query(&[("src", src), ("dest", dest)])
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }
}

#[tokio::test]
async fn test_upload_and_download() {
    let server = start_server().await;

    let (status, body) = server.upload("/a.txt", b"hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "file upload success");

    let response = server.download("/a.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["content-disposition"], "attachment; filename=\"a.txt\"");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["content-length"], "5");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");
}

#[tokio::test]
async fn test_upload_path_errors() {
    let server = start_server().await;

    let (status, _) = server.upload("/missing/a.txt", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.upload("/a.txt", b"first").await;
    let (status, body) = server.upload("/a.txt", b"second").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already exists"), "{body}");

    let response = server.download("/a.txt").await;
    assert_eq!(response.text().await.unwrap(), "first");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let server = start_server().await;

    let form = Form::new().text("other", "value");
    let response = server
        .client
        .post(server.url("/upload"))
        .query(&[("path", "/a.txt")])
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, listing) = server.list("/").await;
    assert_eq!(listing, json!([]));
}

#[tokio::test]
async fn test_upload_not_multipart() {
    let server = start_server().await;

    let response = server
        .client
        .post(server.url("/upload"))
        .query(&[("path", "/a.txt")])
        .body("raw")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_query_parameter() {
    let server = start_server().await;

    let response = server.client.get(server.url("/list")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server
        .client
        .put(server.url("/copy"))
        .query(&[("src", "/a")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_directory_and_list() {
    let server = start_server().await;

    let (status, body) = server.mkdir("/docs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "create directory success");

    server.upload("/docs/b", b"").await;
    server.upload("/docs/a", b"").await;
    server.mkdir("/docs/m").await;

    let (status, listing) = server.list("/docs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listing,
        json!([
            {"type": "file", "name": "a", "path": "/docs/a"},
            {"type": "file", "name": "b", "path": "/docs/b"},
            {"type": "dir", "name": "m", "path": "/docs/m"},
        ])
    );

    let (status, _) = server.mkdir("/docs").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_errors() {
    let server = start_server().await;
    server.upload("/f", b"x").await;

    let (status, _) = server.list("/f").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.list("/nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_errors() {
    let server = start_server().await;
    server.mkdir("/d").await;

    assert_eq!(server.download("/d").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.download("/nope").await.status(), StatusCode::BAD_REQUEST);

    server.upload("/f", b"x").await;
    server.storage.disk().fail_on(DiskOp::Open);
    assert_eq!(
        server.download("/f").await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_delete() {
    let server = start_server().await;
    server.mkdir("/d").await;
    server.upload("/d/f", b"x").await;

    let (status, body) = server.delete("/d").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "delete success");
    assert_eq!(server.list("/").await.1, json!([]));

    let (status, body) = server.delete("/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "cannot delete root");

    let (status, _) = server.delete("/d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_copy_and_move() {
    let server = start_server().await;
    server.mkdir("/docs").await;
    server.upload("/docs/a.txt", b"hi").await;

    let (status, body) = server.transfer("/copy", "/docs/a.txt", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "copy success");
    assert_eq!(server.download("/a.txt").await.text().await.unwrap(), "hi");
    assert_eq!(server.download("/docs/a.txt").await.text().await.unwrap(), "hi");

    server.mkdir("/archive").await;
    let (status, body) = server.transfer("/move", "/a.txt", "/archive").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "move success");

    let (_, root) = server.list("/").await;
    assert_eq!(
        root,
        json!([
            {"type": "dir", "name": "archive", "path": "/archive"},
            {"type": "dir", "name": "docs", "path": "/docs"},
        ])
    );
    assert_eq!(
        server.download("/archive/a.txt").await.text().await.unwrap(),
        "hi"
    );

    let (status, _) = server.transfer("/copy", "/docs", "/archive").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_move_incomplete_is_server_error() {
    let server = start_server().await;
    server.mkdir("/dst").await;
    server.upload("/a", b"x").await;
    server.storage.disk().fail_on(DiskOp::RemoveFile);

    let (status, body) = server.transfer("/move", "/a", "/dst").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("could not delete the source"), "{body}");

    let (_, root) = server.list("/").await;
    assert!(root.as_array().unwrap().iter().any(|e| e["name"] == "a"));
    let (_, dst) = server.list("/dst").await;
    assert_eq!(dst, json!([{"type": "file", "name": "a", "path": "/dst/a"}]));
}

#[tokio::test]
async fn test_update() {
    let server = start_server().await;
    server.upload("/a.txt", b"original content").await;

    let (status, body) = server.update("/a.txt", b"new").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "file update success");
    assert_eq!(server.download("/a.txt").await.text().await.unwrap(), "new");

    let (status, _) = server.update("/missing.txt", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_disk_failure_is_server_error() {
    let server = start_server().await;
    server.storage.disk().fail_on(DiskOp::CreateFile);

    let (status, _) = server.upload("/a.txt", b"x").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(server.list("/").await.1, json!([]));
}

#[tokio::test]
async fn test_oversize_upload_is_bad_request() {
    let server = start_server_with_limit(1024).await;
    static PAYLOAD: [u8; 64 * 1024] = [b'x'; 64 * 1024];

    let (status, body) = server.upload("/big.bin", &PAYLOAD).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(server.list("/").await.1, json!([]));
    assert!(!server.storage.root().join("big.bin").exists());

    let (status, _) = server.upload("/small.bin", b"fits").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_trace_headers_pass_through() {
    let server = start_server().await;

    let response = server
        .client
        .get(server.url("/list"))
        .query(&[("path", "/")])
        .header(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .header("tracestate", "kura=1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!([]));
}
