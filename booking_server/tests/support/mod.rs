// Shared bootstrapping for integration tests: one booking server backed by a fake document store.
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
    time::Duration,
};

use booking_server::Settings;
use booking_server::frameworks::config::FileConfig;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "s3cret";
pub const MATCHING_PHONE: &str = "0912345678";

// Base URL published once the server has bound its port.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let store = start_fake_store().await;
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                booking_server::run(listener, settings(&store.uri()))
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn settings(store_uri: &str) -> Settings {
    let vars: HashMap<String, String> = [
        ("ADMIN_USER", ADMIN_USER),
        ("ADMIN_PASS", ADMIN_PASS),
        ("ADMIN_JWT_SECRET", "integration-secret"),
        ("CLOUDINARY_CLOUD_NAME", "demo"),
        ("CLOUDINARY_API_KEY", "key"),
        ("CLOUDINARY_API_SECRET", "secret"),
        ("CLOUDINARY_API_BASE", store_uri),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    Settings::from_sources(FileConfig::default(), &vars).expect("test settings")
}

// A search mentioning the phone number returns only the matching booking.
async fn start_fake_store() -> MockServer {
    let server = MockServer::start().await;
    let matching = json!({
        "public_id": "booking/match",
        "created_at": "2025-10-01T02:00:00Z",
        "resource_type": "raw",
        "type": "upload",
        "context": { "姓名": "王小明", "電話": MATCHING_PHONE, "室內機所在樓層": "5F" },
    });
    let other = json!({
        "public_id": "booking/other",
        "created_at": "2025-09-30T02:00:00Z",
        "resource_type": "raw",
        "type": "upload",
        "context": { "name": "陳大文", "phone": "0987000111" },
    });

    Mock::given(method("POST"))
        .and(path("/demo/resources/search"))
        .and(body_string_contains(MATCHING_PHONE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [matching],
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/demo/resources/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [matching, other],
            "next_cursor": "page-2",
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    server
}

// Wait for URL publication and then for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
