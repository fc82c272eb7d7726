//! End-to-end scenarios covering the channel protocol's main flows,
//! driven straight through the axum `Router` with
//! `tower::ServiceExt::oneshot` rather than a real socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rpiped::admin::nonce::NoncePool;
use rpiped::http::{router, AppState};
use rpiped::state::State;
use rpiped::stats::Stats;
use rpiped::version::VersionContract;
use semver::Version;
use tower::ServiceExt;

fn test_app(min_version: Version, pipe_max_bytes: usize) -> axum::Router {
    let stats = Stats::new();
    let state = Arc::new(State::new(stats.clone()));
    let app_state = Arc::new(AppState {
        state,
        stats,
        contract: VersionContract::new(min_version, vec![]),
        nonce_pool: NoncePool::new(),
        admin_public_key: None,
        debug: true,
        state_file: None,
        pipe_max_bytes,
    });
    router(app_state)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body())
        .await
        .unwrap()
        .to_vec()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn scenario_1_basic_create_write_read_drain() {
    let app = test_app(Version::new(0, 0, 0), 16 * 1024 * 1024);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/A?version=1.0.0&final=false&ttl=60&encrypted=false")
                .body(Body::from("hello "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let stream_id = header(&create, "stream_id").to_string();

    let put = app
        .clone()
        .oneshot(
            Request::put(format!("/c/A?stream_id={stream_id}&final=true"))
                .body(Body::from("world"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);

    let first = app
        .clone()
        .oneshot(
            Request::get("/c/A?version=1.0.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "final"), "false");
    assert_eq!(body_bytes(first).await, b"hello ");

    let second = app
        .clone()
        .oneshot(
            Request::get("/c/A?version=1.0.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "final"), "true");
    assert_eq!(body_bytes(second).await, b"world");

    let third = app
        .clone()
        .oneshot(
            Request::get("/c/A?version=1.0.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::NO_CONTENT);

    let meta = app
        .clone()
        .oneshot(Request::get("/q/A").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(meta.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn scenario_2_over_capacity_then_drain_and_retry() {
    let app = test_app(Version::new(0, 0, 0), 16);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/B?version=1.0.0&final=false")
                .body(Body::from("0123456789"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let stream_id = header(&create, "stream_id").to_string();

    let put_too_much = app
        .clone()
        .oneshot(
            Request::put(format!("/c/B?stream_id={stream_id}"))
                .body(Body::from("0123456789"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put_too_much.status(), StatusCode::from_u16(425).unwrap());

    let drain = app
        .clone()
        .oneshot(Request::get("/c/B?version=1.0.0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(drain.status(), StatusCode::OK);

    let retry = app
        .clone()
        .oneshot(
            Request::put(format!("/c/B?stream_id={stream_id}"))
                .body(Body::from("0123456789"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn scenario_3_concurrent_writers_conflict() {
    let app = test_app(Version::new(0, 0, 0), 16 * 1024 * 1024);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/C?version=1.0.0&final=false")
                .body(Body::from("s1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);

    let second_post = app
        .clone()
        .oneshot(
            Request::post("/c/C?version=1.0.0&final=false")
                .body(Body::from("s2"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second_post.status(), StatusCode::CONFLICT);

    let put_wrong_id = app
        .clone()
        .oneshot(
            Request::put("/c/C?stream_id=not-the-real-one")
                .body(Body::from("nope"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put_wrong_id.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn scenario_4_peek_does_not_advance() {
    let app = test_app(Version::new(0, 0, 0), 16 * 1024 * 1024);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/D?version=1.0.0&final=false")
                .body(Body::from("one"))
                .unwrap(),
        )
        .await
        .unwrap();
    let stream_id = header(&create, "stream_id").to_string();

    app.clone()
        .oneshot(
            Request::put(format!("/c/D?stream_id={stream_id}&final=true"))
                .body(Body::from("two"))
                .unwrap(),
        )
        .await
        .unwrap();

    let peek1 = app
        .clone()
        .oneshot(Request::get("/c/D?peek=true").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_bytes(peek1).await, b"onetwo");

    let peek2 = app
        .clone()
        .oneshot(Request::get("/c/D?peek=true").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_bytes(peek2).await, b"onetwo");

    let real_read = app
        .clone()
        .oneshot(Request::get("/c/D").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_bytes(real_read).await, b"onetwo");
}

#[tokio::test]
async fn scenario_5_version_gate() {
    let app = test_app(Version::new(2, 0, 0), 16 * 1024 * 1024);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/E?version=1.0.0&final=false")
                .body(Body::from("x"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::UPGRADE_REQUIRED);
    let text = String::from_utf8(body_bytes(create).await).unwrap();
    assert!(text.contains("2.0.0"));
}

#[tokio::test]
async fn read_override_bypasses_version_gate() {
    let app = test_app(Version::new(2, 0, 0), 16 * 1024 * 1024);

    app.clone()
        .oneshot(
            Request::post("/c/G?version=2.0.0&final=true")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    let rejected = app
        .clone()
        .oneshot(
            Request::get("/c/G?version=1.0.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UPGRADE_REQUIRED);

    let forced = app
        .clone()
        .oneshot(
            Request::get("/c/G?version=1.0.0&override=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forced.status(), StatusCode::OK);
    assert_eq!(body_bytes(forced).await, b"payload");
}

#[tokio::test]
async fn append_to_expired_channel_is_rejected_as_no_data() {
    let app = test_app(Version::new(0, 0, 0), 16 * 1024 * 1024);

    let create = app
        .clone()
        .oneshot(
            Request::post("/c/H?version=1.0.0&final=false&ttl=0")
                .body(Body::from("first"))
                .unwrap(),
        )
        .await
        .unwrap();
    let stream_id = header(&create, "stream_id").to_string();

    // ttl=0 means `expire` is already in the past by the time this runs.
    let put = app
        .clone()
        .oneshot(
            Request::put(format!("/c/H?stream_id={stream_id}"))
                .body(Body::from("second"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn version_endpoint_is_plain_text_and_supported_uses_min_banned_keys() {
    let app = test_app(Version::new(1, 2, 3), 16 * 1024 * 1024);

    let version = app
        .clone()
        .oneshot(Request::get("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(version.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(version).await).unwrap();
    assert_eq!(text, "1.2.3");

    let supported = app
        .clone()
        .oneshot(Request::get("/supported").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(supported.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(supported).await).unwrap();
    assert_eq!(json["min"], "1.2.3");
    assert!(json["banned"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_6_restart_round_trips_via_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.bin");

    {
        let stats = Stats::new();
        let state = Arc::new(State::new(stats.clone()));
        state
            .with_state(|s| {
                let mut e = rpiped::stream::Stream::new(
                    Version::new(1, 0, 0),
                    false,
                    chrono::Utc::now() + chrono::Duration::seconds(60),
                    "sid-e".into(),
                );
                e.data.push_back(bytes::Bytes::from_static(b"payload-e"));
                e.mark_final();
                s.streams.insert("E".into(), e);

                let mut f = rpiped::stream::Stream::new(
                    Version::new(1, 0, 0),
                    false,
                    chrono::Utc::now() + chrono::Duration::seconds(60),
                    "sid-f".into(),
                );
                f.data.push_back(bytes::Bytes::from_static(b"payload-f"));
                f.mark_final();
                s.streams.insert("F".into(), f);
            })
            .unwrap();

        // simulate graceful shutdown
        rpiped::shutdown::shutdown(&state, Some(&path)).unwrap();
    }

    let streams = rpiped::persist::load_or_empty(&path);
    assert_eq!(
        streams["E"].data.iter().flatten().copied().collect::<Vec<u8>>(),
        b"payload-e".to_vec()
    );
    assert_eq!(
        streams["F"].data.iter().flatten().copied().collect::<Vec<u8>>(),
        b"payload-f".to_vec()
    );

    let stats = Stats::new();
    assert_eq!(stats.snapshot().bytes_in, 0);
    assert_eq!(stats.snapshot().streams_created, 0);
}
