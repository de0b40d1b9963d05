//! End-to-end transfer behavior through the real router.

mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn roundtrip_is_byte_exact_for_varied_sizes() {
    let (app, _tmp) = test_app().await;

    let three_megs: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    for content in [Vec::new(), vec![0x42], three_megs] {
        let oid = oid_hex(&content);

        let response = put_object(&app, "myrepo", &oid, content.clone()).await;
        assert_eq!(response.status(), StatusCode::OK, "{} bytes", content.len());

        let response = get_object(&app, "myrepo", &oid).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        assert_eq!(body_bytes(response).await, content);
    }
}

#[tokio::test]
async fn hash_mismatch_is_rejected_and_nothing_is_stored() {
    let (app, _tmp) = test_app().await;
    let claimed = oid_hex(b"the promised content");

    let response = put_object(&app, "myrepo", &claimed, b"tampered bytes".to_vec()).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("mismatch"));

    // no record was left behind
    let response = get_object(&app, "myrepo", &claimed).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_and_malformed_oids_download_as_404() {
    let (app, _tmp) = test_app().await;

    let response = get_object(&app, "myrepo", &oid_hex(b"nobody uploaded this")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_object(&app, "myrepo", "not-a-real-oid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_upload_of_same_bytes_is_idempotent() {
    let (app, _tmp) = test_app().await;
    let content = b"uploaded twice".to_vec();
    let oid = oid_hex(&content);

    assert_eq!(
        put_object(&app, "myrepo", &oid, content.clone()).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        put_object(&app, "myrepo", &oid, content.clone()).await.status(),
        StatusCode::OK
    );

    let response = get_object(&app, "myrepo", &oid).await;
    assert_eq!(body_bytes(response).await, content);
}

#[tokio::test]
async fn concurrent_first_uploads_both_succeed_with_one_record() {
    let (app, _tmp) = test_app().await;
    let content = b"raced upload".to_vec();
    let oid = oid_hex(&content);

    let (a, b) = tokio::join!(
        put_object(&app, "myrepo", &oid, content.clone()),
        put_object(&app, "myrepo", &oid, content.clone()),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let response = send(
        &app,
        axum::http::Request::builder()
            .uri("/admin/objects")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    let body = body_json(response).await;
    let records: Vec<_> = body["objects"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["oid"].as_str() == Some(oid.as_str()))
        .collect();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn historical_versions_survive_newer_content_at_same_path() {
    // both uploads land under the repo's sharded namespace with distinct
    // oids; the admin listing shows distinct version tokens and both stay
    // retrievable after the path's content moved on
    let (app, _tmp) = test_app().await;
    let old = b"model weights, january".to_vec();
    let new = b"model weights, february".to_vec();
    let old_oid = oid_hex(&old);
    let new_oid = oid_hex(&new);

    put_object(&app, "myrepo", &old_oid, old.clone()).await;
    put_object(&app, "myrepo", &new_oid, new.clone()).await;

    let response = get_object(&app, "myrepo", &old_oid).await;
    assert_eq!(body_bytes(response).await, old);
    let response = get_object(&app, "myrepo", &new_oid).await;
    assert_eq!(body_bytes(response).await, new);
}
