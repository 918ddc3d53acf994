//! Tests for the server side of the CouchDB replication protocol:
//! forced revision writes (`new_edits=false`), `_revs_diff`, tombstone
//! propagation, and checkpoint storage.

mod common;

use axum::http::StatusCode;
use common::{json_request, test_router};
use serde_json::json;

#[tokio::test]
async fn test_replicator_put_with_new_edits_false() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    let doc = json!({
        "v": 1,
        "_revisions": {"start": 2, "ids": ["bbbb", "aaaa"]}
    });
    let (status, body) = json_request(
        &router,
        "PUT",
        "/mydb/doc?new_edits=false",
        Some(doc.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rev"], json!("2-bbbb"));

    // the document surfaces under the pushed revid
    let (status, read) = json_request(&router, "GET", "/mydb/doc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["_rev"], json!("2-bbbb"));
    assert_eq!(read["v"], json!(1));

    // pushing the same revision again is a no-op: no new sequence
    let (_, changes) = json_request(&router, "GET", "/mydb/_changes", None).await;
    assert_eq!(changes["last_seq"], json!(1));
    let (status, _) = json_request(&router, "PUT", "/mydb/doc?new_edits=false", Some(doc)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, changes) = json_request(&router, "GET", "/mydb/_changes", None).await;
    assert_eq!(changes["last_seq"], json!(1));
}

#[tokio::test]
async fn test_replicator_put_rejects_bad_revisions() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    // start shorter than the ids list
    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/doc?new_edits=false",
        Some(json!({"_revisions": {"start": 1, "ids": ["bbbb", "aaaa"]}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // missing _revisions entirely
    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/doc?new_edits=false",
        Some(json!({"v": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forced_write_extends_local_history() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    // local edit, then a remote branch that builds on it
    let (_, body) = json_request(&router, "PUT", "/mydb/doc", Some(json!({"v": 1}))).await;
    let rev1 = body["rev"].as_str().unwrap().to_string();
    let digest1 = rev1.split_once('-').unwrap().1.to_string();

    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/doc?new_edits=false",
        Some(json!({
            "v": 2,
            "_revisions": {"start": 2, "ids": ["remote2", digest1]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // the merged history still answers for the ancestor
    let (_, diff) = json_request(
        &router,
        "POST",
        "/mydb/_revs_diff",
        Some(json!({"doc": [rev1, "2-remote2", "9-unknown"]})),
    )
    .await;
    assert_eq!(diff, json!({"doc": {"missing": ["9-unknown"]}}));
}

#[tokio::test]
async fn test_revs_diff() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    let (_, body) = json_request(&router, "PUT", "/mydb/a", Some(json!({"v": 1}))).await;
    let rev1 = body["rev"].as_str().unwrap().to_string();
    let (_, body) = json_request(
        &router,
        "PUT",
        "/mydb/a",
        Some(json!({"v": 2, "_rev": rev1})),
    )
    .await;
    let rev2 = body["rev"].as_str().unwrap().to_string();

    let (status, diff) = json_request(
        &router,
        "POST",
        "/mydb/_revs_diff",
        Some(json!({
            "a": [rev1, "9-zz"],
            "b": ["1-q"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        diff,
        json!({
            "a": {"missing": ["9-zz"]},
            "b": {"missing": ["1-q"]}
        })
    );

    // a caller that is fully caught up gets an empty diff
    let (_, diff) = json_request(
        &router,
        "POST",
        "/mydb/_revs_diff",
        Some(json!({"a": [rev2]})),
    )
    .await;
    assert_eq!(diff, json!({}));
}

#[tokio::test]
async fn test_bulk_docs_with_new_edits_false() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    let (status, body) = json_request(
        &router,
        "POST",
        "/mydb/_bulk_docs",
        Some(json!({
            "new_edits": false,
            "docs": [
                {"_id": "x", "v": 1, "_revisions": {"start": 1, "ids": ["aaaa"]}},
                {"_id": "y", "v": 2, "_revisions": {"start": 3, "ids": ["cccc", "bbbb", "aaaa"]}},
                {"v": 3},
                {"_id": "_sys", "_revisions": {"start": 1, "ids": ["aaaa"]}}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let docs = body["docs"].as_array().unwrap();
    assert_eq!(docs[0], json!({"id": "x", "rev": "1-aaaa"}));
    assert_eq!(docs[1], json!({"id": "y", "rev": "3-cccc"}));
    // a replicated doc without an _id cannot be stored
    assert_eq!(docs[2], json!({"error": "bad_request"}));
    // nor can one pushed under a reserved id
    assert_eq!(docs[3], json!({"id": "_sys", "error": "bad_request"}));

    let (_, read) = json_request(&router, "GET", "/mydb/y", None).await;
    assert_eq!(read["_rev"], json!("3-cccc"));
}

#[tokio::test]
async fn test_forced_deletion_shows_in_changes() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    let (_, body) = json_request(&router, "PUT", "/mydb/doc", Some(json!({"v": 1}))).await;
    let rev1 = body["rev"].as_str().unwrap().to_string();
    let digest1 = rev1.split_once('-').unwrap().1.to_string();

    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/doc?new_edits=false",
        Some(json!({
            "_deleted": true,
            "_revisions": {"start": 2, "ids": ["dead", digest1]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = json_request(&router, "GET", "/mydb/doc", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, changes) = json_request(&router, "GET", "/mydb/_changes?since=0", None).await;
    let results = changes["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["deleted"], json!(true));
    assert_eq!(results[0]["changes"], json!([{"rev": "2-dead"}]));
}

#[tokio::test]
async fn test_checkpoint_roundtrip() {
    let router = test_router();
    json_request(&router, "PUT", "/mydb", None).await;

    // replicators store their state under _local between pulls
    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/_local/remote-checkpoint",
        Some(json!({"last_seq": 12, "session": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        json_request(&router, "GET", "/mydb/_local/remote-checkpoint", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["last_seq"], json!(12));

    let (status, _) = json_request(
        &router,
        "PUT",
        "/mydb/_local/remote-checkpoint",
        Some(json!({"last_seq": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = json_request(&router, "GET", "/mydb/_local/remote-checkpoint", None).await;
    assert_eq!(body["last_seq"], json!(20));
}

#[tokio::test]
async fn test_identical_updates_converge_on_one_revid() {
    // two databases acting as two replicas: the same update must
    // produce the same revid on both
    let router = test_router();
    json_request(&router, "PUT", "/r1", None).await;
    json_request(&router, "PUT", "/r2", None).await;

    let (_, a) = json_request(&router, "PUT", "/r1/doc", Some(json!({"v": 1}))).await;
    let (_, b) = json_request(&router, "PUT", "/r2/doc", Some(json!({"v": 1}))).await;
    assert_eq!(a["rev"], b["rev"]);

    let rev = a["rev"].as_str().unwrap().to_string();
    let update = json!({"v": 2, "_rev": rev});
    let (_, a) = json_request(&router, "PUT", "/r1/doc", Some(update.clone())).await;
    let (_, b) = json_request(&router, "PUT", "/r2/doc", Some(update)).await;
    assert_eq!(a["rev"], b["rev"]);
}
