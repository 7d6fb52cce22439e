//! Like toggling and its optimistic-concurrency guarantees.

mod common;

use axum::http::StatusCode;
use common::app;
use ripple::app::engagement::{EngagementService, ToggleOutcome};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn toggle_adds_then_removes_like() {
    let app = app().await;
    let author = app.create_user("eng_author").await;
    let liker = app.create_user("eng_liker").await;
    let post_id = app.create_post_for_user(author.id).await;

    let resp = app
        .post_json(&format!("/v1/posts/{}/like", post_id), json!({}), Some(&liker.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["liked"].as_bool().unwrap());
    assert_eq!(body["like_count"].as_i64().unwrap(), 1);

    let resp = app
        .post_json(&format!("/v1/posts/{}/like", post_id), json!({}), Some(&liker.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(!body["liked"].as_bool().unwrap());
    assert_eq!(body["like_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn toggle_parity_and_counter_invariant() {
    let app = app().await;
    let author = app.create_user("eng_parity_author").await;
    let liker = app.create_user("eng_parity_liker").await;
    let post_id = app.create_post_for_user(author.id).await;

    for round in 1..=5 {
        let resp = app
            .post_json(&format!("/v1/posts/{}/like", post_id), json!({}), Some(&liker.token))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json()["liked"].as_bool().unwrap(), round % 2 == 1);

        // like_count always equals |likes| after every committed toggle
        let post = app.get(&format!("/v1/posts/{}", post_id), None).await.json();
        assert_eq!(
            post["like_count"].as_i64().unwrap(),
            post["likes"].as_array().unwrap().len() as i64
        );
    }

    // 5 toggles — odd, so the like sticks
    let post = app.get(&format!("/v1/posts/{}", post_id), None).await.json();
    assert_eq!(post["like_count"].as_i64().unwrap(), 1);
}

#[tokio::test]
async fn likes_from_two_users_accumulate() {
    let app = app().await;
    let author = app.create_user("eng_two_author").await;
    let liker_a = app.create_user("eng_two_a").await;
    let liker_b = app.create_user("eng_two_b").await;
    let post_id = app.create_post_for_user(author.id).await;

    app.post_json(&format!("/v1/posts/{}/like", post_id), json!({}), Some(&liker_a.token))
        .await;
    let resp = app
        .post_json(&format!("/v1/posts/{}/like", post_id), json!({}), Some(&liker_b.token))
        .await;

    assert_eq!(resp.json()["like_count"].as_i64().unwrap(), 2);

    let post = app.get(&format!("/v1/posts/{}", post_id), None).await.json();
    let likes: Vec<&str> = post["likes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(likes.contains(&liker_a.id.to_string().as_str()));
    assert!(likes.contains(&liker_b.id.to_string().as_str()));
}

#[tokio::test]
async fn stale_post_version_conflicts() {
    let app = app().await;
    let author = app.create_user("eng_stale_author").await;
    let user_a = app.create_user("eng_stale_a").await;
    let user_b = app.create_user("eng_stale_b").await;
    let post_id = app.create_post_for_user(author.id).await;

    let service = EngagementService::new(app.state.db.clone());

    // A loads the post at version v, then B's toggle commits first
    let stale = service.post_snapshot(post_id).await.unwrap().unwrap();
    let outcome = service.toggle_post_like(post_id, user_b.id).await.unwrap();
    assert!(matches!(
        outcome,
        Some(ToggleOutcome::Applied { liked: true, like_count: 1 })
    ));

    // A's commit against the stale version must fail, not overwrite
    let outcome = service.commit_post_toggle(&stale, user_a.id).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Conflict);

    // B's like survived untouched
    let post = app.get(&format!("/v1/posts/{}", post_id), None).await.json();
    assert_eq!(post["like_count"].as_i64().unwrap(), 1);
    assert_eq!(
        post["likes"][0].as_str().unwrap(),
        user_b.id.to_string()
    );
}

#[tokio::test]
async fn like_missing_post() {
    let app = app().await;
    let user = app.create_user("eng_missing").await;

    let resp = app
        .post_json(
            &format!("/v1/posts/{}/like", Uuid::new_v4()),
            json!({}),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn like_requires_auth() {
    let app = app().await;
    let author = app.create_user("eng_noauth_author").await;
    let post_id = app.create_post_for_user(author.id).await;

    let resp = app
        .post_json(&format!("/v1/posts/{}/like", post_id), json!({}), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn comment_like_toggles() {
    let app = app().await;
    let author = app.create_user("eng_cmt_author").await;
    let liker = app.create_user("eng_cmt_liker").await;
    let post_id = app.create_post_for_user(author.id).await;
    let comment_id = app.create_comment_for_user(author.id, post_id).await;

    let resp = app
        .post_json(
            &format!("/v1/comments/{}/like", comment_id),
            json!({}),
            Some(&liker.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["liked"].as_bool().unwrap());

    let resp = app
        .post_json(
            &format!("/v1/comments/{}/like", comment_id),
            json!({}),
            Some(&liker.token),
        )
        .await;
    assert!(!resp.json()["liked"].as_bool().unwrap());

    let comment = app
        .get(&format!("/v1/comments/{}", comment_id), None)
        .await
        .json();
    assert!(comment["likes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stale_comment_version_conflicts() {
    let app = app().await;
    let author = app.create_user("eng_cstale_author").await;
    let user_a = app.create_user("eng_cstale_a").await;
    let user_b = app.create_user("eng_cstale_b").await;
    let post_id = app.create_post_for_user(author.id).await;
    let comment_id = app.create_comment_for_user(author.id, post_id).await;

    let service = EngagementService::new(app.state.db.clone());

    let stale = service.comment_snapshot(comment_id).await.unwrap().unwrap();
    service
        .toggle_comment_like(comment_id, user_b.id)
        .await
        .unwrap();

    let outcome = service
        .commit_comment_toggle(&stale, user_a.id)
        .await
        .unwrap();
    assert_eq!(outcome, ToggleOutcome::Conflict);
}
