mod support;

use axum::http::StatusCode;
use support::{TestApp, body_text, location};

#[tokio::test]
async fn anonymous_create_redirects_to_login_with_next() {
    let app = TestApp::new();

    let response = app.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let target = location(&response);
    assert!(target.starts_with("/auth/login/?"));
    assert!(target.contains("next=/create/"), "{target}");
}

#[tokio::test]
async fn anonymous_post_is_redirected_before_the_body_is_read() {
    let app = TestApp::new();
    let response = app
        .post_multipart("/create/", None, &[("text", "hello")], None)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(app.store.posts().is_empty());
}

#[tokio::test]
async fn unknown_forwarded_user_is_anonymous() {
    let app = TestApp::new();
    let response = app.get("/follow/", Some("nobody")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).contains("next=/follow/"));
}

#[tokio::test]
async fn non_author_edit_shows_read_only_detail() {
    let app = TestApp::new();
    let leo = app.store.add_user("leo");
    app.store.add_user("ana");
    let post = app.store.add_post(&leo, "original words", None);

    let response = app.get(&format!("/posts/{}/edit/", post.id), Some("ana")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("original words"));
    assert!(html.contains("Comments"));
    assert!(!html.contains("<textarea id=\"id_text\""));

    let response = app
        .post_multipart(
            &format!("/posts/{}/edit/", post.id),
            Some("ana"),
            &[("text", "hijacked")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.store.post(post.id).expect("post").text,
        "original words"
    );
}

#[tokio::test]
async fn author_sees_edit_form() {
    let app = TestApp::new();
    let leo = app.store.add_user("leo");
    let post = app.store.add_post(&leo, "draft text", None);

    let response = app.get(&format!("/posts/{}/edit/", post.id), Some("leo")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<textarea id=\"id_text\""));
    assert!(html.contains("draft text"));
}

#[tokio::test]
async fn non_author_delete_redirects_to_detail() {
    let app = TestApp::new();
    let leo = app.store.add_user("leo");
    app.store.add_user("ana");
    let post = app.store.add_post(&leo, "keep me", None);

    let response = app
        .post_form(&format!("/posts/{}/delete/", post.id), Some("ana"), "")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    assert!(app.store.post(post.id).is_some());
}

#[tokio::test]
async fn author_delete_removes_post_and_returns_home() {
    let app = TestApp::new();
    let leo = app.store.add_user("leo");
    let post = app.store.add_post(&leo, "delete me", None);

    let response = app
        .get(&format!("/posts/{}/delete/", post.id), Some("leo"))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(app.store.post(post.id).is_none());
}
