mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp};
use serde::Deserialize;
use serde_json::json;
use vault::models::Note;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

async fn create(app: &TestApp, payload: serde_json::Value) -> Result<Note> {
    let response = app.post_json("/api/notes", &payload).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response.into_body()).await
}

#[tokio::test]
async fn create_applies_defaults() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let blank = create(&app, json!({})).await?;
    assert_eq!(blank.title, "Untitled Note");
    assert_eq!(blank.content, "");
    assert!(blank.is_active);
    assert_eq!(blank.view_count, 0);

    let no_body = app.post_empty("/api/notes").await?;
    assert_eq!(no_body.status(), StatusCode::CREATED);
    let no_body: Note = body_json(no_body.into_body()).await?;
    assert_eq!(no_body.title, "Untitled Note");

    let titled = create(&app, json!({ "title": "Todo", "content": "<p>milk</p>" })).await?;
    assert_eq!(titled.title, "Todo");
    assert_eq!(titled.content, "<p>milk</p>");

    let wrong_type = app.post_json("/api/notes", &json!({ "title": 5 })).await?;
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);
    let error: ErrorBody = body_json(wrong_type.into_body()).await?;
    assert!(error.error.contains("title"));

    let list = app.get("/api/notes").await?;
    let notes: Vec<Note> = body_json(list.into_body()).await?;
    assert_eq!(notes.len(), 3);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn partial_updates_touch_only_given_fields() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let note = create(&app, json!({ "title": "Todo", "content": "<p>milk</p>" })).await?;

    let response = app
        .put_json(
            &format!("/api/notes/{}", note.id),
            &json!({ "content": "<p>milk, eggs</p>" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let first: Note = body_json(response.into_body()).await?;
    assert_eq!(first.title, "Todo");
    assert_eq!(first.content, "<p>milk, eggs</p>");
    assert!(first.last_edited > note.last_edited);

    let response = app
        .put_json(&format!("/api/notes/{}", note.id), &json!({ "title": "" }))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let second: Note = body_json(response.into_body()).await?;
    assert_eq!(second.title, "Untitled Note");
    assert_eq!(second.content, "<p>milk, eggs</p>");
    assert!(second.last_edited > first.last_edited);

    let cleared = app
        .put_json(&format!("/api/notes/{}", note.id), &json!({ "content": "" }))
        .await?;
    let cleared: Note = body_json(cleared.into_body()).await?;
    assert_eq!(cleared.content, "");

    let null_title = app
        .put_json(&format!("/api/notes/{}", note.id), &json!({ "title": null }))
        .await?;
    assert_eq!(null_title.status(), StatusCode::BAD_REQUEST);
    let error: ErrorBody = body_json(null_title.into_body()).await?;
    assert!(error.error.contains("title"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn long_titles_are_stored_in_full() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let long_title = "t".repeat(300);
    let note = create(&app, json!({ "title": &long_title })).await?;
    assert_eq!(note.title, long_title);

    let longer_title = "u".repeat(300);
    let response = app
        .put_json(
            &format!("/api/notes/{}", note.id),
            &json!({ "title": &longer_title }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Note = body_json(response.into_body()).await?;
    assert_eq!(updated.title, longer_title);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn soft_delete_and_restore() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let keep = create(&app, json!({ "title": "Keep" })).await?;
    let trash = create(&app, json!({ "title": "Trash me" })).await?;

    let deleted = app.delete(&format!("/api/notes/{}", trash.id)).await?;
    assert_eq!(deleted.status(), StatusCode::OK);
    let message: MessageBody = body_json(deleted.into_body()).await?;
    assert_eq!(message.message, "Note deleted successfully");

    let list = app.get("/api/notes").await?;
    let notes: Vec<Note> = body_json(list.into_body()).await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, keep.id);

    let hidden = app.get(&format!("/api/notes/{}", trash.id)).await?;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    let error: ErrorBody = body_json(hidden.into_body()).await?;
    assert_eq!(error.error, "Note not found");

    let update_hidden = app
        .put_json(&format!("/api/notes/{}", trash.id), &json!({ "title": "x" }))
        .await?;
    assert_eq!(update_hidden.status(), StatusCode::NOT_FOUND);

    let restored = app.put_empty(&format!("/api/notes/{}/restore", trash.id)).await?;
    assert_eq!(restored.status(), StatusCode::OK);
    let restored: Note = body_json(restored.into_body()).await?;
    assert!(restored.is_active);
    assert_eq!(restored.title, "Trash me");

    let list = app.get("/api/notes").await?;
    let notes: Vec<Note> = body_json(list.into_body()).await?;
    assert_eq!(notes.len(), 2);

    let unknown = app
        .delete("/api/notes/00000000-0000-4000-8000-000000000000")
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn get_counts_views() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let note = create(&app, json!({ "title": "Read me" })).await?;
    for expected in 1..=2 {
        let response = app.get(&format!("/api/notes/{}", note.id)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Note = body_json(response.into_body()).await?;
        assert_eq!(fetched.view_count, expected);
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn search_matches_title_or_content() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    create(&app, json!({ "title": "Quarterly plan", "content": "" })).await?;
    create(&app, json!({ "title": "Budget", "content": "<p>numbers for the QUARTERLY review</p>" }))
        .await?;
    create(&app, json!({ "title": "Groceries", "content": "<p>milk</p>" })).await?;

    let response = app.get("/api/notes?search=quarterly").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let notes: Vec<Note> = body_json(response.into_body()).await?;
    let mut titles: Vec<String> = notes.into_iter().map(|note| note.title).collect();
    titles.sort();
    assert_eq!(titles, vec!["Budget", "Quarterly plan"]);

    let by_title = app.get("/api/notes?sort=title").await?;
    let notes: Vec<Note> = body_json(by_title.into_body()).await?;
    let titles: Vec<&str> = notes.iter().map(|note| note.title.as_str()).collect();
    assert_eq!(titles, vec!["Quarterly plan", "Groceries", "Budget"]);

    app.cleanup().await?;
    Ok(())
}
