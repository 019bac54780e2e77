mod support;

use crate::support::{file, image_collection, tracing_init, MockCollectionApi, Request, ScriptedEncoder};
use curator::import::{DetailLoad, ImageDetailSession, SubmitError, ValidationError};
use curator::lock::LockError;
use curator::models::RecordId;
use serde_json::json;
use std::sync::Arc;

fn detail(api: &Arc<MockCollectionApi>, id: i64) -> ImageDetailSession {
    ImageDetailSession::new(
        api.clone(),
        "/images",
        RecordId::from(id),
        Arc::new(ScriptedEncoder::new().failing("corrupt.png")),
        Some(2),
    )
}

#[tokio::test]
async fn test_missing_collection_redirects_to_listing() {
    let api = Arc::new(MockCollectionApi::new());
    let mut session = detail(&api, 404);

    assert_eq!(
        session.load().await.unwrap(),
        DetailLoad::Redirect("/images".to_string())
    );
    assert!(session.record().is_none());
    assert_eq!(session.error_message(), None);
}

#[tokio::test]
async fn test_edit_appends_new_images_and_reloads() {
    tracing_init();
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(
        3,
        "Arca",
        &["img-1"],
    )]));
    let mut session = detail(&api, 3);
    assert_eq!(session.load().await.unwrap(), DetailLoad::Loaded);
    assert_eq!(session.draft().title, "Arca");

    session.begin_edit();
    session.set_title("Arca Bhairawa");
    session.add_files(vec![file("new.png", 4), file("corrupt.png", 5)]);
    session.settle().await;
    session.save().await.unwrap();

    assert!(!session.is_editing());
    assert!(session.view().is_empty());
    let record = session.record().unwrap();
    assert_eq!(record.title, "Arca Bhairawa");
    assert_eq!(record.images.len(), 2);

    let update = api
        .mutations()
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(
        update,
        Request::Update {
            endpoint: "/images".to_string(),
            id: RecordId::from(3),
            body: json!({
                "title": "Arca Bhairawa",
                "description": "Arca description",
                "images": [ScriptedEncoder::payload_for("new.png")],
            }),
        }
    );
}

#[tokio::test]
async fn test_text_only_edit_omits_images() {
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(3, "Arca", &[])]));
    let mut session = detail(&api, 3);
    session.load().await.unwrap();

    session.begin_edit();
    session.set_description("Updated");
    session.save().await.unwrap();

    let Some(Request::Update { body, .. }) = api.mutations().into_iter().next() else {
        panic!("expected an update");
    };
    assert_eq!(body, json!({"title": "Arca", "description": "Updated"}));
}

#[tokio::test]
async fn test_blank_description_blocks_save() {
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(3, "Arca", &[])]));
    let mut session = detail(&api, 3);
    session.load().await.unwrap();

    session.begin_edit();
    session.set_description("");
    assert!(matches!(
        session.save().await,
        Err(SubmitError::Validation(ValidationError::MissingTitleOrDescription))
    ));
    assert_eq!(
        session.error_message(),
        Some("Title and description are required.")
    );
    assert!(session.is_editing());
    assert!(api.mutations().is_empty());
}

#[tokio::test]
async fn test_cancel_edit_restores_the_draft() {
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(3, "Arca", &[])]));
    let mut session = detail(&api, 3);
    session.load().await.unwrap();

    session.begin_edit();
    session.set_title("Changed");
    session.add_files(vec![file("new.png", 1)]);
    session.cancel_edit();

    assert!(!session.is_editing());
    assert_eq!(session.draft().title, "Arca");
    assert!(session.view().is_empty());
}

#[tokio::test]
async fn test_image_delete_is_optimistic_and_exclusive() {
    tracing_init();
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(
        3,
        "Arca",
        &["img-1", "img-2"],
    )]));
    let mut session = detail(&api, 3);
    session.load().await.unwrap();

    let first = RecordId::from("img-1");
    let ticket = session.begin_delete_image(&first).unwrap();
    assert!(session.is_deleting(&first));
    assert!(!session.can_delete_image());
    assert!(matches!(
        session.begin_delete_image(&RecordId::from("img-2")),
        Err(LockError::Busy { .. })
    ));

    session.finish_delete_image(ticket, Ok(())).unwrap();
    assert!(session.can_delete_image());
    let remaining: Vec<&str> = session
        .record()
        .unwrap()
        .images
        .iter()
        .map(|img| img.id.as_str())
        .collect();
    assert_eq!(remaining, vec!["img-2"]);
}

#[tokio::test]
async fn test_failed_image_delete_keeps_the_image() {
    let api = Arc::new(MockCollectionApi::with_records(vec![image_collection(3, "Arca", &["img-1"])]));
    let mut session = detail(&api, 3);
    session.load().await.unwrap();
    api.fail_mutations(500, "busy");

    assert!(session.delete_image(&RecordId::from("img-1")).await.is_err());
    assert_eq!(session.error_message(), Some("Failed to delete image"));
    assert_eq!(session.record().unwrap().images.len(), 1);
    assert!(session.can_delete_image());
}
