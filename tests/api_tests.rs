//! Integration tests for the HTTP API, driven through actix's test service
//! without binding a socket.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use soccer_analyzer::api::{configure, AppState};
use soccer_analyzer::config::Settings;
use soccer_analyzer::pipeline::VideoProcessor;

fn test_state() -> web::Data<AppState> {
    let settings = Settings::default();
    let processor = VideoProcessor::new(settings.clone(), None, None);
    web::Data::new(AppState::new(settings, processor).unwrap())
}

/// The player page HTML-escapes attribute values, including `/`.
fn unescape_slashes(page: &str) -> String {
    page.replace("&#x2f;", "/")
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(App::new().configure(configure($state.clone()))).await
    };
}

#[actix_web::test]
async fn index_serves_the_ui() {
    let state = test_state();
    let app = test_app!(state);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("Soccer Commentary Analyzer"));
}

#[actix_web::test]
async fn analyzing_the_example_tags_every_minute() {
    let state = test_state();
    let app = test_app!(state);

    let example: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/example?language=en").to_request(),
    )
    .await;
    let text = example["text"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/analyze")
        .set_json(json!({"text": text, "language": "en"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 9);
    assert_eq!(results[1]["time"], "23'");
    assert!(results[1]["tags"].as_str().unwrap().contains("Messi"));
    assert_eq!(body["summary"]["total_events"], 9);

    let tagged = results
        .iter()
        .filter(|row| !row["event_types"].as_array().unwrap().is_empty())
        .count();
    assert_eq!(body["advertisements"].as_array().unwrap().len(), tagged);
}

#[actix_web::test]
async fn goal_rows_advertise_the_scorer_jersey() {
    let state = test_state();
    let app = test_app!(state);
    let req = test::TestRequest::post()
        .uri("/api/analyze")
        .set_json(json!({"text": "23' GOAL! Messi scores a brilliant goal", "language": "en"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let ads = body["advertisements"].as_array().unwrap();
    assert_eq!(ads.len(), 1);
    assert_eq!(ads[0]["time"], "23'");
    assert_eq!(ads[0]["merchandise"]["kind"], "jersey");
    assert_eq!(ads[0]["merchandise"]["name"], "Lionel Messi");
}

#[actix_web::test]
async fn blank_commentary_is_rejected() {
    let state = test_state();
    let app = test_app!(state);
    let req = test::TestRequest::post()
        .uri("/api/analyze")
        .set_json(json!({"text": "   ", "language": "es"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Please enter some commentary text to analyze.");
    assert_eq!(body["status"], 400);
}

#[actix_web::test]
async fn spanish_example_is_available() {
    let state = test_state();
    let app = test_app!(state);
    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/example?language=es").to_request(),
    )
    .await;
    assert_eq!(body["language"], "es");
    assert!(body["text"].as_str().unwrap().contains("¡GOL!"));
}

#[actix_web::test]
async fn unknown_language_is_a_bad_request() {
    let state = test_state();
    let app = test_app!(state);
    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/example?language=klingon").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn capabilities_reflect_configured_backends() {
    let state = test_state();
    let app = test_app!(state);
    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/capabilities").to_request(),
    )
    .await;
    assert_eq!(body, json!({"local": false, "cloud": false}));
}

#[actix_web::test]
async fn video_lifecycle() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/videos?name=final.mp4")
        .set_payload(b"fake mp4 bytes".to_vec())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let info: Value = test::read_body_json(resp).await;
    let id = info["id"].as_str().unwrap().to_string();
    assert_eq!(info["name"], "final.mp4");
    assert_eq!(info["size"], 14);

    let fetched: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri(&format!("/api/videos/{id}")).to_request(),
    )
    .await;
    assert_eq!(fetched["id"], id.as_str());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/videos/{id}/content"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp4");
    assert_eq!(&test::read_body(resp).await[..], b"fake mp4 bytes");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/videos/{id}/content"))
            .insert_header(("Range", "bytes=0-3"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers().get("content-range").unwrap(), "bytes 0-3/14");
    assert_eq!(&test::read_body(resp).await[..], b"fake");

    let commentary = "0:30 GOAL! Messi scores from the edge of the box";
    let req = test::TestRequest::post()
        .uri(&format!("/api/videos/{id}/player"))
        .set_json(json!({"commentary": commentary, "language": "en"}))
        .to_request();
    let page = String::from_utf8(test::call_and_read_body(&app, req).await.to_vec()).unwrap();
    assert!(unescape_slashes(&page).contains(&format!("/api/videos/{id}/content")));
    assert!(page.contains("Found 1 goal moments"));

    let req = test::TestRequest::post()
        .uri(&format!("/api/videos/{id}/player"))
        .set_json(json!({"commentary": "", "inline": true}))
        .to_request();
    let page = String::from_utf8(test::call_and_read_body(&app, req).await.to_vec()).unwrap();
    assert!(unescape_slashes(&page).contains("data:video/mp4;base64,"));
    assert!(page.contains("showing demo advertisements"));

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/videos/{id}"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri(&format!("/api/videos/{id}")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn uploads_must_be_non_empty_mp4() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/videos?name=notes.txt")
        .set_payload(b"hello".to_vec())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/videos?name=empty.mp4")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    assert!(state.store.is_empty());
}

#[actix_web::test]
async fn unavailable_method_returns_503() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/videos?name=clip.mp4")
        .set_payload(b"bytes".to_vec())
        .to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    let id = info["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/videos/{id}/process?language=en&method=local"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 503);
}

#[actix_web::test]
async fn unknown_video_is_not_found() {
    let state = test_state();
    let app = test_app!(state);
    for req in [
        test::TestRequest::get().uri("/api/videos/video-0-0").to_request(),
        test::TestRequest::get().uri("/api/videos/video-0-0/content").to_request(),
        test::TestRequest::delete().uri("/api/videos/video-0-0").to_request(),
        test::TestRequest::post()
            .uri("/api/videos/video-0-0/process?method=cloud")
            .to_request(),
    ] {
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
