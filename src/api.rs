use actix_files::NamedFile;
use actix_web::middleware::Logger;
use actix_web::{delete, get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};

use crate::analyzer::{example_commentary, summarize, AnalysisRow, SoccerAnalyzer, Summary};
use crate::config::Settings;
use crate::error::ApiError;
use crate::language::Language;
use crate::merchandise::{EventAdvertisement, MerchandiseMatcher};
use crate::overlay::{demo_goal_events, goal_events, OverlayPlayer, VideoSource};
use crate::pipeline::{ProcessingMethod, VideoProcessor};
use crate::store::{StoredVideo, VideoStore};

const INDEX_PAGE: &str = include_str!("../static/index.html");
const JSON_LIMIT: usize = 4 * 1024 * 1024;

/// Everything the handlers share.
pub struct AppState {
    pub settings: Settings,
    pub processor: VideoProcessor,
    pub store: VideoStore,
    pub player: OverlayPlayer,
    pub merchandise: MerchandiseMatcher,
    english: SoccerAnalyzer,
    spanish: SoccerAnalyzer,
}

impl AppState {
    pub fn new(settings: Settings, processor: VideoProcessor) -> Result<Self> {
        Ok(Self {
            settings,
            processor,
            store: VideoStore::new(),
            player: OverlayPlayer::new()?,
            merchandise: MerchandiseMatcher::new()?,
            english: SoccerAnalyzer::new(Language::English)?,
            spanish: SoccerAnalyzer::new(Language::Spanish)?,
        })
    }

    pub fn analyzer(&self, language: Language) -> &SoccerAnalyzer {
        match language {
            Language::English => &self.english,
            Language::Spanish => &self.spanish,
        }
    }

    fn video(&self, id: &str) -> Result<std::sync::Arc<StoredVideo>, ApiError> {
        self.store
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("video {id} not found")))
    }
}

#[derive(Deserialize)]
pub struct LanguageQuery {
    #[serde(default)]
    pub language: Language,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub results: Vec<AnalysisRow>,
    pub summary: Summary,
    pub advertisements: Vec<EventAdvertisement>,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct ProcessQuery {
    #[serde(default)]
    pub language: Language,
    pub method: ProcessingMethod,
}

#[derive(Deserialize)]
pub struct PlayerRequest {
    #[serde(default)]
    pub commentary: String,
    #[serde(default)]
    pub language: Language,
    /// Embed the video as a data URI instead of linking to the content route.
    #[serde(default)]
    pub inline: bool,
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_PAGE)
}

/// Which video processing methods this server can run.
///
/// # Example
/// ```shell
/// curl http://localhost:5000/api/capabilities
/// ```
///
/// # Returns
/// ```json
/// {"local": true, "cloud": false}
/// ```
#[get("/api/capabilities")]
pub async fn capabilities(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.processor.capabilities())
}

#[get("/api/example")]
pub async fn example(query: web::Query<LanguageQuery>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "language": query.language,
        "text": example_commentary(query.language),
    }))
}

/// Analyze pasted commentary.
///
/// # Example
/// ```shell
/// curl -X POST http://localhost:5000/api/analyze \
///   -H 'Content-Type: application/json' \
///   -d '{"text": "23'"'"' GOAL! Messi scores", "language": "en"}'
/// ```
///
/// # Returns
/// ```json
/// {
///   "results": [{"time": "23'", "tags": "goal, Messi", ...}],
///   "summary": {"total_events": 1, "unique_event_types": 2, "player_mentions": 1},
///   "advertisements": [{"time": "23'", "event_type": "goal", "merchandise": {...}}]
/// }
/// ```
#[post("/api/analyze")]
pub async fn analyze(
    state: web::Data<AppState>,
    body: web::Json<AnalyzeRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please enter some commentary text to analyze.".to_string(),
        ));
    }
    let results = state.analyzer(body.language).analyze(&body.text);
    let summary = summarize(&results);
    let advertisements = state.merchandise.advertisements(&results);
    Ok(HttpResponse::Ok().json(AnalyzeResponse {
        results,
        summary,
        advertisements,
    }))
}

/// Upload a raw MP4 body.
///
/// # Example
/// ```shell
/// curl -X POST 'http://localhost:5000/api/videos?name=match.mp4' --data-binary @match.mp4
/// ```
#[post("/api/videos")]
pub async fn upload_video(
    state: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let name = query.name.as_deref().unwrap_or("video.mp4");
    if !name.to_lowercase().ends_with(".mp4") {
        return Err(ApiError::BadRequest(format!("{name} is not an MP4 file")));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("No video data received".to_string()));
    }
    let info = state.store.insert(name, body).await?;
    Ok(HttpResponse::Created().json(info))
}

#[get("/api/videos/{id}")]
pub async fn get_video(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let video = state.video(&path)?;
    Ok(HttpResponse::Ok().json(&video.info))
}

/// Streams the stored file. Range requests are answered so players can seek.
#[get("/api/videos/{id}/content")]
pub async fn video_content(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let video = state.video(&path)?;
    let file = NamedFile::open_async(video.path())
        .await
        .map_err(anyhow::Error::from)?;
    Ok(file.into_response(&req))
}

#[delete("/api/videos/{id}")]
pub async fn delete_video(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    if state.store.remove(&path) {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound(format!("video {} not found", path.as_str())))
    }
}

/// Transcribe an uploaded video.
///
/// # Example
/// ```shell
/// curl -X POST \
///   'http://localhost:5000/api/videos/video-1700000000000-1/process?language=es&method=local'
/// ```
///
/// # Returns
/// ```json
/// {"status": "completed", "transcript": "0:00' ...", "method": "local",
///  "audio_analysis": {...}}
/// ```
#[post("/api/videos/{id}/process")]
pub async fn process_video(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ProcessQuery>,
) -> Result<HttpResponse, ApiError> {
    let video = state.video(&path)?;
    if !state.processor.capabilities().supports(query.method) {
        return Err(ApiError::Unavailable(format!(
            "{} processing is not available on this server",
            query.method
        )));
    }
    info!(
        "Processing {} ({}) with {} in {}",
        video.info.id,
        video.info.name,
        query.method,
        query.language.display_name()
    );
    let outcome = state
        .processor
        .process(video.path(), query.language, query.method)
        .await;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Render the goal-ad player for an uploaded video.
#[post("/api/videos/{id}/player")]
pub async fn video_player(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PlayerRequest>,
) -> Result<HttpResponse, ApiError> {
    let video = state.video(&path)?;

    let rows = state.analyzer(body.language).analyze(&body.commentary);
    let mut events = goal_events(&rows);
    let demo = events.is_empty();
    if demo {
        events = demo_goal_events();
    }

    let source = if body.inline {
        let bytes = tokio::fs::read(video.path())
            .await
            .map_err(anyhow::Error::from)?;
        VideoSource::Inline(bytes)
    } else {
        VideoSource::Url(format!("/api/videos/{}/content", video.info.id))
    };

    let page = state.player.render(&source, &events, demo)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page))
}

/// Registers shared state, extractor limits and every route.
pub fn configure(state: web::Data<AppState>) -> impl Fn(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let max_upload = state.settings.max_upload_bytes;
        cfg.app_data(state.clone())
            .app_data(web::PayloadConfig::new(max_upload))
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_LIMIT)
                    .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
            )
            .service(index)
            .service(capabilities)
            .service(example)
            .service(analyze)
            .service(upload_video)
            .service(get_video)
            .service(video_content)
            .service(delete_video)
            .service(process_video)
            .service(video_player);
    }
}

/// Run the API server
pub async fn run_api_server(state: AppState) -> std::io::Result<()> {
    let bind = (state.settings.host.clone(), state.settings.port);
    info!("Listening on http://{}:{}", bind.0, bind.1);

    let state = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(configure(state.clone()))
    })
    .bind(bind)?
    .run()
    .await
}
