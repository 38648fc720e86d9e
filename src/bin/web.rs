//! Single binary web server: JSON API over tournament sessions and the sync queue.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT, RATINGS_DIR,
//! OUTBOX_PATH, VOTE_COOLDOWN_MS, SYNC_MAX_ATTEMPTS.

use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{
    cookie::Key,
    get, post, put,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use pairwise_tournament::{
    AppConfig, Candidate, CandidateId, CompletionPolicy, EngineConfig, JsonFilePersistence,
    PersistRequest, Rating, SessionId, SyncQueue, SyncWorker, TournamentEngine, TournamentError,
    PERSIST_CHANNEL_CAPACITY,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Cookie key holding the caller's current session id.
const SESSION_COOKIE_KEY: &str = "tournament_session";

/// Inactivity threshold: sessions not touched for this long are ended and removed.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(12 * 3600);

/// Per-session entry: the engine + last activity time (for auto-cleanup).
struct SessionEntry {
    engine: Arc<TournamentEngine>,
    last_activity: Instant,
}

struct Shared {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    queue: Arc<SyncQueue>,
    persist_tx: mpsc::Sender<PersistRequest>,
    connectivity: watch::Sender<bool>,
    engine_config: EngineConfig,
}

type AppState = Data<Shared>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

/// A candidate given either as a bare label or as `{ "id", "label" }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateInput {
    Label(String),
    Full(Candidate),
}

impl From<CandidateInput> for Candidate {
    fn from(input: CandidateInput) -> Self {
        match input {
            CandidateInput::Label(label) => Candidate::labelled(label),
            CandidateInput::Full(candidate) => candidate,
        }
    }
}

#[derive(Deserialize)]
struct StartSessionBody {
    candidates: Vec<CandidateInput>,
    #[serde(default)]
    prior_ratings: HashMap<CandidateId, Rating>,
    #[serde(default)]
    judge: Option<String>,
    #[serde(default)]
    completion: Option<CompletionPolicy>,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct VoteBody {
    outcome: String,
}

#[derive(Deserialize)]
struct ConnectivityBody {
    online: bool,
}

/// Path segment: session id (e.g. /api/sessions/{id})
#[derive(Deserialize)]
struct SessionPath {
    id: SessionId,
}

fn error_response(e: &TournamentError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        TournamentError::VoteInProgress | TournamentError::SessionComplete => {
            HttpResponse::Conflict().json(body)
        }
        TournamentError::VoteTooSoon { .. } => HttpResponse::TooManyRequests().json(body),
        TournamentError::NotFound(_) => HttpResponse::NotFound().json(body),
        TournamentError::PersistenceFailed { .. } | TournamentError::Outbox(_) => {
            HttpResponse::InternalServerError().json(body)
        }
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn no_session() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "No session" }))
}

/// Look up a session's engine, refreshing its last activity.
fn engine_for(state: &AppState, id: SessionId) -> Result<Option<Arc<TournamentEngine>>, HttpResponse> {
    let mut g = state
        .sessions
        .write()
        .map_err(|_| HttpResponse::InternalServerError().body("lock error"))?;
    Ok(g.get_mut(&id).map(|entry| {
        entry.last_activity = Instant::now();
        entry.engine.clone()
    }))
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "pairwise-tournament",
    })
}

/// Start a session (returns its view; the id is also remembered in the cookie session).
#[post("/api/sessions")]
async fn api_start_session(state: AppState, session: Session, body: Json<StartSessionBody>) -> HttpResponse {
    let body = body.into_inner();
    let mut config = state.engine_config.clone();
    if let Some(completion) = body.completion {
        config.completion = completion;
    }
    let mut builder = TournamentEngine::builder(config).persist_to(state.persist_tx.clone());
    if let Some(judge) = body.judge {
        builder = builder.judge(judge);
    }
    if let Some(seed) = body.seed {
        builder = builder.seed(seed);
    }
    let candidates: Vec<Candidate> = body.candidates.into_iter().map(Candidate::from).collect();
    let engine = match builder.start(candidates, &body.prior_ratings) {
        Ok(engine) => Arc::new(engine),
        Err(e) => return error_response(&e),
    };
    let id = engine.id();
    let view = engine.view();
    {
        let mut g = match state.sessions.write() {
            Ok(guard) => guard,
            Err(_) => return HttpResponse::InternalServerError().body("lock error"),
        };
        g.insert(
            id,
            SessionEntry {
                engine,
                last_activity: Instant::now(),
            },
        );
    }
    if let Err(e) = session.insert(SESSION_COOKIE_KEY, id) {
        log::warn!("Could not remember session {} in cookie: {}", id, e);
    }
    HttpResponse::Ok().json(view)
}

/// Get a session by id (404 if not found).
#[get("/api/sessions/{id}")]
async fn api_get_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match engine_for(&state, path.id) {
        Ok(Some(engine)) => HttpResponse::Ok().json(engine.view()),
        Ok(None) => no_session(),
        Err(resp) => resp,
    }
}

/// Session remembered in the caller's cookie, if any.
#[get("/api/session/current")]
async fn api_current_session(state: AppState, session: Session) -> HttpResponse {
    let id = match session.get::<SessionId>(SESSION_COOKIE_KEY) {
        Ok(Some(id)) => id,
        Ok(None) => return no_session(),
        Err(e) => {
            log::warn!("Unreadable session cookie: {}", e);
            return no_session();
        }
    };
    match engine_for(&state, id) {
        Ok(Some(engine)) => HttpResponse::Ok().json(engine.view()),
        Ok(None) => no_session(),
        Err(resp) => resp,
    }
}

/// Vote on the current matchup: `{ "outcome": "left" | "right" | "both" | "neither" }`.
#[post("/api/sessions/{id}/vote")]
async fn api_vote(state: AppState, path: Path<SessionPath>, body: Json<VoteBody>) -> HttpResponse {
    let engine = match engine_for(&state, path.id) {
        Ok(Some(engine)) => engine,
        Ok(None) => return no_session(),
        Err(resp) => return resp,
    };
    match engine.vote_named(&body.outcome).await {
        Ok(result) => HttpResponse::Ok().json(serde_json::json!({
            "result": result,
            "session": engine.view(),
        })),
        Err(e) => error_response(&e),
    }
}

/// End a session early with the ratings as they stand.
#[post("/api/sessions/{id}/abort")]
async fn api_abort(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let engine = match engine_for(&state, path.id) {
        Ok(Some(engine)) => engine,
        Ok(None) => return no_session(),
        Err(resp) => return resp,
    };
    let final_ratings = engine.abort_early().await;
    HttpResponse::Ok().json(serde_json::json!({
        "final_ratings": final_ratings,
        "session": engine.view(),
    }))
}

/// Outbox status plus the entries that could not be delivered.
#[get("/api/sync")]
async fn api_sync_status(state: AppState) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": state.queue.status(),
        "failed": state.queue.failed(),
    }))
}

#[post("/api/sync/flush")]
async fn api_sync_flush(state: AppState) -> HttpResponse {
    let report = state.queue.flush().await;
    HttpResponse::Ok().json(report)
}

/// Re-queue every failed entry.
#[post("/api/sync/retry-failed")]
async fn api_sync_retry_failed(state: AppState) -> HttpResponse {
    match state.queue.retry_failed() {
        Ok(requeued) => {
            let report = state.queue.flush().await;
            HttpResponse::Ok().json(serde_json::json!({ "requeued": requeued, "flush": report }))
        }
        Err(e) => error_response(&e),
    }
}

/// Connectivity signal from the client; going online triggers a flush in the worker.
#[put("/api/sync/connectivity")]
async fn api_set_connectivity(state: AppState, body: Json<ConnectivityBody>) -> HttpResponse {
    state.connectivity.send_replace(body.online);
    HttpResponse::Ok().json(state.queue.status())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env();
    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let persistence = Arc::new(JsonFilePersistence::new(config.ratings_dir.clone()));
    let queue = Arc::new(
        SyncQueue::from_config(config.sync.clone(), persistence).map_err(std::io::Error::other)?,
    );

    let (persist_tx, persist_rx) = mpsc::channel(PERSIST_CHANNEL_CAPACITY);
    let (connectivity_tx, connectivity_rx) = watch::channel(true);
    SyncWorker::new(queue.clone(), persist_rx, connectivity_rx).spawn();

    let mut failures = queue.subscribe_failures();
    actix_web::rt::spawn(async move {
        while let Ok(failure) = failures.recv().await {
            log::error!("Unsynced write: {}", failure);
        }
    });

    let state = Data::new(Shared {
        sessions: RwLock::new(HashMap::new()),
        queue,
        persist_tx,
        connectivity: connectivity_tx,
        engine_config: config.engine.clone(),
    });

    // Background task: every 30 minutes, end and remove sessions inactive for 12+ hours
    let state_cleanup = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(30 * 60));
        loop {
            interval.tick().await;
            let expired: Vec<Arc<TournamentEngine>> = {
                let mut g = match state_cleanup.sessions.write() {
                    Ok(guard) => guard,
                    Err(_) => continue,
                };
                let ids: Vec<SessionId> = g
                    .iter()
                    .filter(|(_, entry)| entry.last_activity.elapsed() >= INACTIVITY_TIMEOUT)
                    .map(|(id, _)| *id)
                    .collect();
                ids.iter().filter_map(|id| g.remove(id)).map(|e| e.engine).collect()
            };
            if expired.is_empty() {
                continue;
            }
            log::info!("Cleaning up {} inactive session(s) (no activity for 12h)", expired.len());
            for engine in expired {
                // hands the final ratings to the outbox if the session never finished
                engine.abort_early().await;
            }
        }
    });

    let key = Key::generate();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .service(api_health)
            .service(api_start_session)
            .service(api_get_session)
            .service(api_current_session)
            .service(api_vote)
            .service(api_abort)
            .service(api_sync_status)
            .service(api_sync_flush)
            .service(api_sync_retry_failed)
            .service(api_set_connectivity)
    })
    .bind(bind)?
    .run()
    .await
}
