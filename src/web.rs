use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use actix_files::Files;
use actix_session::config::PersistentSession;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Key;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::display::format_player_name;
use crate::error::AppError;
use crate::form::{validate_submission, write_board_csv, SubmissionRequest};
use crate::parser::read_registrations;
use crate::schedule::{Category, OfficerBoard, OfficerSession, SortKey, UtcOffset};
use crate::stats::collect_stats;
use crate::store::events::validate_event_date;
use crate::store::{
    EventPatch, EventStore, JsonFile, NewEvent, OfficerStore, RegistrationPatch, StoreError, SubmissionFilter,
    SubmissionStore,
};

const ADMIN_SESSION_KEY: &str = "admin";

pub struct AppState {
    pub submissions: Mutex<SubmissionStore>,
    pub events: Mutex<EventStore>,
    pub officers: Mutex<OfficerStore>,
    pub admin_password: String,
}

impl AppState {
    /// Opens the JSON stores under `data_dir`
    pub fn open(data_dir: &Path, admin_password: String) -> Result<Self, StoreError> {
        Ok(Self {
            submissions: Mutex::new(SubmissionStore::open(JsonFile::at(data_dir, "registrations.json"))?),
            events: Mutex::new(EventStore::open(JsonFile::at(data_dir, "events.json"))?),
            officers: Mutex::new(OfficerStore::open(JsonFile::at(data_dir, "officers.json"))?),
            admin_password,
        })
    }

    pub fn in_memory(admin_password: String) -> Result<Self, StoreError> {
        Ok(Self {
            submissions: Mutex::new(SubmissionStore::open(JsonFile::in_memory())?),
            events: Mutex::new(EventStore::open(JsonFile::in_memory())?),
            officers: Mutex::new(OfficerStore::open(JsonFile::in_memory())?),
            admin_password,
        })
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignQuery {
    sort_by: Option<SortKey>,
    utc_offset: Option<UtcOffset>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBoardsRequest {
    utc_offset: Option<UtcOffset>,
    boards: BTreeMap<Category, OfficerBoard>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    registration_id: String,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    from: usize,
    to: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    day_name: String,
    event_date: String,
    utc_offset: UtcOffset,
    appointments: Vec<ScheduleSlot>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    slot: usize,
    time: String,
    player: Option<String>,
    is_empty: bool,
}

/// Admin access comes from the login session or an X-Admin-Password header
fn require_admin(req: &HttpRequest, session: &Session, state: &AppState) -> Result<(), AppError> {
    let header_ok = req
        .headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .map(|p| p == state.admin_password)
        .unwrap_or(false);
    let session_ok = session.get::<bool>(ADMIN_SESSION_KEY).ok().flatten().unwrap_or(false);

    if header_ok || session_ok {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

fn parse_date(date: &str) -> Result<(), AppError> {
    validate_event_date(date).map_err(AppError::from)
}

fn parse_category(category: &str) -> Result<Category, AppError> {
    category.parse().map_err(AppError::BadRequest)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

// Admin login endpoint
async fn admin_login(
    req: web::Json<LoginRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.password != state.admin_password {
        warn!("Rejected admin login");
        return Err(AppError::Unauthorized);
    }
    session
        .insert(ADMIN_SESSION_KEY, true)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    session.renew();
    info!("Admin logged in");
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn admin_logout(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(serde_json::json!({"success": true}))
}

async fn public_events(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let events = state.events.lock()?.list_public(Utc::now())?;
    Ok(HttpResponse::Ok().json(events))
}

async fn open_events(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let events = state.events.lock()?.list_open(Utc::now())?;
    Ok(HttpResponse::Ok().json(events))
}

async fn list_events(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let events = state.events.lock()?.list_all(Utc::now())?;
    Ok(HttpResponse::Ok().json(events))
}

async fn create_event(
    req: HttpRequest,
    session: Session,
    body: web::Json<NewEvent>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let event = state.events.lock()?.create(body.into_inner(), Utc::now())?;
    Ok(HttpResponse::Created().json(event))
}

async fn update_event(
    req: HttpRequest,
    session: Session,
    date: web::Path<String>,
    body: web::Json<EventPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let event = state.events.lock()?.update(&date, body.into_inner(), Utc::now())?;
    Ok(HttpResponse::Ok().json(event))
}

async fn delete_event(
    req: HttpRequest,
    session: Session,
    date: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    state.events.lock()?.delete(&date)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

// Member registration endpoint
async fn submit_registration(
    body: web::Json<SubmissionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    validate_submission(&request).map_err(AppError::BadRequest)?;

    let now = Utc::now();
    let event_date = {
        let mut events = state.events.lock()?;
        match &request.event_date {
            Some(date) => {
                let event = events
                    .get(date, now)?
                    .ok_or_else(|| AppError::NotFound(format!("Event {} not found", date)))?;
                if !event.accepts_registrations(now) {
                    return Err(AppError::BadRequest(format!("Registration for {} is closed", date)));
                }
                Some(date.clone())
            }
            // Latest open event, if any
            None => events.list_open(now)?.pop().map(|e| e.event_date),
        }
    };

    let registration = request.into_registration(event_date, now.timestamp_millis());
    let created = state.submissions.lock()?.create(registration)?;
    Ok(HttpResponse::Created().json(created))
}

async fn list_submissions(
    req: HttpRequest,
    session: Session,
    filter: web::Query<SubmissionFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let registrations = state.submissions.lock()?.list(&filter);
    Ok(HttpResponse::Ok().json(registrations))
}

async fn update_submission(
    req: HttpRequest,
    session: Session,
    id: web::Path<String>,
    body: web::Json<RegistrationPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let updated = state.submissions.lock()?.update(&id, body.into_inner())?;
    Ok(HttpResponse::Ok().json(updated))
}

async fn delete_submission(
    req: HttpRequest,
    session: Session,
    id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    state.submissions.lock()?.delete(&id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

// Admin CSV upload endpoint
async fn admin_upload(
    req: HttpRequest,
    session: Session,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;

    let imported = read_registrations(body.as_ref())?;
    let total = imported.len();
    let summary = state.submissions.lock()?.import(imported)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Imported {} registrations", total),
        "created": summary.created,
        "replaced": summary.replaced
    })))
}

// Stats endpoint
async fn get_stats(
    req: HttpRequest,
    session: Session,
    filter: web::Query<SubmissionFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let registrations = state.submissions.lock()?.list(&filter);
    Ok(HttpResponse::Ok().json(collect_stats(&registrations)))
}

async fn officer_dates(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let dates = state.officers.lock()?.event_dates();
    Ok(HttpResponse::Ok().json(dates))
}

async fn public_officers(date: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    parse_date(&date)?;
    let boards = state.officers.lock()?.get(&date);
    Ok(HttpResponse::Ok().json(boards))
}

async fn admin_officer_dates(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    officer_dates(state).await
}

async fn get_officers(
    req: HttpRequest,
    session: Session,
    date: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    parse_date(&date)?;
    let board_session = state.officers.lock()?.session(&date, UtcOffset::default());
    Ok(HttpResponse::Ok().json(board_session.boards()))
}

/// Replaces all boards of a date. A player may appear on one board only.
async fn save_officers(
    req: HttpRequest,
    session: Session,
    date: web::Path<String>,
    body: web::Json<SaveBoardsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    parse_date(&date)?;

    let SaveBoardsRequest { utc_offset, boards } = body.into_inner();
    if let Some((&key, board)) = boards.iter().find(|(k, b)| **k != b.category) {
        return Err(AppError::BadRequest(format!(
            "Board stored under {} is a {} board",
            key, board.category
        )));
    }
    let offset = utc_offset
        .or_else(|| boards.values().next().map(|b| b.utc_offset))
        .unwrap_or_default();
    let mut officers = OfficerSession::load(&date, offset, boards);
    officers.set_utc_offset(offset);
    officers.check_exclusive()?;

    state.officers.lock()?.save_session(&officers)?;
    info!("Saved officer boards for {}", date);
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn delete_officers(
    req: HttpRequest,
    session: Session,
    date: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    state.officers.lock()?.delete(&date)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn auto_assign(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String)>,
    query: web::Query<AutoAssignQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let roster = state.submissions.lock()?.roster(&date, category);

    let mut officers = state.officers.lock()?;
    let mut board_session = officers.session(&date, query.utc_offset.unwrap_or_default());
    if let Some(offset) = query.utc_offset {
        board_session.set_utc_offset(offset);
    }
    let outcome = board_session.auto_assign(category, &roster, query.sort_by.unwrap_or_default());
    officers.save_session(&board_session)?;

    let message = if outcome.candidate_count == 0 {
        "All eligible players are already assigned".to_string()
    } else {
        format!(
            "Assigned {} of {} candidates to {}",
            outcome.assigned_count,
            outcome.candidate_count,
            category.day_name()
        )
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "assigned": outcome.assigned_count,
        "candidates": outcome.candidate_count,
        "message": message,
        "placements": outcome.placements,
        "board": outcome.board
    })))
}

async fn clear_board(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let mut officers = state.officers.lock()?;
    let mut board = officers.session(&date, UtcOffset::default()).board(category).clone();
    board.clear();
    officers.save_board(&date, board)?;
    info!("Cleared {} board for {}", category, date);
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

/// Manual placement of one registration into an empty slot
async fn place_officer(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String, usize)>,
    body: web::Json<PlaceRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category, index) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let snapshot = state
        .submissions
        .lock()?
        .get(&body.registration_id)
        .map(|r| r.snapshot())
        .ok_or_else(|| AppError::NotFound(format!("Registration {} not found", body.registration_id)))?;

    let mut officers = state.officers.lock()?;
    let mut board_session = officers.session(&date, UtcOffset::default());
    board_session.place(category, index, snapshot)?;
    officers.save_session(&board_session)?;
    Ok(HttpResponse::Ok().json(board_session.board(category)))
}

async fn remove_officer(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String, usize)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category, index) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let mut officers = state.officers.lock()?;
    let mut board_session = officers.session(&date, UtcOffset::default());
    let removed = board_session.remove(category, index)?;
    officers.save_session(&board_session)?;
    Ok(HttpResponse::Ok().json(removed))
}

async fn move_officer(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String)>,
    body: web::Json<MoveRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let mut officers = state.officers.lock()?;
    let mut board_session = officers.session(&date, UtcOffset::default());
    board_session.move_assignment(category, body.from, body.to)?;
    officers.save_session(&board_session)?;
    Ok(HttpResponse::Ok().json(board_session.board(category)))
}

// Schedule endpoint
async fn get_schedule(path: web::Path<(String, String)>, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let (date, category) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let board_session = state.officers.lock()?.session(&date, UtcOffset::default());
    let board = board_session.board(category);

    let appointments = board
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| ScheduleSlot {
            slot: index,
            time: board.slot_time(index),
            player: slot
                .as_ref()
                .map(|appt| format_player_name(&appt.alliance, &appt.player_name)),
            is_empty: slot.is_none(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        day_name: category.day_name().to_string(),
        event_date: date,
        utc_offset: board.utc_offset,
        appointments,
    }))
}

async fn export_schedule(
    req: HttpRequest,
    session: Session,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &session, &state)?;
    let (date, category) = path.into_inner();
    parse_date(&date)?;
    let category = parse_category(&category)?;

    let board_session = state.officers.lock()?.session(&date, UtcOffset::default());
    let mut body = Vec::new();
    write_board_csv(board_session.board(category), &mut body).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"schedule_{}_{}.csv\"", date, category),
        ))
        .body(body))
}

/// Registers every API route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health))
        .route("/api/login", web::post().to(admin_login))
        .route("/api/logout", web::post().to(admin_logout))
        .route("/api/events/public", web::get().to(public_events))
        .route("/api/events/open", web::get().to(open_events))
        .route("/api/events", web::get().to(list_events))
        .route("/api/events", web::post().to(create_event))
        .route("/api/events/{date}", web::put().to(update_event))
        .route("/api/events/{date}", web::delete().to(delete_event))
        .route("/api/submissions", web::post().to(submit_registration))
        .route("/api/submissions", web::get().to(list_submissions))
        .route("/api/submissions/{id}", web::put().to(update_submission))
        .route("/api/submissions/{id}", web::delete().to(delete_submission))
        .route("/api/upload", web::post().to(admin_upload))
        .route("/api/stats", web::get().to(get_stats))
        .route("/api/officers/public-dates", web::get().to(officer_dates))
        .route("/api/officers/public/{date}", web::get().to(public_officers))
        .route("/api/officers/dates", web::get().to(admin_officer_dates))
        .route("/api/officers/{date}", web::get().to(get_officers))
        .route("/api/officers/{date}", web::put().to(save_officers))
        .route("/api/officers/{date}", web::delete().to(delete_officers))
        .route("/api/officers/{date}/{category}/auto-assign", web::post().to(auto_assign))
        .route("/api/officers/{date}/{category}/clear", web::post().to(clear_board))
        .route("/api/officers/{date}/{category}/move", web::post().to(move_officer))
        .route("/api/officers/{date}/{category}/slots/{index}", web::put().to(place_officer))
        .route("/api/officers/{date}/{category}/slots/{index}", web::delete().to(remove_officer))
        .route("/api/schedule/{date}/{category}", web::get().to(get_schedule))
        .route("/api/schedule/{date}/{category}/export", web::get().to(export_schedule));
}

pub async fn start_server(config: Config) -> std::io::Result<()> {
    let app_state = web::Data::new(
        AppState::open(&config.data_dir, config.admin_password.clone())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
    );

    // Sessions do not outlive a restart
    let key = Key::generate();
    let static_dir = config.static_dir.clone();
    let serve_static = static_dir.is_dir();
    if !serve_static {
        warn!("Static directory {} not found, serving the API only", static_dir.display());
    }

    info!("Starting web server on port {}", config.port);
    info!("Access the site at http://localhost:{}", config.port);

    HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_secure(false)
                    .session_lifecycle(PersistentSession::default().session_ttl(CookieDuration::hours(12)))
                    .build(),
            )
            .wrap(middleware::Logger::default())
            .configure(configure);

        if serve_static {
            app.service(Files::new("/", static_dir.clone()).index_file("index.html"))
        } else {
            app
        }
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
