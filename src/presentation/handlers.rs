// HTTP request handlers
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::application::ingestion::IngestError;
use crate::domain::measurement::Measurement;
use crate::infrastructure::report;
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use crate::presentation::{escape_markup, plot};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/:model", post(api_model))
        .route("/:model/table", get(model_table))
        .route("/:model/plot", get(model_plot))
        .route("/:model/csv", get(model_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Always-up, unauthenticated liveness probe.
async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ingest one tag->value submission into a model, creating the series on
/// first use. Auth is checked before the body is even looked at.
async fn api_model(
    Path(model): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&headers, &state)?;

    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(JsonRejection::MissingJsonContentType(_)) => {
            return Err(ApiError::UnsupportedMediaType);
        }
        Err(_) => return Err(ApiError::Validation("No JSON data".to_string())),
    };
    let object = payload
        .as_object()
        .ok_or_else(|| ApiError::Validation("No JSON data".to_string()))?;

    match state.ingestion.ingest(&model, object).await {
        Ok(_) => Ok((StatusCode::CREATED, Json(json!({ "error": null }))).into_response()),
        Err(IngestError::Store(e)) => Err(internal(&state, e).await),
        Err(e) => Err(e.into()),
    }
}

/// HTML table of matching records. Without any `created_at` filter the
/// request is redirected to the same URL scoped to today.
async fn model_table(
    Path(model): Path<String>,
    Query(args): Query<Vec<(String, String)>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    if !args.iter().any(|(key, _)| key.starts_with("created_at")) {
        return Ok(redirect_to_today(&model, &args, &state).into_response());
    }

    ensure_known_model(&state, &model).await?;
    let records = resolve(&state, &model, &args).await?;
    Ok(Html(render_table(&model, &records, &state)).into_response())
}

/// SVG chart of matching records. `_kind` picks the style (`line`,
/// `points`); `_resample` mean-aggregates into time buckets first.
async fn model_plot(
    Path(model): Path<String>,
    Query(args): Query<Vec<(String, String)>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    ensure_known_model(&state, &model).await?;
    let mut records = resolve(&state, &model, &args).await?;
    if records.is_empty() {
        return Err(ApiError::NoData);
    }

    if let Some(spec) = control_arg(&args, "_resample") {
        let bucket = plot::parse_resample(spec)
            .ok_or_else(|| ApiError::Validation(format!("invalid _resample: {spec}")))?;
        records = plot::resample(&records, bucket);
    }
    let kind = control_arg(&args, "_kind").unwrap_or("line");

    let svg = plot::render_svg(&records, kind);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

/// CSV export of matching records; an unknown model yields just the header.
async fn model_csv(
    Path(model): Path<String>,
    Query(args): Query<Vec<(String, String)>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let records = resolve(&state, &model, &args).await?;

    let mut body = String::from("created_at,measurement,value\n");
    for record in &records {
        body.push_str(&format!(
            "{},{},{}\n",
            record.created_at.with_timezone(&state.display_offset).to_rfc3339(),
            csv_field(&record.measurement),
            record.value,
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{model}.csv\""),
            ),
        ],
        body,
    )
        .into_response())
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if provided != Some(state.api_key.as_str()) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn ensure_known_model(state: &AppState, model: &str) -> Result<(), ApiError> {
    match state.store.exists(model).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::NotFound),
        Err(e) => Err(internal(state, e).await),
    }
}

async fn resolve(
    state: &AppState,
    model: &str,
    args: &[(String, String)],
) -> Result<Vec<Measurement>, ApiError> {
    match state.query.resolve(model, args).await {
        Ok(records) => Ok(records),
        Err(e) => Err(internal(state, e).await),
    }
}

/// Store-layer faults are request-fatal: report, log, answer 500.
async fn internal(state: &AppState, e: anyhow::Error) -> ApiError {
    report::report_error(state.error_report_url.as_deref(), &format!("{e:#}")).await;
    ApiError::Internal(e)
}

fn control_arg<'a>(args: &'a [(String, String)], name: &str) -> Option<&'a str> {
    args.iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn redirect_to_today(model: &str, args: &[(String, String)], state: &AppState) -> Redirect {
    let today = Utc::now()
        .with_timezone(&state.display_offset)
        .format("%Y-%m-%d");
    let mut pairs: Vec<String> = args
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect();
    pairs.push(format!("created_at__gt={today}"));
    let target = format!("/{}/table?{}", urlencoding::encode(model), pairs.join("&"));
    Redirect::to(&target)
}

fn render_table(model: &str, records: &[Measurement], state: &AppState) -> String {
    let mut html = format!(
        "<!doctype html><html><head><title>{title}</title></head><body>\
         <h1>{title}</h1>\
         <table><thead><tr><th>created_at</th><th>measurement</th><th>value</th></tr></thead><tbody>",
        title = escape_markup(model),
    );
    for record in records {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            record.created_at.with_timezone(&state.display_offset).to_rfc3339(),
            escape_markup(&record.measurement),
            record.value,
        ));
    }
    html.push_str("</tbody></table></body></html>");
    html
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::MeasurementStore;
    use crate::domain::filter::FilterSpec;
    use crate::infrastructure::config::Settings;
    use crate::infrastructure::memory_store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const API_KEY: &str = "test-secret";

    fn settings() -> Settings {
        Settings {
            api_key: API_KEY.to_string(),
            bind: "127.0.0.1:0".to_string(),
            data_dir: None,
            display_offset: None,
            error_report_url: None,
            smtp_host: None,
            mail_from: None,
            mail_to: None,
            mail_login: None,
            mail_password: None,
        }
    }

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store.clone(), &settings()));
        (router(state), store)
    }

    fn post_json(uri: &str, body: &str, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn seed(store: &Arc<MemoryStore>, model: &str, tag: &str, value: f64, at: &str) {
        use crate::domain::measurement::{Measurement, parse_timestamp};
        store
            .insert(
                model,
                Measurement::new(value, tag.to_string(), parse_timestamp(at).unwrap()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_model_requires_key_before_body() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json("/api/test_model", r#"{"measurement": 1}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!store.exists("test_model").await.unwrap());
    }

    #[tokio::test]
    async fn test_api_model_wrong_content_type_is_415() {
        let (app, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/test_model")
            .header("x-api-key", API_KEY)
            .body(Body::from("measurement=1"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_api_model_empty_json_is_400() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/api/test_model", "{}", Some(API_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No JSON data"}));
    }

    #[tokio::test]
    async fn test_api_model_non_numeric_value_is_400_and_inserts_nothing() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/api/test_model",
                r#"{"measurement": "str"}"#,
                Some(API_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("NOT_FLOATABLE"));
        assert!(error.contains("test_model"));
        assert!(!store.exists("test_model").await.unwrap());
    }

    #[tokio::test]
    async fn test_api_model_valid_value_creates_series() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/api/newmodel",
                r#"{"measurement": 1}"#,
                Some(API_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({"error": null}));

        assert!(store.exists("newmodel").await.unwrap());
        let records = store
            .find("newmodel", &FilterSpec::new(), "-created_at", None, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_api_model_explicit_created_at() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/api/test_model",
                r#"{"measurement": 2, "created_at": "2020-12-31T00:00:00"}"#,
                Some(API_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let record = store
            .find_one("test_model", &FilterSpec::new(), "-created_at", 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2020-12-31T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_status_is_open() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_table_unknown_model_is_404() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/nosuchmodel/table?created_at__gt=2020-01-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_table_redirects_to_today_scope() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.0, "2021-06-01T08:00:00").await;

        let response = app
            .oneshot(
                Request::get("/temperature/table?measurement=salon")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("/temperature/table?"));
        assert!(location.contains("measurement=salon"));
        assert!(location.contains("created_at__gt="));
    }

    #[tokio::test]
    async fn test_table_renders_matching_records() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.5, "2021-06-01T08:00:00").await;
        seed(&store, "temperature", "patio", 12.0, "2021-06-01T09:00:00").await;

        let response = app
            .oneshot(
                Request::get("/temperature/table?created_at__gt=2021-01-01&measurement=salon")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("20.5"));
        assert!(html.contains("salon"));
        assert!(!html.contains("patio"));
    }

    #[tokio::test]
    async fn test_csv_streams_records_with_attachment() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.5, "2021-06-01T08:00:00").await;

        let response = app
            .oneshot(Request::get("/temperature/csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .contains("attachment")
        );
        let body = body_text(response).await;
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("created_at,measurement,value"));
        assert_eq!(
            lines.next(),
            Some("2021-06-01T08:00:00+00:00,salon,20.5")
        );
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_csv_unknown_model_is_just_the_header() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/nosuchmodel/csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "created_at,measurement,value\n");
    }

    #[tokio::test]
    async fn test_plot_empty_result_is_404_no_data() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.0, "2021-06-01T08:00:00").await;

        let response = app
            .oneshot(
                Request::get("/temperature/plot?created_at__gt=2099-01-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "No data"}));
    }

    #[tokio::test]
    async fn test_plot_renders_svg() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.0, "2021-06-01T08:00:00").await;
        seed(&store, "temperature", "salon", 21.0, "2021-06-01T09:00:00").await;

        let response = app
            .oneshot(
                Request::get("/temperature/plot?_kind=points&_resample=1h")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/svg+xml");
        let svg = body_text(response).await;
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<circle"));
    }

    #[tokio::test]
    async fn test_same_filters_same_records_across_renderers() {
        let (app, store) = app();
        seed(&store, "temperature", "salon", 20.5, "2021-06-01T08:00:00").await;
        seed(&store, "temperature", "salon", 21.5, "2021-06-01T09:00:00").await;
        seed(&store, "temperature", "patio", 12.0, "2021-06-01T09:30:00").await;

        let filters = "created_at__gt=2021-01-01&measurement=salon";
        let csv = app
            .clone()
            .oneshot(
                Request::get(format!("/temperature/csv?{filters}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let table = app
            .oneshot(
                Request::get(format!("/temperature/table?{filters}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let csv_body = body_text(csv).await;
        let table_body = body_text(table).await;
        // same records, same order: newest salon reading first in both
        assert_eq!(csv_body.matches("salon").count(), 2);
        assert!(!csv_body.contains("patio"));
        assert!(table_body.find("21.5").unwrap() < table_body.find("20.5").unwrap());
        assert!(csv_body.find("21.5").unwrap() < csv_body.find("20.5").unwrap());
    }
}
