// Fire-and-forget error reporting to a configured endpoint
use serde_json::json;

/// POST an error message to the reporting endpoint, if one is configured.
/// Failures are logged and never propagated; reporting must not take a
/// request down with it.
pub async fn report_error(endpoint: Option<&str>, message: &str) {
    let Some(url) = endpoint else {
        return;
    };
    let result = reqwest::Client::new()
        .post(url)
        .json(&json!({ "service": "homelog", "message": message }))
        .send()
        .await;
    if let Err(e) = result {
        tracing::warn!("error report delivery failed: {}", e);
    }
}
