//! Best-effort score upload

use chrono::{FixedOffset, Utc};
use railbench_config::ScoreboardConfig;
use railbench_http::{HttpError, HttpMethod};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Serialize)]
struct ScoreUpload<'a> {
    team: &'a str,
    score: i64,
    timestamp: String,
    language: &'a str,
}

fn jst_timestamp() -> String {
    match FixedOffset::east_opt(JST_OFFSET_SECS) {
        Some(jst) => Utc::now().with_timezone(&jst).to_rfc3339(),
        None => Utc::now().to_rfc3339(),
    }
}

/// `PUT {api_url}teams` with the team's score. Skipped when neither the URL
/// nor the team name is configured.
pub async fn post_score(config: &ScoreboardConfig, score: i64, language: &str) -> Result<(), HttpError> {
    if !config.is_enabled() {
        return Ok(());
    }

    let base = config.api_url.as_deref().unwrap_or_default();
    let url = format!("{}teams", base);
    let body = ScoreUpload {
        team: config.team_name.as_deref().unwrap_or_default(),
        score,
        timestamp: jst_timestamp(),
        language,
    };

    let response = Client::new()
        .request(HttpMethod::Put.into(), &url)
        .json(&body)
        .send()
        .await?;
    let status = response.status().as_u16();
    if !response.status().is_success() {
        return Err(HttpError::Status {
            method: HttpMethod::Put,
            path: url,
            status,
        });
    }
    Ok(())
}

/// [`post_score`] with failures logged instead of returned
pub async fn report_score(config: &ScoreboardConfig, score: i64, language: &str) {
    if !config.is_enabled() {
        return;
    }
    match post_score(config, score, language).await {
        Ok(()) => info!("Score sent to scoreboard"),
        Err(e) => error!("Failed to send score: {}", e),
    }
}
