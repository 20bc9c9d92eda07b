use std::fmt::Write as _;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use super::month::MonthlyReport;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary generation is not configured")]
    NotConfigured,
    #[error("nothing to summarize")]
    NothingToSummarize,
    #[error("summary request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("summary service returned {status}")]
    Status { status: u16 },
    #[error("unexpected summary response")]
    UnexpectedResponse,
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Summary {
    pub title: String,
    pub text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Value>,
}

/// Client for a `generateContent` text endpoint.
#[derive(Clone)]
pub struct SummaryClient {
    config: SummaryConfig,
    client: Client,
}

impl SummaryClient {
    pub fn new(config: SummaryConfig) -> Result<Self, SummaryError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub async fn summarize(&self, report: &MonthlyReport) -> Result<Summary, SummaryError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SummaryError::NotConfigured)?;
        if report.records.is_empty() {
            return Err(SummaryError::NothingToSummarize);
        }

        let url = format!(
            "{}/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        );
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(report) }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "summary service rejected the request");
            return Err(SummaryError::Status {
                status: status.as_u16(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|_| SummaryError::UnexpectedResponse)?;
        let text = extract_text(body).ok_or(SummaryError::UnexpectedResponse)?;

        info!(year = report.year, month = report.month, "summary generated");
        Ok(Summary {
            title: format!("Attendance Summary - {}", report.title),
            text,
        })
    }
}

fn extract_text(body: GenerateResponse) -> Option<String> {
    body.candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .first()?
        .get("text")?
        .as_str()
        .map(str::to_owned)
}

pub fn build_prompt(report: &MonthlyReport) -> String {
    let stats = &report.stats;
    let mut prompt = format!(
        "Below is an employee's attendance data for {}:\n\
         Total attendance records: {}\n\
         Successful check-ins: {}\n\
         Failed check-ins: {}\n\
         Unique days with a record: {}\n\
         Total present days: {}\n\
         Total days in the month: {}\n\n\
         Detail of every attendance record:\n",
        report.title,
        stats.total_records,
        stats.succeeded,
        stats.failed,
        stats.unique_days,
        stats.present_days,
        stats.days_in_month,
    );

    for rec in &report.records {
        let _ = writeln!(
            prompt,
            "Date: {}, Time: {}, Status: {}, Distance from premises: {} meters, Reason: {}",
            rec.date,
            rec.time,
            rec.status,
            rec.distance_to_store,
            rec.reason.as_deref().unwrap_or("N/A"),
        );
    }

    prompt.push_str(
        "\nPlease give a comprehensive summary and the key insights of the data above. Focus on:\n\
         1. Key statistics (total, succeeded, failed, unique days, present days).\n\
         2. Regularity of attendance.\n\
         3. If there are failed check-ins, a short analysis of why and suggestions to improve.\n\
         4. Whether the employee shows good attendance or needs attention.\n\
         Write in formal, easy to understand language as structured paragraphs.",
    );
    prompt
}
