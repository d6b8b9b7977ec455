// Gemini-backed duplicate confirmation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use conflictwatch_common::IncidentRecord;
use conflictwatch_engine::{BetterReport, DuplicateOracle, OracleVerdict};
use gemini_client::util::strip_code_blocks;
use gemini_client::GeminiClient;

/// JSON verdict as the model returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVerdict {
    is_duplicate: bool,
    #[serde(default)]
    duplicate_of_id: Option<String>,
    #[serde(default)]
    better_report: Option<String>,
    #[serde(default)]
    reason: String,
}

impl WireVerdict {
    fn into_verdict(self) -> OracleVerdict {
        OracleVerdict {
            is_duplicate: self.is_duplicate,
            duplicate_of_id: self
                .duplicate_of_id
                .as_deref()
                .and_then(|s| Uuid::parse_str(s).ok()),
            better_report: match self.better_report.as_deref() {
                Some("existing") => BetterReport::Existing,
                _ => BetterReport::Candidate,
            },
            reason: self.reason,
        }
    }
}

pub struct GeminiOracle {
    client: GeminiClient,
}

impl GeminiOracle {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DuplicateOracle for GeminiOracle {
    async fn confirm(
        &self,
        candidate: &IncidentRecord,
        existing: &[IncidentRecord],
    ) -> Result<OracleVerdict> {
        if existing.is_empty() {
            return Ok(OracleVerdict {
                is_duplicate: false,
                duplicate_of_id: None,
                better_report: BetterReport::Candidate,
                reason: "No existing reports to compare against.".to_string(),
            });
        }

        let prompt = comparison_prompt(candidate, existing)?;
        let response = self.client.generate(&prompt).await?;
        let text = response
            .text()
            .ok_or_else(|| anyhow!("Gemini returned no text for duplicate check"))?;

        debug!(candidate = %candidate.id, "Duplicate check response received");

        let wire: WireVerdict = serde_json::from_str(strip_code_blocks(&text))
            .context("failed to parse duplicate verdict from Gemini response")?;
        Ok(wire.into_verdict())
    }
}

/// The fields the model needs for the judgement; internal bookkeeping
/// (hash, tags, timestamps) stays out of the prompt.
fn report_view(record: &IncidentRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "title": record.title,
        "date": record.date,
        "location": record.location,
        "group": record.group,
        "casualties": record.casualties,
        "sources": record.sources,
        "description": record.description,
    })
}

fn comparison_prompt(candidate: &IncidentRecord, existing: &[IncidentRecord]) -> Result<String> {
    let candidate_json = serde_json::to_string_pretty(&report_view(candidate))?;
    let existing_json = serde_json::to_string_pretty(
        &existing.iter().map(report_view).collect::<Vec<_>>(),
    )?;

    Ok(format!(
        r#"You are a security intelligence analyst.
Compare the following "CANDIDATE" report against the list of "EXISTING" reports.
Determine if the CANDIDATE refers to the SAME security incident as any of the EXISTING reports.

CANDIDATE REPORT:
{candidate_json}

EXISTING REPORTS:
{existing_json}

TASK:
1. Determine if the CANDIDATE describes the exact same event as any EXISTING report (same location + same date + same nature of attack).
2. If a match is found, compare reliability and quality:
   - Prefer reports with confirmed sources (reliable news outlets over lone social posts).
   - Prefer reports with more specific details (precise location, specific casualty counts).
   - Prefer reports with HIGHER casualty counts (initial reports often undercount; later reports are more accurate).

RESPONSE FORMAT (JSON ONLY):
{{
  "isDuplicate": boolean,
  "duplicateOfId": "string (ID of the matching existing report, or null if no match)",
  "betterReport": "candidate" | "existing" (only if isDuplicate is true),
  "reason": "string (explanation)"
}}"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflictwatch_engine::testing::{day, incident};

    #[test]
    fn fenced_verdict_parses() {
        let text = "```json\n{\"isDuplicate\": true, \"duplicateOfId\": \"8c4e64cb-9d1a-42b5-a4a0-1f6f91a1f9eb\", \"betterReport\": \"existing\", \"reason\": \"Same Gwoza attack.\"}\n```";
        let wire: WireVerdict = serde_json::from_str(strip_code_blocks(text)).unwrap();
        let verdict = wire.into_verdict();

        assert!(verdict.is_duplicate);
        assert_eq!(verdict.better_report, BetterReport::Existing);
        assert!(verdict.duplicate_of_id.is_some());
        assert_eq!(verdict.reason, "Same Gwoza attack.");
    }

    #[test]
    fn non_uuid_duplicate_id_becomes_none() {
        let wire: WireVerdict = serde_json::from_str(
            r#"{"isDuplicate": false, "duplicateOfId": "null", "reason": "Different towns."}"#,
        )
        .unwrap();
        let verdict = wire.into_verdict();

        assert!(!verdict.is_duplicate);
        assert!(verdict.duplicate_of_id.is_none());
        assert_eq!(verdict.better_report, BetterReport::Candidate);
    }

    #[test]
    fn prompt_includes_both_sides() {
        let a = incident("Borno", "Gwoza", day(2024, 3, 1));
        let b = incident("Borno", "Bama", day(2024, 3, 2));
        let prompt = comparison_prompt(&a, std::slice::from_ref(&b)).unwrap();

        assert!(prompt.contains("CANDIDATE REPORT"));
        assert!(prompt.contains("EXISTING REPORTS"));
        assert!(prompt.contains(&a.id.to_string()));
        assert!(prompt.contains(&b.id.to_string()));
        assert!(prompt.contains("Gwoza"));
        assert!(prompt.contains("Bama"));
    }

    #[tokio::test]
    async fn empty_existing_list_short_circuits() {
        let oracle = GeminiOracle::new(GeminiClient::new("test-key", "test-model"));
        let a = incident("Borno", "Gwoza", day(2024, 3, 1));
        let verdict = oracle.confirm(&a, &[]).await.unwrap();

        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.better_report, BetterReport::Candidate);
    }
}
