// Incident extraction: search-grounded Gemini call returning raw incident
// reports from the last 72 hours of Nigerian security news.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use gemini_client::util::strip_code_blocks;
use gemini_client::{GeminiClient, GroundingChunk};

/// Publishers we refuse to cite. Matched case-insensitively against the
/// publisher field of each source.
const BANNED_PUBLISHERS: [&str; 4] = [
    "truth nigeria",
    "aid to the church in need",
    "acn international",
    "the journal",
];

const GROUNDING_REDIRECT_MARKER: &str = "grounding-api-redirect";

// ---------------------------------------------------------------------------
// Wire types: what the model returns for each incident
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLocation {
    pub state: String,
    pub lga: String,
    pub town: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RawCasualties {
    pub killed: Option<u32>,
    pub injured: Option<u32>,
    pub kidnapped: Option<u32>,
    pub displaced: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSource {
    pub url: String,
    pub title: String,
    pub publisher: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawIncident {
    pub title: String,
    pub description: String,
    /// ISO 8601 datetime string as returned by the model.
    pub date: String,
    pub location: RawLocation,
    pub group: String,
    pub casualties: RawCasualties,
    /// False when only attackers were harmed; such reports are dropped.
    pub civilian_casualties: bool,
    pub sources: Vec<RawSource>,
    pub status: String,
    pub tags: Vec<String>,
}

impl RawIncident {
    /// Minimum fields a report needs to be stored at all.
    fn is_usable(&self) -> bool {
        !self.title.is_empty()
            && !self.description.is_empty()
            && !self.date.is_empty()
            && !self.location.state.is_empty()
            && !self.group.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IncidentExtractor: Send + Sync {
    /// Fetch raw incident reports from the last 72 hours.
    async fn fetch_recent(&self) -> Result<Vec<RawIncident>>;
}

/// Search-grounded Gemini extractor.
pub struct GeminiExtractor {
    client: GeminiClient,
}

impl GeminiExtractor {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IncidentExtractor for GeminiExtractor {
    async fn fetch_recent(&self) -> Result<Vec<RawIncident>> {
        let today = Utc::now();
        let lookback_start = today - Duration::days(3);
        let prompt = extraction_prompt(
            &lookback_start.format("%Y-%m-%d").to_string(),
            &today.format("%Y-%m-%d").to_string(),
        );

        let response = self.client.generate_with_search(&prompt).await?;
        let text = response
            .text()
            .ok_or_else(|| anyhow!("Gemini returned no text for extraction prompt"))?;

        let mut incidents: Vec<RawIncident> = serde_json::from_str(strip_code_blocks(&text))
            .context("failed to parse incident array from Gemini response")?;

        repair_source_urls(&mut incidents, response.grounding_chunks());

        let before = incidents.len();
        let incidents = filter_reports(incidents);
        info!(
            returned = before,
            usable = incidents.len(),
            "Extraction complete"
        );

        Ok(incidents)
    }
}

/// Drop banned publishers, then reports left with no sources, reports
/// missing required fields, and attacker-casualty-only reports.
fn filter_reports(incidents: Vec<RawIncident>) -> Vec<RawIncident> {
    incidents
        .into_iter()
        .filter_map(|mut incident| {
            incident.sources.retain(|s| !is_banned_publisher(&s.publisher));
            if incident.sources.is_empty() {
                warn!(title = %incident.title, "Dropping report with no citable sources");
                return None;
            }
            if !incident.is_usable() {
                warn!(title = %incident.title, "Dropping report missing required fields");
                return None;
            }
            if !incident.civilian_casualties {
                warn!(title = %incident.title, "Dropping attacker-casualty-only report");
                return None;
            }
            Some(incident)
        })
        .collect()
}

fn is_banned_publisher(publisher: &str) -> bool {
    let publisher = publisher.to_lowercase();
    BANNED_PUBLISHERS.iter().any(|b| publisher.contains(b))
}

/// The model cites search results through opaque redirect URLs. Re-point
/// each such source at the real page from the grounding metadata, matched
/// by title containment; when no chunk matches, fall back to a Google
/// search link so the citation stays actionable.
fn repair_source_urls(incidents: &mut [RawIncident], chunks: &[GroundingChunk]) {
    if chunks.is_empty() {
        return;
    }

    for incident in incidents.iter_mut() {
        for source in incident.sources.iter_mut() {
            if !source.url.contains(GROUNDING_REDIRECT_MARKER) && source.url.starts_with("http") {
                continue;
            }

            let source_title = source.title.to_lowercase();
            let matched = chunks.iter().filter_map(|c| c.web.as_ref()).find(|web| {
                if web.title.is_empty() || source_title.is_empty() {
                    return false;
                }
                let chunk_title = web.title.to_lowercase();
                chunk_title.contains(&source_title) || source_title.contains(&chunk_title)
            });

            source.url = match matched {
                Some(web) => web.uri.clone(),
                None => search_fallback_url(&incident.title, &source.publisher),
            };
        }
    }
}

fn search_fallback_url(title: &str, publisher: &str) -> String {
    let query = format!("{title} {publisher}");
    match Url::parse_with_params("https://www.google.com/search", &[("q", query.as_str())]) {
        Ok(url) => url.to_string(),
        Err(_) => "https://www.google.com/search".to_string(),
    }
}

fn extraction_prompt(from: &str, to: &str) -> String {
    format!(
        r#"You are an intelligence analyst specializing in security incidents in Nigeria.
Search for the MOST RECENT terrorist attacks, insurgent attacks, bandit attacks, militant attacks, and attacks by unknown gunmen that have occurred in Nigeria within the last 72 hours (from {from} to {to}).

Search news outlets, security trackers, and references such as: Premium Times Nigeria, The Cable, Peoples Gazette, Channels TV, Sahara Reporters, Punch Nigeria, Vanguard Nigeria, Daily Trust, HumAngle Media, AFP, Reuters, ACLED, Zagazola Makama, and Wikipedia. Also search recent Twitter/X posts about Nigerian security incidents and include tweet URLs as sources when an incident is first reported there.

For each incident found, provide:
1. A clear, concise title
2. Detailed description of what happened
3. Exact date and time (ISO 8601 format, e.g., "2026-02-12T00:00:00.000Z"). If only the date is known, use midnight.
4. Location: Nigerian state, Local Government Area (LGA), and specific town/village
5. The armed group responsible (e.g., "Boko Haram", "ISWAP", "Bandits", "Unknown Gunmen"). If unknown, use "Unidentified Armed Group"
6. Casualties: number of CIVILIANS and SECURITY FORCES killed, injured, kidnapped, displaced. Do NOT include attackers in any count. Use null if not reported.
7. Source URLs: direct links to the news articles and/or tweet URLs.
8. Status: "confirmed" if from multiple reliable sources, "unconfirmed" if single source, "developing" if ongoing
9. Tags (e.g., "boko-haram", "northeast", "kidnapping", "banditry")

CRITICAL RULES:
- Only include REAL, VERIFIED incidents. Do NOT fabricate any attacks.
- If you cannot find any recent attacks, return an empty array.
- Cross-reference incidents across multiple sources when possible.
- Be specific about locations: include the state and town name.
- The killed and injured counts must ONLY include civilians and security forces. If an incident ONLY resulted in attacker deaths, DO NOT include it at all.
- Set "civilianCasualties" to true if any civilians or security forces were killed, injured, kidnapped, or displaced. Set to false if ONLY attackers were harmed.
- Do NOT use "Truth Nigeria", "Aid to the Church in Need (ACN International)", or "The Journal" as sources.

Return your response as a valid JSON array. Each element must follow this exact schema:
{{
  "title": "string",
  "description": "string",
  "date": "ISO 8601 datetime string",
  "location": {{
    "state": "string (Nigerian state name)",
    "lga": "string or 'Unknown'",
    "town": "string or 'Unknown'"
  }},
  "group": "string",
  "casualties": {{
    "killed": number or null,
    "injured": number or null,
    "kidnapped": number or null,
    "displaced": number or null
  }},
  "civilianCasualties": true or false,
  "sources": [
    {{
      "url": "string (direct URL to article or tweet)",
      "title": "string (article title or tweet excerpt)",
      "publisher": "string (publisher name)"
    }}
  ],
  "status": "confirmed" | "unconfirmed" | "developing",
  "tags": ["string"]
}}

RESPOND ONLY WITH THE JSON ARRAY."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_client::types::WebChunk;

    fn raw_source(url: &str, title: &str, publisher: &str) -> RawSource {
        RawSource {
            url: url.to_string(),
            title: title.to_string(),
            publisher: publisher.to_string(),
        }
    }

    fn usable_incident() -> RawIncident {
        RawIncident {
            title: "Attack in Gwoza".to_string(),
            description: "Armed men attacked Gwoza.".to_string(),
            date: "2024-03-01T00:00:00Z".to_string(),
            location: RawLocation {
                state: "Borno".to_string(),
                lga: "Gwoza".to_string(),
                town: "Gwoza".to_string(),
            },
            group: "ISWAP".to_string(),
            casualties: RawCasualties::default(),
            civilian_casualties: true,
            sources: vec![raw_source(
                "https://news.example/gwoza",
                "Gwoza attack",
                "Example News",
            )],
            status: "unconfirmed".to_string(),
            tags: vec![],
        }
    }

    fn chunk(uri: &str, title: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebChunk {
                uri: uri.to_string(),
                title: title.to_string(),
            }),
        }
    }

    #[test]
    fn wire_format_deserializes_with_missing_fields() {
        let incidents: Vec<RawIncident> = serde_json::from_str(
            r#"[{
                "title": "Attack in Gwoza",
                "description": "Armed men attacked the town.",
                "date": "2024-03-01T00:00:00.000Z",
                "location": {"state": "Borno"},
                "group": "ISWAP",
                "casualties": {"killed": 7, "injured": null},
                "civilianCasualties": true,
                "sources": [{"url": "https://news.example/a"}],
                "status": "confirmed"
            }]"#,
        )
        .unwrap();

        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].location.lga, "");
        assert_eq!(incidents[0].casualties.killed, Some(7));
        assert_eq!(incidents[0].casualties.injured, None);
        assert!(incidents[0].civilian_casualties);
        assert!(incidents[0].tags.is_empty());
    }

    #[test]
    fn banned_publishers_are_dropped_case_insensitively() {
        let mut incident = usable_incident();
        incident.sources.push(raw_source(
            "https://bad.example/x",
            "Report",
            "TRUTH Nigeria Desk",
        ));

        let filtered = filter_reports(vec![incident]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].sources.len(), 1);
        assert_eq!(filtered[0].sources[0].publisher, "Example News");
    }

    #[test]
    fn report_with_only_banned_sources_is_dropped() {
        let mut incident = usable_incident();
        incident.sources = vec![raw_source("https://bad.example/x", "Report", "The Journal")];
        assert!(filter_reports(vec![incident]).is_empty());
    }

    #[test]
    fn report_missing_state_is_dropped() {
        let mut incident = usable_incident();
        incident.location.state = String::new();
        assert!(filter_reports(vec![incident]).is_empty());
    }

    #[test]
    fn attacker_only_report_is_dropped() {
        let mut incident = usable_incident();
        incident.civilian_casualties = false;
        assert!(filter_reports(vec![incident]).is_empty());
    }

    #[test]
    fn redirect_url_is_repaired_by_title_containment() {
        let mut incident = usable_incident();
        incident.sources = vec![raw_source(
            "https://vertexaisearch.cloud.google.com/grounding-api-redirect/xyz",
            "Gwoza attack",
            "Example News",
        )];
        let chunks = vec![chunk(
            "https://news.example/gwoza-full",
            "Gwoza attack leaves several dead",
        )];

        let mut incidents = vec![incident];
        repair_source_urls(&mut incidents, &chunks);
        assert_eq!(incidents[0].sources[0].url, "https://news.example/gwoza-full");
    }

    #[test]
    fn unmatched_redirect_falls_back_to_search_url() {
        let mut incident = usable_incident();
        incident.sources = vec![raw_source("not-a-url", "Completely different", "Daily News")];
        let chunks = vec![chunk("https://news.example/other", "Unrelated story")];

        let mut incidents = vec![incident];
        repair_source_urls(&mut incidents, &chunks);
        let url = &incidents[0].sources[0].url;
        assert!(url.starts_with("https://www.google.com/search?q="));
        assert!(url.contains("Gwoza"));
    }

    #[test]
    fn good_urls_are_left_alone() {
        let mut incidents = vec![usable_incident()];
        let chunks = vec![chunk("https://news.example/other", "Gwoza attack")];
        repair_source_urls(&mut incidents, &chunks);
        assert_eq!(incidents[0].sources[0].url, "https://news.example/gwoza");
    }

    #[test]
    fn prompt_carries_date_range() {
        let prompt = extraction_prompt("2024-03-01", "2024-03-04");
        assert!(prompt.contains("from 2024-03-01 to 2024-03-04"));
        assert!(prompt.contains("JSON array"));
    }
}
