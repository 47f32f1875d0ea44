//! Certification fan-out checker
//!
//! Resolves official halal certification for a product from three kinds of
//! evidence, cheapest first:
//!
//! 1. Source label tags ("halal"/"halaal" substring), no network calls.
//! 2. A text-search probe against a reputation site, keyed by product name.
//! 3. HEAD existence probes against certification registries, keyed by
//!    barcode.
//!
//! Network probes run concurrently and are awaited as a batch; every probe
//! contributes a `CertificationCheckResult` to the transparency log whether
//! it succeeded, missed, errored, or timed out. The first probe reporting a
//! hit, in submission order, decides the outcome. The checker as a whole
//! never fails the request.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{CertificationCheckResult, CertificationOutcome, CheckStatus};
use crate::types::{CertificationChecker, CertificationQuery};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const LABEL_CONFIDENCE: u8 = 85;
const SEARCH_CONFIDENCE: u8 = 90;
const REGISTRY_CONFIDENCE: u8 = 95;
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Certification registries probed by barcode
///
/// Listing order is the tie-break order: the first registry reporting a hit
/// wins, regardless of response time.
const REGISTRIES: &[(&str, &str, &str)] = &[
    (
        "JAKIM",
        "Malaysia",
        "https://www.halal.gov.my/v4/index.php?data=bW9kdWxlcy9uZXdzOzs7Ow==&utama=panduan&ids={barcode}",
    ),
    (
        "MUI",
        "Indonesia",
        "https://www.halalmui.org/mui14/main/page/produk-halal-mui/{barcode}",
    ),
    (
        "HFA",
        "United States",
        "https://halalfoodauthority.com/verify?barcode={barcode}",
    ),
    (
        "IFANCA",
        "International",
        "https://www.ifanca.org/halal-certification/verify/{barcode}",
    ),
    (
        "EIAC",
        "United Arab Emirates",
        "https://www.eiac.gov.ae/en/halal-products/search?code={barcode}",
    ),
    (
        "HMC",
        "United Kingdom",
        "https://www.halalhmc.org/verify-product/{barcode}",
    ),
    (
        "SANHA",
        "South Africa",
        "https://www.sanha.co.za/halaal-search/?product_code={barcode}",
    ),
    (
        "HFCE",
        "Canada",
        "https://halalfoodcouncil.ca/verify/{barcode}",
    ),
];

/// A positive certification signal from one probe
#[derive(Debug, Clone)]
pub struct CertificationHit {
    pub cert_body: String,
    pub cert_country: Option<String>,
    pub cert_link: String,
    pub confidence_score: u8,
    pub external_source: String,
}

/// Result of one settled probe: the audit entry plus an optional hit
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub check: CertificationCheckResult,
    pub hit: Option<CertificationHit>,
}

/// A pluggable certification evidence source
///
/// New registries are added by implementing this trait; the fan-out
/// orchestration does not change.
#[async_trait]
pub trait CertificationProbe: Send + Sync {
    fn name(&self) -> &str;
    fn country(&self) -> &str;
    /// Whether this probe can run for the given query (e.g. registry
    /// probes need a barcode)
    fn applies(&self, query: &CertificationQuery) -> bool;
    async fn probe(&self, query: &CertificationQuery) -> ProbeOutcome;
}

/// Barcode-keyed HEAD existence probe against one registry
pub struct RegistryProbe {
    name: String,
    country: String,
    url_template: String,
    http_client: reqwest::Client,
}

impl RegistryProbe {
    pub fn new(
        name: &str,
        country: &str,
        url_template: &str,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            country: country.to_string(),
            url_template: url_template.to_string(),
            http_client,
        }
    }
}

#[async_trait]
impl CertificationProbe for RegistryProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn country(&self) -> &str {
        &self.country
    }

    fn applies(&self, query: &CertificationQuery) -> bool {
        query.barcode.is_some()
    }

    async fn probe(&self, query: &CertificationQuery) -> ProbeOutcome {
        let barcode = query.barcode.as_deref().unwrap_or_default();
        let url = self.url_template.replace("{barcode}", barcode);
        let started = Instant::now();

        let response = self
            .http_client
            .head(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT, "text/html,application/json")
            .send()
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::info!(
                    registry = %self.name,
                    country = %self.country,
                    "Potential certification listing found"
                );
                ProbeOutcome {
                    check: CertificationCheckResult::new(
                        &self.name,
                        &self.country,
                        true,
                        CheckStatus::Success,
                        elapsed_ms,
                    ),
                    hit: Some(CertificationHit {
                        cert_body: self.name.clone(),
                        cert_country: Some(self.country.clone()),
                        cert_link: url,
                        confidence_score: REGISTRY_CONFIDENCE,
                        external_source: self.name.to_lowercase(),
                    }),
                }
            }
            Ok(_) => ProbeOutcome {
                check: CertificationCheckResult::new(
                    &self.name,
                    &self.country,
                    false,
                    CheckStatus::NotFound,
                    elapsed_ms,
                ),
                hit: None,
            },
            Err(e) => {
                tracing::debug!(registry = %self.name, error = %e, "Registry probe failed");
                ProbeOutcome {
                    check: CertificationCheckResult::new(
                        &self.name,
                        &self.country,
                        false,
                        CheckStatus::Error,
                        elapsed_ms,
                    ),
                    hit: None,
                }
            }
        }
    }
}

/// Name-keyed text-search probe against the VerifyHalal reputation site
///
/// The HTML scan is explicitly heuristic, best-effort signal only.
pub struct VerifyHalalProbe {
    http_client: reqwest::Client,
    base_url: String,
}

impl VerifyHalalProbe {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: "https://verifyhalal.com/product-result.html".to_string(),
        }
    }
}

#[async_trait]
impl CertificationProbe for VerifyHalalProbe {
    fn name(&self) -> &str {
        "VerifyHalal"
    }

    fn country(&self) -> &str {
        "Global"
    }

    fn applies(&self, query: &CertificationQuery) -> bool {
        query.product_name.is_some()
    }

    async fn probe(&self, query: &CertificationQuery) -> ProbeOutcome {
        let product_name = query.product_name.as_deref().unwrap_or_default();
        let started = Instant::now();

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("keyword", product_name)])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(_) | Err(_) => {
                return ProbeOutcome {
                    check: CertificationCheckResult::new(
                        self.name(),
                        self.country(),
                        false,
                        CheckStatus::Error,
                        elapsed_ms,
                    ),
                    hit: None,
                };
            }
        };

        let search_url = response.url().to_string();
        let html = response.text().await.unwrap_or_default();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let cert_body = extract_loose_value(&html, &["certification body", "certification-body"]);
        let cert_country = extract_loose_value(&html, &["certified in", "certified-in"]);
        let has_indicator = has_certification_indicator(&html);

        if has_indicator || cert_body.is_some() {
            tracing::info!(product_name = %product_name, "Certification signal on VerifyHalal");
            ProbeOutcome {
                check: CertificationCheckResult::new(
                    self.name(),
                    self.country(),
                    true,
                    CheckStatus::Success,
                    elapsed_ms,
                ),
                hit: Some(CertificationHit {
                    cert_body: cert_body.unwrap_or_else(|| "VerifyHalal Listed".to_string()),
                    cert_country,
                    cert_link: search_url,
                    confidence_score: SEARCH_CONFIDENCE,
                    external_source: "verifyhalal".to_string(),
                }),
            }
        } else {
            ProbeOutcome {
                check: CertificationCheckResult::new(
                    self.name(),
                    self.country(),
                    false,
                    CheckStatus::NotFound,
                    elapsed_ms,
                ),
                hit: None,
            }
        }
    }
}

/// Indicator substrings marking a certified listing in the search page
fn has_certification_indicator(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("halal-certified")
        || lower.contains("certified halal")
        || lower.contains("certification-badge")
}

/// Loose extraction of a value following one of the keyword tokens
///
/// Mirrors the page's loosely structured markup: after the keyword, skip
/// quote/colon/whitespace filler, then take everything up to a quote, tag
/// bracket, or line break.
fn extract_loose_value(html: &str, keywords: &[&str]) -> Option<String> {
    for keyword in keywords {
        let Some(index) = find_ascii_case_insensitive(html, keyword) else {
            continue;
        };
        let tail = &html[index + keyword.len()..];
        let Some(value_start) = tail
            .char_indices()
            .find(|(_, c)| !matches!(c, '"' | ':' | ' ' | '\t'))
            .map(|(i, _)| i)
        else {
            continue;
        };
        let value_tail = &tail[value_start..];
        let value_end = value_tail
            .char_indices()
            .find(|(_, c)| matches!(c, '"' | '<' | '>' | '\n' | '\r'))
            .map(|(i, _)| i)
            .unwrap_or(value_tail.len());
        let value = value_tail[..value_end].trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

/// Byte index of an ASCII keyword, matched case-insensitively
///
/// The keyword must be ASCII, which keeps the returned index on a char
/// boundary of the original string.
fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// The fan-out checker
pub struct FanOutChecker {
    probes: Vec<Arc<dyn CertificationProbe>>,
    probe_timeout: Duration,
}

impl FanOutChecker {
    /// Checker with the production probe set: VerifyHalal text search plus
    /// the configured registries, probed in listing order.
    pub fn new(http_client: reqwest::Client) -> Self {
        let mut probes: Vec<Arc<dyn CertificationProbe>> =
            vec![Arc::new(VerifyHalalProbe::new(http_client.clone()))];
        for (name, country, url_template) in REGISTRIES {
            probes.push(Arc::new(RegistryProbe::new(
                name,
                country,
                url_template,
                http_client.clone(),
            )));
        }
        Self {
            probes,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Checker with a custom probe set and timeout; used by tests
    pub fn with_probes(probes: Vec<Arc<dyn CertificationProbe>>, probe_timeout: Duration) -> Self {
        Self {
            probes,
            probe_timeout,
        }
    }

    /// Scan label tags for a halal certification marker
    fn label_hit(labels: &[String]) -> Option<&String> {
        labels.iter().find(|label| {
            let lower = label.to_lowercase();
            lower.contains("halal") || lower.contains("halaal")
        })
    }

    async fn run_probe(
        &self,
        probe: &Arc<dyn CertificationProbe>,
        query: &CertificationQuery,
    ) -> ProbeOutcome {
        let started = Instant::now();
        match tokio::time::timeout(self.probe_timeout, probe.probe(query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(registry = %probe.name(), "Certification probe timed out");
                ProbeOutcome {
                    check: CertificationCheckResult::timed_out(
                        probe.name(),
                        probe.country(),
                        started.elapsed().as_millis() as u64,
                    ),
                    hit: None,
                }
            }
        }
    }
}

#[async_trait]
impl CertificationChecker for FanOutChecker {
    async fn check(&self, query: &CertificationQuery) -> CertificationOutcome {
        // Cheap local check first: a halal label tag short-circuits the
        // entire fan-out.
        if let Some(label) = Self::label_hit(&query.labels) {
            tracing::info!(label = %label, "Halal label tag found, skipping registry probes");
            return CertificationOutcome {
                is_certified: true,
                cert_body: Some(label.clone()),
                cert_country: None,
                cert_link: None,
                confidence_score: LABEL_CONFIDENCE,
                external_source: Some("label_tags".to_string()),
                check_details: Vec::new(),
            };
        }

        let applicable: Vec<&Arc<dyn CertificationProbe>> = self
            .probes
            .iter()
            .filter(|probe| probe.applies(query))
            .collect();

        if applicable.is_empty() {
            return CertificationOutcome::not_certified(Vec::new());
        }

        tracing::info!(
            probes = applicable.len(),
            "Running certification checks in parallel"
        );

        // Wait for every probe to settle so the transparency log is
        // complete; a failing probe never aborts its siblings.
        let outcomes = join_all(
            applicable
                .iter()
                .map(|probe| self.run_probe(probe, query)),
        )
        .await;

        let check_details: Vec<CertificationCheckResult> =
            outcomes.iter().map(|o| o.check.clone()).collect();

        // First found in submission order wins
        let winner = outcomes.into_iter().find_map(|o| o.hit);

        match winner {
            Some(hit) => {
                tracing::info!(cert_body = %hit.cert_body, "Certification found");
                CertificationOutcome {
                    is_certified: true,
                    cert_body: Some(hit.cert_body),
                    cert_country: hit.cert_country,
                    cert_link: Some(hit.cert_link),
                    confidence_score: hit.confidence_score,
                    external_source: Some(hit.external_source),
                    check_details,
                }
            }
            None => {
                tracing::info!("No certification found in any registry");
                CertificationOutcome::not_certified(check_details)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_hit_substring_match() {
        let labels = vec!["en:organic".to_string(), "en:halal-certified".to_string()];
        assert_eq!(
            FanOutChecker::label_hit(&labels),
            Some(&"en:halal-certified".to_string())
        );

        let halaal = vec!["Halaal Approved".to_string()];
        assert!(FanOutChecker::label_hit(&halaal).is_some());

        let none = vec!["en:vegetarian".to_string()];
        assert!(FanOutChecker::label_hit(&none).is_none());
    }

    #[tokio::test]
    async fn test_label_fast_path_skips_probes() {
        // No probes at all; a label hit must still certify
        let checker = FanOutChecker::with_probes(Vec::new(), Duration::from_millis(50));
        let query = CertificationQuery {
            product_name: Some("Biscuits".to_string()),
            barcode: Some("12345678".to_string()),
            brand: None,
            labels: vec!["en:halal-certified".to_string()],
        };

        let outcome = checker.check(&query).await;
        assert!(outcome.is_certified);
        assert_eq!(outcome.confidence_score, LABEL_CONFIDENCE);
        assert_eq!(outcome.external_source.as_deref(), Some("label_tags"));
        assert_eq!(outcome.cert_body.as_deref(), Some("en:halal-certified"));
        assert!(outcome.check_details.is_empty());
    }

    #[tokio::test]
    async fn test_no_applicable_probes_is_a_miss() {
        let checker = FanOutChecker::with_probes(Vec::new(), Duration::from_millis(50));
        let outcome = checker.check(&CertificationQuery::default()).await;
        assert!(!outcome.is_certified);
        assert!(outcome.check_details.is_empty());
    }

    #[test]
    fn test_extract_loose_value() {
        let html = r#"<div data-info="certification body: JAKIM Malaysia"><span>x</span></div>"#;
        assert_eq!(
            extract_loose_value(html, &["certification body", "certification-body"]),
            Some("JAKIM Malaysia".to_string())
        );

        let hyphenated = r#"certification-body:"HFCE""#;
        assert_eq!(
            extract_loose_value(hyphenated, &["certification body", "certification-body"]),
            Some("HFCE".to_string())
        );

        assert_eq!(extract_loose_value("no markers here", &["certification body"]), None);
    }

    #[test]
    fn test_certification_indicators() {
        assert!(has_certification_indicator("<span class=\"halal-certified\">"));
        assert!(has_certification_indicator("This product is Certified Halal by"));
        assert!(!has_certification_indicator("<div>ordinary page</div>"));
    }
}
