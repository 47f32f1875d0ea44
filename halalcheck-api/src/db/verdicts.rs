//! Verdict store
//!
//! At most one verdict row exists per barcode. Inserts are idempotent:
//! `insert_if_absent` never overwrites, and a concurrent writer losing the
//! race gets the persisted winner back instead of an error.

use chrono::{DateTime, Utc};
use halalcheck_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnalysisMethod, Verdict, VerdictStatus};

/// Result of an insert-if-absent attempt
#[derive(Debug)]
pub enum InsertOutcome {
    /// This verdict is now the persisted row
    Inserted,
    /// Another verdict already existed for the barcode; it wins
    AlreadyExists(Verdict),
}

/// Insert a verdict unless one already exists for the barcode
///
/// Uses `ON CONFLICT DO NOTHING`; on conflict the existing row is read
/// back and returned, making concurrent first-time lookups converge on a
/// single persisted verdict.
pub async fn insert_if_absent(pool: &SqlitePool, verdict: &Verdict) -> Result<InsertOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO verdicts (
            id, barcode, verdict, confidence_score, analysis_notes,
            flagged_ingredients, is_certified, cert_body, cert_country, cert_link,
            analysis_method, external_source, ai_explanation, check_details,
            created_at, updated_at, last_verified_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        ON CONFLICT(barcode) DO NOTHING
        "#,
    )
    .bind(verdict.id.to_string())
    .bind(&verdict.barcode)
    .bind(verdict.status.as_str())
    .bind(verdict.confidence_score as i64)
    .bind(&verdict.analysis_notes)
    .bind(
        verdict
            .flagged_ingredients
            .as_ref()
            .map(|f| serde_json::to_string(f).unwrap_or_else(|_| "[]".to_string())),
    )
    .bind(verdict.is_certified as i64)
    .bind(&verdict.cert_body)
    .bind(&verdict.cert_country)
    .bind(&verdict.cert_link)
    .bind(verdict.analysis_method.as_str())
    .bind(&verdict.external_source)
    .bind(&verdict.ai_explanation)
    .bind(serde_json::to_string(&verdict.check_details).unwrap_or_else(|_| "[]".to_string()))
    .bind(verdict.created_at.to_rfc3339())
    .bind(verdict.updated_at.map(|t| t.to_rfc3339()))
    .bind(verdict.last_verified_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let existing = find_by_barcode(pool, &verdict.barcode).await?.ok_or_else(|| {
            Error::Internal(format!(
                "verdict insert conflicted but no row found for barcode {}",
                verdict.barcode
            ))
        })?;
        return Ok(InsertOutcome::AlreadyExists(existing));
    }

    Ok(InsertOutcome::Inserted)
}

/// Load the persisted verdict for a barcode, if any
pub async fn find_by_barcode(pool: &SqlitePool, barcode: &str) -> Result<Option<Verdict>> {
    let row = sqlx::query("SELECT * FROM verdicts WHERE barcode = ?1")
        .bind(barcode)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_text: String = row.try_get("verdict")?;
    let status = VerdictStatus::parse(&status_text)
        .ok_or_else(|| Error::Internal(format!("unknown verdict status: {}", status_text)))?;

    let method_text: String = row.try_get("analysis_method")?;
    let analysis_method = AnalysisMethod::parse(&method_text)
        .ok_or_else(|| Error::Internal(format!("unknown analysis method: {}", method_text)))?;

    let id_text: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|e| Error::Internal(format!("invalid verdict id: {}", e)))?;

    let created_at_text: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_at_text)?;

    let parse_optional_timestamp = |column: &str| -> Result<Option<DateTime<Utc>>> {
        match row.try_get::<Option<String>, _>(column)? {
            Some(text) => Ok(Some(parse_timestamp(&text)?)),
            None => Ok(None),
        }
    };

    Ok(Some(Verdict {
        id,
        barcode: row.try_get("barcode")?,
        status,
        confidence_score: row.try_get::<i64, _>("confidence_score")?.clamp(0, 100) as u8,
        analysis_notes: row.try_get("analysis_notes")?,
        flagged_ingredients: row
            .try_get::<Option<String>, _>("flagged_ingredients")?
            .and_then(|s| serde_json::from_str(&s).ok()),
        is_certified: row.try_get::<i64, _>("is_certified")? != 0,
        cert_body: row.try_get("cert_body")?,
        cert_country: row.try_get("cert_country")?,
        cert_link: row.try_get("cert_link")?,
        analysis_method,
        external_source: row.try_get("external_source")?,
        ai_explanation: row.try_get("ai_explanation")?,
        check_details: row
            .try_get::<String, _>("check_details")
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at,
        updated_at: parse_optional_timestamp("updated_at")?,
        last_verified_at: parse_optional_timestamp("last_verified_at")?,
    }))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp {}: {}", text, e)))
}
