use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::normalizer::{self, NormalizedAnalysis};

/// One submitted case together with everything the backend said about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub case_id: String,
    #[serde(default, deserialize_with = "lenient::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::percent"
    )]
    pub progress_percent: Option<u8>,
    #[serde(default)]
    pub analysis: AnalysisPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportBundle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipts: Vec<ReceiptDocument>,
}

impl AnalysisEntry {
    /// Status shown to the user: the stored status, `Analyzed` when only a payload exists.
    pub fn display_status(&self) -> String {
        if !self.status.trim().is_empty() {
            self.status.clone()
        } else if !self.analysis.is_empty() {
            "Analyzed".to_string()
        } else {
            "—".to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub model: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub issue_description: Option<String>,
    /// Free text from the backend. May start with an embedded JSON object.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_text"
    )]
    pub analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub steps: Vec<String>,
}

impl AnalysisPayload {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Display bundle for this payload, with the payload's own lists as fallback.
    pub fn normalized(&self) -> NormalizedAnalysis {
        normalizer::normalize_with(
            self.analysis.as_deref().unwrap_or_default(),
            &self.key_points,
            &self.steps,
        )
    }

    /// Builds a payload from a structured final report object.
    pub fn from_report_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(lenient::scalar_text);
        let list = |key: &str| {
            object
                .get(key)
                .map(lenient::list_from_value)
                .unwrap_or_default()
        };

        Self {
            model: text("model"),
            issue_description: text("issue_description"),
            analysis: text("analysis")
                .or_else(|| text("summary"))
                .or_else(|| text("explanation")),
            key_points: list("key_points"),
            steps: list("steps"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportBundle {
    #[serde(default)]
    pub classification: Option<ClassificationResult>,
    #[serde(default)]
    pub eligibility: Option<EligibilityResult>,
    #[serde(default, deserialize_with = "lenient::opt_final_report")]
    pub final_report: Option<FinalReport>,
}

impl ReportBundle {
    pub fn is_empty(&self) -> bool {
        self.classification.is_none() && self.eligibility.is_none() && self.final_report.is_none()
    }
}

/// Backend narrative for a decision: either prose or an object with named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalReport {
    Text(String),
    Structured(Map<String, Value>),
}

impl FinalReport {
    /// True for an object, or for text that is a JSON object as a whole.
    pub fn is_structured(&self) -> bool {
        match self {
            FinalReport::Structured(_) => true,
            FinalReport::Text(text) => {
                serde_json::from_str::<Map<String, Value>>(text.trim()).is_ok()
            }
        }
    }

    pub fn normalized(&self) -> NormalizedAnalysis {
        match self {
            FinalReport::Text(text) => normalizer::normalize(text),
            FinalReport::Structured(object) => normalizer::from_object(object, "", &[], &[]),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EligibilityResult {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub eligible: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub reason: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<EligibilitySummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EligibilitySummary {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub item: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub date: Option<ReceiptDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptDate {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub raw: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub iso: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub requires_manual_review: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub model_used: Option<String>,
}

/// OCR output for one uploaded receipt file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptDocument {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub filename: Option<String>,
    #[serde(default)]
    pub pages: Vec<ReceiptPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptPage {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub text: Option<String>,
    #[serde(default)]
    pub parsed: ParsedReceipt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedReceipt {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub seller_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub receipt_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub purchase_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub purchase_total: Option<Money>,
    #[serde(default)]
    pub item_list: Vec<ReceiptItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptItem {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,
}

// Wire types

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCaseResponse {
    #[serde(default, deserialize_with = "lenient::string")]
    pub case_id: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub receipt_id: Option<String>,
    #[serde(default)]
    pub timestamps: HashMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::percent")]
    pub progress_percent: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub issue_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub steps: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamps: HashMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::percent")]
    pub progress_percent: Option<u8>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub case_id: Option<String>,
    #[serde(default)]
    pub eligibility: Option<EligibilityResult>,
    #[serde(default)]
    pub classification: Option<ClassificationResult>,
    #[serde(default, deserialize_with = "lenient::opt_final_report")]
    pub final_report: Option<FinalReport>,
    #[serde(default)]
    pub receipts: Vec<ReceiptDocument>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// Deserializers that accept whatever shape the backend happens to send.
pub(crate) mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::FinalReport;

    /// Text for scalar values; `None` for null, objects and arrays.
    pub fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn list_from_value(value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
            _ => Vec::new(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar_text(&Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_text(&Value::deserialize(d)?))
    }

    /// Like `opt_string`, but objects and arrays are kept as their JSON text.
    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            v @ (Value::Object(_) | Value::Array(_)) => Some(v.to_string()),
            v => scalar_text(&v),
        })
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn percent<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
        Ok(opt_f64(d)?.map(|p| p.clamp(0.0, 100.0).round() as u8))
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(list_from_value(&Value::deserialize(d)?))
    }

    fn truthiness(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|n| n != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Missing, null and unrecognised values read as `false`.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(truthiness(&Value::deserialize(d)?).unwrap_or(false))
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(truthiness(&Value::deserialize(d)?))
    }

    /// RFC 3339 timestamps; anything else reads as unknown.
    pub fn opt_datetime<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        })
    }

    /// Objects stay structured; every other non-null shape becomes text.
    pub fn opt_final_report<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<FinalReport>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Object(object) => Some(FinalReport::Structured(object)),
            Value::String(text) => Some(FinalReport::Text(text)),
            other => Some(FinalReport::Text(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_tolerates_loose_backend_shapes() {
        let entry: AnalysisEntry = serde_json::from_value(json!({
            "case_id": 42,
            "created_at": "2025-10-24T08:00:00Z",
            "status": "analyzed",
            "progress_percent": "150",
            "analysis": {
                "model": "gpt-4o-mini",
                "analysis": {"summary": "structured"},
                "key_points": ["a", 2, null, {"x": 1}],
            },
            "report": {
                "classification": null,
                "eligibility": {"eligible": true, "summary": {"price": {"currency": "AUD", "value": "12.50"}}},
                "final_report": null
            },
            "receipts": [{"pages": [{"parsed": {"seller_name": "Shop", "item_list": [{"description": "Mug", "price": 9}]}}]}]
        }))
        .unwrap();

        assert_eq!(entry.case_id, "42");
        assert_eq!(entry.progress_percent, Some(100));
        assert_eq!(entry.analysis.analysis.as_deref(), Some(r#"{"summary":"structured"}"#));
        assert_eq!(entry.analysis.key_points, vec!["a", "2"]);

        let report = entry.report.unwrap();
        assert!(report.final_report.is_none());
        let price = report.eligibility.unwrap().summary.unwrap().price.unwrap();
        assert_eq!(price.value, Some(12.5));
        assert_eq!(
            entry.receipts[0].pages[0].parsed.item_list[0].price,
            Some(9.0)
        );
    }

    #[test]
    fn final_report_accepts_text_or_object() {
        let text: FinalReport = serde_json::from_value(json!("Refund approved")).unwrap();
        assert_eq!(text, FinalReport::Text("Refund approved".to_string()));

        let object: FinalReport =
            serde_json::from_value(json!({"summary": "ok", "steps": ["call"]})).unwrap();
        let normalized = object.normalized();
        assert_eq!(normalized.display_text.as_deref(), Some("ok"));
        assert_eq!(normalized.steps, vec!["call"]);
    }

    #[test]
    fn loose_flags_do_not_break_the_analyze_response() {
        let analyzed: AnalyzeResponse = serde_json::from_value(json!({
            "analysis": "ok",
            "eligibility": {"eligible": null},
            "classification": {"requires_manual_review": "yes", "reason": "Visible damage",
                               "model_used": "clf-v2"}
        }))
        .unwrap();
        assert!(!analyzed.eligibility.unwrap().eligible);
        let classification = analyzed.classification.unwrap();
        assert_eq!(classification.requires_manual_review, Some(true));
        assert_eq!(classification.reason.as_deref(), Some("Visible damage"));
        assert_eq!(classification.model_used.as_deref(), Some("clf-v2"));

        let eligibility: EligibilityResult =
            serde_json::from_value(json!({"eligible": "true"})).unwrap();
        assert!(eligibility.eligible);
        let eligibility: EligibilityResult = serde_json::from_value(json!({"eligible": 1})).unwrap();
        assert!(eligibility.eligible);
        let classification: ClassificationResult =
            serde_json::from_value(json!({"requires_manual_review": null})).unwrap();
        assert_eq!(classification.requires_manual_review, None);
        let classification: ClassificationResult =
            serde_json::from_value(json!({"requires_manual_review": "No"})).unwrap();
        assert_eq!(classification.requires_manual_review, Some(false));
    }

    #[test]
    fn odd_final_report_shapes_become_text() {
        let analyzed: AnalyzeResponse =
            serde_json::from_value(json!({"final_report": ["Refund", "approved"]})).unwrap();
        assert_eq!(
            analyzed.final_report,
            Some(FinalReport::Text(r#"["Refund","approved"]"#.to_string()))
        );

        let bundle: ReportBundle = serde_json::from_value(json!({"final_report": 42})).unwrap();
        assert_eq!(bundle.final_report, Some(FinalReport::Text("42".to_string())));

        let bundle: ReportBundle =
            serde_json::from_value(json!({"final_report": {"summary": "ok"}})).unwrap();
        assert!(bundle.final_report.unwrap().is_structured());
        assert!(FinalReport::Text(r#" {"steps":["a"]} "#.to_string()).is_structured());
        assert!(!FinalReport::Text("Refund {approved}".to_string()).is_structured());
    }

    #[test]
    fn unparseable_created_at_reads_as_unknown() {
        let entry: AnalysisEntry =
            serde_json::from_value(json!({"case_id": "OLD-2", "created_at": "24/10/2025"}))
                .unwrap();
        assert_eq!(entry.case_id, "OLD-2");
        assert!(entry.created_at.is_none());

        let entry: AnalysisEntry =
            serde_json::from_value(json!({"created_at": "2025-10-24T10:00:00+02:00"})).unwrap();
        assert_eq!(entry.created_at.unwrap().to_rfc3339(), "2025-10-24T08:00:00+00:00");
    }

    #[test]
    fn display_status_falls_back() {
        let mut entry: AnalysisEntry = serde_json::from_value(json!({})).unwrap();
        assert_eq!(entry.display_status(), "—");

        entry.analysis.analysis = Some("text".to_string());
        assert_eq!(entry.display_status(), "Analyzed");

        entry.status = "analysis_completed".to_string();
        assert_eq!(entry.display_status(), "analysis_completed");
    }

    #[test]
    fn payload_from_report_object_prefers_analysis_then_summary() {
        let object = json!({"summary": "short", "explanation": "long", "key_points": ["k"]});
        let payload = AnalysisPayload::from_report_object(object.as_object().unwrap());
        assert_eq!(payload.analysis.as_deref(), Some("short"));
        assert_eq!(payload.key_points, vec!["k"]);
        assert!(payload.steps.is_empty());
    }
}
