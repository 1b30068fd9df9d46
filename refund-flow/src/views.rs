//! What the dashboard and the result report show, independent of how they are drawn.

use chrono::{DateTime, Utc};

use crate::{
    models::{AnalysisEntry, ClassificationResult, EligibilityResult, ParsedReceipt},
    normalizer::NormalizedAnalysis,
};

pub const DASHBOARD_KEY_POINTS: usize = 3;
pub const DASHBOARD_STEPS: usize = 5;
pub const DASHBOARD_RECENT: usize = 8;

pub const ELIGIBLE_LABEL: &str = "Eligible for refund";
pub const NOT_ELIGIBLE_LABEL: &str = "Not eligible";

/// Reason text for a structured final report that carries no prose of its own.
pub const STRUCTURED_REPORT_NOTICE: &str =
    "AI returned structured analysis. See key points and recommended steps below.";

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub last: Option<LastAnalysisView>,
    pub recent: Vec<HistoryRow>,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastAnalysisView {
    pub case_id: String,
    pub status: String,
    pub issue_description: Option<String>,
    pub analysis_text: Option<String>,
    pub key_points: Vec<String>,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub index: usize,
    pub case_id: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl HistoryRow {
    pub fn from_entry(index: usize, entry: &AnalysisEntry) -> Self {
        Self {
            index,
            case_id: entry.case_id.clone(),
            status: entry.display_status(),
            created_at: entry.created_at,
        }
    }
}

impl DashboardView {
    pub fn build(last: Option<&AnalysisEntry>, history: &[AnalysisEntry]) -> Self {
        let last = last.map(|entry| {
            let normalized = entry.analysis.normalized();
            LastAnalysisView {
                case_id: entry.case_id.clone(),
                status: entry.display_status(),
                issue_description: entry
                    .analysis
                    .issue_description
                    .clone()
                    .filter(|s| !s.trim().is_empty()),
                analysis_text: normalized.display_text,
                key_points: truncate(normalized.key_points, DASHBOARD_KEY_POINTS),
                steps: truncate(normalized.steps, DASHBOARD_STEPS),
            }
        });

        Self {
            last,
            recent: history
                .iter()
                .take(DASHBOARD_RECENT)
                .enumerate()
                .map(|(index, entry)| HistoryRow::from_entry(index, entry))
                .collect(),
            history_len: history.len(),
        }
    }
}

/// The refund eligibility report for one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    /// Nothing to report; the user should upload a receipt first.
    Empty,
    Report(Box<ReportView>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub case_id: String,
    pub decision: Option<DecisionView>,
    pub receipt: Option<ReceiptSummary>,
    pub reason: NormalizedAnalysis,
    pub classification: Option<ClassificationView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionView {
    pub eligible: bool,
    pub reason: Option<String>,
    pub model: Option<String>,
}

impl DecisionView {
    fn from_eligibility(eligibility: &EligibilityResult) -> Self {
        Self {
            eligible: eligibility.eligible,
            reason: eligibility.reason.clone().filter(|r| !r.is_empty()),
            model: eligibility.model.clone().filter(|m| !m.is_empty()),
        }
    }

    pub fn label(&self) -> &'static str {
        if self.eligible {
            ELIGIBLE_LABEL
        } else {
            NOT_ELIGIBLE_LABEL
        }
    }
}

/// OCR facts from the first page of the first receipt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptSummary {
    pub seller: Option<String>,
    pub receipt_id: Option<String>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
    pub total: Option<String>,
    pub items: Vec<String>,
}

impl ReceiptSummary {
    fn from_parsed(parsed: &ParsedReceipt) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        let total = parsed.purchase_total.as_ref().and_then(|total| {
            let value = total.value?;
            let currency = total
                .currency
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CURRENCY);
            Some(format!("{currency} {value}"))
        });

        let items = parsed
            .item_list
            .iter()
            .map(|item| {
                let description = item.description.as_deref().unwrap_or_default();
                match item.price {
                    Some(price) => format!("{description} - ${price:.2}"),
                    None => description.to_string(),
                }
            })
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        Self {
            seller: non_empty(&parsed.seller_name),
            receipt_id: non_empty(&parsed.receipt_id),
            date: non_empty(&parsed.purchase_date),
            payment_method: non_empty(&parsed.payment_method),
            total,
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationView {
    pub category: String,
    pub reason: Option<String>,
    pub requires_manual_review: Option<bool>,
    pub confidence_score: Option<f64>,
    pub keywords: Vec<String>,
    pub model_used: Option<String>,
}

impl ClassificationView {
    fn from_result(result: &ClassificationResult) -> Self {
        Self {
            category: result
                .category
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "—".to_string()),
            reason: result.reason.clone().filter(|r| !r.trim().is_empty()),
            requires_manual_review: result.requires_manual_review,
            confidence_score: result.confidence_score,
            keywords: result.keywords.clone(),
            model_used: result.model_used.clone().filter(|m| !m.trim().is_empty()),
        }
    }
}

impl ResultView {
    /// Report for `entry`; empty when there is neither a report bundle nor any analysis.
    pub fn build(entry: Option<&AnalysisEntry>) -> Self {
        let Some(entry) = entry else {
            return Self::Empty;
        };
        let report = entry.report.as_ref().filter(|r| !r.is_empty());
        if report.is_none() && entry.analysis.is_empty() {
            return Self::Empty;
        }

        // The backend's final report is the reason; the analysis text stands in without one.
        let final_report = report.and_then(|r| r.final_report.as_ref());
        let mut reason = final_report
            .map(|final_report| final_report.normalized())
            .filter(|normalized| !normalized.is_empty())
            .unwrap_or_else(|| entry.analysis.normalized());
        if reason.display_text.is_none() && final_report.is_some_and(|r| r.is_structured()) {
            reason.display_text = Some(STRUCTURED_REPORT_NOTICE.to_string());
        }

        let receipt = entry
            .receipts
            .first()
            .and_then(|doc| doc.pages.first())
            .map(|page| ReceiptSummary::from_parsed(&page.parsed));

        Self::Report(Box::new(ReportView {
            case_id: entry.case_id.clone(),
            decision: report
                .and_then(|r| r.eligibility.as_ref())
                .map(DecisionView::from_eligibility),
            receipt,
            reason,
            classification: report
                .and_then(|r| r.classification.as_ref())
                .map(ClassificationView::from_result),
        }))
    }
}

fn truncate(mut items: Vec<String>, max: usize) -> Vec<String> {
    items.truncate(max);
    items
}
