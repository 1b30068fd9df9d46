//! Plain-text rendering of the view models for the terminal.

use chrono::{DateTime, Local, Utc};
use refund_flow::{
    Session,
    views::{DashboardView, HistoryRow, ReportView, ResultView},
};
use std::fmt::{self, Display, Formatter};

const NO_REPORT: &str =
    "No report data yet. Upload a receipt with `refund upload` to get an eligibility report.";

pub fn session(session: Option<&Session>) -> String {
    match session {
        Some(session) => format!("Signed in as {}", session.user.email),
        None => "Not signed in".to_string(),
    }
}

pub fn dashboard(view: &DashboardView, session: &Session) -> String {
    Dashboard { view, session }.to_string()
}

pub fn history(rows: &[HistoryRow]) -> String {
    History(rows).to_string()
}

pub fn result(view: &ResultView) -> String {
    match view {
        ResultView::Empty => format!("{NO_REPORT}\n"),
        ResultView::Report(report) => Report(report).to_string(),
    }
}

struct Dashboard<'a> {
    view: &'a DashboardView,
    session: &'a Session,
}

impl Display for Dashboard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Welcome, {}", self.session.user.email)?;
        writeln!(f)?;

        match &self.view.last {
            None => writeln!(f, "No analysis yet. Run `refund upload` to start a case.")?,
            Some(last) => {
                writeln!(f, "Last analysis")?;
                writeln!(f, "  Case:   {}", or_dash(&last.case_id))?;
                writeln!(f, "  Status: {}", last.status)?;
                if let Some(issue) = &last.issue_description {
                    writeln!(f, "  Issue:  {issue}")?;
                }
                if let Some(text) = &last.analysis_text {
                    writeln!(f)?;
                    indented(f, text)?;
                }
                bullets(f, "Key points", &last.key_points)?;
                numbered(f, "Next steps", &last.steps)?;
            }
        }

        writeln!(f)?;
        if self.view.recent.is_empty() {
            return writeln!(f, "History is empty.");
        }
        writeln!(
            f,
            "Recent cases ({} of {})",
            self.view.recent.len(),
            self.view.history_len
        )?;
        History(&self.view.recent).fmt(f)
    }
}

struct History<'a>(&'a [HistoryRow]);

impl Display for History<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in self.0 {
            writeln!(
                f,
                "  [{}] {:<20} {:<22} {}",
                row.index,
                or_dash(&row.case_id),
                row.status,
                timestamp(row.created_at)
            )?;
        }
        Ok(())
    }
}

struct Report<'a>(&'a ReportView);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Refund eligibility report")?;
        writeln!(f, "  Case: {}", or_dash(&report.case_id))?;

        if let Some(decision) = &report.decision {
            writeln!(f)?;
            writeln!(f, "Decision: {}", decision.label())?;
            if let Some(reason) = &decision.reason {
                writeln!(f, "  Reason: {reason}")?;
            }
            if let Some(model) = &decision.model {
                writeln!(f, "  Model:  {model}")?;
            }
        }

        if let Some(receipt) = &report.receipt {
            writeln!(f)?;
            writeln!(f, "Receipt")?;
            let fields = [
                ("Seller", &receipt.seller),
                ("Receipt ID", &receipt.receipt_id),
                ("Date", &receipt.date),
                ("Payment", &receipt.payment_method),
                ("Total", &receipt.total),
            ];
            for (label, value) in fields {
                writeln!(f, "  {label:<11} {}", value.as_deref().unwrap_or("—"))?;
            }
            bullets(f, "Items", &receipt.items)?;
        }

        writeln!(f)?;
        writeln!(f, "Why")?;
        match &report.reason.display_text {
            Some(text) => indented(f, text)?,
            None => writeln!(f, "  No AI report available.")?,
        }
        bullets(f, "Key points", &report.reason.key_points)?;
        numbered(f, "Next steps", &report.reason.steps)?;

        let Some(classification) = &report.classification else {
            return Ok(());
        };
        writeln!(f)?;
        writeln!(f, "Classification")?;
        writeln!(f, "  Category:      {}", classification.category)?;
        if let Some(reason) = &classification.reason {
            writeln!(f, "  Reason:        {reason}")?;
        }
        if let Some(review) = classification.requires_manual_review {
            writeln!(f, "  Manual review: {}", if review { "Yes" } else { "No" })?;
        }
        if let Some(score) = classification.confidence_score {
            writeln!(f, "  Confidence:    {score:.2}")?;
        }
        if !classification.keywords.is_empty() {
            writeln!(f, "  Keywords:      {}", classification.keywords.join(", "))?;
        }
        if let Some(model) = &classification.model_used {
            writeln!(f, "  Model:         {model}")?;
        }
        Ok(())
    }
}

fn bullets(f: &mut Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title}:")?;
    for item in items {
        writeln!(f, "    - {item}")?;
    }
    Ok(())
}

fn numbered(f: &mut Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title}:")?;
    for (i, item) in items.iter().enumerate() {
        writeln!(f, "    {}. {item}", i + 1)?;
    }
    Ok(())
}

fn indented(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
    for line in text.lines() {
        writeln!(f, "  {line}")?;
    }
    Ok(())
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "—" } else { value }
}

fn timestamp(created_at: Option<DateTime<Utc>>) -> String {
    created_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use refund_flow::{AnalysisEntry, AuthUser};
    use serde_json::json;

    fn entry(value: serde_json::Value) -> AnalysisEntry {
        serde_json::from_value(value).unwrap()
    }

    fn signed_in() -> Session {
        Session {
            token: "tok".to_string(),
            user: AuthUser {
                email: "ana@example.com".to_string(),
            },
        }
    }

    #[test]
    fn empty_result_points_to_upload() {
        assert!(result(&ResultView::Empty).contains("refund upload"));
    }

    #[test]
    fn report_lists_decision_receipt_and_steps() {
        let last = entry(json!({
            "case_id": "CASE-7",
            "analysis": {"issue_description": "Seam split"},
            "report": {
                "eligibility": {"eligible": false, "reason": "Worn item"},
                "classification": {"category": "wear", "confidence_score": 0.5,
                                   "reason": "Sole worn through", "model_used": "clf-v2"},
                "final_report": "Not covered.\nNormal wear."
            },
            "receipts": [{"pages": [{"parsed": {
                "seller_name": "Shoe Hub",
                "item_list": [{"description": "Boots", "price": 80}]
            }}]}]
        }));
        let text = result(&ResultView::build(Some(&last)));

        assert!(text.contains("Case: CASE-7"));
        assert!(!text.contains("Seam split"));
        assert!(text.contains("Decision: Not eligible"));
        assert!(text.contains("Reason: Worn item"));
        assert!(text.contains("Seller      Shoe Hub"));
        assert!(text.contains("- Boots - $80.00"));
        assert!(text.contains("  Not covered.\n  Normal wear."));
        assert!(text.contains("Reason:        Sole worn through"));
        assert!(text.contains("Confidence:    0.50"));
        assert!(text.contains("Model:         clf-v2"));
        assert!(!text.contains("Manual review"));
    }

    #[test]
    fn structured_report_without_prose_shows_notice() {
        let last = entry(json!({
            "case_id": "CASE-8",
            "report": {"final_report": {"steps": ["Print the label"]}}
        }));
        let text = result(&ResultView::build(Some(&last)));
        assert!(text.contains("AI returned structured analysis."));
        assert!(text.contains("1. Print the label"));
    }

    #[test]
    fn dashboard_shows_last_and_recent() {
        let last = entry(json!({
            "case_id": "CASE-2",
            "status": "analysis_completed",
            "analysis": {"analysis": "Refund likely", "steps": ["Pack item"]}
        }));
        let view = DashboardView::build(Some(&last), std::slice::from_ref(&last));
        let text = dashboard(&view, &signed_in());

        assert!(text.starts_with("Welcome, ana@example.com"));
        assert!(text.contains("Status: analysis_completed"));
        assert!(text.contains("  Refund likely"));
        assert!(text.contains("1. Pack item"));
        assert!(text.contains("Recent cases (1 of 1)"));
        assert!(text.contains("[0] CASE-2"));
    }

    #[test]
    fn empty_dashboard_prompts_for_upload() {
        let text = dashboard(&DashboardView::build(None, &[]), &signed_in());
        assert!(text.contains("No analysis yet"));
        assert!(text.contains("History is empty."));
    }

    #[test]
    fn session_line() {
        assert_eq!(session(Some(&signed_in())), "Signed in as ana@example.com");
        assert_eq!(session(None), "Not signed in");
    }
}
