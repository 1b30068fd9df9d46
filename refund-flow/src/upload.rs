use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{
    client::{ApiClient, CaseSubmission, FileUpload},
    error::{FlowError, Result},
    history::HistoryStore,
    models::{
        AnalysisEntry, AnalysisPayload, AnalyzeResponse, EligibilityResult, FinalReport,
        ReportBundle,
    },
};

/// Largest file accepted for upload.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub const RECEIPT_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

const DEFAULT_STATUS: &str = "analyzed";

/// What the user picked on the upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub receipt_files: Vec<PathBuf>,
    pub product_images: Vec<PathBuf>,
    pub issue_description: String,
    /// Reference the user already has for this purchase, if any.
    pub case_id: Option<String>,
}

impl UploadRequest {
    /// Checks files and description before anything is sent.
    pub async fn validate(&self) -> Result<()> {
        if self.receipt_files.is_empty() {
            return Err(FlowError::validation(
                "Please choose at least one receipt file (PDF, PNG or JPEG).",
            ));
        }
        for path in &self.receipt_files {
            check_file(path, &RECEIPT_EXTENSIONS, "receipt file").await?;
        }
        for path in &self.product_images {
            check_file(path, &IMAGE_EXTENSIONS, "product image").await?;
        }
        validate_issue(&self.issue_description)
    }

    fn user_case_id(&self) -> Option<&str> {
        self.case_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Validates, creates the case, asks for its analysis and records the result.
pub async fn submit(
    client: &ApiClient,
    history: &HistoryStore,
    request: &UploadRequest,
) -> Result<AnalysisEntry> {
    request.validate().await?;

    let submission = CaseSubmission {
        receipt_files: read_all(&request.receipt_files).await?,
        product_images: read_all(&request.product_images).await?,
        issue_description: request.issue_description.trim().to_string(),
        receipt_id: request.user_case_id().map(str::to_string),
    };
    info!(
        receipts = submission.receipt_files.len(),
        images = submission.product_images.len(),
        "Submitting case"
    );

    let created = client.create_case(submission).await?;
    info!(case_id = %created.case_id, status = ?created.status, "Case created");

    let server_case_id = Some(created.case_id.as_str()).filter(|id| !id.is_empty());
    let analyzed = client
        .analyze(request.issue_description.trim(), server_case_id)
        .await?;

    let case_id = first_non_empty([
        analyzed.case_id.as_deref(),
        server_case_id,
        request.user_case_id(),
    ]);
    let entry = build_entry(case_id, request.issue_description.trim(), analyzed, Utc::now());
    history.record(&entry).await?;

    info!(case_id = %entry.case_id, status = %entry.status, "Case analyzed");
    Ok(entry)
}

/// Analyzes an issue description on its own, optionally for an existing case.
pub async fn analyze_issue(
    client: &ApiClient,
    history: &HistoryStore,
    issue_description: &str,
    case_id: Option<&str>,
) -> Result<AnalysisEntry> {
    validate_issue(issue_description)?;
    let case_id = case_id.map(str::trim).filter(|id| !id.is_empty());

    let analyzed = client.analyze(issue_description.trim(), case_id).await?;
    let case_id = first_non_empty([analyzed.case_id.as_deref(), case_id]);
    let entry = build_entry(case_id, issue_description.trim(), analyzed, Utc::now());
    history.record(&entry).await?;

    info!(case_id = %entry.case_id, status = %entry.status, "Issue analyzed");
    Ok(entry)
}

/// Turns an analyze response into the entry kept in history.
pub fn build_entry(
    case_id: String,
    issue_description: &str,
    analyzed: AnalyzeResponse,
    created_at: DateTime<Utc>,
) -> AnalysisEntry {
    let analysis = payload_from(&analyzed, issue_description);

    let classification = analyzed.classification.or_else(|| {
        analyzed
            .eligibility
            .as_ref()
            .and_then(|e| e.classification.clone())
    });
    let report = ReportBundle {
        classification,
        eligibility: analyzed.eligibility,
        final_report: analyzed.final_report,
    };

    AnalysisEntry {
        case_id,
        created_at: Some(created_at),
        status: analyzed
            .status
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        progress_percent: Some(analyzed.progress_percent.unwrap_or(100)),
        analysis,
        report: (!report.is_empty()).then_some(report),
        receipts: analyzed.receipts,
    }
}

fn payload_from(analyzed: &AnalyzeResponse, issue_description: &str) -> AnalysisPayload {
    let issue = || Some(issue_description.to_string()).filter(|s| !s.is_empty());

    if let Some(FinalReport::Structured(object)) = &analyzed.final_report {
        let mut payload = AnalysisPayload::from_report_object(object);
        payload.issue_description = payload.issue_description.or_else(issue);
        payload.model = payload
            .model
            .or_else(|| analyzed.eligibility.as_ref().and_then(|e| e.model.clone()));
        return payload;
    }

    if analyzed.analysis.is_some() || !analyzed.key_points.is_empty() || !analyzed.steps.is_empty()
    {
        return AnalysisPayload {
            model: analyzed.model.clone(),
            issue_description: analyzed.issue_description.clone().or_else(issue),
            analysis: analyzed.analysis.clone(),
            key_points: analyzed.key_points.clone(),
            steps: analyzed.steps.clone(),
        };
    }

    if let Some(FinalReport::Text(text)) = &analyzed.final_report {
        return AnalysisPayload {
            model: analyzed.eligibility.as_ref().and_then(|e| e.model.clone()),
            issue_description: issue(),
            analysis: Some(text.clone()),
            ..Default::default()
        };
    }

    if let Some(eligibility) = &analyzed.eligibility {
        return AnalysisPayload {
            model: eligibility.model.clone(),
            issue_description: issue(),
            analysis: Some(eligibility_text(eligibility)),
            key_points: eligibility
                .reason
                .clone()
                .filter(|r| !r.is_empty())
                .into_iter()
                .collect(),
            steps: Vec::new(),
        };
    }

    AnalysisPayload {
        model: analyzed.model.clone(),
        issue_description: issue(),
        ..Default::default()
    }
}

/// Plain-text decision used when the backend sent an eligibility result but no report.
fn eligibility_text(eligibility: &EligibilityResult) -> String {
    let summary = eligibility.summary.clone().unwrap_or_default();
    let price = summary
        .price
        .map(|p| {
            let value = p.value.map(|v| v.to_string()).unwrap_or_default();
            format!("{} {}", p.currency.unwrap_or_default(), value)
                .trim()
                .to_string()
        })
        .unwrap_or_default();

    format!(
        "Eligible: {}\nReason: {}\nItem: {}\nPrice: {}\nDate: {}",
        if eligibility.eligible { "Yes" } else { "No" },
        eligibility.reason.as_deref().unwrap_or_default(),
        summary.item.unwrap_or_default(),
        price,
        summary.date.and_then(|d| d.raw).unwrap_or_default(),
    )
}

/// Short label for a set of picked files: `a.pdf, b.png +3 more`.
pub fn summarize_files(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "No files selected".to_string();
    }
    let names: Vec<String> = paths.iter().map(|p| display_name(p)).collect();
    if names.len() <= 2 {
        names.join(", ")
    } else {
        format!("{} +{} more", names[..2].join(", "), names.len() - 2)
    }
}

fn validate_issue(issue_description: &str) -> Result<()> {
    if issue_description.trim().is_empty() {
        return Err(FlowError::validation("Please describe the issue."));
    }
    Ok(())
}

async fn check_file(path: &Path, extensions: &[&str], kind: &str) -> Result<()> {
    let name = display_name(path);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| FlowError::validation(format!("File not found: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(FlowError::validation(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !extensions.contains(&extension.as_str()) {
        return Err(FlowError::validation(format!(
            "Unsupported {kind} type: {name} (allowed: {})",
            extensions.join(", ")
        )));
    }

    if metadata.len() > MAX_FILE_BYTES {
        return Err(FlowError::validation(format!(
            "File is too large (max 10 MB): {name}"
        )));
    }
    Ok(())
}

async fn read_all(paths: &[PathBuf]) -> Result<Vec<FileUpload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        uploads.push(FileUpload::read(path).await?);
    }
    Ok(uploads)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn first_non_empty<const N: usize>(candidates: [Option<&str>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())
        .unwrap_or_default()
        .to_string()
}
