//! Export descriptors: download filenames and certificate payloads.
//!
//! The picture itself is rendered client-side; the backend decides what goes
//! on it and what the PNG is called.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::domain::SpeechEvaluation;
use crate::grading::Evaluation;
use crate::session::ScoreSummary;

const DEFAULT_NAME: &str = "Student";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportKind {
  Certificate {
    #[serde(default)]
    name: Option<String>,
  },
  Summary {
    topic: String,
    #[serde(default = "first_page")]
    page: u32,
  },
  SpeakingCertificate {
    #[serde(default)]
    name: Option<String>,
  },
}

fn first_page() -> u32 {
  1
}

/// Path separators would turn the download name into a path.
fn clean(part: &str) -> String {
  part.trim().replace(['/', '\\'], "-")
}

fn name_or_default(name: Option<&str>) -> String {
  match name.map(clean) {
    Some(n) if !n.is_empty() => n,
    _ => DEFAULT_NAME.to_string(),
  }
}

pub fn export_filename(kind: &ExportKind) -> String {
  match kind {
    ExportKind::Certificate { name } => format!("Certificate-MrsDung-{}.png", name_or_default(name.as_deref())),
    ExportKind::Summary { topic, page } => format!("Summary-MrsDung-{}-P{}.png", clean(topic), page),
    ExportKind::SpeakingCertificate { name } => {
      format!("Speaking-Cert-MrsDung-{}.png", name_or_default(name.as_deref()))
    }
  }
}

/// `Ngày DD tháng MM năm YYYY`
pub fn vietnamese_date(date: NaiveDate) -> String {
  format!("Ngày {:02} tháng {:02} năm {}", date.day(), date.month(), date.year())
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
  pub student_name: String,
  pub topic: String,
  pub score: f64,
  pub total_correct: usize,
  pub out_of: usize,
  pub evaluation: Evaluation,
  pub date_line: String,
  pub filename: String,
}

pub fn lesson_certificate(name: Option<&str>, topic: &str, summary: &ScoreSummary, today: NaiveDate) -> Certificate {
  let student_name = name_or_default(name);
  Certificate {
    filename: export_filename(&ExportKind::Certificate { name: Some(student_name.clone()) }),
    student_name,
    topic: topic.to_string(),
    score: summary.score,
    total_correct: summary.total_correct,
    out_of: summary.out_of,
    evaluation: summary.evaluation.clone(),
    date_line: vietnamese_date(today),
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingCertificate {
  pub student_name: String,
  pub pronunciation: f64,
  pub overall_score: f64,
  pub feedback: String,
  /// `DD/MM/YYYY HH:MM`
  pub practiced_at: String,
  pub filename: String,
}

pub fn speaking_certificate(name: Option<&str>, eval: &SpeechEvaluation, now: NaiveDateTime) -> SpeakingCertificate {
  let student_name = name_or_default(name);
  SpeakingCertificate {
    filename: export_filename(&ExportKind::SpeakingCertificate { name: Some(student_name.clone()) }),
    student_name,
    pronunciation: eval.scores.pronunciation,
    overall_score: eval.overall_score,
    feedback: eval.feedback.clone(),
    practiced_at: format!(
      "{:02}/{:02}/{} {:02}:{:02}",
      now.day(),
      now.month(),
      now.year(),
      now.hour(),
      now.minute()
    ),
  }
}
