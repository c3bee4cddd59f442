//! Domain records produced by the model and echoed back to the front-end.
//!
//! Field names follow the JSON the model is asked to produce (camelCase for
//! lesson/story/writing records, snake_case for the mind map).

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Target proficiency tier passed to the lesson prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CefrLevel {
  #[default]
  #[serde(rename = "Starter (A1)", alias = "A1", alias = "starter")]
  Starter,
  #[serde(rename = "Elementary (A2)", alias = "A2", alias = "elementary")]
  Elementary,
  #[serde(rename = "Intermediate (B1)", alias = "B1", alias = "intermediate")]
  Intermediate,
}

impl CefrLevel {
  pub fn label(&self) -> &'static str {
    match self {
      CefrLevel::Starter => "Starter (A1)",
      CefrLevel::Elementary => "Elementary (A2)",
      CefrLevel::Intermediate => "Intermediate (B1)",
    }
  }
}

/// One base64 image as sent by the upload zone.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
  pub data: String,
  #[serde(default = "default_image_mime")]
  pub mime_type: String,
}

fn default_image_mime() -> String {
  "image/jpeg".into()
}

/// Lesson generation input, one variant per planner mode.
#[derive(Clone, Debug)]
pub enum LessonInput {
  Topic(String),
  Text(String),
  Images(Vec<InlineImage>),
}

impl LessonInput {
  pub fn mode(&self) -> &'static str {
    match self {
      LessonInput::Topic(_) => "topic",
      LessonInput::Text(_) => "text",
      LessonInput::Images(_) => "image",
    }
  }
}

// --- Lesson plan ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
  pub word: String,
  #[serde(default)]
  pub emoji: String,
  #[serde(default)]
  pub ipa: String,
  pub meaning: String,
  #[serde(default)]
  pub example: String,
  #[serde(default)]
  pub sentence_meaning: String,
  #[serde(default, rename = "type")]
  pub kind: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GrammarSection {
  pub topic: String,
  pub explanation: String,
  #[serde(default)]
  pub examples: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceQ {
  pub id: String,
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: usize,
  #[serde(default)]
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrambleQ {
  pub id: String,
  pub scrambled: Vec<String>,
  pub correct_sentence: String,
  #[serde(default)]
  pub translation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankQ {
  pub id: String,
  pub question: String,
  pub correct_answer: String,
  #[serde(default)]
  pub clue_emoji: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorIdQ {
  pub id: String,
  pub sentence: String,
  pub options: Vec<String>,
  pub correct_option_index: usize,
  #[serde(default)]
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListeningQ {
  pub id: String,
  pub question: String,
  pub audio_text: String,
  pub options: Vec<String>,
  pub correct_answer: usize,
  #[serde(default)]
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchingPair {
  pub id: String,
  pub left: String,
  pub right: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadingAdventure {
  pub title: String,
  pub passage: String,
  #[serde(default)]
  pub translation: String,
  #[serde(default)]
  pub comprehension: Vec<MultipleChoiceQ>,
}

/// The 50-question battery: five graded sets of ten plus matching pairs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MegaTest {
  #[serde(default)]
  pub multiple_choice: Vec<MultipleChoiceQ>,
  #[serde(default)]
  pub scramble: Vec<ScrambleQ>,
  #[serde(default)]
  pub fill_blank: Vec<FillBlankQ>,
  #[serde(default)]
  pub error_id: Vec<ErrorIdQ>,
  #[serde(default)]
  pub listening: Vec<ListeningQ>,
  #[serde(default)]
  pub matching: Vec<MatchingPair>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeContent {
  pub mega_test: MegaTest,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
  pub topic: String,
  pub vocabulary: Vec<VocabularyItem>,
  pub grammar: GrammarSection,
  pub reading: ReadingAdventure,
  pub practice: PracticeContent,
  #[serde(default)]
  pub teacher_tips: String,
}

// --- Story mode ---

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub emoji: String,
  #[serde(default)]
  pub prompt_context: String,
  #[serde(default)]
  pub style_prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoryVocabulary {
  #[serde(default)]
  pub word: String,
  #[serde(default)]
  pub meaning: String,
  #[serde(default)]
  pub emoji: String,
}

/// Comprehension question under a story. Only its text is needed to show it,
/// so every field tolerates being left out.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryQuestion {
  pub id: String,
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: usize,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingQ {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub suggested_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentResult {
  pub story_english: String,
  pub translated_text: String,
  pub writing_prompt_en: String,
  pub writing_prompt_vi: String,
  pub vocabulary: Vec<StoryVocabulary>,
  pub image_prompt: String,
  pub comprehension_questions: Vec<StoryQuestion>,
  pub speaking_questions: Vec<SpeakingQ>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageRatio {
  #[default]
  #[serde(rename = "1:1")]
  Square,
  #[serde(rename = "16:9")]
  Landscape,
  #[serde(rename = "9:16")]
  Portrait,
}

impl ImageRatio {
  pub fn as_str(&self) -> &'static str {
    match self {
      ImageRatio::Square => "1:1",
      ImageRatio::Landscape => "16:9",
      ImageRatio::Portrait => "9:16",
    }
  }
}

// --- Mind map / presentation ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MindMapMode {
  Topic,
  Text,
  Image,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MindMapCenter {
  #[serde(default)]
  pub title_en: String,
  #[serde(default)]
  pub title_vi: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub emoji: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MindMapNode {
  #[serde(default)]
  pub text_en: String,
  #[serde(default)]
  pub text_vi: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub emoji: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MindMapData {
  #[serde(default)]
  pub center: MindMapCenter,
  #[serde(default)]
  pub nodes: Vec<MindMapNode>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Bilingual {
  #[serde(default)]
  pub english: String,
  #[serde(default)]
  pub vietnamese: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScriptSection {
  #[serde(default)]
  pub keyword: String,
  #[serde(default)]
  pub script: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PresentationScript {
  #[serde(default)]
  pub introduction: Bilingual,
  #[serde(default)]
  pub body: Vec<ScriptSection>,
  #[serde(default)]
  pub conclusion: Bilingual,
}

impl PresentationScript {
  /// The whole English script read in one go: intro, body sections, conclusion.
  pub fn full_english(&self) -> String {
    std::iter::once(self.introduction.english.as_str())
      .chain(self.body.iter().map(|b| b.script.as_str()))
      .chain(std::iter::once(self.conclusion.english.as_str()))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

// --- Writing / speaking evaluation ---

/// Writing feedback arrives either as a sentence or as a record of sentences.
#[derive(Clone, Debug, PartialEq)]
pub enum Feedback {
  Text(String),
  /// Entries in the order the model produced them.
  Structured(Vec<(String, String)>),
}

pub const DEFAULT_FEEDBACK: &str = "Tuyệt vời!";

impl Feedback {
  /// Single display string: structured values joined by one space.
  pub fn flatten(&self) -> String {
    match self {
      Feedback::Text(s) => s.clone(),
      Feedback::Structured(entries) => entries
        .iter()
        .map(|(_, v)| v.as_str())
        .collect::<Vec<_>>()
        .join(" "),
    }
  }
}

impl Serialize for Feedback {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.flatten())
  }
}

impl<'de> Deserialize<'de> for Feedback {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct FeedbackVisitor;

    impl<'de> Visitor<'de> for FeedbackVisitor {
      type Value = Feedback;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a feedback string or an object of feedback strings")
      }

      fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Feedback, E> {
        Ok(Feedback::Text(v.to_string()))
      }

      fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Feedback, A::Error> {
        let mut entries = Vec::new();
        while let Some((k, v)) = map.next_entry::<String, serde_json::Value>()? {
          let text = match v {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
          };
          entries.push((k, text));
        }
        Ok(Feedback::Structured(entries))
      }
    }

    deserializer.deserialize_any(FeedbackVisitor)
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
  #[serde(default)]
  pub vocabulary: f64,
  #[serde(default)]
  pub grammar: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WritingError {
  #[serde(default)]
  pub original: String,
  #[serde(default)]
  pub fixed: String,
  #[serde(default)]
  pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WritingCorrection {
  /// Kept loose: models sometimes answer "8/10" instead of a number.
  #[serde(default)]
  pub score: Option<serde_json::Value>,
  #[serde(default)]
  pub feedback: Option<Feedback>,
  #[serde(default)]
  pub fixed_text: Option<String>,
  #[serde(default)]
  pub breakdown: Option<ScoreBreakdown>,
  #[serde(default)]
  pub errors: Vec<WritingError>,
  #[serde(default)]
  pub suggestions: Option<String>,
}

impl WritingCorrection {
  /// Numeric score, 0 when missing or not a number.
  pub fn score_value(&self) -> f64 {
    self.score.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0)
  }

  pub fn feedback_text(&self) -> String {
    self
      .feedback
      .as_ref()
      .map(Feedback::flatten)
      .unwrap_or_else(|| DEFAULT_FEEDBACK.to_string())
  }

  /// Corrected text, or the submitted text when the model gave none.
  pub fn fixed_text_or<'a>(&'a self, submitted: &'a str) -> &'a str {
    self.fixed_text.as_deref().unwrap_or(submitted)
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PronunciationScores {
  #[serde(default)]
  pub pronunciation: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvaluation {
  #[serde(default)]
  pub scores: PronunciationScores,
  #[serde(default)]
  pub overall_score: f64,
  #[serde(default)]
  pub feedback: String,
}
