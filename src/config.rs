//! Loading agent configuration (prompts + scoring policy) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `ScoringConfig` for the expected schema.
//! Every section is optional; missing keys fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub scoring: ScoringConfig,
}

/// How the Mega Challenge total is turned into a score out of 10.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  /// Items each graded set is expected to hold.
  pub expected_set_size: usize,
  /// Divide by the questions actually generated instead of 5 × `expected_set_size`.
  pub normalize_by_actual_count: bool,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self { expected_set_size: 10, normalize_by_actual_count: false }
  }
}

/// System instructions and user templates for every Gemini call.
/// Placeholders use `{name}` and are filled by `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Lesson plan ({level})
  pub lesson_system: String,
  pub lesson_text_template: String,
  pub lesson_topic_template: String,
  // Story from images
  pub story_system: String,
  pub story_user_template: String,
  // Mind map + presentation
  pub mind_map_system: String,
  pub mind_map_user_template: String,
  pub mind_map_image_prompt_template: String,
  pub presentation_system: String,
  pub presentation_user_template: String,
  // Evaluation
  pub writing_system: String,
  pub writing_user_template: String,
  pub speech_system: String,
  pub speech_user: String,
  // Illustration
  pub image_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_system: LESSON_SYSTEM.trim().into(),
      lesson_text_template: "INPUT TEXT:\n{text}".into(),
      lesson_topic_template: "INPUT TOPIC:\n{topic}".into(),
      story_system: "You are Mrs. Dung, a warm English teacher for Vietnamese children. Write a short magical story for kids based on the pictures. Reply with JSON only.".into(),
      story_user_template: "Narrator: {character} {character_emoji}. {character_context}\nStory mode: {mode}\nExtra wishes: {custom_prompt}\nTopic: {topic}\nText: {text}\nWrite the story now.".into(),
      mind_map_system: "Reply with JSON only.".into(),
      mind_map_user_template: "Build a bilingual (English/Vietnamese) mind map ({mode}) as JSON for: {content}".into(),
      mind_map_image_prompt_template: "Write one Midjourney prompt for a colourful kids' mind-map poster ({mode}) about: {content}".into(),
      presentation_system: "Reply with JSON only.".into(),
      presentation_user_template: "Write a short speaking script for a child presenting this mind map: {mind_map}".into(),
      writing_system: "Reply with JSON only. You grade short English writing by Vietnamese children on a 0-10 scale and explain mistakes kindly in Vietnamese.".into(),
      writing_user_template: "Writing task: {prompt}\nChild's text: \"{text}\"\nGrade it.".into(),
      speech_system: "Reply with JSON only. You grade a child's English pronunciation on a 0-10 scale and give one kind tip in Vietnamese.".into(),
      speech_user: "Grade the pronunciation in this recording.".into(),
      image_user_template: "{prompt}. Style: {style}".into(),
    }
  }
}

const LESSON_SYSTEM: &str = r#"
You are Mrs. Dung AI, an English examiner and textbook author for Vietnamese children.

Core tasks:
1. Scan ALL provided text and images. Extract the most important vocabulary, sentence patterns and grammar points.
2. Write a lesson plan at level {level} from what you extracted.
3. Produce EXACTLY 50 practice questions, 10 per section. None may be missing.

The 50 questions:
- 10 listening: very short audioText, question about what is heard.
- 10 error identification: one mistake in a sentence from the lesson; options are 4 phrases taken from that sentence.
- 10 fill blank: a key word removed from a sentence of the material, marked with ___.
- 10 multiple choice: overall comprehension.
- 10 scramble: words of a correct sentence from the lesson, shuffled.

Rules:
- Reply with a single JSON object.
- Warm, caring tone for children.
- Explain grammar briefly and clearly in Vietnamese.
"#;

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "mrsdung_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mrsdung_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mrsdung_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
      [prompts]
      speech_user = "Score this please."

      [scoring]
      normalize_by_actual_count = true
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.speech_user, "Score this please.");
    assert_eq!(cfg.prompts.image_user_template, "{prompt}. Style: {style}");
    assert!(cfg.scoring.normalize_by_actual_count);
    assert_eq!(cfg.scoring.expected_set_size, 10);
  }

  #[test]
  fn lesson_prompt_carries_level_placeholder() {
    assert!(Prompts::default().lesson_system.contains("{level}"));
  }
}
