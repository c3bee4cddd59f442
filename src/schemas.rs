//! Response schemas declared to Gemini for each JSON-producing operation.
//!
//! Shapes mirror the records in `domain.rs`; `required` lists are what the
//! model is held to, the serde side stays a little more forgiving.

use serde_json::{json, Value};

fn string() -> Value {
  json!({ "type": "STRING" })
}

fn integer() -> Value {
  json!({ "type": "INTEGER" })
}

fn number() -> Value {
  json!({ "type": "NUMBER" })
}

fn string_array() -> Value {
  json!({ "type": "ARRAY", "items": string() })
}

fn array_of(items: Value) -> Value {
  json!({ "type": "ARRAY", "items": items })
}

fn multiple_choice_item() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "id": string(), "question": string(), "options": string_array(),
      "correctAnswer": integer(), "explanation": string()
    },
    "required": ["id", "question", "options", "correctAnswer", "explanation"]
  })
}

pub fn lesson_plan() -> Value {
  let vocabulary_item = json!({
    "type": "OBJECT",
    "properties": {
      "word": string(), "emoji": string(), "ipa": string(), "meaning": string(),
      "example": string(), "sentenceMeaning": string(), "type": string()
    },
    "required": ["word", "emoji", "ipa", "meaning", "example", "sentenceMeaning", "type"]
  });

  let scramble_item = json!({
    "type": "OBJECT",
    "properties": {
      "id": string(), "scrambled": string_array(), "correctSentence": string(), "translation": string()
    },
    "required": ["id", "scrambled", "correctSentence", "translation"]
  });

  let fill_blank_item = json!({
    "type": "OBJECT",
    "properties": {
      "id": string(), "question": string(), "correctAnswer": string(),
      "clueEmoji": string(), "explanation": string()
    },
    "required": ["id", "question", "correctAnswer", "clueEmoji", "explanation"]
  });

  let error_id_item = json!({
    "type": "OBJECT",
    "properties": {
      "id": string(), "sentence": string(), "options": string_array(),
      "correctOptionIndex": integer(), "explanation": string()
    },
    "required": ["id", "sentence", "options", "correctOptionIndex", "explanation"]
  });

  let listening_item = json!({
    "type": "OBJECT",
    "properties": {
      "id": string(), "question": string(), "audioText": string(), "options": string_array(),
      "correctAnswer": integer(), "explanation": string()
    },
    "required": ["id", "question", "audioText", "options", "correctAnswer", "explanation"]
  });

  let matching_item = json!({
    "type": "OBJECT",
    "properties": { "id": string(), "left": string(), "right": string() },
    "required": ["id", "left", "right"]
  });

  json!({
    "type": "OBJECT",
    "properties": {
      "topic": string(),
      "vocabulary": array_of(vocabulary_item),
      "grammar": {
        "type": "OBJECT",
        "properties": { "topic": string(), "explanation": string(), "examples": string_array() },
        "required": ["topic", "explanation", "examples"]
      },
      "reading": {
        "type": "OBJECT",
        "properties": {
          "title": string(), "passage": string(), "translation": string(),
          "comprehension": array_of(multiple_choice_item())
        },
        "required": ["title", "passage", "translation", "comprehension"]
      },
      "practice": {
        "type": "OBJECT",
        "properties": {
          "megaTest": {
            "type": "OBJECT",
            "properties": {
              "multipleChoice": array_of(multiple_choice_item()),
              "scramble": array_of(scramble_item),
              "fillBlank": array_of(fill_blank_item),
              "errorId": array_of(error_id_item),
              "listening": array_of(listening_item),
              "matching": array_of(matching_item)
            },
            "required": ["multipleChoice", "scramble", "fillBlank", "errorId", "listening", "matching"]
          }
        },
        "required": ["megaTest"]
      },
      "teacherTips": string()
    },
    "required": ["topic", "vocabulary", "grammar", "reading", "practice", "teacherTips"]
  })
}

pub fn story_content() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "storyEnglish": string(),
      "translatedText": string(),
      "writingPromptEn": string(),
      "writingPromptVi": string(),
      "vocabulary": array_of(json!({
        "type": "OBJECT",
        "properties": { "word": string(), "meaning": string(), "emoji": string() }
      })),
      "imagePrompt": string(),
      "comprehensionQuestions": array_of(multiple_choice_item()),
      "speakingQuestions": array_of(json!({
        "type": "OBJECT",
        "properties": { "id": string(), "question": string(), "suggestedAnswer": string() },
        "required": ["id", "question", "suggestedAnswer"]
      }))
    },
    "required": [
      "storyEnglish", "translatedText", "writingPromptEn", "writingPromptVi",
      "vocabulary", "imagePrompt", "comprehensionQuestions", "speakingQuestions"
    ]
  })
}

pub fn mind_map() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "center": {
        "type": "OBJECT",
        "properties": { "title_en": string(), "title_vi": string(), "emoji": string() }
      },
      "nodes": array_of(json!({
        "type": "OBJECT",
        "properties": { "text_en": string(), "text_vi": string(), "emoji": string(), "color": string() }
      }))
    }
  })
}

pub fn writing_correction() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "score": number(),
      "feedback": string(),
      "fixedText": string(),
      "breakdown": {
        "type": "OBJECT",
        "properties": { "vocabulary": number(), "grammar": number() }
      },
      "errors": array_of(json!({
        "type": "OBJECT",
        "properties": { "original": string(), "fixed": string(), "reason": string() }
      })),
      "suggestions": string()
    }
  })
}

pub fn speech_evaluation() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "scores": { "type": "OBJECT", "properties": { "pronunciation": number() } },
      "overallScore": number(),
      "feedback": string()
    }
  })
}

pub fn presentation() -> Value {
  let bilingual = json!({
    "type": "OBJECT",
    "properties": { "english": string(), "vietnamese": string() }
  });
  json!({
    "type": "OBJECT",
    "properties": {
      "introduction": bilingual.clone(),
      "body": array_of(json!({
        "type": "OBJECT",
        "properties": { "keyword": string(), "script": string() }
      })),
      "conclusion": bilingual
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lesson_schema_requires_all_five_graded_sets() {
    let s = lesson_plan();
    let req = &s["properties"]["practice"]["properties"]["megaTest"]["required"];
    for key in ["multipleChoice", "scramble", "fillBlank", "errorId", "listening"] {
      assert!(req.as_array().unwrap().iter().any(|v| v == key), "{key} not required");
    }
  }

  #[test]
  fn story_schema_lists_every_content_field() {
    let s = story_content();
    assert_eq!(s["required"].as_array().unwrap().len(), 8);
    assert_eq!(s["properties"]["vocabulary"]["type"], "ARRAY");
    let item = &s["properties"]["comprehensionQuestions"]["items"];
    assert_eq!(item["required"].as_array().unwrap().len(), 5);
  }
}
