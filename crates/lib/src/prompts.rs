//! # Extraction Prompts

/// System prompt for turning one article into structured project ideas.
pub const IDEA_EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an analyst who reads technology news and proposes concrete project ideas inspired by it.

Read the article in the user message and propose between zero and three ideas that a small team could build. Skip the article entirely if it contains nothing actionable.

Respond with a single JSON object and nothing else:
{
  "output": [
    {
      "title": "A short, specific, descriptive title",
      "type": "SaaS | Startup | Open-Source | General-Project",
      "problemStatement": "The issue or opportunity, in one or two sentences",
      "solution": "The proposed solution, at most 100 words",
      "targetAudience": "Who benefits",
      "innovationScore": 0.0,
      "potentialApplications": "Where it could be used",
      "prerequisites": "Technologies, datasets or skills needed",
      "additionalNotes": "Relevant trends or context"
    }
  ]
}

`innovationScore` is a number from 0 to 10. If there are no ideas, return {"output": [], "endReason": "<why>"}."#;

/// User message wrapping the article text.
pub fn extraction_user_prompt(content: &str) -> String {
    format!("Input: {content}\nResponse (JSON):")
}
