/// Keeps the reply machine-readable; `parse_json_reply` still strips stray fences.
pub const ANALYSIS_SYSTEM: &str = "You review resumes for people moving from BPO work into tech. \
    Reply with a single JSON object and nothing else: no prose, no markdown fences.";

/// Tech-career compatibility prompt. `{resume_text}` is replaced with the focused resume text.
pub const RESUME_ANALYSIS_PROMPT: &str = r#"Analyze this resume for tech career compatibility. Return JSON only:
{
  "compatibility_score": number (0-100),
  "top_technical_skills_found": ["skill1", "skill2", "skill3"],
  "compatibility_explanation": "brief explanation",
  "suggested_keywords": ["keyword1", "keyword2"]
}

Resume: {resume_text}"#;

pub const ANALYSIS_MAX_TOKENS: u32 = 300;
pub const ANALYSIS_TEMPERATURE: f32 = 0.7;

pub fn build_analysis_prompt(resume_text: &str) -> String {
    RESUME_ANALYSIS_PROMPT.replace("{resume_text}", resume_text)
}
