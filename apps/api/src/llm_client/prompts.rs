// Prompt constants and prompt-building utilities for the CV endpoint.

/// Prompt for converting raw resume text into a structured markdown CV.
/// `{resume_text}` is replaced with the trimmed extracted PDF text.
pub const CV_FORMAT_PROMPT: &str = "\
You are a CV formatter assistant. Your task is to take the raw text of a resume below and convert it into a structured Markdown CV. Use sections like:

## Summary
## Experience
## Education
## Skills

Make sure the markdown is clean and easy to customize.

Resume text:

{resume_text}

Please return only the markdown content.";

/// Builds the CV-formatting prompt for the given extracted resume text.
pub fn cv_format_prompt(resume_text: &str) -> String {
    CV_FORMAT_PROMPT.replace("{resume_text}", resume_text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_trimmed_resume_text() {
        let prompt = cv_format_prompt("  Jane Doe\nRust Engineer  \n");
        assert!(prompt.contains("Jane Doe\nRust Engineer"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(prompt.contains("## Experience"));
    }
}
