//! Instruction template for grounded answers.

use std::fmt;

/// Placeholder replaced with the retrieved context block.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder replaced with the user's question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Default instructions: answer strictly from the reference material.
pub const DEFAULT_TEMPLATE: &str = "You are a careful document assistant. \
Answer the question using only the reference material below.
Rules:
1. Base the answer entirely on the reference material.
2. If the material does not contain the answer, say that you don't know.

Reference material:
{context}

Question:
{question}";

/// A validated prompt template containing both placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Accept a custom template; both placeholders must appear.
    pub fn new(template: impl Into<String>) -> Result<Self, String> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(format!("prompt_template is missing {placeholder}"));
            }
        }
        Ok(Self { template })
    }

    /// Template from settings, falling back to the default.
    pub fn from_option(template: Option<&str>) -> Result<Self, String> {
        match template {
            Some(custom) => Self::new(custom),
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both placeholders in a single pass.
    ///
    /// Placeholder text inside the substituted values is left alone, so a
    /// document containing `{question}` cannot inject into the prompt.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        loop {
            let next = [
                (rest.find(CONTEXT_PLACEHOLDER), CONTEXT_PLACEHOLDER, context),
                (rest.find(QUESTION_PLACEHOLDER), QUESTION_PLACEHOLDER, question),
            ]
            .into_iter()
            .filter_map(|(pos, placeholder, value)| pos.map(|p| (p, placeholder, value)))
            .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, placeholder, value)) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(value);
                    rest = &rest[pos + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_renders_both_parts() {
        let prompt = PromptTemplate::default().render("Absences cost points.", "What if I miss class?");
        assert!(prompt.contains("Reference material:\nAbsences cost points."));
        assert!(prompt.contains("Question:\nWhat if I miss class?"));
        assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
        assert!(!prompt.contains(QUESTION_PLACEHOLDER));
    }

    #[test]
    fn test_custom_template_requires_placeholders() {
        assert!(PromptTemplate::new("Only {context}").is_err());
        assert!(PromptTemplate::new("Only {question}").is_err());
        assert!(PromptTemplate::new("{question} / {context}").is_ok());
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let template = PromptTemplate::new("C={context} Q={question}").unwrap();
        let prompt = template.render("see {question}", "about {context}?");
        assert_eq!(prompt, "C=see {question} Q=about {context}?");
    }

    #[test]
    fn test_repeated_placeholders() {
        let template = PromptTemplate::new("{question}|{context}|{question}").unwrap();
        assert_eq!(template.render("c", "q"), "q|c|q");
    }
}
