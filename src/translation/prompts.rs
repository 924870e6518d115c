/*!
 * Prompt construction for batch translation.
 *
 * A batch is sent to the model as a system prompt describing the task and
 * the expected output shape, plus a user message carrying the source units
 * as a JSON array.
 */

use super::units::NumberedUnit;

/// System prompt template for page translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for translating numbered page fragments.
    pub const PAGE_TRANSLATOR: &'static str = r#"You are a professional translator. Translate the fragments of the document titled "{title}" into {target_language}.

## Input
- A JSON array of objects with a "number" and a "text" field
- Number 0 is the document title
- Fragments appear in document order; use neighbouring fragments as context

## Output Requirements
- Return ONLY a JSON array of objects with the same "number" and the translated "text"
- Translate every fragment exactly once and keep its number unchanged
- Preserve line breaks, inline punctuation and placeholders
- Do not include any text outside the JSON array"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default page translator template.
    pub fn page_translator() -> Self {
        Self::new(Self::PAGE_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, title: &str, target_language: &str) -> String {
        self.template
            .replace("{title}", title)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::page_translator()
    }
}

/// Serialize units as the JSON array handed to the model
pub fn units_to_source_json(units: &[NumberedUnit]) -> String {
    serde_json::to_string(units).unwrap_or_else(|_| "[]".to_string())
}

/// Builder for the system and user messages of one batch.
#[derive(Debug, Clone)]
pub struct BatchPromptBuilder {
    title: String,
    target_language: String,
    source_json: String,
    template: PromptTemplate,
}

impl BatchPromptBuilder {
    /// Create a builder for a batch already serialized as JSON
    pub fn new(title: &str, target_language: &str, source_json: &str) -> Self {
        Self {
            title: title.to_string(),
            target_language: target_language.to_string(),
            source_json: source_json.to_string(),
            template: PromptTemplate::default(),
        }
    }

    /// Use a custom system prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Build the system prompt.
    pub fn build_system_prompt(&self) -> String {
        self.template.render(&self.title, &self.target_language)
    }

    /// Build the user prompt.
    pub fn build_user_prompt(&self) -> String {
        self.source_json.clone()
    }

    /// Build both prompts concatenated, for providers with a single prompt field
    pub fn build_single_prompt(&self) -> String {
        format!("{}\n\n{}", self.build_system_prompt(), self.build_user_prompt())
    }

    /// Build both system and user prompts.
    pub fn build(&self) -> (String, String) {
        (self.build_system_prompt(), self.build_user_prompt())
    }
}
