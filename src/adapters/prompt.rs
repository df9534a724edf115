//! Custom-prompt rendering
//!
//! Templates may reference `{{system_name}}`, `{{model_name}}` and
//! `{{original_system}}`. A template that references `{{original_system}}`
//! replaces the caller's system text; any other template is placed ahead of it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::PromptConfig;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(system_name|model_name|original_system)\s*\}\}")
        .expect("placeholder regex is valid")
});

/// System text to send upstream
///
/// Returns the caller's system text unchanged when the config has custom
/// prompts disabled or no template.
pub fn render_system_prompt(
    original_system: Option<&str>,
    config: &PromptConfig,
    model: &str,
) -> Option<String> {
    let template = match config.prompt_template.as_deref() {
        Some(t) if config.use_custom_prompt && !t.trim().is_empty() => t,
        _ => return original_system.map(str::to_string),
    };

    let original = original_system.unwrap_or("");
    let model_name = config.model_name_override.as_deref().unwrap_or(model);
    let mut replaces_original = false;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
        "system_name" => config.system_name.clone(),
        "model_name" => model_name.to_string(),
        _ => {
            replaces_original = true;
            original.to_string()
        }
    });
    let rendered = rendered.trim().to_string();

    if replaces_original || original.trim().is_empty() {
        Some(rendered)
    } else {
        Some(format!("{rendered}\n\n{original}"))
    }
}
