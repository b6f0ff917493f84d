//! Prompt construction for single snippets and combined batches.

use crate::models::DocumentationSchema;
use std::fmt::Write;

/// Renders the per-snippet prompt from a template.
///
/// `{language}` and `{code}` are replaced; other text is kept verbatim.
#[must_use]
pub fn render_item_prompt(template: &str, input: &str, language: &str) -> String {
    template
        .replace("{language}", language)
        .replace("{code}", input)
}

/// Builds one combined prompt asking for a JSON array with one record per
/// snippet, in snippet order.
#[must_use]
pub fn build_batch_prompt<T: DocumentationSchema>(snippets: &[String]) -> String {
    let mut prompt = String::with_capacity(
        T::instructions().len()
            + T::response_example().len()
            + snippets.iter().map(String::len).sum::<usize>()
            + 64,
    );

    prompt.push_str(T::instructions());
    prompt.push_str("\n\n");

    if T::snippets_first() {
        write_snippets(&mut prompt, snippets);
        prompt.push_str("\n**Return format example**:\n");
        prompt.push_str(T::response_example());
    } else {
        prompt.push_str(T::response_example());
        prompt.push_str("\n\n");
        write_snippets(&mut prompt, snippets);
    }

    let _ = write!(
        prompt,
        "\n\nRespond with exactly {} objects in the array and nothing else.",
        snippets.len()
    );
    prompt
}

fn write_snippets(prompt: &mut String, snippets: &[String]) {
    prompt.push_str("Snippets:\n[\n");
    for (i, snippet) in snippets.iter().enumerate() {
        let escaped = snippet.trim().replace('"', "\\\"");
        let _ = write!(prompt, "  \"Snippet {}: {escaped}\"", i + 1);
        if i + 1 < snippets.len() {
            prompt.push_str(",\n");
        }
    }
    prompt.push_str("\n]\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;
    use crate::models::{Documentation, YamlDocumentation};

    #[test]
    fn test_render_default_template() {
        let prompt = render_item_prompt(DEFAULT_PROMPT_TEMPLATE, "x := 1", "go");
        assert!(prompt.starts_with("Generate a concise explanation (10-15 words) for this go code:"));
        assert!(prompt.contains("```go\nx := 1\n```"));
    }

    #[test]
    fn test_render_custom_template() {
        assert_eq!(render_item_prompt("[{language}] {code}", "a", "rust"), "[rust] a");
    }

    #[test]
    fn test_batch_prompt_tags_snippets_in_order() {
        let snippets = vec!["first".to_string(), "say \"hi\"".to_string()];
        let prompt = build_batch_prompt::<Documentation>(&snippets);

        let first = prompt.find("\"Snippet 1: first\"").unwrap();
        let second = prompt.find("\"Snippet 2: say \\\"hi\\\"\"").unwrap();
        assert!(first < second);
        assert!(prompt.contains("exactly 2 objects"));
        assert!(prompt.find("Snippets:").unwrap() < prompt.find("Return format example").unwrap());
    }

    #[test]
    fn test_yaml_prompt_places_example_first() {
        let prompt = build_batch_prompt::<YamlDocumentation>(&["replicas: 3".to_string()]);
        assert!(prompt.contains("YAML configuration documentation assistant"));
        assert!(prompt.find("best_practices\": [").unwrap() < prompt.find("Snippets:").unwrap());
    }
}
