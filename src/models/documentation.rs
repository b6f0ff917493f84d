//! Structured documentation records returned by the backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A documentation shape the pipeline can request, cache, and decode.
///
/// Each implementor describes what the backend should produce for one snippet
/// and gives a literal example of the expected JSON array.
pub trait DocumentationSchema:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Short name used in logs.
    const KIND: &'static str;

    /// Instructions placed before the snippets in a combined prompt.
    fn instructions() -> &'static str;

    /// Example of the JSON array the backend must answer with.
    fn response_example() -> &'static str;

    /// Whether the combined prompt lists snippets before the example.
    fn snippets_first() -> bool {
        true
    }

    /// Combined prompt for `snippets`, one record per snippet in order.
    fn batch_prompt(snippets: &[String]) -> String {
        crate::enhance::prompt::build_batch_prompt::<Self>(snippets)
    }
}

/// Documentation for a code snippet (function, method, class).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Documentation {
    /// Short functional summary.
    pub summary: String,
    /// Parameters and their types.
    pub parameters: Vec<Param>,
    /// Return value description.
    pub returns: String,
    /// Big-O time complexity.
    pub time_complexity: String,
    /// Big-O space complexity.
    pub space_complexity: String,
    /// One usage example.
    pub usage_example: String,
    /// Edge cases worth knowing about.
    pub edge_cases: Vec<String>,
}

/// A documented parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// What the parameter means.
    pub description: String,
}

impl Documentation {
    /// Returns true when the backend produced nothing useful.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.parameters.is_empty()
            && self.returns.is_empty()
            && self.usage_example.is_empty()
    }
}

impl DocumentationSchema for Documentation {
    const KIND: &'static str = "code";

    fn instructions() -> &'static str {
        "You are an **advanced code documentation assistant**. For each code snippet provided, generate:\n\n\
         - A concise functional summary (15-20 words)\n\
         - Key parameters/inputs with types\n\
         - Return value/output description\n\
         - Time complexity analysis (Big-O notation)\n\
         - Space complexity analysis\n\
         - One common usage example\n\
         - Potential edge cases to consider\n\n\
         **Return a JSON array** where each element is **an object containing these documentation aspects**, \
         in the same order as the snippets."
    }

    fn response_example() -> &'static str {
        r#"[
  {
    "summary": "Function that adds two integers",
    "parameters": [
      {"name": "a", "type": "int", "description": "First operand"},
      {"name": "b", "type": "int", "description": "Second operand"}
    ],
    "returns": "Sum of the two integers as int",
    "time_complexity": "O(1)",
    "space_complexity": "O(1)",
    "usage_example": "sum := add(3, 5) // returns 8",
    "edge_cases": [
      "Integer overflow with large numbers"
    ]
  }
]"#
    }
}

/// A documented configuration field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YamlField {
    /// Key name.
    pub name: String,
    /// One of `scalar`, `map`, `array`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Short description.
    pub description: String,
}

/// Documentation for a configuration (YAML) snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YamlDocumentation {
    /// Brief purpose.
    pub summary: String,
    /// Key fields.
    pub fields: Vec<YamlField>,
    /// Example values keyed by field name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, serde_json::Value>,
    /// Known defaults keyed by field name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, serde_json::Value>,
    /// Common usage scenario.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub usage: String,
    /// Warnings, constraints, best practices.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub best_practices: Vec<String>,
}

impl DocumentationSchema for YamlDocumentation {
    const KIND: &'static str = "yaml";

    fn instructions() -> &'static str {
        "You are an **advanced YAML configuration documentation assistant**.\n\n\
         For each YAML snippet, return a **JSON object** with the following fields:\n\
         - summary: brief purpose (max 20 words)\n\
         - fields: list of key fields with name, type (scalar, map, array), and short description\n\
         - examples: valid example values for key fields (if applicable)\n\
         - defaults: known default values\n\
         - usage: common usage scenario\n\
         - best_practices: warnings, constraints, or best practices\n\n\
         Return a **JSON array**, one object per snippet, in the same order as the snippets, like:"
    }

    fn response_example() -> &'static str {
        r#"[
  {
    "summary": "Describes access modes and storage class for a volume",
    "fields": [
      { "name": "accessModes", "type": "array", "description": "Mount options: ReadWriteOnce, etc." },
      { "name": "storageClassName", "type": "scalar", "description": "Storage class name" }
    ],
    "examples": { "accessModes": ["ReadWriteOnce"], "storageClassName": "standard" },
    "defaults": { "storageClassName": "default" },
    "usage": "Used in PersistentVolumeClaim for storage provisioning",
    "best_practices": ["Explicitly define accessModes"]
  }
]"#
    }

    fn snippets_first() -> bool {
        false
    }
}
