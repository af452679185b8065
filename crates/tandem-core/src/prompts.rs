//! Prompt Library for the AI generator
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tandem/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt file carries YAML frontmatter followed by `# System` and
//! `# User` sections. Templates use `{{var}}` placeholders and
//! `{{#if var}}...{{/if}}` blocks that are dropped when `var` is empty.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const GENERATE_INSIGHTS: &str = include_str!("../../../prompts/generate_insights.md");
    pub const SUMMARIZE_DATASET: &str = include_str!("../../../prompts/summarize_dataset.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Structured JSON insight list
    GenerateInsights,
    /// Plain-text narrative comparison
    SummarizeDataset,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateInsights => "generate_insights",
            Self::SummarizeDataset => "summarize_dataset",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::GenerateInsights, Self::SummarizeDataset]
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::GenerateInsights => defaults::GENERATE_INSIGHTS,
            Self::SummarizeDataset => defaults::SUMMARIZE_DATASET,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Task type for model routing (insight_extraction, narrative)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        render_template(&self.content, vars)
    }

    /// Render just the system section, or nothing when the prompt has none
    pub fn render_system(&self, vars: &HashMap<&str, String>) -> Option<String> {
        self.system_section().map(|s| render_template(s, vars))
    }

    /// Render just the user section with variables
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        match self.user_section() {
            Some(user) => render_template(user, vars),
            None => self.render(vars),
        }
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    /// Cached parsed prompts
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        match self.cache.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let prompt = load(self.override_dir.as_ref(), id)?;
                Ok(entry.insert(prompt))
            }
        }
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_dir
            .as_ref()
            .is_some_and(|dir| dir.join(format!("{}.md", id.as_str())).exists())
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tandem").join("prompts").join("overrides"))
}

/// Load a prompt (checking override first, then default)
fn load(override_dir: Option<&PathBuf>, id: PromptId) -> Result<Prompt> {
    if let Some(dir) = override_dir {
        let override_path = dir.join(format!("{}.md", id.as_str()));
        if override_path.exists() {
            let content = fs::read_to_string(&override_path)
                .map_err(|e| Error::Config(format!("Failed to read prompt override: {}", e)))?;
            let (metadata, body) = parse_prompt(&content)?;
            tracing::debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(override_path),
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        is_override: false,
        override_path: None,
    })
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let Some(rest) = content.strip_prefix("---") else {
        return Err(Error::Config(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    };

    let end = rest.find("---").ok_or_else(|| {
        Error::Config("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Config(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Resolve conditionals, then substitute variables in a single pass
///
/// Substituted values are never rescanned, so a value containing `{{x}}`
/// comes through literally.
fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let resolved = resolve_conditionals(template, vars);
    let mut out = String::with_capacity(resolved.len());
    let mut rest = resolved.as_str();

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Keep or drop `{{#if var}}...{{/if}}` blocks depending on `var`
fn resolve_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].trim().to_string();
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let full_end = block_start + endif_pos + 7;

        let keep = vars
            .get(var_name.as_str())
            .is_some_and(|v| !v.trim().is_empty());
        let block = if keep {
            result[block_start..block_start + endif_pos].to_string()
        } else {
            String::new()
        };
        result = format!("{}{}{}", &result[..if_start], block, &result[full_end..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
task_type: insight_extraction
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.task_type, "insight_extraction");
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User\nhello").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = r#"# System
System content here.

# User
User content here."#;

        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(
            extract_section(content, "# User"),
            Some("User content here.")
        );
    }

    #[test]
    fn test_render_replaces_and_keeps_unknown() {
        let rendered = render_template(
            "Hello {{name}}, {{ value }} and {{unknown}}",
            &vars(&[("name", "World"), ("value", "42")]),
        );
        assert_eq!(rendered, "Hello World, 42 and {{unknown}}");
    }

    #[test]
    fn test_render_is_single_pass() {
        let rendered = render_template(
            "A={{a}} B={{b}}",
            &vars(&[("a", "{{b}}"), ("b", "secret")]),
        );
        assert_eq!(rendered, "A={{b}} B=secret");
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "Start{{#if filters}}\nFilters: {{filters}}{{/if}}\nEnd";

        let rendered = render_template(template, &vars(&[("filters", "region=North")]));
        assert!(rendered.contains("Filters: region=North"));

        let rendered = render_template(template, &vars(&[("filters", "  ")]));
        assert!(!rendered.contains("Filters:"));
        assert!(rendered.contains("Start"));
        assert!(rendered.contains("End"));
    }

    #[test]
    fn test_prompt_library_embedded() {
        let mut lib = PromptLibrary::embedded_only();

        for id in PromptId::all() {
            let prompt = lib.get(*id).unwrap();
            assert!(!prompt.is_override);
            assert_eq!(prompt.metadata.id, id.as_str());
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().is_some());
        }
    }

    #[test]
    fn test_generate_insights_requests_json() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::GenerateInsights).unwrap();
        assert_eq!(prompt.metadata.task_type, "insight_extraction");
        let system = prompt.render_system(&HashMap::new()).unwrap();
        assert!(system.contains("\"insights\""));
    }

    #[test]
    fn test_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("summarize_dataset.md"),
            "---\nid: summarize_dataset\nversion: 9\ntask_type: narrative\n---\n# System\nS\n# User\nCustom {{dataset_name}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.has_override(PromptId::SummarizeDataset));
        assert!(!lib.has_override(PromptId::GenerateInsights));

        let prompt = lib.get(PromptId::SummarizeDataset).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);
        assert_eq!(
            prompt.render_user(&vars(&[("dataset_name", "Q1")])),
            "Custom Q1"
        );
    }
}
