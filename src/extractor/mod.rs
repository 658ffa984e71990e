#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::Result;

/// Metadata derived from a script file, before embedding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptMetadata {
    pub name: String,
    pub category: String,
    pub description: String,
    pub usage: String,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Seam for the metadata-extraction pass; the seeder composes this so it
/// can run against fakes in tests.
pub trait MetadataExtractor {
    fn extract(&self, path: &Path) -> Result<ScriptMetadata>;
}

/// Extracts metadata from a script's leading comment block.
///
/// The description is the first comment paragraph after the shebang, a
/// `Usage:` comment line becomes the usage string, the category comes from
/// the parent directory, and dependencies are commands from a known list
/// that the script body mentions.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderCommentExtractor;

/// Commands worth surfacing as dependencies for system-configuration
/// scripts. Anything else a script calls is noise for search purposes.
const KNOWN_COMMANDS: &[&str] = &[
    "apt",
    "apt-get",
    "dpkg",
    "ffmpeg",
    "fuser",
    "nvidia-smi",
    "obs",
    "pactl",
    "pw-cli",
    "pw-top",
    "snap",
    "systemctl",
    "timedatectl",
    "v4l2-ctl",
    "wpctl",
    "xrandr",
];

impl MetadataExtractor for HeaderCommentExtractor {
    #[inline]
    fn extract(&self, path: &Path) -> Result<ScriptMetadata> {
        debug!("Extracting metadata from {}", path.display());

        let content = fs::read_to_string(path)?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let category = path
            .parent()
            .and_then(Path::file_name)
            .map(|dir| dir.to_string_lossy().into_owned())
            .filter(|dir| !dir.is_empty() && dir != "." && dir != "/")
            .unwrap_or_else(|| "general".to_string());

        let (description, usage) = parse_header_comments(&content);
        let tags = derive_tags(&name, &category);
        let dependencies = scan_dependencies(&content);

        Ok(ScriptMetadata {
            name,
            category,
            description,
            usage,
            tags,
            dependencies,
        })
    }
}

/// Pull the description paragraph and the `Usage:` line out of the leading
/// comment block. Stops at the first non-comment, non-blank line.
fn parse_header_comments(content: &str) -> (String, String) {
    let mut description_lines = Vec::new();
    let mut usage = String::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("#!") {
            continue;
        }

        let comment = if let Some(rest) = trimmed.strip_prefix("//") {
            rest.trim()
        } else if let Some(rest) = trimmed.strip_prefix('#') {
            rest.trim()
        } else if trimmed.is_empty() && description_lines.is_empty() {
            continue;
        } else {
            break;
        };

        if let Some(rest) = comment.strip_prefix("Usage:") {
            usage = rest.trim().to_string();
        } else if comment.is_empty() {
            if !description_lines.is_empty() {
                // End of the first comment paragraph.
                break;
            }
        } else {
            description_lines.push(comment.to_string());
        }
    }

    (description_lines.join(" "), usage)
}

/// Tags are the category plus the words of the file name.
fn derive_tags(name: &str, category: &str) -> Vec<String> {
    let mut tags = vec![category.to_string()];
    for word in name.split(['_', '-', '.']) {
        let word = word.to_lowercase();
        if !word.is_empty() && !tags.contains(&word) {
            tags.push(word);
        }
    }
    tags
}

fn scan_dependencies(content: &str) -> Vec<String> {
    let tokens: std::collections::HashSet<&str> = content.split_whitespace().collect();
    KNOWN_COMMANDS
        .iter()
        .filter(|command| tokens.contains(**command))
        .map(|command| (*command).to_string())
        .collect()
}
