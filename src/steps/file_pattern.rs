//! File-name matching for the directory iterator: presets, globs and regular expressions.

use regex::{Regex, RegexBuilder};

const IMAGE_EXTENSIONS: &[&str] = &[
  "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "avif",
];
const VIDEO_EXTENSIONS: &[&str] = &[
  "mkv", "mp4", "m4v", "avi", "mov", "wmv", "mpg", "mpeg", "ts", "webm", "flv",
];
const AUDIO_EXTENSIONS: &[&str] = &[
  "mp3", "flac", "aac", "m4a", "ogg", "opus", "wav", "wma", "alac",
];

/// A pattern that is neither a preset nor a valid glob/regular expression.
#[derive(Debug, thiserror::Error)]
#[error("invalid file pattern '{pattern}': {source}")]
pub struct InvalidPattern {
  pub pattern: String,
  #[source]
  pub source: regex::Error,
}

/// Compiled file-name matcher.
#[derive(Debug, Clone)]
pub enum FilePattern {
  /// Every file matches.
  Any,
  /// Case-insensitive match against the file name.
  Regex(Regex),
}

fn extension_regex(exts: &[&str]) -> String {
  format!(r"\.({})$", exts.join("|"))
}

/// Translates `*` and `?` wildcards into an anchored regular expression.
fn glob_to_regex(glob: &str) -> String {
  let mut out = String::from("^");
  for c in glob.chars() {
    match c {
      '*' => out.push_str(".*"),
      '?' => out.push('.'),
      c => out.push_str(&regex::escape(&c.to_string())),
    }
  }
  out.push('$');
  out
}

fn is_glob(pattern: &str) -> bool {
  const REGEX_META: &[char] = &['^', '$', '(', ')', '[', ']', '{', '}', '|', '+', '\\'];
  pattern.contains(['*', '?']) && !pattern.contains(REGEX_META) && !pattern.contains(".*")
}

impl FilePattern {
  /// Parses a preset name (`images`, `videos`, `audio`), a glob (`*.mkv`) or a regular expression.
  /// An empty pattern matches everything.
  pub fn parse(pattern: &str) -> Result<Self, InvalidPattern> {
    let trimmed = pattern.trim();
    let source = match trimmed.to_ascii_lowercase().as_str() {
      "" | "*" | "*.*" => return Ok(FilePattern::Any),
      "images" | "image" => extension_regex(IMAGE_EXTENSIONS),
      "videos" | "video" => extension_regex(VIDEO_EXTENSIONS),
      "audio" => extension_regex(AUDIO_EXTENSIONS),
      _ if is_glob(trimmed) => glob_to_regex(trimmed),
      _ => trimmed.to_string(),
    };
    RegexBuilder::new(&source)
      .case_insensitive(true)
      .build()
      .map(FilePattern::Regex)
      .map_err(|source| InvalidPattern {
        pattern: pattern.to_string(),
        source,
      })
  }

  pub fn matches(&self, file_name: &str) -> bool {
    match self {
      FilePattern::Any => true,
      FilePattern::Regex(r) => r.is_match(file_name),
    }
  }
}
