//! Output file naming
//!
//! A [`FilenamePattern`] is a template such as `scan_%Y-%m-%d_{no}`:
//! `{no}` is replaced by the scan number and the remaining text is passed
//! through chrono's strftime formatting with the scan timestamp.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt;

/// Placeholder replaced by the scan number
pub const NUMBER_TOKEN: &str = "{no}";

/// Extension used for page images
pub const PAGE_EXTENSION: &str = "jpg";

/// Extension used for merged documents
pub const DOCUMENT_EXTENSION: &str = "pdf";

const PAGE_MARKER: &str = "_page";

/// Validated file name template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenamePattern {
    prefix: String,
    suffix: String,
}

impl FilenamePattern {
    /// Parse and validate a template
    pub fn new(template: &str) -> Result<Self, String> {
        if template.matches(NUMBER_TOKEN).count() != 1 {
            return Err(format!(
                "pattern '{}' must contain {} exactly once",
                template, NUMBER_TOKEN
            ));
        }
        if template.contains('/') || template.contains('\\') {
            return Err(format!("pattern '{}' must not contain path separators", template));
        }

        let (prefix, suffix) = template
            .split_once(NUMBER_TOKEN)
            .ok_or_else(|| format!("pattern '{}' has no {}", template, NUMBER_TOKEN))?;

        for part in [prefix, suffix] {
            if StrftimeItems::new(part).any(|item| matches!(item, Item::Error)) {
                return Err(format!("pattern '{}' has an invalid date field", template));
            }
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    fn render(part: &str, at: &DateTime<Local>) -> String {
        at.format_with_items(StrftimeItems::new(part)).to_string()
    }

    /// Base file name (no extension) for a scan number
    pub fn base_name(&self, number: u64, at: &DateTime<Local>) -> String {
        format!(
            "{}{}{}",
            Self::render(&self.prefix, at),
            number,
            Self::render(&self.suffix, at)
        )
    }

    /// Recover the scan number from an existing file name
    ///
    /// Extensions and `_page<k>` suffixes are ignored. Returns `None` for
    /// names rendered from a different pattern or a different date.
    pub fn parse_number(&self, file_name: &str, at: &DateTime<Local>) -> Option<u64> {
        let stem = strip_page_suffix(file_stem(file_name));
        let prefix = Self::render(&self.prefix, at);
        let suffix = Self::render(&self.suffix, at);

        let rest = stem.strip_prefix(prefix.as_str())?;
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 || &rest[digits_len..] != suffix {
            return None;
        }

        rest[..digits_len].parse().ok()
    }
}

impl fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, NUMBER_TOKEN, self.suffix)
    }
}

/// File name for one page of a scan
///
/// Single-page scans get no page suffix.
pub fn page_file_name(base: &str, page: usize, total_pages: usize) -> String {
    if total_pages <= 1 {
        format!("{}.{}", base, PAGE_EXTENSION)
    } else {
        format!("{}{}{}.{}", base, PAGE_MARKER, page, PAGE_EXTENSION)
    }
}

/// File name for a merged document
pub fn document_file_name(base: &str) -> String {
    format!("{}.{}", base, DOCUMENT_EXTENSION)
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

fn strip_page_suffix(stem: &str) -> &str {
    if let Some(pos) = stem.rfind(PAGE_MARKER) {
        let tail = &stem[pos + PAGE_MARKER.len()..];
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            return &stem[..pos];
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_plain_pattern() {
        let pattern = FilenamePattern::new("scan{no}").unwrap();
        assert_eq!(pattern.base_name(7, &at()), "scan7");
        assert_eq!(pattern.to_string(), "scan{no}");
    }

    #[test]
    fn test_date_pattern() {
        let pattern = FilenamePattern::new("%Y-%m-%d_scan{no}").unwrap();
        assert_eq!(pattern.base_name(12, &at()), "2024-03-09_scan12");
    }

    #[test]
    fn test_pattern_validation() {
        assert!(FilenamePattern::new("scan").is_err());
        assert!(FilenamePattern::new("scan{no}_{no}").is_err());
        assert!(FilenamePattern::new("out/scan{no}").is_err());
        assert!(FilenamePattern::new("scan%Q{no}").is_err());
    }

    #[test]
    fn test_parse_number() {
        let pattern = FilenamePattern::new("scan{no}").unwrap();
        let now = at();

        assert_eq!(pattern.parse_number("scan3.jpg", &now), Some(3));
        assert_eq!(pattern.parse_number("scan41.pdf", &now), Some(41));
        assert_eq!(pattern.parse_number("scan5_page2.jpg", &now), Some(5));
        assert_eq!(pattern.parse_number("scan007.jpg", &now), Some(7));
        assert_eq!(pattern.parse_number("scan.jpg", &now), None);
        assert_eq!(pattern.parse_number("other3.jpg", &now), None);
        assert_eq!(pattern.parse_number("scan3x.jpg", &now), None);
    }

    #[test]
    fn test_parse_number_respects_date() {
        let pattern = FilenamePattern::new("%Y%m%d-{no}").unwrap();
        let now = at();

        assert_eq!(pattern.parse_number("20240309-4.pdf", &now), Some(4));
        assert_eq!(pattern.parse_number("20240308-9.pdf", &now), None);
    }

    #[test]
    fn test_page_file_names() {
        assert_eq!(page_file_name("scan1", 1, 1), "scan1.jpg");
        assert_eq!(page_file_name("scan1", 2, 3), "scan1_page2.jpg");
        assert_eq!(document_file_name("scan1"), "scan1.pdf");
    }
}
