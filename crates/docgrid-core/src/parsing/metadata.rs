use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static EDITION_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:19|20)\d{2})\s+Edition\b").expect("valid edition regex")
});

static JURISDICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:City|County|Town|Village) of [A-Z][A-Za-z.'-]*(?: [A-Z][A-Za-z.'-]*)*(?:, [A-Z]{2}\b)?)")
        .expect("valid jurisdiction regex")
});

static STANDARD_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(EJCDC\s+C-\d{3}(?:\s*\(\d{4}\))?)").expect("valid standard base regex")
});

/// Document-level facts spotted while scanning a spec document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataHints {
    pub title: Option<String>,
    pub edition_year: Option<String>,
    pub jurisdiction: Option<String>,
    pub standard_base: Option<String>,
    /// First non-empty line, used when no title line is found.
    #[serde(skip)]
    pub first_line: Option<String>,
}

impl MetadataHints {
    /// Inspect one whitespace-normalized line. Earlier findings win.
    pub fn observe(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.first_line.is_none() {
            self.first_line = Some(line.to_string());
        }

        if self.title.is_none() && line.to_lowercase().contains("standard specifications") {
            self.title = Some(extract_title(line));
        }

        if self.edition_year.is_none() {
            if let Some(c) = EDITION_YEAR.captures(line) {
                self.edition_year = Some(c[1].to_string());
            }
        }

        if self.jurisdiction.is_none() {
            if let Some(c) = JURISDICTION.captures(line) {
                self.jurisdiction = Some(c[1].to_string());
            }
        }

        if self.standard_base.is_none() {
            if let Some(c) = STANDARD_BASE.captures(line) {
                self.standard_base = Some(c[1].split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
    }

    /// The detected title, falling back to the first line of the document.
    pub fn resolved_title(&self) -> Option<String> {
        self.title.clone().or_else(|| self.first_line.clone())
    }
}

/// Keep the title phrase, dropping trailing page furniture after a dot leader.
fn extract_title(line: &str) -> String {
    let cut = line.find("...").unwrap_or(line.len());
    line[..cut].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observe_all(lines: &[&str]) -> MetadataHints {
        let mut hints = MetadataHints::default();
        for l in lines {
            hints.observe(l);
        }
        hints
    }

    #[test]
    fn test_spec_cover_page() {
        let h = observe_all(&[
            "CITY OF JORDAN",
            "Standard Specifications for Construction of Public Infrastructure",
            "2019 Edition",
            "Prepared for the City of Jordan, MN",
            "General conditions based on EJCDC C-700 (2013)",
        ]);
        assert_eq!(
            h.title.as_deref(),
            Some("Standard Specifications for Construction of Public Infrastructure")
        );
        assert_eq!(h.edition_year.as_deref(), Some("2019"));
        assert_eq!(h.jurisdiction.as_deref(), Some("City of Jordan, MN"));
        assert_eq!(h.standard_base.as_deref(), Some("EJCDC C-700 (2013)"));
    }

    #[test]
    fn test_title_falls_back_to_first_line() {
        let h = observe_all(&["Sanitary Sewer Design Guide", "Page 1"]);
        assert!(h.title.is_none());
        assert_eq!(h.resolved_title().as_deref(), Some("Sanitary Sewer Design Guide"));
    }

    #[test]
    fn test_first_finding_wins() {
        let h = observe_all(&["2019 Edition", "replaces the 2012 Edition"]);
        assert_eq!(h.edition_year.as_deref(), Some("2019"));
    }

    #[test]
    fn test_title_dot_leader_trimmed() {
        let h = observe_all(&["Standard Specifications ........ 1"]);
        assert_eq!(h.title.as_deref(), Some("Standard Specifications"));
    }
}
