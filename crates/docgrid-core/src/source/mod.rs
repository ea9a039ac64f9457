//! Where document bytes come from: local files, S3 objects and HTTP(S) URLs.

pub mod s3;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DocgridError;
use crate::normalize::text::slugify;

/// Timeout for a single HTTP or S3 download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    S3 { bucket: String, key: String },
    Url(String),
}

impl Source {
    /// Parse `s3://bucket/key`.
    pub fn parse_s3_uri(uri: &str) -> Result<Source, DocgridError> {
        let malformed = |reason: &str| DocgridError::SourceUnavailable {
            source_id: uri.to_string(),
            reason: reason.to_string(),
        };
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| malformed("S3 URI must start with s3://"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| malformed("S3 URI has no object key"))?;
        if bucket.is_empty() {
            return Err(malformed("S3 URI has no bucket"));
        }
        if key.is_empty() {
            return Err(malformed("S3 URI has no object key"));
        }
        Ok(Source::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// File name or URI reported for this source.
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    /// Slug of the source's file stem, used as `document_id`.
    pub fn document_id(&self) -> String {
        let name = match self {
            Source::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Source::S3 { key, .. } => last_segment(key).to_string(),
            Source::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or_default();
                last_segment(path).to_string()
            }
        };
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name);
        let slug = slugify(&stem);
        if slug.is_empty() {
            "document".to_string()
        } else {
            slug
        }
    }
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Source::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Every `*.pdf` directly inside `dir`, sorted by path.
pub fn expand_input_dir(dir: &Path) -> Result<Vec<Source>, DocgridError> {
    if !dir.is_dir() {
        return Err(DocgridError::SourceUnavailable {
            source_id: dir.display().to_string(),
            reason: "not a directory".into(),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DocgridError::SourceUnavailable {
            source_id: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let is_pdf = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "input directory expanded");
    Ok(paths.into_iter().map(Source::Local).collect())
}

/// Raw bytes of one fetched document.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub identifier: String,
    pub document_id: String,
    pub bytes: Vec<u8>,
}

/// Downloads sources; one attempt each, no retries.
pub struct Fetcher {
    client: Option<reqwest::blocking::Client>,
    s3: Option<s3::S3Settings>,
}

impl Fetcher {
    /// A fetcher for local files only.
    pub fn local() -> Self {
        Fetcher {
            client: None,
            s3: None,
        }
    }

    /// A fetcher that can also reach HTTP(S) URLs and S3 (credentials from the environment).
    pub fn from_env() -> Result<Self, DocgridError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| DocgridError::SourceUnavailable {
                source_id: "http client".into(),
                reason: e.to_string(),
            })?;
        Ok(Fetcher {
            client: Some(client),
            s3: s3::S3Settings::from_env().ok(),
        })
    }

    pub fn fetch(&self, source: &Source) -> Result<FetchedSource, DocgridError> {
        let identifier = source.identifier();
        let unavailable = |reason: String| DocgridError::SourceUnavailable {
            source_id: identifier.clone(),
            reason,
        };

        let bytes = match source {
            Source::Local(path) => std::fs::read(path).map_err(|e| unavailable(e.to_string()))?,
            Source::Url(url) => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| unavailable("HTTP fetching is not enabled".into()))?;
                let resp = client
                    .get(url)
                    .send()
                    .map_err(|e| unavailable(e.to_string()))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(unavailable(format!("HTTP {}", status)));
                }
                resp.bytes()
                    .map_err(|e| unavailable(e.to_string()))?
                    .to_vec()
            }
            Source::S3 { bucket, key } => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| unavailable("S3 fetching is not enabled".into()))?;
                let settings = match self.s3 {
                    Some(ref s) => s.clone(),
                    None => s3::S3Settings::from_env().map_err(unavailable)?,
                };
                s3::get_object(client, &settings, bucket, key)?
            }
        };

        info!(source = %identifier, bytes = bytes.len(), "document fetched");
        Ok(FetchedSource {
            identifier,
            document_id: source.document_id(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri() {
        assert_eq!(
            Source::parse_s3_uri("s3://docs/2024/inv 1.pdf").unwrap(),
            Source::S3 {
                bucket: "docs".into(),
                key: "2024/inv 1.pdf".into()
            }
        );
        for bad in ["s3://docs", "s3://docs/", "s3:///key.pdf", "https://docs/key.pdf"] {
            assert!(
                matches!(
                    Source::parse_s3_uri(bad),
                    Err(DocgridError::SourceUnavailable { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_document_id_from_stem() {
        assert_eq!(
            Source::Local("/data/Jordan 2019 Specs.pdf".into()).document_id(),
            "jordan_2019_specs"
        );
        assert_eq!(
            Source::parse_s3_uri("s3://b/inv/INV-0042.PDF").unwrap().document_id(),
            "inv_0042"
        );
        assert_eq!(
            Source::Url("https://example.com/files/quote.pdf?sig=abc".into()).document_id(),
            "quote"
        );
        assert_eq!(Source::Local("/tmp/---.pdf".into()).document_id(), "document");
    }

    #[test]
    fn test_identifier() {
        let s = Source::parse_s3_uri("s3://b/k.pdf").unwrap();
        assert_eq!(s.identifier(), "s3://b/k.pdf");
    }

    #[test]
    fn test_expand_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.pdf"), b"%PDF-1.4").unwrap();

        let sources = expand_input_dir(dir.path()).unwrap();
        let names: Vec<String> = sources.iter().map(|s| s.document_id()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_local_file_is_unavailable() {
        let err = Fetcher::local()
            .fetch(&Source::Local("/nonexistent/file.pdf".into()))
            .unwrap_err();
        match err {
            DocgridError::SourceUnavailable { source_id, .. } => {
                assert_eq!(source_id, "/nonexistent/file.pdf")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_url_requires_http_client() {
        let err = Fetcher::local()
            .fetch(&Source::Url("https://example.com/a.pdf".into()))
            .unwrap_err();
        assert!(matches!(err, DocgridError::SourceUnavailable { .. }));
    }
}
