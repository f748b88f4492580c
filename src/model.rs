use anyhow::{Result, bail};
use serde::Serialize;

/// FRBR work identifier, e.g. `/za/act/1998/52`. Only the work-level
/// components are kept; expression and manifestation parts are out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrbrUri {
    pub country: String,
    pub doctype: String,
    pub year: String,
    pub number: String,
}

impl FrbrUri {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let Some(stripped) = trimmed.strip_prefix('/') else {
            bail!("FRBR work URI must start with '/': {value}");
        };

        let parts: Vec<&str> = stripped.split('/').collect();
        if parts.len() != 4 {
            bail!("FRBR work URI must be /country/doctype/year/number: {value}");
        }
        if parts.iter().any(|part| part.is_empty()) {
            bail!("FRBR work URI has an empty component: {value}");
        }

        Ok(FrbrUri {
            country: parts[0].to_string(),
            doctype: parts[1].to_string(),
            year: parts[2].to_string(),
            number: parts[3].to_string(),
        })
    }

    pub fn work_uri(&self) -> String {
        format!(
            "/{}/{}/{}/{}",
            self.country, self.doctype, self.year, self.number
        )
    }
}

/// One document as a finder sees it: serialized content plus the identifier
/// metadata needed to build hrefs. A pass replaces `content` in place.
#[derive(Debug, Clone)]
pub struct Document {
    pub frbr_uri: FrbrUri,
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoundReference {
    pub kind: String,
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub report_version: u32,
    pub generated_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub frbr_uri: String,
    pub language: String,
    pub reference_count: usize,
    pub references: Vec<FoundReference>,
}
