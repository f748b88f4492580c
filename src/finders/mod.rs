pub mod acts;
pub mod engine;
pub mod sections;

use anyhow::{Context, Result};

use crate::model::Document;

/// Locale key a finder is registered under. `None` fields are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub country: Option<String>,
    pub language: Option<String>,
    pub locality: Option<String>,
}

impl Locale {
    pub fn language(language: &str) -> Self {
        Locale {
            country: None,
            language: Some(language.to_string()),
            locality: None,
        }
    }

    /// How specifically this key matches the given document locale: each
    /// non-wildcard field must match exactly and raises the score; any
    /// mismatch disqualifies the key entirely.
    pub fn specificity(
        &self,
        country: &str,
        language: &str,
        locality: Option<&str>,
    ) -> Option<usize> {
        let mut score = 0;

        if let Some(value) = &self.country {
            if value != country {
                return None;
            }
            score += 1;
        }
        if let Some(value) = &self.language {
            if value != language {
                return None;
            }
            score += 1;
        }
        if let Some(value) = &self.locality {
            if locality != Some(value.as_str()) {
                return None;
            }
            score += 1;
        }

        Some(score)
    }
}

/// A reference finder: one operation, find and link references in a
/// document's content in place. Implementations are stateless across
/// documents; any per-pass cache lives and dies inside one call.
pub trait RefsFinder {
    fn locale(&self) -> &Locale;

    fn find_references(&self, document: &mut Document) -> Result<()>;
}

/// Finders for references to other works, by registration order.
pub fn act_finders() -> Vec<Box<dyn RefsFinder>> {
    vec![Box::new(acts::ActRefsFinderEng::new())]
}

/// Finders for internal section references, by registration order.
pub fn section_finders() -> Vec<Box<dyn RefsFinder>> {
    vec![Box::new(sections::SectionRefsFinderEng::new())]
}

/// Picks the most specific finder registered for the document locale.
/// An exact country+language+locality key beats a language-only key beats
/// a full wildcard; ties resolve to the first registered. No eligible
/// finder is a configuration error.
pub fn for_locale<'a>(
    finders: &'a [Box<dyn RefsFinder>],
    country: &str,
    language: &str,
    locality: Option<&str>,
) -> Result<&'a dyn RefsFinder> {
    let mut best: Option<(usize, &'a dyn RefsFinder)> = None;

    for finder in finders {
        let Some(score) = finder.locale().specificity(country, language, locality) else {
            continue;
        };
        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, finder.as_ref()));
        }
    }

    best.map(|(_, finder)| finder).with_context(|| {
        format!(
            "no reference finder registered for locale {}/{}/{}",
            country,
            language,
            locality.unwrap_or("-")
        )
    })
}
