use anyhow::{Context, Result};
use regex::Regex;

use crate::finders::engine::{self, LinkPolicy, RefMatch};
use crate::finders::{Locale, RefsFinder};
use crate::model::Document;
use crate::xml;

/// Finds references to other Acts in English documents, of the form:
///
///     Act 52 of 2001
///     Act no. 52 of 1998
///     Income Tax Act, 1962 (No 58 of 1962)
///
/// Only the `No 52 of 2001` part is wrapped in a ref; the word "Act" stays
/// outside it. The href is built from the document's country without
/// checking that the target work exists (links may dangle by design).
pub struct ActRefsFinderEng {
    locale: Locale,
}

impl ActRefsFinderEng {
    pub fn new() -> Self {
        ActRefsFinderEng {
            locale: Locale::language("eng"),
        }
    }
}

impl RefsFinder for ActRefsFinderEng {
    fn locale(&self) -> &Locale {
        &self.locale
    }

    fn find_references(&self, document: &mut Document) -> Result<()> {
        let mut root = xml::parse(&document.content).context("failed to parse document content")?;
        let policy = ActLinkPolicy::new(&document.frbr_uri.country)?;
        engine::rewrite(&mut root, &policy)?;
        document.content = xml::serialize(&root)?;
        Ok(())
    }
}

struct ActLinkPolicy {
    pattern: Regex,
    country: String,
}

impl ActLinkPolicy {
    fn new(country: &str) -> Result<Self> {
        let pattern = Regex::new(
            r"(?x)
            \bAct,?\s+
            (\d{4}\s+)?
            \(?
            (?P<ref>
             ([nN]o\.?\s*)?
             (?P<num>\d+)\s+
             of\s+
             (?P<year>\d{4})
            )
            ",
        )
        .context("failed to compile act reference pattern")?;

        Ok(ActLinkPolicy {
            pattern,
            country: country.to_string(),
        })
    }
}

impl LinkPolicy for ActLinkPolicy {
    fn ancestors(&self) -> &[&str] {
        &[
            "coverpage",
            "preface",
            "preamble",
            "body",
            "mainBody",
            "conclusions",
        ]
    }

    fn trigger(&self, slot: &str) -> bool {
        slot.contains("Act")
    }

    fn matches(&self, slot: &str) -> Result<Vec<RefMatch>> {
        let Some(captures) = self.pattern.captures(slot) else {
            return Ok(Vec::new());
        };

        let whole = captures.get(0).context("match has no overall span")?;
        let reference = captures
            .name("ref")
            .context("act pattern is missing the ref capture")?;
        let num = captures
            .name("num")
            .context("act pattern is missing the num capture")?;
        let year = captures
            .name("year")
            .context("act pattern is missing the year capture")?;

        Ok(vec![RefMatch {
            start: reference.start(),
            end: reference.end(),
            ref_text: reference.as_str().to_string(),
            matched_text: whole.as_str().to_string(),
            num: num.as_str().to_string(),
            year: Some(year.as_str().to_string()),
        }])
    }

    fn is_valid(&self, _candidate: &RefMatch) -> bool {
        true
    }

    fn make_href(&self, candidate: &RefMatch) -> Result<String> {
        let year = candidate
            .year
            .as_deref()
            .context("act reference has no year capture")?;
        Ok(format!("/{}/act/{}/{}", self.country, year, candidate.num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrbrUri;

    const NS: &str = "http://www.akomantoso.org/2.0";

    fn document(body: &str) -> Document {
        Document {
            frbr_uri: FrbrUri::parse("/za/act/2014/22").unwrap(),
            language: "eng".to_string(),
            content: format!(
                r#"<akomaNtoso xmlns="{NS}"><act><body>{body}</body></act></akomaNtoso>"#
            ),
        }
    }

    fn link(body: &str) -> String {
        let mut doc = document(body);
        ActRefsFinderEng::new().find_references(&mut doc).unwrap();
        doc.content
    }

    #[test]
    fn text_without_act_mentions_is_unchanged() {
        let body = "<p>nothing to see here, not even a statute of 1998</p>";
        assert_eq!(link(body), document(body).content);
    }

    #[test]
    fn links_bare_act_number_form() {
        let output = link("<p>as given in Act 52 of 2001 and nowhere else</p>");
        assert!(output.contains(
            r#"<p>as given in Act <ref href="/za/act/2001/52">52 of 2001</ref> and nowhere else</p>"#
        ));
    }

    #[test]
    fn links_parenthesized_title_form() {
        let output = link("<p>See the Income Tax Act, 1962 (No 58 of 1962) for details.</p>");
        assert!(output.contains(concat!(
            r#"<p>See the Income Tax Act, 1962 ("#,
            r#"<ref href="/za/act/1962/58">No 58 of 1962</ref>) for details.</p>"#
        )));
    }

    #[test]
    fn links_no_dot_form() {
        let output = link("<p>under Act no. 14 of 1998 as amended</p>");
        assert!(output.contains(r#"<ref href="/za/act/1998/14">no. 14 of 1998</ref>"#));
    }

    #[test]
    fn links_sequential_mentions_left_to_right() {
        let output = link("<p>Act 1 of 2000 and Act 2 of 2001</p>");
        assert!(output.contains(concat!(
            r#"<p>Act <ref href="/za/act/2000/1">1 of 2000</ref>"#,
            r#" and Act <ref href="/za/act/2001/2">2 of 2001</ref></p>"#
        )));
    }

    #[test]
    fn links_mention_in_a_tail() {
        let output = link("<p><b>bold</b> then Act 7 of 1999.</p>");
        assert!(output.contains(
            r#"<b>bold</b> then Act <ref href="/za/act/1999/7">7 of 1999</ref>.</p>"#
        ));
    }

    #[test]
    fn ignores_mentions_outside_content_ancestors() {
        let mut doc = Document {
            frbr_uri: FrbrUri::parse("/za/act/2014/22").unwrap(),
            language: "eng".to_string(),
            content: format!(
                r#"<akomaNtoso xmlns="{NS}"><act><meta>Act 5 of 2000</meta></act></akomaNtoso>"#
            ),
        };
        let before = doc.content.clone();
        ActRefsFinderEng::new().find_references(&mut doc).unwrap();
        assert_eq!(doc.content, before);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let body = "<p>Act 1 of 2000 and Act 2 of 2001, see Act 3 of 2002</p>";
        let once = link(body);

        let mut doc = Document {
            frbr_uri: FrbrUri::parse("/za/act/2014/22").unwrap(),
            language: "eng".to_string(),
            content: once.clone(),
        };
        ActRefsFinderEng::new().find_references(&mut doc).unwrap();
        assert_eq!(doc.content, once);
    }

    #[test]
    fn country_comes_from_the_document_uri() {
        let mut doc = Document {
            frbr_uri: FrbrUri::parse("/gb/act/1990/3").unwrap(),
            language: "eng".to_string(),
            content: format!(
                r#"<akomaNtoso xmlns="{NS}"><act><body><p>Act 9 of 1991</p></body></act></akomaNtoso>"#
            ),
        };
        ActRefsFinderEng::new().find_references(&mut doc).unwrap();
        assert!(doc.content.contains(r#"href="/gb/act/1991/9""#));
    }

    #[test]
    fn missing_namespace_is_fatal() {
        let mut doc = Document {
            frbr_uri: FrbrUri::parse("/za/act/2014/22").unwrap(),
            language: "eng".to_string(),
            content: "<akomaNtoso><act><body><p>Act 1 of 2000</p></body></act></akomaNtoso>"
                .to_string(),
        };
        assert!(ActRefsFinderEng::new().find_references(&mut doc).is_err());
    }

    #[test]
    fn malformed_content_is_fatal() {
        let mut doc = document("<p>Act 1 of 2000");
        doc.content = doc.content.replace("</body></act></akomaNtoso>", "");
        assert!(ActRefsFinderEng::new().find_references(&mut doc).is_err());
    }
}
