use std::collections::HashMap;

use anyhow::{Context, Result};
use fancy_regex::Regex;

use crate::finders::engine::{self, LinkPolicy, RefMatch};
use crate::finders::{Locale, RefsFinder};
use crate::model::Document;
use crate::xml::{self, Element};

/// Finds internal references to sections of the same document, of the form:
///
///     section 26
///     section 26B
///     sections 26 and 31 (only the first mention is linked)
///
/// A mention is linked only when the document actually contains a section
/// with that number; anything else stays plain text. Mentions that read as
/// part of an external reference ("section 26 of the Criminal Procedure
/// Act") are rejected and left for the act finder.
pub struct SectionRefsFinderEng {
    locale: Locale,
}

impl SectionRefsFinderEng {
    pub fn new() -> Self {
        SectionRefsFinderEng {
            locale: Locale::language("eng"),
        }
    }
}

impl RefsFinder for SectionRefsFinderEng {
    fn locale(&self) -> &Locale {
        &self.locale
    }

    fn find_references(&self, document: &mut Document) -> Result<()> {
        let mut root = xml::parse(&document.content).context("failed to parse document content")?;

        // Targets are collected up front: the rewrite only ever touches
        // text slots, never section elements, so the map stays accurate
        // for the whole pass. It is dropped with the pass.
        let targets = collect_targets(&root);

        let policy = SectionLinkPolicy::new(targets)?;
        engine::rewrite(&mut root, &policy)?;
        document.content = xml::serialize(&root)?;
        Ok(())
    }
}

/// Maps a section number to the id of the first section element declaring
/// it, where "declaring" means a `num` child with text `"26."`. Keyed by
/// bare number, so duplicate section numbers in different scopes would
/// collide; the first one in document order wins.
fn collect_targets(root: &Element) -> HashMap<String, String> {
    let mut targets = HashMap::new();
    collect_into(root, &mut targets);
    targets
}

fn collect_into(element: &Element, targets: &mut HashMap<String, String>) {
    if element.tag == "section" {
        if let Some(id) = element.attr("id") {
            let declared = element
                .children
                .iter()
                .find(|child| child.tag == "num")
                .and_then(|num| num.text.strip_suffix('.'));
            if let Some(number) = declared {
                targets
                    .entry(number.to_string())
                    .or_insert_with(|| id.to_string());
            }
        }
    }

    for child in &element.children {
        collect_into(child, targets);
    }
}

struct SectionLinkPolicy {
    pattern: Regex,
    targets: HashMap<String, String>,
}

impl SectionLinkPolicy {
    fn new(targets: HashMap<String, String>) -> Result<Self> {
        // The negative lookahead stops a match that is followed by yet
        // another parenthesized unit, so a composite reference is not cut
        // off halfway. The trailing "of ..." is consumed so the validator
        // can see it, but stays outside the ref capture.
        let pattern = Regex::new(
            r"(?x)
            (?P<ref>
              \b[sS]ections?\s+
              (?P<num>\d+[A-Z]*)
            )
            (?P<subsection_ref>\s*\(\d+[A-Z]*\))?
            (?P<paragraph_ref>\s*\([a-z]+[A-Z]*\))?
            (?P<subparagraph_ref>\s*\([ivx]+[A-Z]*\))?
            (?P<item_ref>\s*\([a-z]{2,}[A-Z]*\))?
            (?!\s*\()
            (\s+of\s+(this\s+Act|the\s+|Act\s+)?)?
            ",
        )
        .context("failed to compile section reference pattern")?;

        Ok(SectionLinkPolicy { pattern, targets })
    }
}

impl LinkPolicy for SectionLinkPolicy {
    fn ancestors(&self) -> &[&str] {
        &["body", "mainBody", "conclusions"]
    }

    fn trigger(&self, slot: &str) -> bool {
        slot.contains("section")
    }

    fn matches(&self, slot: &str) -> Result<Vec<RefMatch>> {
        let mut found = Vec::new();

        for captures in self.pattern.captures_iter(slot) {
            let captures = captures.context("section pattern match failed")?;
            let whole = captures.get(0).context("match has no overall span")?;
            let reference = captures
                .name("ref")
                .context("section pattern is missing the ref capture")?;
            let num = captures
                .name("num")
                .context("section pattern is missing the num capture")?;

            found.push(RefMatch {
                start: reference.start(),
                end: reference.end(),
                ref_text: reference.as_str().to_string(),
                matched_text: whole.as_str().to_string(),
                num: num.as_str().to_string(),
                year: None,
            });
        }

        Ok(found)
    }

    fn is_valid(&self, candidate: &RefMatch) -> bool {
        // a mention trailing off into "of the ..." or "of Act ..." is an
        // external section reference, not ours
        if candidate.matched_text.ends_with("the ") || candidate.matched_text.ends_with("Act ") {
            return false;
        }
        self.targets.contains_key(&candidate.num)
    }

    fn make_href(&self, candidate: &RefMatch) -> Result<String> {
        let id = self
            .targets
            .get(&candidate.num)
            .context("section reference validated without a target")?;
        Ok(format!("#{id}"))
    }
}
