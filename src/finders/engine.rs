use anyhow::{Result, bail};

use crate::xml::Element;

pub const REF_TAG: &str = "ref";

/// One candidate match in a text slot. `start`/`end` are byte offsets of the
/// `ref` capture within the slot; `matched_text` is the full pattern match,
/// which validators inspect.
#[derive(Debug, Clone)]
pub struct RefMatch {
    pub start: usize,
    pub end: usize,
    pub ref_text: String,
    pub matched_text: String,
    pub num: String,
    pub year: Option<String>,
}

/// The per-finder behavior injected into the rewrite engine: where to look,
/// when a slot is worth scanning, what a match is, when a match may be
/// linked, and what it links to.
pub trait LinkPolicy {
    /// Container tags under which scanning is permitted.
    fn ancestors(&self) -> &[&str];

    /// Cheap substring predicate applied to a slot before pattern matching.
    fn trigger(&self, slot: &str) -> bool;

    /// Candidate matches within a slot, in left-to-right order. A policy
    /// that links greedily returns only the first; a policy with a
    /// validation step returns all non-overlapping candidates.
    fn matches(&self, slot: &str) -> Result<Vec<RefMatch>>;

    fn is_valid(&self, candidate: &RefMatch) -> bool;

    fn make_href(&self, candidate: &RefMatch) -> Result<String>;
}

/// Rewrites plain-text reference mentions under `root` into `ref` elements
/// according to `policy`. The tree is mutated in place; candidate text runs
/// that yield no valid match are left untouched.
pub fn rewrite(root: &mut Element, policy: &dyn LinkPolicy) -> Result<()> {
    if root.attr("xmlns").is_none() {
        bail!("document root has no default namespace");
    }
    descend(root, policy)
}

fn descend(element: &mut Element, policy: &dyn LinkPolicy) -> Result<()> {
    if policy.ancestors().contains(&element.tag.as_str()) {
        return rewrite_subtree(element, policy);
    }
    for child in &mut element.children {
        descend(child, policy)?;
    }
    Ok(())
}

/// Scans one element's text slots in document order: its leading text, then
/// each child's subtree followed by that child's tail. On a splice the
/// cursor moves to the newly inserted ref so the remainder of the original
/// run is scanned next; matched text is never scanned twice.
fn rewrite_subtree(element: &mut Element, policy: &dyn LinkPolicy) -> Result<()> {
    let mut index = 0;

    if policy.trigger(&element.text) {
        if let Some(matched) = first_valid(policy, &element.text)? {
            let href = policy.make_href(&matched)?;
            let (prefix, ref_element) = split_slot(&element.text, &matched, &href);
            element.text = prefix;
            element.children.insert(0, ref_element);
            index = scan_tails(element, 0, policy)? + 1;
        }
    }

    while index < element.children.len() {
        // never link inside an existing reference
        if element.children[index].tag != REF_TAG {
            rewrite_subtree(&mut element.children[index], policy)?;
        }

        if policy.trigger(&element.children[index].tail) {
            index = scan_tails(element, index, policy)?;
        }
        index += 1;
    }

    Ok(())
}

/// Scans the tail of `children[index]` and keeps splicing for as long as the
/// current tail holds a valid match. Each splice truncates the current tail
/// to the match prefix and hands the suffix to the new ref element, so the
/// scan resumes exactly where the previous match ended. Returns the index of
/// the last child whose tail was scanned.
fn scan_tails(parent: &mut Element, mut index: usize, policy: &dyn LinkPolicy) -> Result<usize> {
    loop {
        if parent.children[index].tail.is_empty() {
            return Ok(index);
        }

        let slot = parent.children[index].tail.clone();
        let Some(matched) = first_valid(policy, &slot)? else {
            return Ok(index);
        };

        let href = policy.make_href(&matched)?;
        let (prefix, ref_element) = split_slot(&slot, &matched, &href);
        parent.children[index].tail = prefix;
        parent.children.insert(index + 1, ref_element);
        index += 1;
    }
}

fn first_valid(policy: &dyn LinkPolicy, slot: &str) -> Result<Option<RefMatch>> {
    for candidate in policy.matches(slot)? {
        if policy.is_valid(&candidate) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Splits a slot at the match boundaries: returns the text before the match
/// and a new ref element carrying the matched text, with the text after the
/// match as its tail.
fn split_slot(slot: &str, matched: &RefMatch, href: &str) -> (String, Element) {
    let mut ref_element = Element::new(REF_TAG);
    ref_element.set_attr("href", href);
    ref_element.text = matched.ref_text.clone();
    ref_element.tail = slot[matched.end..].to_string();
    (slot[..matched.start].to_string(), ref_element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    /// Links every occurrence of `token NN` under `<blurb>` ancestors.
    struct TokenPolicy {
        valid_nums: Vec<String>,
    }

    impl TokenPolicy {
        fn all() -> Self {
            TokenPolicy {
                valid_nums: Vec::new(),
            }
        }

        fn only(nums: &[&str]) -> Self {
            TokenPolicy {
                valid_nums: nums.iter().map(|num| num.to_string()).collect(),
            }
        }
    }

    impl LinkPolicy for TokenPolicy {
        fn ancestors(&self) -> &[&str] {
            &["blurb"]
        }

        fn trigger(&self, slot: &str) -> bool {
            slot.contains("token")
        }

        fn matches(&self, slot: &str) -> Result<Vec<RefMatch>> {
            let pattern = regex::Regex::new(r"(?P<ref>token (?P<num>\d+))").unwrap();
            Ok(pattern
                .captures_iter(slot)
                .map(|captures| {
                    let reference = captures.name("ref").unwrap();
                    RefMatch {
                        start: reference.start(),
                        end: reference.end(),
                        ref_text: reference.as_str().to_string(),
                        matched_text: captures.get(0).unwrap().as_str().to_string(),
                        num: captures.name("num").unwrap().as_str().to_string(),
                        year: None,
                    }
                })
                .collect())
        }

        fn is_valid(&self, candidate: &RefMatch) -> bool {
            self.valid_nums.is_empty() || self.valid_nums.contains(&candidate.num)
        }

        fn make_href(&self, candidate: &RefMatch) -> Result<String> {
            Ok(format!("#token-{}", candidate.num))
        }
    }

    fn run(input: &str, policy: &dyn LinkPolicy) -> String {
        let mut root = xml::parse(input).unwrap();
        rewrite(&mut root, policy).unwrap();
        xml::serialize(&root).unwrap()
    }

    #[test]
    fn rewrite_requires_default_namespace() {
        let mut root = xml::parse("<doc><blurb>token 1</blurb></doc>").unwrap();
        assert!(rewrite(&mut root, &TokenPolicy::all()).is_err());
    }

    #[test]
    fn splices_leading_text_into_first_child() {
        let output = run(
            r#"<doc xmlns="ns"><blurb>see token 1 here</blurb></doc>"#,
            &TokenPolicy::all(),
        );
        assert_eq!(
            output,
            r##"<doc xmlns="ns"><blurb>see <ref href="#token-1">token 1</ref> here</blurb></doc>"##
        );
    }

    #[test]
    fn splices_tail_text_after_sibling() {
        let output = run(
            r#"<doc xmlns="ns"><blurb><b>x</b> near token 2.</blurb></doc>"#,
            &TokenPolicy::all(),
        );
        assert_eq!(
            output,
            r##"<doc xmlns="ns"><blurb><b>x</b> near <ref href="#token-2">token 2</ref>.</blurb></doc>"##
        );
    }

    #[test]
    fn chains_multiple_matches_in_one_run() {
        let output = run(
            r#"<doc xmlns="ns"><blurb>token 1 and token 2 and token 3</blurb></doc>"#,
            &TokenPolicy::all(),
        );
        assert_eq!(
            output,
            concat!(
                r##"<doc xmlns="ns"><blurb><ref href="#token-1">token 1</ref>"##,
                r##" and <ref href="#token-2">token 2</ref>"##,
                r##" and <ref href="#token-3">token 3</ref></blurb></doc>"##
            )
        );
    }

    #[test]
    fn conserves_text_across_splices() {
        let input = r#"<doc xmlns="ns"><blurb>a token 1 b <b>mid</b> c token 2 d</blurb></doc>"#;
        let output = run(input, &TokenPolicy::all());

        let root = xml::parse(&output).unwrap();
        let blurb = &root.children[0];
        let mut flattened = blurb.text.clone();
        for child in &blurb.children {
            flattened.push_str(&child.text);
            flattened.push_str(&child.tail);
        }
        assert_eq!(flattened, "a token 1 b mid c token 2 d");
    }

    #[test]
    fn skips_slots_outside_allowlisted_ancestors() {
        let input = r#"<doc xmlns="ns"><heading>token 1</heading></doc>"#;
        assert_eq!(run(input, &TokenPolicy::all()), input);
    }

    #[test]
    fn never_links_inside_an_existing_ref() {
        let input =
            r##"<doc xmlns="ns"><blurb><ref href="#token-1">token 1</ref> tail text</blurb></doc>"##;
        assert_eq!(run(input, &TokenPolicy::all()), input);
    }

    #[test]
    fn scans_the_tail_of_an_existing_ref() {
        let output = run(
            r##"<doc xmlns="ns"><blurb><ref href="#token-1">token 1</ref> then token 2</blurb></doc>"##,
            &TokenPolicy::all(),
        );
        assert!(output.contains(r##"<ref href="#token-2">token 2</ref>"##));
    }

    #[test]
    fn invalid_candidate_falls_through_to_next_match_in_slot() {
        let output = run(
            r#"<doc xmlns="ns"><blurb>token 9 and token 1 here</blurb></doc>"#,
            &TokenPolicy::only(&["1"]),
        );
        assert!(!output.contains(r#">token 9<"#));
        assert_eq!(
            output,
            concat!(
                r#"<doc xmlns="ns"><blurb>token 9 and "#,
                r##"<ref href="#token-1">token 1</ref> here</blurb></doc>"##
            )
        );
    }

    #[test]
    fn abandoned_run_leaves_later_runs_alone() {
        let output = run(
            concat!(
                r#"<doc xmlns="ns"><blurb>token 8 and token 9 here"#,
                r#"<b>x</b> later token 2</blurb></doc>"#
            ),
            &TokenPolicy::only(&["2"]),
        );
        // nothing in the leading run validates, so it stays plain text;
        // the tail run after <b> is a separate candidate and still links
        assert!(output.contains("token 8 and token 9 here"));
        assert!(output.contains(r##"<ref href="#token-2">token 2</ref>"##));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let input = r#"<doc xmlns="ns"><blurb>a token 1 b token 2 c</blurb></doc>"#;
        let once = run(input, &TokenPolicy::all());
        let twice = run(&once, &TokenPolicy::all());
        assert_eq!(once, twice);
    }
}
