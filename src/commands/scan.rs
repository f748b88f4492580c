use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ScanArgs;
use crate::commands::link::link_document;
use crate::finders::engine::REF_TAG;
use crate::model::{Document, FoundReference, FrbrUri, ScanReport};
use crate::util::{now_utc_string, read_document, sha256_file, write_json_pretty};
use crate::xml::{self, Element};

const REPORT_VERSION: u32 = 1;

/// Runs the detection passes against an in-memory copy of the document and
/// reports the references the passes added; refs already present in the
/// input are left out, and the input file is never rewritten.
pub fn run(args: ScanArgs) -> Result<()> {
    let frbr_uri = FrbrUri::parse(&args.frbr_uri)?;
    let source_sha256 = sha256_file(&args.input)?;
    let content = read_document(&args.input)?;

    let before = xml::parse(&content).context("failed to parse source content")?;

    let mut document = Document {
        frbr_uri,
        language: args.language.clone(),
        content,
    };

    link_document(
        &mut document,
        args.locality.as_deref(),
        args.skip_external,
        args.skip_internal,
    )?;

    let after = xml::parse(&document.content).context("failed to parse linked content")?;
    let references = new_references(&before, &after);

    let report = ScanReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        source_path: args.input.display().to_string(),
        source_sha256,
        frbr_uri: document.frbr_uri.work_uri(),
        language: document.language.clone(),
        reference_count: references.len(),
        references,
    };

    match &args.report_path {
        Some(path) => {
            write_json_pretty(path, &report)?;
            info!(report = %path.display(), count = report.reference_count, "wrote scan report");
        }
        None => {
            let rendered = serde_json::to_string_pretty(&report)
                .context("failed to serialize scan report")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

/// Returns the refs present in `after` but not in `before`, subtracting
/// duplicates one for one so repeated identical refs are only reported as
/// many times as the passes introduced them.
fn new_references(before: &Element, after: &Element) -> Vec<FoundReference> {
    let mut existing = Vec::new();
    collect_references(before, &mut existing);

    let mut counts: HashMap<(String, String, String), usize> = HashMap::new();
    for reference in existing {
        *counts
            .entry((reference.kind, reference.text, reference.href))
            .or_default() += 1;
    }

    let mut found = Vec::new();
    collect_references(after, &mut found);
    found.retain(|reference| {
        let key = (
            reference.kind.clone(),
            reference.text.clone(),
            reference.href.clone(),
        );
        match counts.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        }
    });
    found
}

fn collect_references(element: &Element, found: &mut Vec<FoundReference>) {
    if element.tag == REF_TAG {
        if let Some(href) = element.attr("href") {
            let kind = if href.starts_with('#') { "section" } else { "act" };
            found.push(FoundReference {
                kind: kind.to_string(),
                text: element.text.clone(),
                href: href.to_string(),
            });
        }
    }

    for child in &element.children {
        collect_references(child, found);
    }
}
