use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::LinkArgs;
use crate::finders;
use crate::model::{Document, FrbrUri};
use crate::util::read_document;

pub fn run(args: LinkArgs) -> Result<()> {
    let frbr_uri = FrbrUri::parse(&args.frbr_uri)?;
    let content = read_document(&args.input)?;

    let mut document = Document {
        frbr_uri,
        language: args.language.clone(),
        content,
    };

    link_document(&mut document, args.locality.as_deref(), args.skip_external, args.skip_internal)?;

    match &args.output {
        Some(path) => {
            fs::write(path, document.content.as_bytes())
                .with_context(|| format!("failed to write linked document: {}", path.display()))?;
            info!(output = %path.display(), "wrote linked document");
        }
        None => println!("{}", document.content),
    }

    Ok(())
}

/// Runs the external and internal passes for the document's locale, in that
/// order: act references first so that internal-looking mentions of other
/// works are already consumed when the section pass runs.
pub fn link_document(
    document: &mut Document,
    locality: Option<&str>,
    skip_external: bool,
    skip_internal: bool,
) -> Result<()> {
    let country = document.frbr_uri.country.clone();
    let language = document.language.clone();

    if !skip_external {
        let registered = finders::act_finders();
        let finder = finders::for_locale(&registered, &country, &language, locality)?;
        finder.find_references(document)?;
        info!("act reference pass complete");
    }

    if !skip_internal {
        let registered = finders::section_finders();
        let finder = finders::for_locale(&registered, &country, &language, locality)?;
        finder.find_references(document)?;
        info!("section reference pass complete");
    }

    Ok(())
}
