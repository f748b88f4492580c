use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "akn-reflink",
    version,
    about = "Reference detection and linking for Akoma Ntoso legal documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite plain-text references in a document into ref elements
    Link(LinkArgs),
    /// Detect references and write a JSON report without rewriting
    Scan(ScanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    #[arg(long)]
    pub input: PathBuf,

    /// FRBR work URI of the document, e.g. /za/act/1998/52
    #[arg(long)]
    pub frbr_uri: String,

    #[arg(long, default_value = "eng")]
    pub language: String,

    #[arg(long)]
    pub locality: Option<String>,

    /// Write the linked document here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub skip_external: bool,

    #[arg(long, default_value_t = false)]
    pub skip_internal: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(long)]
    pub input: PathBuf,

    /// FRBR work URI of the document, e.g. /za/act/1998/52
    #[arg(long)]
    pub frbr_uri: String,

    #[arg(long, default_value = "eng")]
    pub language: String,

    #[arg(long)]
    pub locality: Option<String>,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub skip_external: bool,

    #[arg(long, default_value_t = false)]
    pub skip_internal: bool,
}
