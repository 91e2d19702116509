use bootjar_archive::{ArchiveOptions, JarArchive, JarPath};
use clap::Args;
use miette::{Context, Result};

pub mod cat;
pub mod extract;
pub mod list;
pub mod manifest;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// List the entries of an archive
    List(list::ListArgs),
    /// Write the content of one entry to stdout
    Cat(cat::CatArgs),
    /// Show the main attributes of an archive's manifest
    Manifest(manifest::ManifestArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::List(list) => list.handle(),
            Commands::Cat(cat) => cat.handle(),
            Commands::Manifest(manifest) => manifest.handle(),
            Commands::Extract(extract) => extract.handle(),
        }
    }
}

/// Options shared by every command that opens an archive
#[derive(Args)]
pub struct ArchiveArgs {
    /// Check the CRC-32 of every entry that is read
    #[arg(long, default_value_t = false)]
    verify: bool,
}

impl ArchiveArgs {
    /// Open `path`, which may address a nested archive with `!/` separators
    pub fn open(&self, path: &str) -> Result<JarArchive> {
        let path = JarPath::parse(path)?;
        let options = ArchiveOptions::builder()
            .verify_checksums(self.verify)
            .build();
        JarArchive::open_path(&path, options).wrap_err_with(|| format!("opening {path}"))
    }
}
