use clap::Args;
use miette::{miette, Result};
use owo_colors::{OwoColorize, Stream::Stdout};

use super::ArchiveArgs;

#[derive(Args)]
pub struct ManifestArgs {
    /// An archive, nested archives are addressed as `outer.jar!/lib/inner.jar`
    #[arg(value_name = "PATH")]
    path: String,

    /// Also print the per-entry sections
    #[arg(long, default_value_t = false)]
    sections: bool,

    #[command(flatten)]
    archive: ArchiveArgs,
}

impl ManifestArgs {
    pub fn handle(&self) -> Result<()> {
        let jar = self.archive.open(&self.path)?;
        let manifest = jar
            .manifest()?
            .ok_or_else(|| miette!("{} has no manifest", jar.name()))?;

        for (name, value) in manifest.main_attributes().iter() {
            println!("{}: {value}", name.if_supports_color(Stdout, |n| n.cyan()));
        }

        if self.sections {
            for (section, attributes) in manifest.sections() {
                println!();
                println!("{}", section.if_supports_color(Stdout, |s| s.bold()));
                for (name, value) in attributes.iter() {
                    println!(
                        "  {}: {value}",
                        name.if_supports_color(Stdout, |n| n.cyan())
                    );
                }
            }
        }

        jar.close()?;
        Ok(())
    }
}
