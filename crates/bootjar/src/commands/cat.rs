use clap::Args;
use miette::{Context, IntoDiagnostic, Result};

use super::ArchiveArgs;

#[derive(Args)]
pub struct CatArgs {
    /// An archive, nested archives are addressed as `outer.jar!/lib/inner.jar`
    #[arg(value_name = "PATH")]
    path: String,

    /// Name of the entry to print
    #[arg(value_name = "ENTRY")]
    entry: String,

    #[command(flatten)]
    archive: ArchiveArgs,
}

impl CatArgs {
    pub fn handle(&self) -> Result<()> {
        let jar = self.archive.open(&self.path)?;
        let mut stream = jar.open_stream_by_name(&self.entry)?;

        let mut stdout = std::io::stdout().lock();
        std::io::copy(&mut stream, &mut stdout)
            .into_diagnostic()
            .context(format!("reading {}", self.entry))?;

        jar.close()?;
        Ok(())
    }
}
