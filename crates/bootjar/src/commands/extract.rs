use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

use super::ArchiveArgs;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive, nested archives are addressed as `outer.jar!/lib/inner.jar`
    #[arg(short, long, value_name = "PATH")]
    file: String,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[command(flatten)]
    archive: ArchiveArgs,
}

/// `name` as a relative path that stays inside the target directory
fn enclosed_name(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| path.to_path_buf())
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let jar = self.archive.open(&self.file)?;

        for entry in jar.entries() {
            let name = entry.name_lossy();
            let Some(relative) = enclosed_name(&name) else {
                warn!("skipping {name}, it would be written outside of the target");
                continue;
            };
            let p = self.directory.join(relative);

            if entry.is_directory() {
                std::fs::create_dir_all(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?;
                continue;
            }
            info!("writing {}", p.display());

            let parent = p
                .parent()
                .ok_or_else(|| miette!("{} has no parent directory", p.display()))?;
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;
            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            let mut stream = jar.open_stream(&entry)?;
            std::io::copy(&mut stream, &mut out)
                .into_diagnostic()
                .context(format!("extracting {name}"))?;
        }

        jar.close()?;
        Ok(())
    }
}
