use bootjar_archive::CompressionMethod;
use clap::Args;
use miette::Result;
use owo_colors::{OwoColorize, Stream::Stdout};

use super::ArchiveArgs;

#[derive(Args)]
pub struct ListArgs {
    /// An archive, nested archives are addressed as `outer.jar!/lib/inner.jar`
    #[arg(value_name = "PATH")]
    path: String,

    #[command(flatten)]
    archive: ArchiveArgs,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let jar = self.archive.open(&self.path)?;

        for entry in jar.entries() {
            let method = match entry.compression_method() {
                CompressionMethod::Stored => "stored".to_owned(),
                CompressionMethod::Deflated => "deflated".to_owned(),
                CompressionMethod::Unsupported(id) => format!("method {id}"),
            };
            let name = entry.name_lossy();
            let (year, month, day) = entry.record().modified_date();
            let (hour, minute, _) = entry.record().modified_time();
            print!(
                "{:>10} {:>10} {:>8}  {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}  ",
                entry.size(),
                entry.compressed_size(),
                method,
            );
            if entry.is_directory() {
                println!("{}", name.if_supports_color(Stdout, |n| n.blue()));
            } else {
                println!("{name}");
            }
        }

        let total = jar.decompressed_size().unwrap_or_default();
        println!(
            "{}",
            format!("{} entries, {total} bytes", jar.len())
                .if_supports_color(Stdout, |t| t.dimmed())
        );
        if jar.is_signed() {
            println!("{}", "signed".if_supports_color(Stdout, |t| t.green()));
        }

        jar.close()?;
        Ok(())
    }
}
