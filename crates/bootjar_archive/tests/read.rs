use std::path::PathBuf;
use std::{fs::File, io::Read};

use bootjar_archive::{error::Error, ArchiveOptions, JarArchive};
use pretty_assertions::assert_eq;
use tracing::info;
use tracing_test::traced_test;
use walkdir::WalkDir;

fn validate_jar(path: &PathBuf) -> Result<(), Error> {
    info!("testing {}", &path.display());

    let parent_dir = &path
        .parent()
        .ok_or(Error::InvalidPath("unable to find parent".into()))?
        .join(
            path.file_stem()
                .ok_or(Error::InvalidPath("unable to create file stem".into()))?,
        );

    info!("comparing to files in {}", parent_dir.display());

    let expected_files = WalkDir::new(parent_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .collect::<Vec<_>>();

    let options = ArchiveOptions::builder().verify_checksums(true).build();
    let jar = JarArchive::open_with(path, options)?;
    let files = jar.entries().filter(|e| !e.is_directory()).count();
    assert_eq!(files, expected_files.len());

    for entry in jar.entries() {
        let p = parent_dir.join(&*entry.name_lossy());
        if entry.is_directory() {
            assert!(p.is_dir(), "{} should be a directory", p.display());
            continue;
        }
        info!("comparing to {}", p.display());

        let mut expected = Vec::new();
        let mut f_real = File::open(&p)?;
        f_real.read_to_end(&mut expected)?;

        let mut actual = Vec::new();
        jar.open_stream(&entry)?.read_to_end(&mut actual)?;

        assert_eq!(expected.len(), actual.len());
        assert_eq!(expected, actual);
    }

    jar.close()
}

#[traced_test]
#[test]
fn validate_jar_parsing() -> Result<(), Error> {
    let to_test = std::fs::read_dir(format!("{}/resources/", env!("CARGO_MANIFEST_DIR")))?
        // Filter out all those directory entries which couldn't be read
        .filter_map(|res| res.ok())
        // Map the directory entries to paths
        .map(|dir_entry| dir_entry.path())
        .filter(|e| e.is_file())
        .filter(|path| {
            path.extension()
                .map_or(false, |extension| extension == "jar")
        })
        .collect::<Vec<_>>();

    assert!(!to_test.is_empty());
    for path in to_test {
        validate_jar(&path)?;
    }

    Ok(())
}

#[test]
fn launcher_prefix_is_skipped() -> Result<(), Error> {
    let sample = JarArchive::open(format!("{}/resources/sample.jar", env!("CARGO_MANIFEST_DIR")))?;
    let launcher =
        JarArchive::open(format!("{}/resources/launcher.jar", env!("CARGO_MANIFEST_DIR")))?;

    assert_eq!(sample.start_of_archive(), 0);
    assert_eq!(launcher.start_of_archive(), 42);
    assert_eq!(launcher.size(), sample.size());

    for (a, b) in sample.entries().zip(launcher.entries()) {
        assert_eq!(a.name(), b.name());
        if a.is_directory() {
            continue;
        }
        let offset = sample.entry_data(&a)?.offset();
        assert_eq!(launcher.entry_data(&b)?.offset(), offset + 42);
    }

    Ok(())
}

#[test]
fn manifest_of_sample() -> Result<(), Error> {
    let jar = JarArchive::open(format!("{}/resources/sample.jar", env!("CARGO_MANIFEST_DIR")))?;

    let manifest = jar.manifest()?.expect("sample.jar has a manifest");
    assert_eq!(manifest.main_class(), Some("org.example.boot.JarLauncher"));
    assert_eq!(
        manifest.start_class(),
        Some("org.example.sample.SampleApplication")
    );

    Ok(())
}
