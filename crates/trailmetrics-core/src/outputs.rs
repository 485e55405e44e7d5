use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::Result;

/// Writes a table as CSV through a sibling temporary file, renaming into
/// place only on success. A failed stage therefore never leaves a
/// truncated artifact where the next stage would read it; the prior valid
/// output, if any, survives.
pub fn write_csv_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let tmp = temp_sibling(path);

    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    })();

    publish(written, &tmp, path)
}

/// Same discipline for plain-text artifacts (the route GeoJSON).
pub fn write_string_atomic(content: &str, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let tmp = temp_sibling(path);

    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    })();

    publish(written, &tmp, path)
}

pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input table {} does not exist", path.display()),
        )
        .into());
    }
    let file = fs::File::open(path)?;
    // whole-file schema inference: sparse extension columns must not be
    // mistyped from an empty prefix
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(df)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn publish(written: Result<()>, tmp: &Path, path: &Path) -> Result<()> {
    match written {
        Ok(()) => {
            fs::rename(tmp, path)?;
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(tmp);
            Err(err)
        }
    }
}
