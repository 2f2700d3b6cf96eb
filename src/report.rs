//! Report rendering: turns a [`MatchReport`] into either a plain-text
//! summary (stdout) or a JSON document (file).

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::match_result::MatchReport;

/// Prints one paragraph per `(physicalPath, metainfoPath, logicalPath)`
/// triple to `out`.
pub fn render_text<W: Write>(report: &MatchReport, mut out: W) -> io::Result<()> {
    if report.torrents.is_empty() {
        writeln!(out, "No torrents processed.")?;
        return Ok(());
    }
    for (torrent_path, matches) in &report.torrents {
        if matches.files.is_empty() {
            writeln!(out, "{torrent_path}: no matches found.\n")?;
            continue;
        }
        for (logical_path, physical_paths) in &matches.files {
            for physical_path in physical_paths {
                writeln!(
                    out,
                    "{} <- {} (from {})\n",
                    logical_path,
                    physical_path.display(),
                    torrent_path
                )?;
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    torrents: std::collections::BTreeMap<&'a str, std::collections::BTreeMap<&'a str, Vec<&'a Path>>>,
}

/// Serializes the report to the shape `{ metainfoPath: { logicalPath:
/// [physicalPath, …] } }` at `path`.
pub fn write_json(report: &MatchReport, path: &Path) -> Result<()> {
    let mut torrents = std::collections::BTreeMap::new();
    for (torrent_path, matches) in &report.torrents {
        let mut files = std::collections::BTreeMap::new();
        for (logical_path, physical_paths) in &matches.files {
            files.insert(
                logical_path.as_str(),
                physical_paths.iter().map(|p| p.as_path()).collect::<Vec<_>>(),
            );
        }
        torrents.insert(torrent_path.as_str(), files);
    }
    let json_report = JsonReport { torrents };

    let file = File::create(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::to_writer_pretty(file, &json_report)
        .map_err(|e| Error::Config(format!("failed to write json report: {e}")))?;
    Ok(())
}
