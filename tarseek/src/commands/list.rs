use std::io::{self, Write};

use humansize::{file_size_opts as options, FileSize};
use serde_json::json;
use tarseek_format::{EntryKind, Statemap};

use super::{open_archive, open_indexed};
use crate::cli::ListArgs;
use crate::error::{Error, Result};

pub fn run(args: ListArgs) -> Result<()> {
    let extractor = if args.rebuild {
        let mut extractor = open_archive(&args.archive)?;
        extractor.rebuild().map_err(|source| Error::Index {
            path: args.archive.path.clone(),
            source,
        })?;
        extractor
    } else {
        open_indexed(&args.archive)?
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.json {
        list_json(extractor.statemap(), &mut out)?;
    } else {
        list_table(extractor.statemap(), &mut out)?;
    }

    Ok(())
}

#[inline(always)]
fn format_size(size: u64) -> String {
    size.file_size(options::BINARY)
        .unwrap_or_else(|_| size.to_string())
}

fn list_table<W: Write>(statemap: &Statemap, out: &mut W) -> io::Result<()> {
    writeln!(out, "{:12}  {:>12}  {:>12}  Path", "Type", "Offset", "Size")?;
    writeln!(out, "{}", "-".repeat(60))?;

    let mut files = 0;
    let mut folders = 0;
    let mut total = 0u64;

    for entry in statemap {
        match entry.kind {
            EntryKind::Directory => {
                folders += 1;
                writeln!(
                    out,
                    "{:12}  {:>12}  {:>12}  {}",
                    "<directory>", entry.offset, "-", entry.path
                )?;
            }
            EntryKind::File => {
                files += 1;
                total += entry.size;
                writeln!(
                    out,
                    "{:12}  {:>12}  {:>12}  {}",
                    "<file>",
                    entry.offset,
                    format_size(entry.size),
                    entry.path
                )?;
            }
        }
    }

    writeln!(out, "{}", "-".repeat(60))?;
    writeln!(
        out,
        "{} files, {} folders, {}",
        files,
        folders,
        format_size(total)
    )
}

fn list_json<W: Write>(statemap: &Statemap, out: &mut W) -> io::Result<()> {
    let entries = statemap
        .iter()
        .map(|entry| {
            json!({
                "path": entry.path.as_str(),
                "type": entry.kind.to_string(),
                "offset": entry.offset,
                "size": entry.size,
            })
        })
        .collect::<Vec<_>>();

    serde_json::to_writer_pretty(&mut *out, &entries)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarseek_format::{EntryState, VPath};

    fn sample() -> Statemap {
        let mut statemap = Statemap::new();
        statemap
            .insert(EntryState {
                path: VPath::folder("docs").unwrap(),
                offset: 512,
                size: 0,
                kind: EntryKind::Directory,
            })
            .unwrap();
        statemap
            .insert(EntryState {
                path: VPath::file("docs/readme.md").unwrap(),
                offset: 1536,
                size: 2048,
                kind: EntryKind::File,
            })
            .unwrap();
        statemap
    }

    #[test]
    fn table() {
        let mut out = Vec::<u8>::new();
        list_table(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        println!("{}", text);

        assert!(text.contains("/docs/readme.md"));
        assert!(text.contains("<directory>"));
        assert!(text.contains("1 files, 1 folders"));
    }

    #[test]
    fn json() {
        let mut out = Vec::<u8>::new();
        list_json(&sample(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value[0]["type"], "directory");
        assert_eq!(value[1]["path"], "/docs/readme.md");
        assert_eq!(value[1]["offset"], 1536);
        assert_eq!(value[1]["size"], 2048);
    }
}
