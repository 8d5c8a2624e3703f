use std::io::{self, Read, Write};

use tarseek_format::{Extractor, ReadError, VPath};

use super::open_indexed;
use crate::cli::CatArgs;
use crate::error::{Error, Result};

pub fn run(args: CatArgs) -> Result<()> {
    let extractor = open_indexed(&args.archive)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    cat(&*extractor, &args.path, args.offset, args.length, &mut out)?;
    out.flush()?;

    Ok(())
}

fn cat<W: Write>(
    extractor: &dyn Extractor,
    path: &str,
    offset: u64,
    length: Option<usize>,
    out: &mut W,
) -> Result<()> {
    let read_err = |source| Error::Read {
        path: path.to_string(),
        source,
    };

    let file = VPath::file(path)
        .ok()
        .and_then(|p| extractor.file_list().get(&p))
        .ok_or_else(|| read_err(ReadError::NotFound(path.to_string())))?;

    match length {
        Some(length) => {
            let output = extractor.read(file, length, offset).map_err(read_err)?;
            out.write_all(output.bytes())?;
        }
        None => {
            let mut reader = extractor.open(file).map_err(read_err)?;
            io::copy(&mut reader.by_ref().take(offset), &mut io::sink())?;
            io::copy(&mut reader, out)?;
        }
    }

    Ok(())
}
