use tracing::info;

use super::open_archive;
use crate::cli::RebuildArgs;
use crate::error::{Error, Result};

pub fn run(args: RebuildArgs) -> Result<()> {
    let mut extractor = open_archive(&args.archive)?;
    extractor.rebuild().map_err(|source| Error::Index {
        path: args.archive.path.clone(),
        source,
    })?;

    let statemap_path = extractor.options().statemap_path();
    info!(statemap = %statemap_path.display(), "statemap rebuilt");
    println!(
        "Indexed {} entries into {}",
        extractor.statemap().len(),
        statemap_path.display()
    );

    Ok(())
}
