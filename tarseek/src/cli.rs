use std::path::PathBuf;

use structopt::clap::AppSettings::*;
use structopt::StructOpt;
use tarseek_format::ExtractorOptions;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "tarseek",
    about = "Index tar archives and read their files without extracting them.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands],
    usage = "tarseek (l|c|r) [FLAGS|OPTIONS] <archive> [path]"
)]
pub struct Cli {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub command: Commands,
}

#[derive(Debug, StructOpt)]
pub enum Commands {
    #[structopt(
        name = "l",
        visible_alias = "list",
        about = "List the indexed entries of an archive"
    )]
    List(ListArgs),

    #[structopt(
        name = "c",
        visible_alias = "cat",
        about = "Write the contents of a file in the archive to stdout"
    )]
    Cat(CatArgs),

    #[structopt(
        name = "r",
        visible_alias = "rebuild",
        about = "Rescan an archive and rewrite its statemap"
    )]
    Rebuild(RebuildArgs),
}

#[derive(Debug, StructOpt)]
pub struct ArchiveArgs {
    #[structopt(name = "archive", parse(from_os_str), help = "Path to the .tar archive")]
    pub path: PathBuf,

    #[structopt(
        long,
        parse(from_os_str),
        help = "Statemap location [default: <archive>.statemap]"
    )]
    pub statemap: Option<PathBuf>,

    #[structopt(long, help = "Skip header checksum verification")]
    pub no_checksum: bool,

    #[structopt(
        long,
        help = "Fail when an entry appears before its parent folder"
    )]
    pub strict_parents: bool,
}

impl ArchiveArgs {
    pub fn options(&self) -> ExtractorOptions {
        let options = ExtractorOptions::new(&self.path)
            .verify_checksums(!self.no_checksum)
            .strict_parents(self.strict_parents);

        match &self.statemap {
            Some(path) => options.with_statemap_path(path),
            None => options,
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct ListArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(long, help = "Output as JSON")]
    pub json: bool,

    #[structopt(long, help = "Rescan the archive instead of using the statemap")]
    pub rebuild: bool,
}

#[derive(Debug, StructOpt)]
pub struct CatArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(name = "path", help = "Path of the file inside the archive")]
    pub path: String,

    #[structopt(short, long, default_value = "0", help = "Byte offset to start reading at")]
    pub offset: u64,

    #[structopt(short = "n", long, help = "Number of bytes to read [default: to the end]")]
    pub length: Option<usize>,
}

#[derive(Debug, StructOpt)]
pub struct RebuildArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,
}
