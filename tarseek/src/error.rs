use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: tarseek_format::OpenError,
    },

    #[error("Not a recognised tar archive: `{}`", .path.display())]
    UnknownFormat { path: PathBuf },

    #[error("Cannot index archive `{}`", .path.display())]
    Index {
        path: PathBuf,
        #[source]
        source: tarseek_format::Error,
    },

    #[error("Cannot read `{path}` from archive")]
    Read {
        path: String,
        #[source]
        source: tarseek_format::ReadError,
    },

    #[error("Cannot write output")]
    Output {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Output { source }
    }
}
