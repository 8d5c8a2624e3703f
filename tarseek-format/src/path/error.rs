use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntoVPathError {
    UnrepresentableStr,
    EmptyPath,
}

impl std::error::Error for IntoVPathError {}

impl fmt::Display for IntoVPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl IntoVPathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoVPathError::UnrepresentableStr => {
                "path contains a NUL or line break and cannot be indexed"
            }
            IntoVPathError::EmptyPath => "no path provided",
        }
    }

    pub fn as_io_error(&self) -> std::io::Error {
        use std::io::{Error, ErrorKind};
        Error::new(ErrorKind::InvalidInput, self.as_str())
    }
}

impl From<IntoVPathError> for std::io::Error {
    fn from(err: IntoVPathError) -> Self {
        err.as_io_error()
    }
}
