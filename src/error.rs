//! Error management.

use derive_more::{Display, From};

#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "format error at offset {}: {}", offset, reason)]
    #[from(ignore)]
    Format { offset: usize, reason: String },
    #[display(fmt = "range error in {}: node {} is out of bound {}", stage, node, bound)]
    #[from(ignore)]
    Range {
        stage: &'static str,
        node: usize,
        bound: usize,
    },
    #[display(fmt = "numeric error: rank of node {} is not finite in iteration {}", node, iteration)]
    #[from(ignore)]
    Numeric { node: usize, iteration: usize },
    #[display(fmt = "resource error: cannot allocate {} entries for {}", len, what)]
    #[from(ignore)]
    Resource { what: &'static str, len: usize },
    #[display(fmt = "config error: {}", _0)]
    #[from(ignore)]
    Config(String),
    #[display(fmt = "io error: {}", _0)]
    Io(std::io::Error),
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        Error::Format {
            offset,
            reason: reason.into(),
        }
    }
}

/// Allocates a vector of `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)
        .map_err(|_| Error::Resource { what, len })?;
    vec.resize(len, value);
    Ok(vec)
}
