use derive_more::From;

use crate::k8s::quantity::QuantityError;
use crate::prom::QueryError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Http(reqwest::Error),

    #[from]
    Query(QueryError),

    #[from]
    Quantity(QuantityError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Query(e) => write!(fmt, "{e}"),
            Self::Quantity(e) => write!(fmt, "{e}"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {}
