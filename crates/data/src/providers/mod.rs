//! External providers.

mod http_oracle;

pub use http_oracle::{HttpBiasOracle, HttpOracleConfig};
