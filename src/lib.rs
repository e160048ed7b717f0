pub mod config;
pub mod derive;
pub mod error;
pub mod generator;
pub mod hasher;
pub mod kdf;
pub mod multibase;
pub mod schema;
pub mod wordlist;

pub use config::{Config, SiteConfig, SiteHashing, SiteProfile};
pub use derive::{generate, hash_site};
pub use error::{Error, Result};
pub use generator::PassacreGenerator;
pub use hasher::Algorithm;
pub use kdf::{Argon2Config, Kdf, ScryptConfig};
pub use multibase::{Base, MultiBase};
pub use schema::Schema;
pub use wordlist::Wordlist;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const LICENSE: &str = env!("CARGO_PKG_LICENSE");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_metadata() {
        assert_eq!(NAME, "passacre");
        assert_eq!(LICENSE, "ISC");
        assert!(!VERSION.is_empty());
    }
}
