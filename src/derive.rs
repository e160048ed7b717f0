use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{SiteHashing, SiteProfile};
use crate::error::Result;
use crate::generator::{PassacreGenerator, generate_from_multibase};
use crate::schema::{ClassSet, Schema, SchemaItem};
use crate::wordlist::Wordlist;

const SITE_HASH_LENGTH: usize = 40;

/// Builds a generator that has absorbed everything `profile` asks for.
pub fn build_generator(password: &[u8], profile: &SiteProfile) -> Result<PassacreGenerator> {
    let mut generator = PassacreGenerator::new(profile.method);
    if let Some(kdf) = profile.kdf {
        generator.use_kdf(kdf)?;
    }
    let site = profile.site_input();
    generator.absorb_username_password_site(
        profile.username.as_deref().map(str::as_bytes),
        password,
        site.as_bytes(),
    )?;
    generator.absorb_null_rounds(profile.iterations)?;
    Ok(generator)
}

/// Derives the password for `profile`. The same inputs always give the
/// same password.
pub fn generate(
    password: &[u8],
    profile: &SiteProfile,
    wordlist: Option<&Wordlist>,
) -> Result<Zeroizing<String>> {
    let multibase = profile.schema.build(wordlist)?;
    debug!(
        method = %profile.method,
        iterations = profile.iterations,
        kdf = profile.kdf.map(|k| k.name()),
        entropy_bits = multibase.entropy_bits(),
        "generating password"
    );
    let mut generator = build_generator(password, profile)?;
    generate_from_multibase(&mut generator, &multibase)
}

/// The schema hashed site names are encoded with.
pub fn site_hash_schema() -> Schema {
    Schema {
        items: vec![SchemaItem::Repeat(
            SITE_HASH_LENGTH,
            ClassSet::Union(vec!["lowercase".to_string(), "digit".to_string()]),
        )],
        shuffle: false,
    }
}

/// Obscures a site name so the config file does not list the sites in clear.
pub fn hash_site(password: &[u8], site: &str, hashing: &SiteHashing) -> Result<String> {
    let profile = SiteProfile {
        method: hashing.method,
        iterations: hashing.iterations,
        schema: site_hash_schema(),
        ..SiteProfile::new(site)
    };
    let hashed = generate(password, &profile, None)?;
    Ok(hashed.to_string())
}
