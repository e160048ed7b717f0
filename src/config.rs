//! YAML configuration: per-site generation parameters.
//!
//! ```yaml
//! words-file: /usr/share/dict/words
//! site-hashing: {enabled: false, method: keccak, iterations: 10}
//! schemata:
//!   32-printable: [[32, printable]]
//! sites:
//!   default: {method: keccak, iterations: 1000, schema: 32-printable}
//!   example.com: {schema: [[16, alphanumeric]], increment: 2, username: alice}
//! ```
//!
//! Every site inherits from the `default` entry, which in turn falls back to
//! the built-in defaults.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::derive::hash_site;
use crate::error::{Error, Result};
use crate::hasher::Algorithm;
use crate::kdf::Kdf;
use crate::schema::Schema;
use crate::wordlist::Wordlist;

pub const DEFAULT_SITE: &str = "default";
pub const DEFAULT_ITERATIONS: usize = 1000;
pub const CONFIG_ENV_VAR: &str = "PASSACRE_CONFIG";

/// A schema given inline or by its name in `schemata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Named(String),
    Inline(Schema),
}

impl SchemaRef {
    /// Parses a schema name or an inline YAML schema, as typed on the command line.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Per-site overrides; unset fields are inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Algorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub kdf: Option<Kdf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SiteHashing {
    pub enabled: bool,
    pub method: Algorithm,
    pub iterations: usize,
}

impl Default for SiteHashing {
    fn default() -> Self {
        Self {
            enabled: false,
            method: Algorithm::Keccak,
            iterations: 10,
        }
    }
}

/// Everything needed to derive one site's password, minus the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub site: String,
    pub method: Algorithm,
    pub iterations: usize,
    pub schema: Schema,
    pub increment: u32,
    pub username: Option<String>,
    pub kdf: Option<Kdf>,
}

impl SiteProfile {
    /// A profile built only from the built-in defaults.
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            method: Algorithm::Keccak,
            iterations: DEFAULT_ITERATIONS,
            schema: Schema::default(),
            increment: 0,
            username: None,
            kdf: None,
        }
    }

    /// The site string fed to the generator; revisions append `|increment`.
    pub fn site_input(&self) -> String {
        if self.increment > 0 {
            format!("{}|{}", self.site, self.increment)
        } else {
            self.site.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words_sha256: Option<String>,
    #[serde(default)]
    pub site_hashing: SiteHashing,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemata: BTreeMap<String, Schema>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

/// Candidate config files, most preferred first.
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".passacre.yaml"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("passacre").join("passacre.yaml"));
    }
    paths
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_yaml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.path = Some(path.to_path_buf());
        debug!(path = %path.display(), sites = config.sites.len(), "loaded config");
        Ok(config)
    }

    /// Loads `explicit`, then `$PASSACRE_CONFIG`, then the first existing
    /// default path. With nothing found, returns an empty config that will
    /// be saved to the first default path.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        let candidates = default_paths();
        if let Some(path) = candidates.iter().find(|p| p.is_file()) {
            return Self::load(path);
        }

        info!("no config file found; using built-in defaults");
        Ok(Config {
            path: candidates.into_iter().next(),
            ..Config::default()
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Config("config has no file path".to_string()))?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        fs::write(path, text).map_err(|e| Error::io(path, e))?;
        info!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Checks that every schema reference resolves and every KDF is usable.
    pub fn validate(&self) -> Result<()> {
        for (name, site) in &self.sites {
            if let Some(schema) = &site.schema {
                self.resolve_schema(schema)
                    .map_err(|e| Error::Config(format!("site {:?}: {}", name, e)))?;
            }
            if let Some(kdf) = &site.kdf {
                kdf.validate()
                    .map_err(|e| Error::Config(format!("site {:?}: {}", name, e)))?;
            }
        }
        Ok(())
    }

    pub fn resolve_schema(&self, schema: &SchemaRef) -> Result<Schema> {
        match schema {
            SchemaRef::Inline(schema) => Ok(schema.clone()),
            SchemaRef::Named(name) => self
                .schemata
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Config(format!("unknown schema {:?}", name))),
        }
    }

    /// The key `site` is stored under. Hashed configs need the password.
    pub fn site_key(&self, site: &str, password: Option<&[u8]>) -> Result<String> {
        if !self.site_hashing.enabled {
            return Ok(site.to_string());
        }
        let password = password.ok_or_else(|| {
            Error::Config("site hashing is enabled; the password is required".to_string())
        })?;
        hash_site(password, site, &self.site_hashing)
    }

    /// Resolves `site` (stored under `key`) over `default` and the built-ins.
    pub fn site_profile(&self, site: &str, key: &str) -> Result<SiteProfile> {
        let mut profile = SiteProfile::new(site);
        if let Some(defaults) = self.sites.get(DEFAULT_SITE) {
            self.apply(&mut profile, defaults)?;
        }
        match self.sites.get(key) {
            Some(overrides) if key != DEFAULT_SITE => self.apply(&mut profile, overrides)?,
            Some(_) => {}
            None => debug!("site not configured; using defaults"),
        }
        Ok(profile)
    }

    fn apply(&self, profile: &mut SiteProfile, overrides: &SiteConfig) -> Result<()> {
        if let Some(method) = overrides.method {
            profile.method = method;
        }
        if let Some(iterations) = overrides.iterations {
            profile.iterations = iterations;
        }
        if let Some(schema) = &overrides.schema {
            profile.schema = self.resolve_schema(schema)?;
        }
        if let Some(increment) = overrides.increment {
            profile.increment = increment;
        }
        if let Some(username) = &overrides.username {
            profile.username = Some(username.clone());
        }
        if let Some(kdf) = overrides.kdf {
            profile.kdf = Some(kdf);
        }
        Ok(())
    }

    pub fn site_names(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn add_site(&mut self, key: &str, site: SiteConfig) -> Result<()> {
        if self.sites.contains_key(key) {
            return Err(Error::Config(format!("site {:?} already exists", key)));
        }
        if let Some(schema) = &site.schema {
            self.resolve_schema(schema)?;
        }
        if let Some(kdf) = &site.kdf {
            kdf.validate()?;
        }
        self.sites.insert(key.to_string(), site);
        Ok(())
    }

    pub fn remove_site(&mut self, key: &str) -> Result<SiteConfig> {
        self.sites
            .remove(key)
            .ok_or_else(|| Error::Config(format!("site {:?} does not exist", key)))
    }

    /// Loads the configured word list, if any. Relative paths are taken
    /// from the config file's directory and `~/` from the home directory.
    pub fn wordlist(&self) -> Result<Option<Wordlist>> {
        let Some(words_file) = &self.words_file else {
            return Ok(None);
        };
        let path = self.expand_path(words_file);
        Wordlist::load_verified(&path, self.words_sha256.as_deref()).map(Some)
    }

    fn expand_path(&self, path: &Path) -> PathBuf {
        if let Ok(rest) = path.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        if path.is_relative() {
            if let Some(dir) = self.path.as_deref().and_then(Path::parent) {
                return dir.join(path);
            }
        }
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::ScryptConfig;
    use crate::schema::{ClassSet, SchemaItem};

    const SAMPLE: &str = r#"
words-file: words.txt
schemata:
  pin: [[6, digit]]
sites:
  default:
    method: skein
    iterations: 50
  example.com:
    schema: [[16, alphanumeric]]
    increment: 2
    username: alice
    kdf:
      scrypt: {n: 16384, r: 8, p: 1}
  bank:
    schema: pin
    method: keccak
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.words_file.as_deref(), Some(Path::new("words.txt")));
        assert!(!config.site_hashing.enabled);
        assert_eq!(
            config.site_names().collect::<Vec<_>>(),
            ["bank", "default", "example.com"]
        );
        assert_eq!(
            config.sites["example.com"].kdf,
            Some(Kdf::Scrypt(ScryptConfig {
                n: 16384,
                r: 8,
                p: 1
            }))
        );
    }

    #[test]
    fn test_profile_inheritance() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        let profile = config.site_profile("example.com", "example.com").unwrap();
        assert_eq!(profile.method, Algorithm::Skein);
        assert_eq!(profile.iterations, 50);
        assert_eq!(profile.increment, 2);
        assert_eq!(profile.username.as_deref(), Some("alice"));
        assert_eq!(
            profile.schema.items,
            vec![SchemaItem::Repeat(16, ClassSet::One("alphanumeric".to_string()))]
        );
        assert_eq!(profile.site_input(), "example.com|2");

        let bank = config.site_profile("bank", "bank").unwrap();
        assert_eq!(bank.method, Algorithm::Keccak);
        assert_eq!(bank.iterations, 50);
        assert_eq!(bank.schema, Schema::from_yaml("[[6, digit]]").unwrap());
        assert_eq!(bank.site_input(), "bank");

        let unknown = config.site_profile("other.org", "other.org").unwrap();
        assert_eq!(unknown.method, Algorithm::Skein);
        assert_eq!(unknown.schema, Schema::default());
        assert_eq!(unknown.kdf, None);
    }

    #[test]
    fn test_builtin_defaults() {
        let config = Config::from_yaml("").unwrap();
        let profile = config.site_profile("x", "x").unwrap();
        assert_eq!(profile, SiteProfile::new("x"));
        assert_eq!(profile.iterations, DEFAULT_ITERATIONS);
        assert_eq!(profile.method, Algorithm::Keccak);
    }

    #[test]
    fn test_unknown_schema_name_rejected() {
        let err = Config::from_yaml("sites: {a: {schema: nope}}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_yaml("sites: {a: {iteration: 3}}").is_err());
    }

    #[test]
    fn test_bad_kdf_rejected() {
        let err = Config::from_yaml("sites: {a: {kdf: {scrypt: {n: 100, r: 8, p: 1}}}}");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_site_key_hashing() {
        let mut config = Config::from_yaml("").unwrap();
        assert_eq!(config.site_key("example.com", None).unwrap(), "example.com");

        config.site_hashing.enabled = true;
        config.site_hashing.iterations = 1;
        assert!(config.site_key("example.com", None).is_err());
        let hashed = config.site_key("example.com", Some(b"pw")).unwrap();
        assert_ne!(hashed, "example.com");
        assert_eq!(hashed, config.site_key("example.com", Some(b"pw")).unwrap());
    }

    #[test]
    fn test_add_remove_save_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("passacre.yaml");

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.set_path(&path);
        config
            .add_site(
                "new.example",
                SiteConfig {
                    schema: Some(SchemaRef::Named("pin".to_string())),
                    increment: Some(1),
                    ..SiteConfig::default()
                },
            )
            .unwrap();
        assert!(config.add_site("new.example", SiteConfig::default()).is_err());
        assert!(
            config
                .add_site(
                    "broken",
                    SiteConfig {
                        schema: Some(SchemaRef::Named("missing".to_string())),
                        ..SiteConfig::default()
                    }
                )
                .is_err()
        );
        config.remove_site("bank").unwrap();
        assert!(config.remove_site("bank").is_err());
        config.save().unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.path(), Some(path.as_path()));
        assert_eq!(reloaded.sites, config.sites);
        assert_eq!(reloaded.schemata, config.schemata);
        let profile = reloaded.site_profile("new.example", "new.example").unwrap();
        assert_eq!(profile.site_input(), "new.example|1");
    }

    #[test]
    fn test_wordlist_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("words.txt"), "alpha\nbeta\n").unwrap();
        let path = dir.path().join("passacre.yaml");
        fs::write(&path, "words-file: words.txt\n").unwrap();

        let config = Config::load(&path).unwrap();
        let words = config.wordlist().unwrap().unwrap();
        assert_eq!(words.len(), 2);

        assert!(Config::from_yaml("").unwrap().wordlist().unwrap().is_none());
    }

    #[test]
    fn test_schema_ref_from_cli_text() {
        assert_eq!(
            SchemaRef::from_yaml("pin").unwrap(),
            SchemaRef::Named("pin".to_string())
        );
        let inline = SchemaRef::from_yaml("[[8, hexdigit]]").unwrap();
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.resolve_schema(&inline).unwrap(),
            Schema::from_yaml("[[8, hexdigit]]").unwrap()
        );
    }

    // Environment lookups are process-wide, so every ordering case lives in one test.
    #[test]
    fn test_discover_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("env.yaml");
        let explicit = dir.path().join("explicit.yaml");
        fs::write(&from_env, "sites: {from-env: {increment: 1}}\n").unwrap();
        fs::write(&explicit, "sites: {explicit: {increment: 1}}\n").unwrap();

        let home = tempfile::tempdir().unwrap();
        let saved: Vec<_> = [CONFIG_ENV_VAR, "HOME", "XDG_CONFIG_HOME"]
            .into_iter()
            .map(|key| (key, env::var_os(key)))
            .collect();
        unsafe {
            env::set_var(CONFIG_ENV_VAR, &from_env);
            env::set_var("HOME", home.path());
            env::set_var("XDG_CONFIG_HOME", home.path().join(".config"));
        }

        let config = Config::discover(Some(&explicit)).unwrap();
        assert_eq!(config.path(), Some(explicit.as_path()));
        assert_eq!(config.site_names().collect::<Vec<_>>(), ["explicit"]);

        let config = Config::discover(None).unwrap();
        assert_eq!(config.path(), Some(from_env.as_path()));
        assert_eq!(config.site_names().collect::<Vec<_>>(), ["from-env"]);

        unsafe { env::set_var(CONFIG_ENV_VAR, dir.path().join("missing.yaml")) };
        let err = Config::discover(None).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        unsafe { env::remove_var(CONFIG_ENV_VAR) };
        let config = Config::discover(None).unwrap();
        let home_config = home.path().join(".passacre.yaml");
        assert_eq!(config.path(), Some(home_config.as_path()));
        assert_eq!(config.site_names().count(), 0);

        let xdg_config = default_paths()[1].clone();
        fs::create_dir_all(xdg_config.parent().unwrap()).unwrap();
        fs::write(&xdg_config, "sites: {xdg: {increment: 1}}\n").unwrap();
        let config = Config::discover(None).unwrap();
        assert_eq!(config.path(), Some(xdg_config.as_path()));
        assert_eq!(config.site_names().collect::<Vec<_>>(), ["xdg"]);

        for (key, value) in saved {
            match value {
                Some(value) => unsafe { env::set_var(key, value) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/passacre.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
