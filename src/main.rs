mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use passacre::config::SchemaRef;
use passacre::{Algorithm, Config, SiteConfig, SiteProfile, Wordlist};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(
    name = "passacre",
    version,
    author,
    about = "Better repeatable password generation"
)]
struct Cli {
    /// Config file (defaults to $PASSACRE_CONFIG or ~/.passacre.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive the password for a site
    Generate(GenerateArgs),

    /// Show the entropy of one site's schema, or of every configured site
    Entropy { site: Option<String> },

    /// Show the resolved settings for a site
    Info { site: String },

    /// Manage configured sites
    #[command(subcommand)]
    Site(SiteCommand),
}

#[derive(Args)]
struct GenerateArgs {
    /// Site name; prompted for when omitted
    site: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    /// Ask for the password twice
    #[arg(long)]
    confirm: bool,

    /// Print only the password
    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    override_method: Option<Algorithm>,

    #[arg(long)]
    override_iterations: Option<usize>,

    /// Schema name or inline YAML schema
    #[arg(long)]
    override_schema: Option<String>,
}

#[derive(Subcommand)]
enum SiteCommand {
    /// List configured sites
    List,

    /// Print the hashed form of a site name
    Hash { site: String },

    /// Add a site to the config file
    Add {
        site: String,

        /// Schema name or inline YAML schema
        #[arg(long)]
        schema: Option<String>,

        #[arg(long)]
        increment: Option<u32>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        method: Option<Algorithm>,

        #[arg(long)]
        iterations: Option<usize>,
    },

    /// Remove a site from the config file
    Remove { site: String },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::discover(cli.config.as_deref()).context("Failed to load config")?;
    debug!(path = ?config.path(), "using config");

    match cli.command {
        Command::Generate(args) => run_generate(&config, args),
        Command::Entropy { site } => run_entropy(&config, site),
        Command::Info { site } => run_info(&config, &site),
        Command::Site(command) => run_site(&mut config, command),
    }
}

/// The password, when the config needs one just to find a site.
fn password_for_lookup(config: &Config) -> Result<Option<Zeroizing<Vec<u8>>>> {
    if config.site_hashing.enabled {
        Ok(Some(ui::prompt_password(false)?))
    } else {
        Ok(None)
    }
}

fn lookup_profile(config: &Config, site: &str, password: Option<&[u8]>) -> Result<SiteProfile> {
    let key = config.site_key(site, password)?;
    Ok(config.site_profile(site, &key)?)
}

fn wordlist_for(config: &Config, profile: &SiteProfile) -> Result<Option<Wordlist>> {
    if profile.schema.uses_words() {
        Ok(config.wordlist().context("Failed to load word list")?)
    } else {
        Ok(None)
    }
}

fn run_generate(config: &Config, args: GenerateArgs) -> Result<()> {
    let site = match args.site {
        Some(site) => ui::normalize(&site, true),
        None => ui::prompt_site()?,
    };
    let password = ui::prompt_password(args.confirm)?;

    let mut profile = lookup_profile(config, &site, Some(&password[..]))?;
    if let Some(username) = args.username {
        profile.username = Some(username);
    }
    if let Some(method) = args.override_method {
        profile.method = method;
    }
    if let Some(iterations) = args.override_iterations {
        profile.iterations = iterations;
    }
    if let Some(schema) = &args.override_schema {
        let schema = SchemaRef::from_yaml(schema).context("Invalid --override-schema")?;
        profile.schema = config.resolve_schema(&schema)?;
    }

    let wordlist = wordlist_for(config, &profile)?;
    let entropy_bits = profile.schema.build(wordlist.as_ref())?.entropy_bits();

    let options = ui::DisplayOptions::detect(args.quiet);
    let (output, elapsed) = ui::show_progress(options.unicode_support, || {
        Ok(passacre::generate(&password, &profile, wordlist.as_ref())?)
    })?;

    ui::display_output(&output, &profile, entropy_bits, elapsed, &options);
    Ok(())
}

/// One named site, or every configured site when none is given.
fn entropy_profiles(config: &Config, site: Option<String>) -> Result<Vec<(String, SiteProfile)>> {
    match site {
        Some(site) => {
            let site = ui::normalize(&site, true);
            let password = password_for_lookup(config)?;
            let profile = lookup_profile(config, &site, password.as_deref().map(|p| &p[..]))?;
            Ok(vec![(site, profile)])
        }
        None => config
            .site_names()
            .map(|key| Ok((key.to_string(), config.site_profile(key, key)?)))
            .collect(),
    }
}

fn run_entropy(config: &Config, site: Option<String>) -> Result<()> {
    let options = ui::DisplayOptions::detect(false);

    let rows: Vec<(String, Result<f64>)> = entropy_profiles(config, site)?
        .into_iter()
        .map(|(name, profile)| {
            let bits = wordlist_for(config, &profile).and_then(|words| {
                Ok(profile.schema.build(words.as_ref())?.entropy_bits())
            });
            (name, bits)
        })
        .collect();

    ui::display_entropy(&rows, &options);
    Ok(())
}

fn run_info(config: &Config, site: &str) -> Result<()> {
    let site = ui::normalize(site, true);
    let password = password_for_lookup(config)?;
    let profile = lookup_profile(config, &site, password.as_deref().map(|p| &p[..]))?;

    let options = ui::DisplayOptions::detect(false);
    ui::display_settings(&profile, &options);

    let wordlist = wordlist_for(config, &profile)?;
    let multibase = profile.schema.build(wordlist.as_ref())?;
    ui::display_entropy(&[(site, Ok(multibase.entropy_bits()))], &options);
    Ok(())
}

fn run_site(config: &mut Config, command: SiteCommand) -> Result<()> {
    match command {
        SiteCommand::List => {
            for name in config.site_names() {
                println!("{}", name);
            }
        }
        SiteCommand::Hash { site } => {
            let site = ui::normalize(&site, true);
            let password = ui::prompt_password(false)?;
            println!("{}", passacre::hash_site(&password, &site, &config.site_hashing)?);
        }
        SiteCommand::Add {
            site,
            schema,
            increment,
            username,
            method,
            iterations,
        } => {
            let site = ui::normalize(&site, true);
            let schema = schema
                .as_deref()
                .map(SchemaRef::from_yaml)
                .transpose()
                .context("Invalid --schema")?;
            let password = password_for_lookup(config)?;
            let key = config.site_key(&site, password.as_deref().map(|p| &p[..]))?;
            config.add_site(
                &key,
                SiteConfig {
                    method,
                    iterations,
                    schema,
                    increment,
                    username,
                    kdf: None,
                },
            )?;
            config.save().context("Failed to save config")?;
            eprintln!("Added {}", site);
        }
        SiteCommand::Remove { site } => {
            let site = ui::normalize(&site, true);
            let password = password_for_lookup(config)?;
            let key = config.site_key(&site, password.as_deref().map(|p| &p[..]))?;
            config.remove_site(&key)?;
            config.save().context("Failed to save config")?;
            eprintln!("Removed {}", site);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "passacre",
            "generate",
            "example.com",
            "-u",
            "alice",
            "--override-method",
            "skein",
            "--override-schema",
            "[[8, digit]]",
            "-q",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.site.as_deref(), Some("example.com"));
        assert_eq!(args.username.as_deref(), Some("alice"));
        assert_eq!(args.override_method, Some(Algorithm::Skein));
        assert_eq!(args.override_schema.as_deref(), Some("[[8, digit]]"));
        assert!(args.quiet);
        assert!(!args.confirm);
    }

    #[test]
    fn test_parse_rejects_unknown_method() {
        assert!(Cli::try_parse_from(["passacre", "generate", "--override-method", "md5"]).is_err());
    }

    #[test]
    fn test_entropy_site_is_normalized() {
        let config = Config::from_yaml("sites: {\"café\": {increment: 3}}").unwrap();

        let profiles = entropy_profiles(&config, Some("  cafe\u{0301}\n".to_string())).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].0, "café");
        assert_eq!(profiles[0].1.increment, 3);

        let all = entropy_profiles(&config, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "café");
    }

    #[test]
    fn test_parse_site_add_with_global_config() {
        let cli = Cli::try_parse_from([
            "passacre",
            "site",
            "add",
            "example.com",
            "--increment",
            "3",
            "--config",
            "/tmp/passacre.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/passacre.yaml")));
        match cli.command {
            Command::Site(SiteCommand::Add { site, increment, .. }) => {
                assert_eq!(site, "example.com");
                assert_eq!(increment, Some(3));
            }
            _ => panic!("expected site add"),
        }
    }
}
