use anyhow::{Context, Result};
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use passacre::config::SiteProfile;
use passacre::kdf::Kdf;
use rpassword::read_password;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

pub const MIN_SAFE_ENTROPY: f64 = 64.0;
pub const PARANOID_ENTROPY: f64 = 128.0;

pub const MIN_SAFE_PASSWORD_LENGTH: usize = 16;
pub const MIN_SAFE_ITERATIONS: usize = 100;
pub const MAX_PASSWORD_BYTES: usize = 1024 * 1024;

pub const MIN_SCRYPT_N: u64 = 1 << 14;
pub const MIN_SCRYPT_R: u32 = 8;
pub const MIN_KDF_MEMORY_MIB: u32 = 32;
pub const MIN_KDF_ITERATIONS: u32 = 8;

pub struct DisplayOptions {
    pub unicode_support: bool,
    pub color_support: bool,
    pub quiet: bool,
}

impl DisplayOptions {
    pub fn detect(quiet: bool) -> Self {
        Self {
            unicode_support: detect_unicode_support(),
            color_support: detect_color_support(),
            quiet,
        }
    }

    fn style(&self, secure: bool) -> Style {
        if !self.color_support {
            Style::new()
        } else if secure {
            Style::new().green()
        } else {
            Style::new().yellow()
        }
    }

    fn status(&self, secure: bool) -> &'static str {
        let (ok, warn) = get_status_symbols(self.unicode_support);
        if secure { ok } else { warn }
    }

    fn branches(&self) -> (&'static str, &'static str) {
        if self.unicode_support {
            ("├─", "└─")
        } else {
            ("|-", "`-")
        }
    }
}

pub fn detect_unicode_support() -> bool {
    supports_unicode::on(supports_unicode::Stream::Stdout)
}

pub fn detect_color_support() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

pub fn get_status_symbols(unicode_support: bool) -> (&'static str, &'static str) {
    if unicode_support {
        ("✓", "!")
    } else {
        ("+", "!")
    }
}

fn control_character_positions(s: &str) -> Vec<usize> {
    s.chars()
        .enumerate()
        .filter(|(_, c)| c.is_control())
        .map(|(pos, _)| pos)
        .collect()
}

fn confirm_control_characters(s: &str, input_name: &str) -> Result<()> {
    let positions = control_character_positions(s);
    if positions.is_empty() {
        return Ok(());
    }

    let term = Term::stderr();
    let warning_msg = format!(
        "WARNING: {} contains {} control character(s) at position(s): {}",
        input_name,
        positions.len(),
        positions
            .iter()
            .map(|pos| pos.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    term.write_line(&warning_msg)?;
    term.write_str("Continue anyway? [y/N]: ")?;
    term.flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();

    term.clear_last_lines(2)?;

    if response != "y" && response != "yes" {
        anyhow::bail!("Aborted.");
    }
    Ok(())
}

/// NFC-normalizes `s`, trimming surrounding whitespace when asked.
pub fn normalize(s: &str, trim: bool) -> String {
    let s = if trim { s.trim() } else { s };
    s.nfc().collect()
}

fn normalize_and_validate(s: &str, input_name: &str, trim: bool) -> Result<String> {
    let normalized = normalize(s, trim);
    confirm_control_characters(&normalized, input_name)?;
    Ok(normalized)
}

fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let secret = read_password().context("Failed to read password")?;
    Ok(Zeroizing::new(secret))
}

/// Reads the master password; with `confirm`, asks twice and compares.
///
/// The password is NFC-normalized but not trimmed.
pub fn prompt_password(confirm: bool) -> Result<Zeroizing<Vec<u8>>> {
    let password = read_secret("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    if confirm {
        let again = read_secret("Confirm password: ")?;
        if *again != *password {
            anyhow::bail!("Passwords do not match");
        }
    }

    let normalized = Zeroizing::new(normalize_and_validate(&password, "Password", false)?);
    if normalized.len() > MAX_PASSWORD_BYTES {
        anyhow::bail!(
            "Password too long ({} bytes, maximum is {})",
            normalized.len(),
            MAX_PASSWORD_BYTES
        );
    }
    Ok(Zeroizing::new(normalized.as_bytes().to_vec()))
}

pub fn prompt_site() -> Result<String> {
    eprint!("Site: ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read site name")?;

    let site = normalize_and_validate(&input, "Site", true)?;
    if site.is_empty() {
        anyhow::bail!("Site cannot be empty");
    }
    Ok(site)
}

pub fn show_progress<F, T>(unicode_support: bool, f: F) -> Result<(T, Duration)>
where
    F: FnOnce() -> Result<T>,
{
    let term = Term::stderr();
    term.hide_cursor().ok();

    let pb = ProgressBar::new_spinner();

    if unicode_support {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("-\\|/-"),
        );
    }

    pb.set_message("Deriving password...");
    pb.enable_steady_tick(Duration::from_millis(80));

    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    pb.finish_and_clear();
    term.show_cursor().ok();

    result.map(|r| (r, elapsed))
}

/// Rating and whether it counts as safe.
pub fn entropy_rating(bits: f64) -> (&'static str, bool) {
    if bits >= PARANOID_ENTROPY {
        ("Paranoid", true)
    } else if bits >= MIN_SAFE_ENTROPY {
        ("Strong", true)
    } else {
        ("Weak", false)
    }
}

pub fn kdf_is_secure(kdf: Option<&Kdf>) -> bool {
    match kdf {
        None => false,
        Some(Kdf::Scrypt(c)) => c.n >= MIN_SCRYPT_N && c.r >= MIN_SCRYPT_R,
        Some(Kdf::Argon2(c)) => {
            c.memory_mib() >= MIN_KDF_MEMORY_MIB && c.iterations >= MIN_KDF_ITERATIONS
        }
    }
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

pub fn display_output(
    output: &Zeroizing<String>,
    profile: &SiteProfile,
    entropy_bits: f64,
    elapsed: Duration,
    options: &DisplayOptions,
) {
    if options.quiet {
        println!("{}", &**output);
        return;
    }

    println!("{}\n", &**output);
    display_settings(profile, options);
    display_stats(entropy_bits, output.chars().count(), elapsed, options);
}

pub fn display_settings(profile: &SiteProfile, options: &DisplayOptions) {
    let (branch, last) = options.branches();

    let kdf_secure = kdf_is_secure(profile.kdf.as_ref());
    let kdf_style = options.style(kdf_secure);
    let rounds_secure = profile.iterations >= MIN_SAFE_ITERATIONS || kdf_secure;
    let rounds_style = options.style(rounds_secure);

    println!("Settings:");
    if profile.increment > 0 {
        println!(
            "  {} Site       {} (revision {})",
            branch, profile.site, profile.increment
        );
    } else {
        println!("  {} Site       {}", branch, profile.site);
    }
    println!(
        "  {} Username   {}",
        branch,
        profile.username.as_deref().unwrap_or("(none)")
    );
    println!(
        "  {} Method     {} {}, {} null {}",
        branch,
        rounds_style.apply_to(format!("[{}]", options.status(rounds_secure))),
        profile.method,
        rounds_style.apply_to(profile.iterations),
        plural(profile.iterations, "round", "rounds")
    );
    println!(
        "  {} KDF        {} {}",
        branch,
        kdf_style.apply_to(format!("[{}]", options.status(kdf_secure))),
        kdf_style.apply_to(
            profile
                .kdf
                .map(|k| k.describe())
                .unwrap_or_else(|| "none".to_string())
        )
    );
    println!("  {} Sampling   Unbiased rejection", branch);
    println!("  {} Schema     {}", last, profile.schema);
    println!();
}

fn display_stats(entropy: f64, length: usize, elapsed: Duration, options: &DisplayOptions) {
    let (branch, last) = options.branches();
    let (status_text, entropy_secure) = entropy_rating(entropy);
    let entropy_style = options.style(entropy_secure);
    let status_icon = options.status(entropy_secure);

    let length_secure = length >= MIN_SAFE_PASSWORD_LENGTH;
    let length_style = options.style(length_secure);

    println!("Stats:");
    println!(
        "  {} Entropy    {} {} bits ({})",
        branch,
        entropy_style.apply_to(format!("[{}]", status_icon)),
        entropy_style.apply_to(format!("{:.1}", entropy)),
        entropy_style.apply_to(status_text)
    );
    println!(
        "  {} Length     {} {} {}",
        branch,
        length_style.apply_to(format!("[{}]", options.status(length_secure))),
        length_style.apply_to(length),
        plural(length, "char", "chars")
    );
    println!("  {} Time       {:.1}s", last, elapsed.as_secs_f64());

    println!(
        "\n{} Security: {}",
        entropy_style.apply_to(format!("[{}]", status_icon)),
        entropy_style.apply_to(status_text)
    );
}

/// One line per site: entropy bits, rating, and schema.
pub fn display_entropy(rows: &[(String, Result<f64>)], options: &DisplayOptions) {
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, bits) in rows {
        match bits {
            Ok(bits) => {
                let (rating, secure) = entropy_rating(*bits);
                let style = options.style(secure);
                println!(
                    "{:width$}  {} {} bits ({})",
                    name,
                    style.apply_to(format!("[{}]", options.status(secure))),
                    style.apply_to(format!("{:.1}", bits)),
                    rating,
                    width = width
                );
            }
            Err(e) => println!("{:width$}  error: {:#}", name, e, width = width),
        }
    }
}
