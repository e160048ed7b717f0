use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Words available to `word` schema items, in file order.
///
/// Any change to the list (order included) changes every password that
/// draws from it, so a SHA-256 of the source text is kept for pinning.
#[derive(Debug, Clone)]
pub struct Wordlist {
    words: Arc<[String]>,
    sha256: String,
}

impl Wordlist {
    /// Parses one word per line. The last whitespace-separated field is used,
    /// so diceware files (`11111\tabacus`) load unchanged.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut words = Vec::new();
        let mut duplicates = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(word) = line.split_whitespace().last() else {
                continue;
            };
            if seen.insert(word) {
                words.push(word.to_string());
            } else {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!(duplicates, "word list contains duplicate words; keeping first occurrences");
        }
        if words.is_empty() {
            return Err(Error::Wordlist("word list is empty".to_string()));
        }

        Ok(Self {
            words: words.into(),
            sha256: format!("{:x}", Sha256::digest(text.as_bytes())),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let list = Self::from_text(&text)?;
        debug!(path = %path.display(), words = list.len(), "loaded word list");
        Ok(list)
    }

    /// Loads a word list and checks it against a pinned SHA-256, if any.
    pub fn load_verified(path: &Path, expected_sha256: Option<&str>) -> Result<Self> {
        let list = Self::load(path)?;
        if let Some(expected) = expected_sha256 {
            if !expected.trim().eq_ignore_ascii_case(&list.sha256) {
                return Err(Error::Wordlist(format!(
                    "{} has SHA-256 {}, expected {}",
                    path.display(),
                    list.sha256,
                    expected.trim()
                )));
            }
        }
        Ok(list)
    }

    pub fn words(&self) -> &Arc<[String]> {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}
