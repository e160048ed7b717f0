use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::multibase::{Base, MultiBase};
use crate::wordlist::Wordlist;

pub const DIGITS: &str = "0123456789";
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";
pub const HEXDIGITS: &str = "0123456789abcdef";

pub const CLASS_NAMES: &[&str] = &[
    "digit",
    "lowercase",
    "uppercase",
    "letter",
    "alphanumeric",
    "punctuation",
    "printable",
    "hexdigit",
    "word",
];

enum Class {
    Chars(Vec<&'static str>),
    Word,
}

fn lookup_class(name: &str) -> Result<Class> {
    let parts: Vec<&'static str> = match name {
        "digit" => vec![DIGITS],
        "lowercase" => vec![LOWERCASE],
        "uppercase" => vec![UPPERCASE],
        "letter" => vec![LOWERCASE, UPPERCASE],
        "alphanumeric" => vec![DIGITS, LOWERCASE, UPPERCASE],
        "punctuation" => vec![PUNCTUATION],
        "printable" => vec![DIGITS, LOWERCASE, UPPERCASE, PUNCTUATION],
        "hexdigit" => vec![HEXDIGITS],
        "word" => return Ok(Class::Word),
        other => {
            return Err(Error::Schema(format!(
                "unknown character class {:?} (expected one of {})",
                other,
                CLASS_NAMES.join(", ")
            )));
        }
    };
    Ok(Class::Chars(parts))
}

/// One or several character classes drawn from as a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassSet {
    One(String),
    Union(Vec<String>),
}

impl ClassSet {
    fn names(&self) -> Vec<&str> {
        match self {
            ClassSet::One(name) => vec![name.as_str()],
            ClassSet::Union(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join("+"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaItem {
    Class(String),
    Repeat(usize, ClassSet),
    Literal {
        literal: String,
    },
    Words {
        words: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },
    Chars {
        chars: String,
        #[serde(default = "one")]
        count: usize,
    },
}

fn one() -> usize {
    1
}

impl fmt::Display for SchemaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaItem::Class(name) => write!(f, "{}", name),
            SchemaItem::Repeat(count, classes) => write!(f, "{}×{}", count, classes),
            SchemaItem::Literal { literal } => write!(f, "{:?}", literal),
            SchemaItem::Words { words, .. } => {
                write!(f, "{} {}", words, if *words == 1 { "word" } else { "words" })
            }
            SchemaItem::Chars { chars, count } => write!(f, "{}×[{}]", count, chars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum SchemaRepr {
    Plain(Vec<SchemaItem>),
    Full {
        items: Vec<SchemaItem>,
        #[serde(default)]
        shuffle: bool,
    },
}

/// How a password is laid out: which characters or words go where.
///
/// In YAML a schema is either a bare list of items or
/// `{items: [...], shuffle: true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SchemaRepr", into = "SchemaRepr")]
pub struct Schema {
    pub items: Vec<SchemaItem>,
    pub shuffle: bool,
}

impl From<SchemaRepr> for Schema {
    fn from(repr: SchemaRepr) -> Self {
        match repr {
            SchemaRepr::Plain(items) => Schema {
                items,
                shuffle: false,
            },
            SchemaRepr::Full { items, shuffle } => Schema { items, shuffle },
        }
    }
}

impl From<Schema> for SchemaRepr {
    fn from(schema: Schema) -> Self {
        if schema.shuffle {
            SchemaRepr::Full {
                items: schema.items,
                shuffle: true,
            }
        } else {
            SchemaRepr::Plain(schema.items)
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            items: vec![SchemaItem::Repeat(32, ClassSet::One("printable".to_string()))],
            shuffle: false,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shuffle {
            f.write_str("shuffled ")?;
        }
        let items: Vec<String> = self.items.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", items.join(", "))
    }
}

impl Schema {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn uses_words(&self) -> bool {
        self.items.iter().any(|item| match item {
            SchemaItem::Class(name) => name == "word",
            SchemaItem::Repeat(_, classes) => classes.names().contains(&"word"),
            SchemaItem::Words { .. } => true,
            _ => false,
        })
    }

    /// Lays the schema out as a [`MultiBase`].
    pub fn build(&self, wordlist: Option<&Wordlist>) -> Result<MultiBase> {
        if self.items.is_empty() {
            return Err(Error::Schema("schema has no items".to_string()));
        }

        let mut multibase = MultiBase::new();
        for item in &self.items {
            match item {
                SchemaItem::Class(name) => {
                    multibase.push(class_base(&[name.as_str()], wordlist)?);
                }
                SchemaItem::Repeat(count, classes) => {
                    check_count(*count)?;
                    let base = class_base(&classes.names(), wordlist)?;
                    for _ in 0..*count {
                        multibase.push(base.clone());
                    }
                }
                SchemaItem::Literal { literal } => {
                    multibase.push(Base::separator(literal)?);
                }
                SchemaItem::Words { words, separator } => {
                    check_count(*words)?;
                    let base = word_base(wordlist)?;
                    let separator = match separator.as_deref() {
                        Some(s) if !s.is_empty() => Some(Base::separator(s)?),
                        _ => None,
                    };
                    for i in 0..*words {
                        if i > 0 {
                            if let Some(sep) = &separator {
                                multibase.push(sep.clone());
                            }
                        }
                        multibase.push(base.clone());
                    }
                }
                SchemaItem::Chars { chars, count } => {
                    check_count(*count)?;
                    let base = Base::characters(chars)?;
                    for _ in 0..*count {
                        multibase.push(base.clone());
                    }
                }
            }
        }

        if self.shuffle {
            multibase.enable_shuffle();
        }
        Ok(multibase)
    }
}

fn check_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::Schema("item count must be at least 1".to_string()));
    }
    Ok(())
}

fn word_base(wordlist: Option<&Wordlist>) -> Result<Base> {
    let wordlist = wordlist.ok_or_else(|| {
        Error::Schema("schema uses words but no words-file is configured".to_string())
    })?;
    Base::new(wordlist.words().clone())
}

fn class_base(names: &[&str], wordlist: Option<&Wordlist>) -> Result<Base> {
    if names.is_empty() {
        return Err(Error::Schema("empty class list".to_string()));
    }

    let mut pool = String::new();
    let mut words = false;
    for name in names {
        match lookup_class(name)? {
            Class::Word => words = true,
            Class::Chars(parts) => {
                for c in parts.iter().flat_map(|p| p.chars()) {
                    if !pool.contains(c) {
                        pool.push(c);
                    }
                }
            }
        }
    }

    match (words, pool.is_empty()) {
        (true, true) => word_base(wordlist),
        (true, false) => Err(Error::Schema(
            "word cannot be combined with character classes".to_string(),
        )),
        (false, _) => Base::characters(&pool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn wordlist() -> Wordlist {
        Wordlist::from_text("correct\nhorse\nbattery\nstaple\n").unwrap()
    }

    #[test]
    fn test_class_sizes() {
        let sizes = [
            ("digit", 10),
            ("lowercase", 26),
            ("uppercase", 26),
            ("letter", 52),
            ("alphanumeric", 62),
            ("punctuation", 32),
            ("printable", 94),
            ("hexdigit", 16),
        ];
        for (name, size) in sizes {
            let base = class_base(&[name], None).unwrap();
            assert_eq!(base.radix(), size, "class {}", name);
        }
    }

    #[test]
    fn test_parse_plain_list() {
        let schema = Schema::from_yaml("[[32, printable]]").unwrap();
        assert_eq!(schema, Schema::default());
        assert!(!schema.shuffle);
    }

    #[test]
    fn test_parse_every_item_form() {
        let schema = Schema::from_yaml(
            r#"
items:
  - uppercase
  - [3, [digit, punctuation]]
  - {literal: "-"}
  - {words: 2, separator: " "}
  - {chars: "xyz", count: 2}
  - {chars: "q"}
shuffle: true
"#,
        )
        .unwrap();

        assert!(schema.shuffle);
        assert_eq!(
            schema.items,
            vec![
                SchemaItem::Class("uppercase".to_string()),
                SchemaItem::Repeat(
                    3,
                    ClassSet::Union(vec!["digit".to_string(), "punctuation".to_string()])
                ),
                SchemaItem::Literal {
                    literal: "-".to_string()
                },
                SchemaItem::Words {
                    words: 2,
                    separator: Some(" ".to_string())
                },
                SchemaItem::Chars {
                    chars: "xyz".to_string(),
                    count: 2
                },
                SchemaItem::Chars {
                    chars: "q".to_string(),
                    count: 1
                },
            ]
        );
        assert!(schema.uses_words());

        let multibase = schema.build(Some(&wordlist())).unwrap();
        // 1 + 3 + 1 + (2 words + 1 separator) + 2 + 1
        assert_eq!(multibase.len(), 11);
        assert_eq!(multibase.bases()[1].radix(), 42);
        assert!(multibase.is_shuffled());
    }

    #[test]
    fn test_yaml_round_trip_keeps_shape() {
        let schema = Schema {
            items: vec![SchemaItem::Repeat(8, ClassSet::One("alphanumeric".to_string()))],
            shuffle: true,
        };
        let yaml = serde_yaml::to_string(&schema).unwrap();
        assert!(yaml.contains("shuffle: true"));
        assert_eq!(Schema::from_yaml(&yaml).unwrap(), schema);
    }

    #[test]
    fn test_union_dedupes() {
        let base = class_base(&["hexdigit", "digit", "lowercase"], None).unwrap();
        assert_eq!(base.radix(), 16 + 20);
    }

    #[test]
    fn test_errors() {
        let unknown = Schema::from_yaml("[[4, emoji]]").unwrap().build(None);
        assert!(matches!(unknown, Err(Error::Schema(_))));

        let zero = Schema::from_yaml("[[0, digit]]").unwrap().build(None);
        assert!(matches!(zero, Err(Error::Schema(_))));

        let no_words = Schema::from_yaml("[[4, word]]").unwrap().build(None);
        assert!(matches!(no_words, Err(Error::Schema(_))));

        let mixed = Schema::from_yaml("[[4, [word, digit]]]").unwrap().build(Some(&wordlist()));
        assert!(matches!(mixed, Err(Error::Schema(_))));

        let empty = Schema::from_yaml("[]").unwrap().build(None);
        assert!(matches!(empty, Err(Error::Schema(_))));

        let dup = Schema::from_yaml("[{chars: aab}]").unwrap().build(None);
        assert!(matches!(dup, Err(Error::Schema(_))));
    }

    #[test]
    fn test_words_encode() {
        let schema = Schema::from_yaml("[{words: 2, separator: '-'}]").unwrap();
        let multibase = schema.build(Some(&wordlist())).unwrap();
        assert_eq!(multibase.max_encodable_value(), BigUint::from(16u32));
        assert_eq!(*multibase.encode(&BigUint::from(0u32)).unwrap(), "correct-correct");
        assert_eq!(*multibase.encode(&BigUint::from(7u32)).unwrap(), "horse-staple");
    }

    #[test]
    fn test_display() {
        let schema = Schema::from_yaml("[[16, [digit, uppercase]], {literal: '!'}]").unwrap();
        assert_eq!(schema.to_string(), "[16×digit+uppercase, \"!\"]");
        assert_eq!(Schema::default().to_string(), "[32×printable]");
    }
}
