//! # Selector Matching
//!
//! A deliberately small subset of CSS selectors, covering what region,
//! exception, submit, ignored and presenter selectors need:
//!
//! ```text
//! list      := compound ("," compound)*
//! compound  := (tag | "*")? (("#" ident) | ("." ident) | attribute)*
//! attribute := "[" ident ("=" (ident | "'" .. "'" | '"' .. '"'))? "]"
//! ```
//!
//! There are no combinators and no pseudo-classes. A selector list
//! matches an element when any of its compounds does.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::SelectorError;

/// A parsed selector list. Serializes as its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let alternatives = Parser::new(input).parse_list()?;
        Ok(Self {
            source: input.trim().to_string(),
            alternatives,
        })
    }

    /// A selector that matches no element.
    pub fn none() -> Self {
        Self {
            source: String::new(),
            alternatives: Vec::new(),
        }
    }

    /// The selector text as written (trimmed).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether any compound of the list matches `element`.
    pub fn matches(&self, element: &Element) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }
}

impl Compound {
    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.ids.iter().all(|id| el.id() == Some(id.as_str()))
            && self.classes.iter().all(|c| el.has_class(c))
            && self.attributes.iter().all(|a| match &a.value {
                None => el.has_attr(&a.name),
                Some(v) => el.attr(&a.name) == Some(v.as_str()),
            })
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Selector> for String {
    fn from(s: Selector) -> Self {
        s.source
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            input: self.input.to_string(),
            offset: self.offset(),
            found,
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            input: self.input.to_string(),
            what,
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Compound>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_whitespace();
            list.push(self.parse_compound()?);
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(list),
                Some(',') => {
                    self.pos += 1;
                }
                Some(c) => return Err(self.unexpected(c)),
            }
        }
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut seen_any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                seen_any = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_ident("tag name")?.to_ascii_lowercase());
                seen_any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.parse_ident("id")?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident("class name")?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
            seen_any = true;
        }

        if seen_any {
            return Ok(compound);
        }
        match self.peek() {
            None | Some(',') => Err(SelectorError::Empty {
                input: self.input.to_string(),
            }),
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn parse_ident(&mut self, what: &'static str) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                None => Err(self.unterminated(what)),
                Some(c) => Err(self.unexpected(c)),
            };
        }
        Ok(self.chars[start..self.pos].iter().map(|&(_, c)| c).collect())
    }

    fn parse_attribute(&mut self) -> Result<AttributeMatch, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident("attribute selector")?;
        self.skip_whitespace();

        let value = match self.bump() {
            None => return Err(self.unterminated("attribute selector")),
            Some(']') => return Ok(AttributeMatch { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(q @ ('"' | '\'')) => {
                        self.pos += 1;
                        self.parse_quoted(q)?
                    }
                    _ => self.parse_ident("attribute selector")?,
                };
                self.skip_whitespace();
                value
            }
            Some(c) => {
                self.pos -= 1;
                return Err(self.unexpected(c));
            }
        };

        match self.peek() {
            None => Err(self.unterminated("attribute selector")),
            Some(']') => {
                self.pos += 1;
                Ok(AttributeMatch {
                    name,
                    value: Some(value),
                })
            }
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.unterminated("quoted value")),
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
