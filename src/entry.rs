//! Persisted menu entries: the records kept by the tree storage engine.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    error::MenuError,
    slug::{entry_slug, MENU_SLUG_MAX_LENGTH},
    uri::ObjectRef,
};

pub type EntryId = u64;
pub type SiteId = u64;

pub const TITLE_MAX_LENGTH: usize = 50;

/// Accepted prefixes for a stored `uri`.
pub const VALID_URI_PREFIXES: [&str; 6] = ["http://", "https://", "//", "/", "../", "./"];

static TEMPLATE_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("static regex"));
static FORMAT_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("static regex"));

pub fn validate_uri(value: &str) -> Result<(), MenuError> {
    if VALID_URI_PREFIXES.iter().any(|p| value.starts_with(p)) {
        Ok(())
    } else {
        Err(MenuError::Validation(format!("Invalid URL: '{value}'")))
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: EntryId,
    pub site_id: SiteId,
    /// Materialized tree path; structural only, never shown to users.
    pub path: String,
    /// 1 for roots.
    pub depth: usize,
    pub numchild: usize,
    pub menu_slug: String,
    pub title: String,
    pub uri: String,
    pub is_published: bool,
    #[serde(default)]
    pub original: Option<ObjectRef>,
    /// Unix seconds.
    pub created: u64,
    pub modified: u64,
}

impl MenuEntry {
    pub fn href(&self) -> &str {
        &self.uri
    }

    pub fn original_object(&self) -> Option<&ObjectRef> {
        self.original.as_ref()
    }

    pub fn parsed_title(&self, context: &BTreeMap<String, String>) -> String {
        TemplatedTitle::new(&self.title).render(context)
    }

    pub fn is_root(&self) -> bool {
        self.depth == 1
    }
}

impl Display for MenuEntry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "<MenuEntry: title: {}, published: {}, uri: {}>",
            self.title, self.is_published, self.uri
        )
    }
}

/// Field values for an entry about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewEntry {
    pub title: String,
    pub uri: String,
    /// Derived from `uri` when absent.
    #[serde(default)]
    pub menu_slug: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub original: Option<ObjectRef>,
}

impl NewEntry {
    pub fn new<T: Into<String>, U: Into<String>>(title: T, uri: U) -> NewEntry {
        NewEntry {
            title: title.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn published(mut self, is_published: bool) -> NewEntry {
        self.is_published = is_published;
        self
    }

    pub fn with_slug<S: Into<String>>(mut self, slug: S) -> NewEntry {
        self.menu_slug = Some(slug.into());
        self
    }

    pub fn with_original(mut self, original: Option<ObjectRef>) -> NewEntry {
        self.original = original;
        self
    }

    /// Check field constraints and settle the slug.
    pub fn validate(mut self) -> Result<NewEntry, MenuError> {
        validate_uri(&self.uri)?;
        if self.title.trim().is_empty() {
            return Err(MenuError::Validation("title may not be blank".to_string()));
        }
        if self.title.chars().count() > TITLE_MAX_LENGTH {
            return Err(MenuError::Validation(format!(
                "title '{}' exceeds {} characters",
                self.title, TITLE_MAX_LENGTH
            )));
        }
        let slug = match self.menu_slug.take() {
            Some(slug) if !slug.is_empty() => slug,
            _ => entry_slug(&self.uri, &self.title),
        };
        if slug.chars().count() > MENU_SLUG_MAX_LENGTH {
            return Err(MenuError::Validation(format!(
                "menu slug '{slug}' exceeds {MENU_SLUG_MAX_LENGTH} characters"
            )));
        }
        self.menu_slug = Some(slug);
        Ok(self)
    }
}

/// A title that may carry `{{ var }}` or `{var}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct TemplatedTitle<'a> {
    title: &'a str,
}

impl<'a> TemplatedTitle<'a> {
    pub fn new(title: &'a str) -> TemplatedTitle<'a> {
        TemplatedTitle { title }
    }

    fn is_balanced(&self, prefix: &str, suffix: &str) -> bool {
        let lefts = self.title.matches(prefix).count();
        lefts > 0 && self.title.matches(suffix).count() == lefts
    }

    pub fn has_balanced_template_params(&self) -> bool {
        self.is_balanced("{{", "}}")
    }

    pub fn has_balanced_format_params(&self) -> bool {
        self.is_balanced("{", "}")
    }

    pub fn needs_parsing(&self) -> bool {
        self.has_balanced_template_params() || self.has_balanced_format_params()
    }

    /// Template variables missing from `context` render empty; a format title with a
    /// missing key is returned verbatim.
    pub fn render(&self, context: &BTreeMap<String, String>) -> String {
        if !self.title.contains('{') {
            return self.title.to_string();
        }
        if self.has_balanced_template_params() {
            return TEMPLATE_VAR_RE
                .replace_all(self.title, |caps: &Captures| {
                    context.get(&caps[1]).cloned().unwrap_or_default()
                })
                .into_owned();
        }
        if self.has_balanced_format_params() {
            let all_known = FORMAT_VAR_RE
                .captures_iter(self.title)
                .all(|caps| context.contains_key(&caps[1]));
            if all_known {
                return FORMAT_VAR_RE
                    .replace_all(self.title, |caps: &Captures| context[&caps[1]].clone())
                    .into_owned();
            }
        }
        self.title.to_string()
    }
}
