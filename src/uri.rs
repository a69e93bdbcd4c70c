//! Candidate addresses for the menu: `(path, title)` pairs, optionally linked back to the
//! domain object they were derived from.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
};

use crate::error::MenuError;

/// Title used when a domain object yields nothing printable.
pub const NO_TITLE: &str = "<No title>";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Back-reference from a menu entry to the object it was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub content_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new<C: Into<String>, O: Into<String>>(content_type: C, object_id: O) -> ObjectRef {
        ObjectRef {
            content_type: content_type.into(),
            object_id: object_id.into(),
        }
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.object_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uri {
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ObjectRef>,
}

impl Uri {
    pub fn new<P: Into<String>, T: Into<String>>(path: P, title: T) -> Uri {
        Uri {
            path: path.into(),
            title: title.into(),
            origin: None,
        }
    }

    pub fn from_object<T: MenuObject + ?Sized>(obj: &T) -> Uri {
        Uri {
            path: obj.absolute_url(),
            title: clean_title(&obj.menu_title()),
            origin: obj.object_ref(),
        }
    }
}

impl Display for Uri {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.title)
    }
}

/// Capability a domain object implements to be represented in a menu.
pub trait MenuObject {
    fn absolute_url(&self) -> String;

    /// Human label; markup is stripped before use.
    fn menu_title(&self) -> String;

    fn object_ref(&self) -> Option<ObjectRef> {
        None
    }
}

/// Strip markup and whitespace; never returns an empty string.
pub fn clean_title(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        NO_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A named producer of candidate [Uri]s for reconciliation.
pub trait UrlSource: Send + Sync {
    fn verbose_name(&self) -> String;

    fn get_urls(&self) -> Result<Vec<Uri>, MenuError>;
}

type ObjectLoader<T> = Box<dyn Fn() -> Result<Vec<T>, MenuError> + Send + Sync>;

/// Turns every object returned by `loader` into a [Uri], keeping the first object seen for
/// any given path.
pub struct ObjectUrlSource<T> {
    verbose_name: String,
    loader: ObjectLoader<T>,
}

impl<T: MenuObject> ObjectUrlSource<T> {
    pub fn new<F>(verbose_name: &str, loader: F) -> ObjectUrlSource<T>
    where
        F: Fn() -> Result<Vec<T>, MenuError> + Send + Sync + 'static,
    {
        ObjectUrlSource {
            verbose_name: verbose_name.to_string(),
            loader: Box::new(loader),
        }
    }
}

impl<T: MenuObject> UrlSource for ObjectUrlSource<T> {
    fn verbose_name(&self) -> String {
        self.verbose_name.clone()
    }

    fn get_urls(&self) -> Result<Vec<Uri>, MenuError> {
        let mut seen = BTreeSet::new();
        let mut urls = Vec::new();
        for obj in (self.loader)()? {
            let uri = Uri::from_object(&obj);
            if seen.insert(uri.path.clone()) {
                urls.push(uri);
            }
        }
        Ok(urls)
    }
}

/// A fixed list of addresses, typically declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUrlSource {
    pub verbose_name: String,
    #[serde(default)]
    pub urls: Vec<Uri>,
}

impl UrlSource for StaticUrlSource {
    fn verbose_name(&self) -> String {
        self.verbose_name.clone()
    }

    fn get_urls(&self) -> Result<Vec<Uri>, MenuError> {
        Ok(self.urls.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct Post {
        id: u32,
        slug: &'static str,
        headline: &'static str,
    }

    impl MenuObject for Post {
        fn absolute_url(&self) -> String {
            format!("/posts/{}/", self.slug)
        }

        fn menu_title(&self) -> String {
            self.headline.to_string()
        }

        fn object_ref(&self) -> Option<ObjectRef> {
            Some(ObjectRef::new("blog.post", self.id.to_string()))
        }
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("<b>Hello</b> world "), "Hello world");
        assert_eq!(clean_title("   "), NO_TITLE);
        assert_eq!(clean_title("<em></em>"), NO_TITLE);
    }

    #[test]
    fn test_object_source_dedups_by_path() {
        let source = ObjectUrlSource::new("posts", || {
            Ok(vec![
                Post { id: 1, slug: "first", headline: "First" },
                Post { id: 2, slug: "first", headline: "Duplicate" },
                Post { id: 3, slug: "third", headline: "<i>Third</i>" },
            ])
        });
        let urls = source.get_urls().unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].title, "First");
        assert_eq!(urls[0].origin, Some(ObjectRef::new("blog.post", "1")));
        assert_eq!(urls[1].title, "Third");
    }
}
