//! The slice of an incoming request the menu layer reads: path, query string and an optional
//! user. Nothing here is ever mutated on behalf of the caller.

use http::Uri;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::MenuError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MenuRequest {
    path: String,
    query: Option<String>,
    user: Option<String>,
}

impl MenuRequest {
    /// Parse an origin-form request target such as `/a/b/?c=d`.
    pub fn new(full_path: &str) -> Result<MenuRequest, MenuError> {
        let uri: Uri = full_path.parse()?;
        Ok(MenuRequest::from(&uri))
    }

    pub fn with_user<S: Into<String>>(mut self, user: S) -> MenuRequest {
        self.user = Some(user.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Path plus `?query` when a non-empty query string is present.
    pub fn full_path(&self) -> String {
        match self.query() {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

impl From<&Uri> for MenuRequest {
    fn from(uri: &Uri) -> MenuRequest {
        let path = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        MenuRequest {
            path,
            query: uri.query().map(str::to_string),
            user: None,
        }
    }
}

impl<B> From<&http::Request<B>> for MenuRequest {
    fn from(req: &http::Request<B>) -> MenuRequest {
        MenuRequest::from(req.uri())
    }
}

impl Display for MenuRequest {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

/// Split an address into its path and (possibly empty) query component.
pub fn split_query(address: &str) -> (&str, &str) {
    match address.split_once('?') {
        Some((path, query)) => (path, query),
        None => (address, ""),
    }
}

/// Decoded `(key, value)` pairs, sorted so that two query strings compare as multisets.
pub fn query_multiset(query: &str) -> Vec<(String, String)> {
    let mut pairs = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
}
