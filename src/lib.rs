//! # menuhin
//!
//! Navigation menus for sites whose pages come from many places: generated by code, declared
//! in configuration, or curated by editors in a persisted tree.
//!
//! ## Overview
//!
//! menuhin keeps two related models of a site's navigation:
//!
//! - **Transient menus**: every registered [`collection::MenuSource`] produces a flat list of
//!   [`node::MenuNode`]s with parent pointers. A decoration [`processors::Pipeline`] turns that
//!   list into a cross-referenced tree (ancestors, descendants, depth) and marks the nodes
//!   that match the current request.
//! - **Persisted menus**: [`entry::MenuEntry`] rows in a materialized-path tree held by a
//!   [`store::MenuStore`]. Editors publish, reorder and retitle these; the
//!   [`reconcile`] module keeps them in step with the addresses the site actually serves.
//!
//! ### Key Features
//!
//! - **Phase-complete decoration**: each processor sees the whole node set before the next
//!   one runs, so results never depend on input order
//! - **Idempotent reconciliation**: importing the same candidate URLs twice writes nothing
//!   the second time; new entries always start unpublished
//! - **Editorial overrides**: custom items insert above, below or in place of generated nodes
//!   and can graft another source's nodes under them
//! - **Explicit wiring**: sources are registered in a [`registry::MenuRegistry`] and served
//!   through a [`registry::MenuContext`] created at startup and rebuilt with `reload()`
//!
//! ## Architecture
//!
//! - **[`processors`]**: `MenuTree` index and the Ancestry/Descendant/Depth/Hierarchy/Active
//!   calculators
//! - **[`collection`]**: `MenuSource` trait, `MenuCollection`, custom item splicing
//! - **[`registry`]**: source catalog, registry, `MenuContext`, optional cache
//! - **[`store`]** and **[`tree`]**: persisted entries, materialized paths, annotated lists
//! - **[`reconcile`]**: find-missing / add / update-all, batch sync, stale-entry policy
//! - **[`marking`]** and **[`navigation`]**: request marking, lookups, breadcrumbs, sitemap
//!
//! ## Quick Start
//!
//! ### Decorating a generated menu
//!
//! ```rust
//! use menuhin::{node::MenuNode, processors::Pipeline, request::MenuRequest};
//!
//! # fn main() -> Result<(), menuhin::MenuError> {
//! let nodes = vec![
//!     MenuNode::new("Blog", "/blog/", "blog", None)?,
//!     MenuNode::new("2024", "/blog/2024/", "blog-2024", Some("blog"))?,
//!     MenuNode::new("Hello", "/blog/2024/hello/", "hello", Some("blog-2024"))?,
//! ];
//! let request = MenuRequest::new("/blog/2024/")?;
//! let tree = Pipeline::standard(0, false).run(nodes, Some(&request))?;
//!
//! assert_eq!(tree.get("hello").map(|n| n.depth()), Some(2));
//! assert!(tree.get("blog").is_some_and(|n| n.is_ancestor()));
//! assert!(tree.get("hello").is_some_and(|n| n.is_descendant()));
//! # Ok(())
//! # }
//! ```
//!
//! ### Reconciling persisted entries
//!
//! ```rust
//! use menuhin::{reconcile::update_all_urls, store::MemoryStore, uri::Uri};
//!
//! # fn main() -> Result<(), menuhin::MenuError> {
//! let mut store = MemoryStore::new();
//! let urls = vec![Uri::new("/a/", "A"), Uri::new("/a/b/", "B")];
//!
//! let added = update_all_urls(&mut store, &urls, 1)?;
//! assert_eq!(added.map(|a| a.len()), Some(2));
//! // Nothing left to do the second time around.
//! assert!(update_all_urls(&mut store, &urls, 1)?.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `menuhin` command-line tool (`check`, `import-urls`, `update-menus`, `show`)

pub mod collection;
pub mod config;
pub mod entry;
pub mod error;
pub mod marking;
pub mod navigation;
pub mod node;
pub mod processors;
pub mod reconcile;
pub mod registry;
pub mod request;
pub mod slug;
pub mod store;
#[cfg(test)]
mod tests;
pub mod tree;
pub mod uri;

pub use error::*;
