//! Collections: custom item splicing, grafted sources and depth filters

use super::helpers::*;
use crate::{
    collection::*,
    error::MenuError,
    node::MenuNode,
    processors::{MenuTree, Pipeline},
    request::MenuRequest,
};
use std::sync::Arc;
use test_log::test;

fn ids(nodes: &[MenuNode]) -> Vec<String> {
    nodes.iter().map(|n| n.unique_id().to_string()).collect()
}

fn pages() -> Arc<dyn MenuSource> {
    Arc::new(FixedSource::new(
        "pages",
        vec![
            MenuNode::new("Home", "/", "home", None).unwrap(),
            MenuNode::new("About", "/about/", "about", Some("home")).unwrap(),
            MenuNode::new("Contact", "/contact/", "contact", Some("home")).unwrap(),
        ],
    ))
}

fn news() -> Arc<dyn MenuSource> {
    Arc::new(FixedSource::new(
        "news",
        vec![
            MenuNode::new("News", "/news/", "news", None).unwrap(),
            MenuNode::new("Latest", "/news/latest/", "latest", Some("news")).unwrap(),
        ],
    ))
}

fn sources() -> SourceMap {
    SourceMap::from([("pages".to_string(), pages()), ("news".to_string(), news())])
}

fn collection_with(items: Vec<CustomMenuItem>) -> MenuCollection {
    MenuCollection::new(pages(), Pipeline::standard(0, false)).with_custom_items(items, &sources())
}

#[test]
fn test_no_custom_items_passes_nodes_through() {
    let collection = collection_with(vec![]);
    let nodes = collection.get_nodes(None).unwrap();
    assert_eq!(ids(&nodes), ["home", "about", "contact"]);
}

#[test]
fn test_positions() {
    let item = |position| {
        CustomMenuItem::new(1, "pages", "about", position)
            .with_node("Team", "/team/")
            .with_unique_id("team")
    };

    let above = collection_with(vec![item(Position::Above)]);
    assert_eq!(ids(&above.get_nodes(None).unwrap()), ["home", "team", "about", "contact"]);

    let below = collection_with(vec![item(Position::Below)]);
    assert_eq!(ids(&below.get_nodes(None).unwrap()), ["home", "about", "team", "contact"]);

    let replacing = collection_with(vec![item(Position::Replacing)]);
    let nodes = replacing.get_nodes(None).unwrap();
    assert_eq!(ids(&nodes), ["home", "team", "contact"]);
    // The override takes the target's place in the hierarchy.
    assert_eq!(nodes[1].parent_id(), Some("home"));
}

#[test]
fn test_attached_source_hangs_under_target() {
    let item = CustomMenuItem::new(1, "pages", "about", Position::Below).attaching("news");
    let collection = collection_with(vec![item]);
    let tree = collection.get_processed_nodes(None).unwrap();
    assert_eq!(
        ids(tree.nodes()),
        ["home", "about", "news", "latest", "contact"]
    );
    assert_eq!(tree.get("news").unwrap().ancestors(), ["home", "about"]);
    assert_eq!(tree.get("latest").unwrap().depth(), 3);
}

#[test]
fn test_replacing_with_attached_source() {
    let item = CustomMenuItem::new(1, "pages", "about", Position::Replacing)
        .with_node("Press", "/press/")
        .attaching("news");
    let collection = collection_with(vec![item]);
    let tree = collection.get_processed_nodes(None).unwrap();
    // Without an explicit id the replacement takes over the target's.
    let press = tree.get("about").unwrap();
    assert_eq!(press.title(), "Press");
    assert_eq!(press.parent_id(), Some("home"));
    assert_eq!(tree.get("news").unwrap().parent_id(), Some("about"));
}

fn nested() -> Arc<dyn MenuSource> {
    Arc::new(FixedSource::new(
        "nested",
        vec![
            MenuNode::new("Home", "/", "home", None).unwrap(),
            MenuNode::new("About", "/about/", "about", Some("home")).unwrap(),
            MenuNode::new("Team", "/about/team/", "team", Some("about")).unwrap(),
        ],
    ))
}

fn nested_with(items: Vec<CustomMenuItem>) -> MenuTree {
    MenuCollection::new(nested(), Pipeline::standard(0, false))
        .with_custom_items(items, &sources())
        .get_processed_nodes(None)
        .unwrap()
}

#[test]
fn test_replacing_keeps_the_subtree() {
    let tree = nested_with(vec![CustomMenuItem::new(1, "nested", "about", Position::Replacing)
        .with_node("About us", "/about-us/")]);
    let team = tree.get("team").unwrap();
    assert_eq!(team.ancestors(), ["home", "about"]);
    assert_eq!(team.depth(), 2);
    assert_eq!(tree.get("about").unwrap().url(), "/about-us/");
}

#[test]
fn test_replacing_hands_children_over() {
    let renamed = nested_with(vec![CustomMenuItem::new(1, "nested", "about", Position::Replacing)
        .with_node("About us", "/about-us/")
        .with_unique_id("about-us")]);
    assert!(renamed.get("about").is_none());
    assert_eq!(renamed.get("team").unwrap().ancestors(), ["home", "about-us"]);

    // Nothing to replace it with: the children move up a level.
    let removed = nested_with(vec![CustomMenuItem::new(
        1,
        "nested",
        "about",
        Position::Replacing,
    )]);
    assert!(removed.get("about").is_none());
    assert_eq!(removed.get("team").unwrap().ancestors(), ["home"]);
    assert_eq!(removed.get("team").unwrap().depth(), 1);
}

#[test]
fn test_several_items_on_one_target() {
    let collection = collection_with(vec![
        CustomMenuItem::new(1, "pages", "about", Position::Above)
            .with_node("Above", "/xa/")
            .with_unique_id("xa"),
        CustomMenuItem::new(1, "pages", "about", Position::Below)
            .with_node("Below", "/xb/")
            .with_unique_id("xb"),
        CustomMenuItem::new(1, "pages", "about", Position::Above)
            .with_node("Above again", "/xc/")
            .with_unique_id("xc"),
    ]);
    assert_eq!(
        ids(&collection.get_nodes(None).unwrap()),
        ["home", "xa", "xc", "about", "xb", "contact"]
    );
}

#[test]
fn test_unknown_attachment_is_skipped() {
    let item = CustomMenuItem::new(1, "pages", "about", Position::Below).attaching("nope");
    let collection = collection_with(vec![item]);
    assert_eq!(
        ids(&collection.get_nodes(None).unwrap()),
        ["home", "about", "contact"]
    );
}

#[test]
fn test_filter_bounds() {
    let source: Arc<dyn MenuSource> = Arc::new(FixedSource::new("chain", chain_nodes(5)));
    let collection = MenuCollection::new(source, Pipeline::standard(0, false));
    let depths = |min, max| {
        collection
            .filter(None, min, max)
            .unwrap()
            .iter()
            .map(|n| n.depth())
            .collect::<Vec<_>>()
    };
    assert_eq!(depths(None, None), [0, 1, 2, 3, 4]);
    assert_eq!(depths(Some(2), None), [2, 3, 4]);
    assert_eq!(depths(None, Some(1)), [0, 1]);
    assert_eq!(depths(Some(1), Some(3)), [1, 2, 3]);
    assert!(depths(Some(3), Some(1)).is_empty());
}

#[test]
fn test_build_once_and_request_independence() {
    let mut collection = collection_with(vec![]);
    assert!(collection.tree().is_none());
    let built = collection.build().unwrap();
    assert_eq!(built.len(), 3);
    assert!(built.active().is_none());

    let request = MenuRequest::new("/about/").unwrap();
    let processed = collection.get_processed_nodes(Some(&request)).unwrap();
    assert!(processed.get("about").unwrap().is_active());
    // The cached build is untouched by per-request decoration.
    assert!(collection.tree().unwrap().active().is_none());
}

#[test]
fn test_source_errors_propagate() {
    let collection = MenuCollection::new(Arc::new(BrokenSource), Pipeline::standard(0, false));
    assert!(matches!(
        collection.get_processed_nodes(None),
        Err(MenuError::Store(_))
    ));
}

#[test]
fn test_menu_slug_for_source() {
    let source = FixedSource {
        name: "blog",
        verbose_name: "Blog Post",
        nodes: vec![],
    };
    assert_eq!(menu_slug_for(&source), "blog-posts");
    assert_eq!(Position::Replacing.to_string(), "replacing");
}
