//! Decoration pipeline scenarios and tree-wide properties

use super::helpers::*;
use crate::{
    error::MenuError,
    node::MenuNode,
    processors::{ActiveCalculator, AncestryCalculator, Pipeline, Processor},
    request::MenuRequest,
};
use std::sync::Arc;
use test_log::test;

fn site_nodes() -> Vec<MenuNode> {
    vec![
        MenuNode::new("Home", "/", "home", None).unwrap(),
        MenuNode::new("Blog", "/blog/", "blog", Some("home")).unwrap(),
        MenuNode::new("Post", "/blog/post/", "post", Some("blog")).unwrap(),
        MenuNode::new("Draft", "/blog/draft/", "draft", Some("blog")).unwrap(),
        MenuNode::new("About", "/about/", "about", Some("home")).unwrap(),
        MenuNode::new("Elsewhere", "/elsewhere/", "elsewhere", None).unwrap(),
    ]
}

#[test]
fn test_linear_chain() {
    let n = 25;
    let tree = Pipeline::standard(0, false)
        .run(chain_nodes(n + 1), None)
        .unwrap();
    let last = tree.get(&format!("user_{n}")).unwrap();
    let first = tree.get("user_0").unwrap();
    assert_eq!(last.ancestors().len(), n);
    assert_eq!(first.descendants().len(), n);
    for k in 0..=n {
        assert_eq!(tree.get(&format!("user_{k}")).unwrap().depth(), k);
    }
    assert_eq!(last.ancestors()[0], "user_0");
    assert_eq!(last.ancestors()[n - 1], format!("user_{}", n - 1));
}

#[test]
fn test_deep_chain() {
    let n = 1500;
    let tree = Pipeline::standard(0, false).run(chain_nodes(n), None).unwrap();
    assert_eq!(tree.get("user_0").unwrap().descendants().len(), n - 1);
    let middle = tree.get(&format!("user_{}", n / 2)).unwrap();
    assert_eq!(middle.descendants().len(), n - n / 2 - 1);
    assert_eq!(middle.depth(), n / 2);
}

#[test]
fn test_querystring_matching() {
    let nodes = || vec![MenuNode::new("AB", "/a/b/?c=d&e=f", "ab", None).unwrap()];

    let bare = MenuRequest::new("/a/b/").unwrap();
    let tree = Pipeline::standard(0, false).run(nodes(), Some(&bare)).unwrap();
    assert!(!tree.get("ab").unwrap().is_active());

    let reordered = MenuRequest::new("/a/b/?e=f&c=d").unwrap();
    let tree = Pipeline::standard(0, false)
        .run(nodes(), Some(&reordered))
        .unwrap();
    assert!(!tree.get("ab").unwrap().is_active());

    let tree = Pipeline::standard(0, true)
        .run(nodes(), Some(&reordered))
        .unwrap();
    assert!(tree.get("ab").unwrap().is_active());

    let wrong_value = MenuRequest::new("/a/b/?c=x&e=f").unwrap();
    let tree = Pipeline::standard(0, true)
        .run(nodes(), Some(&wrong_value))
        .unwrap();
    assert!(!tree.get("ab").unwrap().is_active());
}

#[test]
fn test_exact_match_without_querystring_comparison() {
    let calc = ActiveCalculator {
        compare_querystrings: false,
    };
    let request = MenuRequest::new("/a/b/?c=d").unwrap();
    assert!(calc.matches("/a/b/?c=d", &request));
    assert!(!calc.matches("/a/b/", &request));
}

#[test]
fn test_descendant_marks_mirror_ancestry() {
    for path in ["/", "/blog/", "/blog/post/", "/about/", "/elsewhere/"] {
        let request = MenuRequest::new(path).unwrap();
        let tree = Pipeline::standard(0, false)
            .run(site_nodes(), Some(&request))
            .unwrap();
        let active = tree.active().unwrap();
        for node in tree.nodes() {
            let below_active = node.ancestors().iter().any(|a| a == active.unique_id());
            assert_eq!(node.is_descendant(), below_active, "{path}: {node}");
        }
    }
}

#[test]
fn test_depth_is_parent_depth_plus_one() {
    for start in [0, 1, 3] {
        let tree = Pipeline::standard(start, false)
            .run(site_nodes(), None)
            .unwrap();
        for node in tree.nodes() {
            match node.ancestors().last() {
                Some(parent) => {
                    assert_eq!(node.depth(), tree.get(parent).unwrap().depth() + 1)
                }
                None => assert_eq!(node.depth(), start),
            }
        }
    }
}

#[test]
fn test_descendants_are_inverse_of_ancestors() {
    let tree = Pipeline::standard(0, false).run(site_nodes(), None).unwrap();
    for a in tree.nodes() {
        for b in tree.nodes() {
            let listed = a.descendants().iter().any(|d| d == b.unique_id());
            let below = b.ancestors().iter().any(|x| x == a.unique_id());
            assert_eq!(listed, below, "{a} / {b}");
        }
    }
}

#[test]
fn test_equality_ignores_title_and_url() {
    let a = MenuNode::new("One", "/one/", "same", None).unwrap();
    let b = MenuNode::new("Two", "/two/", "same", Some("other")).unwrap();
    assert_eq!(a, b);
    let mut set = std::collections::HashSet::new();
    set.insert(a);
    assert!(!set.insert(b));
}

#[test]
fn test_self_parent_never_reaches_pipeline() {
    for id in ["a", "user_0", ""] {
        let result = MenuNode::new("x", "/x/", id, Some(id));
        assert!(matches!(result, Err(MenuError::Structural(_))), "{id}");
    }
}

#[derive(Debug)]
struct FailingProcessor;

impl Processor for FailingProcessor {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn process(
        &self,
        _tree: &mut crate::processors::MenuTree,
        _request: Option<&MenuRequest>,
    ) -> Result<(), MenuError> {
        Err(MenuError::Cancelled("request timed out".to_string()))
    }
}

#[test]
fn test_failed_decoration_returns_no_tree() {
    let pipeline = Pipeline::new(vec![Arc::new(AncestryCalculator), Arc::new(FailingProcessor)])
        .unwrap();
    assert_eq!(pipeline.names(), ["ancestry", "failing"]);
    let result = pipeline.run(site_nodes(), None);
    assert!(matches!(result, Err(MenuError::Cancelled(_))));
}
