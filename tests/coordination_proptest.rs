//! Boolean combinations of relations agree with a brute-force evaluator

use proptest::prelude::*;
use std::collections::BTreeSet;
use tregex::{NodeId, Tree, TregexPattern};

static LABELS: [&str; 3] = ["A", "B", "C"];

#[derive(Debug, Clone)]
struct GenNode {
    label: &'static str,
    children: Vec<GenNode>,
}

impl GenNode {
    fn to_penn(&self) -> String {
        if self.children.is_empty() {
            return self.label.to_string();
        }
        let children: Vec<_> = self.children.iter().map(GenNode::to_penn).collect();
        format!("({} {})", self.label, children.join(" "))
    }
}

#[derive(Debug, Clone)]
enum Formula {
    Child(&'static str),
    Descendant(&'static str),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Opt(Box<Formula>),
}

impl Formula {
    fn render(&self) -> String {
        match self {
            Formula::Child(label) => format!("< {}", label),
            Formula::Descendant(label) => format!("<< {}", label),
            Formula::Not(inner) => match inner.as_ref() {
                Formula::Child(_) | Formula::Descendant(_) => format!("!{}", inner.render()),
                Formula::Not(_) | Formula::Opt(_) => format!("![{}]", inner.render()),
                _ => format!("!{}", inner.render()),
            },
            Formula::And(a, b) => format!("[{} & {}]", a.render(), b.render()),
            Formula::Or(a, b) => format!("[{} | {}]", a.render(), b.render()),
            Formula::Opt(inner) => format!("?[{}]", inner.render()),
        }
    }

    /// Most ways the formula can be satisfied at one node of a tree with
    /// `size` nodes
    fn max_matches(&self, size: usize) -> usize {
        match self {
            Formula::Child(_) | Formula::Descendant(_) => size,
            Formula::Not(_) => 1,
            Formula::And(a, b) => a.max_matches(size).saturating_mul(b.max_matches(size)),
            Formula::Or(a, b) => a.max_matches(size).saturating_add(b.max_matches(size)),
            Formula::Opt(inner) => inner.max_matches(size).saturating_add(1),
        }
    }

    fn holds(&self, tree: &Tree, node: NodeId) -> bool {
        match self {
            Formula::Child(label) => tree
                .children(node)
                .iter()
                .any(|&c| tree.label(c) == Some(*label)),
            Formula::Descendant(label) => tree
                .preorder(node)
                .skip(1)
                .any(|d| tree.label(d) == Some(*label)),
            Formula::Not(inner) => !inner.holds(tree, node),
            Formula::And(a, b) => a.holds(tree, node) && b.holds(tree, node),
            Formula::Or(a, b) => a.holds(tree, node) || b.holds(tree, node),
            Formula::Opt(_) => true,
        }
    }
}

fn label() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&LABELS[..])
}

fn gen_node() -> impl Strategy<Value = GenNode> {
    let leaf = label().prop_map(|label| GenNode {
        label,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 24, 3, |inner| {
        (label(), prop::collection::vec(inner, 1..4))
            .prop_map(|(label, children)| GenNode { label, children })
    })
}

fn gen_tree() -> impl Strategy<Value = GenNode> {
    (label(), prop::collection::vec(gen_node(), 1..4))
        .prop_map(|(label, children)| GenNode { label, children })
}

fn gen_formula() -> impl Strategy<Value = Formula> {
    let atom = prop_oneof![
        label().prop_map(Formula::Child),
        label().prop_map(Formula::Descendant),
    ];
    atom.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|f| Formula::Not(Box::new(f))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Formula::And(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Formula::Or(Box::new(a), Box::new(b))),
            inner.prop_map(|f| Formula::Opt(Box::new(f))),
        ]
    })
}

proptest! {
    #[test]
    fn test_coordination_matches_brute_force(root in gen_tree(), formula in gen_formula()) {
        let tree = Tree::from_penn(&root.to_penn()).unwrap();
        let text = format!("__ {}", formula.render());
        let pattern = TregexPattern::compile(&text).unwrap();

        let mut matcher = pattern.matcher(&tree);
        let mut found = BTreeSet::new();
        while matcher.find_next_matching_node() {
            found.insert(matcher.get_match().unwrap());
        }

        let expected: BTreeSet<NodeId> = tree
            .preorder(0)
            .filter(|&node| formula.holds(&tree, node))
            .collect();
        prop_assert_eq!(found, expected, "pattern {}", text);
    }

    #[test]
    fn test_find_agrees_with_find_next_matching_node(root in gen_tree(), formula in gen_formula()) {
        let tree = Tree::from_penn(&root.to_penn()).unwrap();
        let pattern = TregexPattern::compile(&format!("__ {}", formula.render())).unwrap();

        let mut matcher = pattern.matcher(&tree);
        let mut every = BTreeSet::new();
        let limit = formula.max_matches(tree.len()).saturating_mul(tree.len());
        let mut finds = 0;
        while matcher.find() {
            finds += 1;
            prop_assert!(finds <= limit, "more than {} matches", limit);
            every.insert(matcher.get_match().unwrap());
        }
        let mut matcher = pattern.matcher(&tree);
        let mut distinct = BTreeSet::new();
        while matcher.find_next_matching_node() {
            distinct.insert(matcher.get_match().unwrap());
        }
        prop_assert_eq!(every, distinct);
    }
}
