//! Pattern representation
//!
//! This module defines the AST that the parser builds and the matcher walks.
//! A pattern is a tree of two kinds of nodes: a [`DescriptionPattern`] applies
//! one relation and tests the label of each candidate it finds, and a
//! [`CoordinationPattern`] combines sibling patterns with AND or OR. The AST
//! is immutable once compiled and can be shared across threads.

use crate::category::BasicCategory;
use crate::compiler::{TregexParseError, default_compiler};
use crate::head_finder::HeadFinder;
use crate::matcher::TregexMatcher;
use crate::parser::PatternError;
use crate::relation::Relation;
use crate::tree::{NodeId, Tree};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Write as _};
use std::sync::{Arc, LazyLock};

/// Disjunctions with more alternatives than this are compiled as regexes
pub const MAX_STRING_SET_SIZE: usize = 8;

static SINGLE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:/\^([^.*+?()\[\]{}|\\^$])\$/|/\^\[([^\^\\\]])\]\$/|/\^([-a-zA-Z']+)\$/)$")
        .expect("single word pattern")
});
static MULTI_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/\^\(\?:((?:[-a-zA-Z|]|\\\$)+)\)\$/$").expect("multi word pattern")
});
static CASE_INSENSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/\^\(\?i:((?:[-a-zA-Z|]|\\\$)+)\)\$/$").expect("case insensitive pattern")
});
static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:/\^([-a-zA-Z]+)/|/\^\(\?:([-a-zA-Z|]+)\)/)$").expect("prefix pattern")
});

/// How a [`StringSet`] compares a label against its words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatchMode {
    Exact,
    Prefix,
    CaseInsensitive,
}

/// A short list of literal alternatives, tested without a regex
#[derive(Debug, Clone, PartialEq)]
pub struct StringSet {
    pub mode: StringMatchMode,
    pub words: Vec<String>,
}

impl StringSet {
    pub fn accepts(&self, value: &str) -> bool {
        self.words.iter().any(|word| match self.mode {
            StringMatchMode::Exact => value == word,
            StringMatchMode::Prefix => value.starts_with(word.as_str()),
            StringMatchMode::CaseInsensitive => value.eq_ignore_ascii_case(word),
        })
    }
}

/// Node test of a description
#[derive(Clone)]
pub enum DescriptionMode {
    /// `__`
    Anything,
    Exact(String),
    /// `/regex/`, satisfied by a match anywhere in the label
    Regex(Regex),
    StringSet(StringSet),
    /// `=name` with no description: the very node bound to `name`
    Backreference,
    /// `~name`: any node whose label equals that of the node bound to `name`
    Link(String),
}

// Manual Debug implementation
impl Debug for DescriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionMode::Anything => f.write_str("Anything"),
            DescriptionMode::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            DescriptionMode::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            DescriptionMode::StringSet(set) => f.debug_tuple("StringSet").field(set).finish(),
            DescriptionMode::Backreference => f.write_str("Backreference"),
            DescriptionMode::Link(name) => f.debug_tuple("Link").field(name).finish(),
        }
    }
}

// Manual PartialEq implementation (compare pattern strings, not compiled regex)
impl PartialEq for DescriptionMode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DescriptionMode::Anything, DescriptionMode::Anything) => true,
            (DescriptionMode::Exact(a), DescriptionMode::Exact(b)) => a == b,
            (DescriptionMode::Regex(a), DescriptionMode::Regex(b)) => a.as_str() == b.as_str(),
            (DescriptionMode::StringSet(a), DescriptionMode::StringSet(b)) => a == b,
            (DescriptionMode::Backreference, DescriptionMode::Backreference) => true,
            (DescriptionMode::Link(a), DescriptionMode::Link(b)) => a == b,
            _ => false,
        }
    }
}

impl DescriptionMode {
    /// Choose the cheapest test equivalent to a written description
    pub fn from_description(desc: &str) -> Result<Self, regex::Error> {
        if desc == "__" || desc == "/.*/" || desc == "/^.*$/" {
            return Ok(DescriptionMode::Anything);
        }
        if let Some(caps) = SINGLE_WORD.captures(desc)
            && let Some(word) = (1..=3).find_map(|i| caps.get(i))
        {
            return Ok(DescriptionMode::Exact(word.as_str().to_string()));
        }
        let string_sets = [
            (&*MULTI_WORD, StringMatchMode::Exact),
            (&*CASE_INSENSITIVE, StringMatchMode::CaseInsensitive),
            (&*PREFIX, StringMatchMode::Prefix),
        ];
        for (detector, mode) in string_sets {
            let Some(caps) = detector.captures(desc) else {
                continue;
            };
            let Some(group) = (1..caps.len()).find_map(|i| caps.get(i)) else {
                continue;
            };
            let words: Vec<String> = group
                .as_str()
                .replace('\\', "")
                .split('|')
                .map(str::to_string)
                .collect();
            if words.len() > MAX_STRING_SET_SIZE {
                return Ok(DescriptionMode::Regex(regex_literal(desc)?));
            }
            return Ok(DescriptionMode::StringSet(StringSet { mode, words }));
        }
        if is_regex_literal(desc) {
            return Ok(DescriptionMode::Regex(regex_literal(desc)?));
        }
        if desc.contains('|') {
            let words: Vec<String> = desc.split('|').map(str::to_string).collect();
            if words.len() <= MAX_STRING_SET_SIZE {
                return Ok(DescriptionMode::StringSet(StringSet {
                    mode: StringMatchMode::Exact,
                    words,
                }));
            }
            return Ok(DescriptionMode::Regex(Regex::new(&format!("^(?:{})$", desc))?));
        }
        Ok(DescriptionMode::Exact(desc.to_string()))
    }
}

fn is_regex_literal(desc: &str) -> bool {
    desc.len() >= 2 && desc.starts_with('/') && desc.ends_with('/')
}

/// Compile the body of a `/.../` description
fn regex_literal(desc: &str) -> Result<Regex, regex::Error> {
    Regex::new(&desc[1..desc.len() - 1].replace("\\/", "/"))
}

/// A single relation application plus a node test
#[derive(Clone)]
pub struct DescriptionPattern {
    pub(crate) relation: Arc<Relation>,
    pub(crate) negated: bool,
    pub(crate) optional: bool,
    pub(crate) negated_description: bool,
    pub(crate) mode: DescriptionMode,
    /// The description as written, if there was one
    pub(crate) description: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) basic_category: Option<Arc<dyn BasicCategory>>,
    /// Regex group number and the variable it binds
    pub(crate) variable_groups: Vec<(usize, String)>,
    pub(crate) child: Option<Box<PatternNode>>,
}

impl Debug for DescriptionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptionPattern")
            .field("relation", &self.relation)
            .field("negated", &self.negated)
            .field("optional", &self.optional)
            .field("negated_description", &self.negated_description)
            .field("mode", &self.mode)
            .field("name", &self.name)
            .field("basic_category", &self.basic_category.is_some())
            .field("variable_groups", &self.variable_groups)
            .field("child", &self.child)
            .finish()
    }
}

impl DescriptionPattern {
    /// A description with a written node test
    pub fn new(relation: Arc<Relation>, description: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            relation,
            negated: false,
            optional: false,
            negated_description: false,
            mode: DescriptionMode::from_description(description)?,
            description: Some(description.to_string()),
            name: None,
            basic_category: None,
            variable_groups: Vec::new(),
            child: None,
        })
    }

    /// `=name` on its own
    pub fn backreference(relation: Arc<Relation>, name: &str) -> Self {
        Self {
            relation,
            negated: false,
            optional: false,
            negated_description: false,
            mode: DescriptionMode::Backreference,
            description: None,
            name: Some(name.to_string()),
            basic_category: None,
            variable_groups: Vec::new(),
            child: None,
        }
    }

    /// `~target`, optionally naming the node it matches
    pub fn link(relation: Arc<Relation>, target: &str, name: Option<&str>) -> Self {
        Self {
            relation,
            negated: false,
            optional: false,
            negated_description: false,
            mode: DescriptionMode::Link(target.to_string()),
            description: None,
            name: name.map(str::to_string),
            basic_category: None,
            variable_groups: Vec::new(),
            child: None,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mode(&self) -> &DescriptionMode {
        &self.mode
    }

    pub fn child(&self) -> Option<&PatternNode> {
        self.child.as_deref()
    }

    /// Whether matching this node binds its name
    pub fn declares_name(&self) -> bool {
        self.name.is_some() && self.mode != DescriptionMode::Backreference
    }

    /// Attach relations to this node, conjoining them with any it already has
    pub(crate) fn add_child(&mut self, child: PatternNode) {
        self.child = Some(Box::new(match self.child.take() {
            None => child,
            Some(existing) => PatternNode::Coordination(CoordinationPattern::new(
                vec![*existing, child],
                true,
            )),
        }));
    }

    /// Compare a label against the node test, after any basic-category mapping
    pub(crate) fn basic_label<'a>(&self, label: &'a str) -> std::borrow::Cow<'a, str> {
        match &self.basic_category {
            Some(bc) => bc.basic_category(label),
            None => std::borrow::Cow::Borrowed(label),
        }
    }

    /// The node test as written; empty for a backreference
    fn description_text(&self) -> std::borrow::Cow<'_, str> {
        match (&self.mode, &self.description) {
            (DescriptionMode::Link(target), _) => format!("~{}", target).into(),
            (_, Some(text)) => text.as_str().into(),
            (_, None) => "".into(),
        }
    }

    /// One-line summary used by `pretty_print`
    pub fn local_string(&self) -> String {
        let mut s = format!("{} ", self.relation);
        if self.negated_description {
            s.push('!');
        }
        if self.basic_category.is_some() {
            s.push('@');
        }
        s.push_str(&self.description_text());
        if let Some(name) = &self.name {
            let _ = write!(s, "={}", name);
        }
        s
    }
}

impl fmt::Display for DescriptionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        write!(f, "{} ", self.relation)?;
        if self.child.is_some() {
            f.write_str("(")?;
        }
        if self.negated_description {
            f.write_str("!")?;
        }
        if self.basic_category.is_some() {
            f.write_str("@")?;
        }
        f.write_str(&self.description_text())?;
        if let Some(name) = &self.name {
            write!(f, "={}", name)?;
        }
        f.write_str(" ")?;
        if let Some(child) = &self.child {
            write!(f, "{})", child)?;
        }
        Ok(())
    }
}

/// AND / OR over sibling patterns that share an anchor node
#[derive(Debug, Clone)]
pub struct CoordinationPattern {
    pub(crate) negated: bool,
    pub(crate) optional: bool,
    pub(crate) is_conjunction: bool,
    pub(crate) children: Vec<PatternNode>,
}

impl CoordinationPattern {
    pub fn new(children: Vec<PatternNode>, is_conjunction: bool) -> Self {
        Self {
            negated: false,
            optional: false,
            is_conjunction,
            children,
        }
    }

    pub fn is_conjunction(&self) -> bool {
        self.is_conjunction
    }

    pub fn children(&self) -> &[PatternNode] {
        &self.children
    }

    pub fn local_string(&self) -> String {
        if self.is_conjunction { "and" } else { "or" }.to_string()
    }
}

impl fmt::Display for CoordinationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_conjunction {
            if self.negated {
                f.write_str("!(")?;
            }
            if self.optional {
                f.write_str("?(")?;
            }
            for child in &self.children {
                write!(f, "{}", child)?;
            }
            if self.negated || self.optional {
                f.write_str(")")?;
            }
        } else {
            if self.negated {
                f.write_str("![")?;
            } else if self.optional {
                f.write_str("?[")?;
            } else {
                f.write_str("[")?;
            }
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(" | ")?;
                }
                write!(f, "{}", child)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// A node of the pattern AST
#[derive(Debug, Clone)]
pub enum PatternNode {
    Description(DescriptionPattern),
    Coordination(CoordinationPattern),
}

impl PatternNode {
    pub fn is_negated(&self) -> bool {
        match self {
            PatternNode::Description(d) => d.negated,
            PatternNode::Coordination(c) => c.negated,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            PatternNode::Description(d) => d.optional,
            PatternNode::Coordination(c) => c.optional,
        }
    }

    /// Mark the node as negated (`!`)
    pub fn negate(&mut self) -> Result<(), PatternError> {
        if self.is_optional() {
            return Err(PatternError::NegatedAndOptional);
        }
        match self {
            PatternNode::Description(d) => d.negated = true,
            PatternNode::Coordination(c) => c.negated = true,
        }
        Ok(())
    }

    /// Mark the node as optional (`?`)
    pub fn make_optional(&mut self) -> Result<(), PatternError> {
        if self.is_negated() {
            return Err(PatternError::NegatedAndOptional);
        }
        match self {
            PatternNode::Description(d) => d.optional = true,
            PatternNode::Coordination(c) => c.optional = true,
        }
        Ok(())
    }

    pub fn children(&self) -> Vec<&PatternNode> {
        match self {
            PatternNode::Description(d) => d.child().into_iter().collect(),
            PatternNode::Coordination(c) => c.children.iter().collect(),
        }
    }

    pub fn local_string(&self) -> String {
        match self {
            PatternNode::Description(d) => d.local_string(),
            PatternNode::Coordination(c) => c.local_string(),
        }
    }

    fn pretty_print_into(&self, out: &mut String, indent: usize) {
        out.push_str(&"   ".repeat(indent));
        if self.is_negated() {
            out.push('!');
        }
        if self.is_optional() {
            out.push('?');
        }
        out.push_str(&self.local_string());
        out.push('\n');
        for child in self.children() {
            child.pretty_print_into(out, indent + 1);
        }
    }
}

impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternNode::Description(d) => fmt::Display::fmt(d, f),
            PatternNode::Coordination(c) => fmt::Display::fmt(c, f),
        }
    }
}

/// A compiled Tregex pattern
///
/// # Examples
///
/// ```
/// use tregex::{Tree, TregexPattern};
///
/// let pattern = TregexPattern::compile("NP < NN=noun").unwrap();
/// let tree = Tree::from_penn("(S (NP (DT the) (NN dog)) (VP (VBZ barks)))").unwrap();
/// let mut matcher = pattern.matcher(&tree);
/// assert!(matcher.find());
/// let noun = matcher.get_node("noun").unwrap();
/// assert_eq!(tree.display(noun).to_string(), "(NN dog)");
/// ```
#[derive(Debug, Clone)]
pub struct TregexPattern {
    root: PatternNode,
    pattern: String,
    known_variables: BTreeSet<String>,
}

impl TregexPattern {
    pub(crate) fn new(root: PatternNode, pattern: &str, known_variables: BTreeSet<String>) -> Self {
        Self {
            root,
            pattern: pattern.to_string(),
            known_variables,
        }
    }

    /// Compile with the default compiler (Penn basic categories, Collins heads)
    pub fn compile(pattern: &str) -> Result<Self, TregexParseError> {
        default_compiler().compile(pattern)
    }

    /// Compile, logging and discarding any parse error
    pub fn safe_compile(pattern: &str) -> Option<Self> {
        default_compiler().safe_compile(pattern)
    }

    /// The pattern text that was parsed (after macro expansion)
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Every node name declared in the pattern
    pub fn known_variables(&self) -> &BTreeSet<String> {
        &self.known_variables
    }

    pub fn root(&self) -> &PatternNode {
        &self.root
    }

    /// A matcher over the whole of `tree`
    pub fn matcher<'a>(&'a self, tree: &'a Tree) -> TregexMatcher<'a> {
        TregexMatcher::new(self, tree, tree.root_id.unwrap_or(0), None)
    }

    /// A matcher that uses `head_finder` for every head relation instead of
    /// the ones the pattern was compiled with
    pub fn matcher_with_head_finder<'a>(
        &'a self,
        tree: &'a Tree,
        head_finder: &'a dyn HeadFinder,
    ) -> TregexMatcher<'a> {
        TregexMatcher::new(self, tree, tree.root_id.unwrap_or(0), Some(head_finder))
    }

    /// A matcher confined to the subtree rooted at `root`
    pub fn matcher_at<'a>(&'a self, tree: &'a Tree, root: NodeId) -> TregexMatcher<'a> {
        TregexMatcher::new(self, tree, root, None)
    }

    /// One pattern node per line, indented by depth
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.root.pretty_print_into(&mut out, 0);
        out
    }
}

impl fmt::Display for TregexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(desc: &str) -> DescriptionMode {
        DescriptionMode::from_description(desc).unwrap()
    }

    fn words(mode: StringMatchMode, words: &[&str]) -> DescriptionMode {
        DescriptionMode::StringSet(StringSet {
            mode,
            words: words.iter().map(|w| w.to_string()).collect(),
        })
    }

    #[test]
    fn test_description_modes() {
        assert_eq!(mode("__"), DescriptionMode::Anything);
        assert_eq!(mode("/^.*$/"), DescriptionMode::Anything);
        assert_eq!(mode("NP"), DescriptionMode::Exact("NP".into()));
        assert_eq!(mode("/^NP$/"), DescriptionMode::Exact("NP".into()));
        assert_eq!(mode("/^,$/"), DescriptionMode::Exact(",".into()));
        assert_eq!(mode("/^[$]$/"), DescriptionMode::Exact("$".into()));
        assert_eq!(
            mode("/^(?:NN|NNS|PRP\\$)$/"),
            words(StringMatchMode::Exact, &["NN", "NNS", "PRP$"])
        );
        assert_eq!(mode("/^(?i:foo|bar)$/"), words(StringMatchMode::CaseInsensitive, &["foo", "bar"]));
        assert_eq!(mode("/^JJ/"), words(StringMatchMode::Prefix, &["JJ"]));
        assert_eq!(mode("/^(?:JJ|NN)/"), words(StringMatchMode::Prefix, &["JJ", "NN"]));
        assert_eq!(mode("NN|NNS"), words(StringMatchMode::Exact, &["NN", "NNS"]));
        assert!(matches!(mode("/^JJ|NN/"), DescriptionMode::Regex(_)));
        assert!(matches!(mode("/^.$/"), DescriptionMode::Regex(_)));
        assert!(matches!(mode("/NP/"), DescriptionMode::Regex(_)));
        assert!(matches!(mode("a|b|c|d|e|f|g|h|i"), DescriptionMode::Regex(_)));
        assert!(matches!(
            mode("/^(?:a|b|c|d|e|f|g|h|i)$/"),
            DescriptionMode::Regex(_)
        ));
        assert!(DescriptionMode::from_description("/(/").is_err());
    }

    #[test]
    fn test_string_set_accepts() {
        let exact = StringSet {
            mode: StringMatchMode::Exact,
            words: vec!["NN".into(), "NNS".into()],
        };
        assert!(exact.accepts("NNS"));
        assert!(!exact.accepts("NNP"));

        let prefix = StringSet {
            mode: StringMatchMode::Prefix,
            words: vec!["JJ".into()],
        };
        assert!(prefix.accepts("JJR"));
        assert!(!prefix.accepts("NJJ"));

        let ci = StringSet {
            mode: StringMatchMode::CaseInsensitive,
            words: vec!["foo".into()],
        };
        assert!(ci.accepts("FOO"));
    }

    #[test]
    fn test_negate_and_optional_conflict() {
        let mut node = PatternNode::Description(
            DescriptionPattern::new(Arc::new(Relation::ParentOf), "B").unwrap(),
        );
        node.negate().unwrap();
        assert!(matches!(node.make_optional(), Err(PatternError::NegatedAndOptional)));
    }

    #[test]
    fn test_display_and_pretty_print() {
        let mut root = DescriptionPattern::new(Arc::new(Relation::Root), "A").unwrap();
        let b = DescriptionPattern::new(Arc::new(Relation::ParentOf), "B").unwrap();
        let mut c = DescriptionPattern::new(Arc::new(Relation::ParentOf), "C").unwrap();
        c.name = Some("c".into());
        let mut or = PatternNode::Coordination(CoordinationPattern::new(
            vec![PatternNode::Description(b), PatternNode::Description(c)],
            false,
        ));
        or.make_optional().unwrap();
        root.add_child(or);
        let pattern = TregexPattern::new(PatternNode::Description(root), "A ?[< B | < C=c]", BTreeSet::new());

        assert_eq!(pattern.to_string(), "Root (A ?[< B  | < C=c ])");
        assert_eq!(pattern.pretty_print(), "Root A\n   ?or\n      < B\n      < C=c\n");
    }
}
