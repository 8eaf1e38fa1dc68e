//! Backtracking pattern matcher
//!
//! A [`TregexMatcher`] runs one compiled pattern over one tree. It mirrors the
//! pattern AST with a tree of small state machines: each description node
//! walks the candidates of its relation lazily, and each coordination node
//! backtracks across its children. All of them share one [`MatchContext`]
//! holding the tree, the named-node bindings and the variable groups.

use crate::head_finder::HeadFinder;
use crate::pattern::{
    CoordinationPattern, DescriptionMode, DescriptionPattern, PatternNode, TregexPattern,
};
use crate::relation::RelationSearch;
use crate::tree::{NodeId, Preorder, Tree};
use crate::variables::{Checkpoint, VariableStrings};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Error type for matcher misuse
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("find_at called on node {requested} while matching at node {current}; call reset() first")]
    NodeChanged { current: NodeId, requested: NodeId },
}

/// State shared by every node matcher of one [`TregexMatcher`]
pub(crate) struct MatchContext<'a> {
    pub(crate) tree: &'a Tree,
    /// Root of the searched subtree; nothing above it is visible
    pub(crate) root: NodeId,
    /// Overrides the head finder of every head relation
    pub(crate) head_finder: Option<&'a dyn HeadFinder>,
    pub(crate) names: FxHashMap<&'a str, NodeId>,
    pub(crate) variables: VariableStrings,
}

impl<'a> MatchContext<'a> {
    pub(crate) fn new(tree: &'a Tree, root: NodeId, head_finder: Option<&'a dyn HeadFinder>) -> Self {
        Self {
            tree,
            root,
            head_finder,
            names: FxHashMap::default(),
            variables: VariableStrings::new(),
        }
    }

    /// Parent of `node` within the searched subtree
    pub(crate) fn parent(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root {
            None
        } else {
            self.tree.parent(node)
        }
    }
}

/// Matcher for one node of the pattern AST
pub(crate) enum NodeMatcher<'a> {
    Description(DescriptionMatcher<'a>),
    Coordination(CoordinationMatcher<'a>),
}

impl<'a> NodeMatcher<'a> {
    fn new(pattern: &'a PatternNode, anchor: NodeId) -> Self {
        match pattern {
            PatternNode::Description(d) => NodeMatcher::Description(DescriptionMatcher::new(d, anchor)),
            PatternNode::Coordination(c) => NodeMatcher::Coordination(CoordinationMatcher::new(c, anchor)),
        }
    }

    fn matches(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        match self {
            NodeMatcher::Description(m) => m.matches(ctx),
            NodeMatcher::Coordination(m) => m.matches(ctx),
        }
    }

    /// Restart the search from the current anchor, undoing all bindings
    fn reset_child_iter(&mut self, ctx: &mut MatchContext<'a>) {
        match self {
            NodeMatcher::Description(m) => m.reset_child_iter(ctx),
            NodeMatcher::Coordination(m) => m.reset_child_iter(ctx),
        }
    }

    /// Restart the search from a new anchor
    fn reset_child_iter_at(&mut self, anchor: NodeId, ctx: &mut MatchContext<'a>) {
        match self {
            NodeMatcher::Description(m) => {
                m.anchor = anchor;
                m.reset_child_iter(ctx);
            }
            NodeMatcher::Coordination(m) => m.reset_child_iter_at(anchor, ctx),
        }
    }

    fn get_match(&self) -> Option<NodeId> {
        match self {
            NodeMatcher::Description(m) => m.candidate,
            NodeMatcher::Coordination(m) => m.get_match(),
        }
    }
}

pub(crate) struct DescriptionMatcher<'a> {
    pattern: &'a DescriptionPattern,
    anchor: NodeId,
    search: Option<RelationSearch<'a>>,
    /// The candidate currently accepted by the node test
    candidate: Option<NodeId>,
    child: Option<Box<NodeMatcher<'a>>>,
    finished: bool,
    /// For childless nodes: the current candidate has been reported
    matched_once: bool,
    committed: Option<Checkpoint>,
}

impl<'a> DescriptionMatcher<'a> {
    fn new(pattern: &'a DescriptionPattern, anchor: NodeId) -> Self {
        Self {
            pattern,
            anchor,
            search: None,
            candidate: None,
            child: None,
            finished: false,
            matched_once: false,
            committed: None,
        }
    }

    fn reset_child_iter(&mut self, ctx: &mut MatchContext<'a>) {
        self.decommit_variables(ctx);
        self.remove_name(ctx);
        self.search = None;
        self.finished = false;
        self.candidate = None;
        if let Some(child) = &mut self.child {
            child.reset_child_iter(ctx);
        }
    }

    fn decommit_variables(&mut self, ctx: &mut MatchContext<'a>) {
        if let Some(checkpoint) = self.committed.take() {
            ctx.variables.rollback(checkpoint);
        }
    }

    fn remove_name(&self, ctx: &mut MatchContext<'a>) {
        if self.pattern.declares_name()
            && let Some(name) = &self.pattern.name
        {
            ctx.names.remove(name.as_str());
        }
    }

    /// Re-anchor the child matcher at a freshly accepted candidate
    fn reset_child(&mut self, ctx: &mut MatchContext<'a>) {
        match (&mut self.child, self.candidate) {
            (Some(child), Some(candidate)) => child.reset_child_iter_at(candidate, ctx),
            (None, _) => self.matched_once = false,
            (Some(_), None) => {}
        }
    }

    /// Advance to the next relation candidate that passes the node test.
    /// Leaves `finished` set when the candidates run out.
    fn go_to_next_match(&mut self, ctx: &mut MatchContext<'a>) {
        self.decommit_variables(ctx);
        self.remove_name(ctx);
        self.finished = true;
        let pattern = self.pattern;
        let anchor = self.anchor;
        let search = self
            .search
            .get_or_insert_with(|| pattern.relation.search(anchor, ctx));
        let mut accepted = None;
        while let Some(candidate) = search.next(ctx) {
            if let Some(captures) = test_candidate(pattern, candidate, ctx) {
                accepted = Some((candidate, captures));
                break;
            }
        }
        let Some((candidate, captures)) = accepted else {
            self.candidate = None;
            return;
        };

        self.finished = false;
        self.candidate = Some(candidate);
        self.reset_child(ctx);
        if pattern.declares_name()
            && let Some(name) = &pattern.name
        {
            ctx.names.insert(name.as_str(), candidate);
        }
        if !captures.is_empty() {
            self.committed = Some(ctx.variables.checkpoint());
            for ((_, var), value) in pattern.variable_groups.iter().zip(&captures) {
                ctx.variables.set(var, value);
            }
        }
    }

    fn match_child(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        let Some(candidate) = self.candidate else {
            return false;
        };
        let pattern = self.pattern;
        if self.child.is_none()
            && let Some(child) = &pattern.child
        {
            self.child = Some(Box::new(NodeMatcher::new(child, candidate)));
        }
        match &mut self.child {
            Some(child) => child.matches(ctx),
            None if !self.matched_once => {
                self.matched_once = true;
                true
            }
            None => false,
        }
    }

    fn matches(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        // Negated and optional nodes only answer once per reset
        if self.finished {
            return false;
        }
        while !self.finished {
            if self.match_child(ctx) {
                if self.pattern.negated {
                    self.finished = true;
                    return false;
                }
                if self.pattern.optional {
                    self.finished = true;
                }
                return true;
            }
            self.go_to_next_match(ctx);
        }
        if self.pattern.negated {
            return true;
        }
        self.decommit_variables(ctx);
        self.remove_name(ctx);
        self.candidate = None;
        self.pattern.optional
    }
}

/// Apply the node test of `pattern` to one candidate. On success, returns
/// the strings to bind to its variable groups (in declaration order).
fn test_candidate(
    pattern: &DescriptionPattern,
    candidate: NodeId,
    ctx: &MatchContext<'_>,
) -> Option<Vec<String>> {
    let tree = ctx.tree;
    match &pattern.mode {
        DescriptionMode::Backreference => {
            let name = pattern.name.as_deref()?;
            (ctx.names.get(name) == Some(&candidate)).then(Vec::new)
        }
        DescriptionMode::Link(target) => {
            let linked = *ctx.names.get(target.as_str())?;
            let label = |node| tree.label(node).map(|l| pattern.basic_label(l));
            ((label(linked) == label(candidate)) != pattern.negated_description).then(Vec::new)
        }
        mode => {
            let Some(raw) = tree.label(candidate) else {
                return pattern.negated_description.then(Vec::new);
            };
            let value = pattern.basic_label(raw);
            let mut captures = None;
            let found = match mode {
                DescriptionMode::Anything => true,
                DescriptionMode::Exact(word) => *value == **word,
                DescriptionMode::StringSet(set) => set.accepts(&value),
                DescriptionMode::Regex(re) if pattern.variable_groups.is_empty() => re.is_match(&value),
                DescriptionMode::Regex(re) => match re.captures(&value) {
                    Some(caps) => {
                        captures = Some(
                            pattern
                                .variable_groups
                                .iter()
                                .map(|(group, _)| {
                                    caps.get(*group).map_or("", |m| m.as_str()).to_string()
                                })
                                .collect::<Vec<_>>(),
                        );
                        true
                    }
                    None => false,
                },
                DescriptionMode::Backreference | DescriptionMode::Link(_) => false,
            };
            if pattern.negated_description {
                return (!found).then(Vec::new);
            }
            if !found {
                return None;
            }
            // Without a regex every group stands for the whole label
            let captures = captures
                .unwrap_or_else(|| vec![value.to_string(); pattern.variable_groups.len()]);
            let consistent = pattern
                .variable_groups
                .iter()
                .zip(&captures)
                .all(|((_, var), value)| ctx.variables.get(var).is_none_or(|bound| bound == value));
            consistent.then_some(captures)
        }
    }
}

pub(crate) struct CoordinationMatcher<'a> {
    pattern: &'a CoordinationPattern,
    anchor: NodeId,
    children: Vec<Option<NodeMatcher<'a>>>,
    cursor: usize,
    /// No further match is possible until the next reset
    exhausted: bool,
    /// A match has been reported since the last reset
    matched: bool,
    /// Every child must hold: plain AND, or a negated OR
    consider_all: bool,
}

impl<'a> CoordinationMatcher<'a> {
    fn new(pattern: &'a CoordinationPattern, anchor: NodeId) -> Self {
        Self {
            pattern,
            anchor,
            children: pattern.children.iter().map(|_| None).collect(),
            cursor: 0,
            exhausted: false,
            matched: false,
            consider_all: pattern.is_conjunction != pattern.negated,
        }
    }

    fn child_matcher(&mut self, i: usize) -> &mut NodeMatcher<'a> {
        let pattern = self.pattern;
        let anchor = self.anchor;
        self.children[i].get_or_insert_with(|| NodeMatcher::new(&pattern.children[i], anchor))
    }

    fn reset_child_iter(&mut self, ctx: &mut MatchContext<'a>) {
        self.cursor = 0;
        self.exhausted = false;
        self.matched = false;
        for child in self.children.iter_mut().flatten() {
            child.reset_child_iter(ctx);
        }
    }

    fn reset_child_iter_at(&mut self, anchor: NodeId, ctx: &mut MatchContext<'a>) {
        self.anchor = anchor;
        self.cursor = 0;
        self.exhausted = false;
        self.matched = false;
        for child in self.children.iter_mut().flatten() {
            child.reset_child_iter_at(anchor, ctx);
        }
    }

    /// Result once no child combination is left: an optional coordination
    /// that never matched succeeds exactly once, with nothing bound
    fn fail(&mut self) -> bool {
        let trivial = self.pattern.optional && !self.matched;
        self.matched = true;
        self.exhausted = true;
        trivial
    }

    fn matches(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        if self.consider_all {
            self.match_all(ctx)
        } else {
            self.match_any(ctx)
        }
    }

    fn match_all(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        let negated = self.pattern.negated;
        let n = self.children.len();
        if self.exhausted || n == 0 {
            return self.fail();
        }
        // Resume by asking the last child for its next alternative
        if self.cursor == n {
            self.cursor -= 1;
        }
        loop {
            let i = self.cursor;
            let child = self.child_matcher(i);
            if negated != child.matches(ctx) {
                self.cursor += 1;
                if self.cursor == n {
                    if negated {
                        self.exhausted = true;
                    }
                    self.matched = true;
                    return true;
                }
            } else {
                child.reset_child_iter(ctx);
                // A negated disjunction fails as soon as any child matches
                if negated || i == 0 {
                    return self.fail();
                }
                self.cursor -= 1;
            }
        }
    }

    fn match_any(&mut self, ctx: &mut MatchContext<'a>) -> bool {
        let negated = self.pattern.negated;
        if !self.exhausted {
            while self.cursor < self.children.len() {
                let i = self.cursor;
                if negated != self.child_matcher(i).matches(ctx) {
                    if negated {
                        self.cursor = self.children.len();
                    }
                    self.matched = true;
                    return true;
                }
                self.cursor += 1;
            }
        }
        for child in self.children.iter_mut().flatten() {
            child.reset_child_iter(ctx);
        }
        self.fail()
    }

    /// Only a positive disjunction has a single matched node: that of the
    /// child that matched
    fn get_match(&self) -> Option<NodeId> {
        if self.pattern.is_conjunction || self.pattern.negated {
            return None;
        }
        self.children.get(self.cursor)?.as_ref()?.get_match()
    }
}

/// Runs a compiled pattern over a tree
///
/// Obtained from [`TregexPattern::matcher`]. Call [`find`](Self::find)
/// repeatedly to enumerate every match; after each successful call the
/// matched node, named nodes and variable groups can be queried.
pub struct TregexMatcher<'a> {
    pattern: &'a TregexPattern,
    root_matcher: NodeMatcher<'a>,
    ctx: MatchContext<'a>,
    find_iter: Option<Preorder<'a>>,
    find_current: Option<NodeId>,
}

impl<'a> TregexMatcher<'a> {
    pub(crate) fn new(
        pattern: &'a TregexPattern,
        tree: &'a Tree,
        root: NodeId,
        head_finder: Option<&'a dyn HeadFinder>,
    ) -> Self {
        Self {
            pattern,
            root_matcher: NodeMatcher::new(pattern.root(), root),
            ctx: MatchContext::new(tree, root, head_finder),
            find_iter: None,
            find_current: None,
        }
    }

    pub fn pattern(&self) -> &'a TregexPattern {
        self.pattern
    }

    pub fn tree(&self) -> &'a Tree {
        self.ctx.tree
    }

    /// Try to match (again) at the current position: the node where the
    /// search was last started must match the root of the pattern
    pub fn matches(&mut self) -> bool {
        self.root_matcher.matches(&mut self.ctx)
    }

    /// Restart matching with `node` as the match root
    pub fn matches_at(&mut self, node: NodeId) -> bool {
        self.root_matcher.reset_child_iter_at(node, &mut self.ctx);
        self.matches()
    }

    /// Find the next match, scanning the tree in preorder. A node may match
    /// several times in different ways; each is reported separately.
    pub fn find(&mut self) -> bool {
        if self.find_iter.is_none() {
            self.find_iter = Some(self.ctx.tree.preorder(self.ctx.root));
        }
        if self.find_current.is_some() && self.matches() {
            return true;
        }
        while let Some(node) = self.find_iter.as_mut().and_then(Iterator::next) {
            self.find_current = Some(node);
            self.root_matcher.reset_child_iter_at(node, &mut self.ctx);
            if self.matches() {
                return true;
            }
        }
        false
    }

    /// Find the next match rooted at `node`. Repeated calls enumerate the
    /// different ways the pattern matches there; switching to another node
    /// requires a [`reset`](Self::reset) first.
    pub fn find_at(&mut self, node: NodeId) -> Result<bool, MatcherError> {
        match self.find_current {
            Some(current) if current != node => Err(MatcherError::NodeChanged {
                current,
                requested: node,
            }),
            Some(_) => Ok(self.matches()),
            None => {
                self.find_current = Some(node);
                self.root_matcher.reset_child_iter_at(node, &mut self.ctx);
                Ok(self.matches())
            }
        }
    }

    /// Find the next match rooted at a different node than the last one
    pub fn find_next_matching_node(&mut self) -> bool {
        let last = self.get_match();
        while self.find() {
            if self.get_match() != last {
                return true;
            }
        }
        false
    }

    /// Forget the search position and every binding
    pub fn reset(&mut self) {
        self.find_iter = None;
        self.find_current = None;
        self.ctx.names.clear();
        self.ctx.variables.reset();
    }

    /// Root node of the last match
    pub fn get_match(&self) -> Option<NodeId> {
        self.root_matcher.get_match()
    }

    /// Node bound to `name` in the last match
    pub fn get_node(&self, name: &str) -> Option<NodeId> {
        self.ctx.names.get(name).copied()
    }

    /// Names bound in the last match, sorted
    pub fn get_node_names(&self) -> Vec<&'a str> {
        let mut names: Vec<_> = self.ctx.names.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn get_variable_string(&self, var: &str) -> Option<&str> {
        self.ctx.variables.get(var)
    }

    /// Every variable bound in the last match
    pub fn variables(&self) -> &VariableStrings {
        &self.ctx.variables
    }
}
