//! Pattern parser
//!
//! Parses pattern text into the [`PatternNode`] AST using the pest grammar in
//! `tregex.pest`, then checks the naming rules the grammar cannot express.

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::category::BasicCategory;
use crate::head_finder::HeadFinder;
use crate::pattern::{CoordinationPattern, DescriptionMode, DescriptionPattern, PatternNode};
use crate::relation::{Relation, RelationError};

#[derive(Parser)]
#[grammar = "tregex.pest"]
struct TregexParser;

/// Error type for pattern parsing failures
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Pattern error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Pattern error: {0}")]
    Relation(#[from] RelationError),

    #[error("Pattern error: bad regex {pattern}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Pattern error: a node cannot be both negated and optional")]
    NegatedAndOptional,

    #[error("Pattern error: cannot name node {0} under negation")]
    NamedUnderNegation(String),

    #[error("Pattern error: node name {0} declared twice")]
    DuplicateName(String),

    #[error("Pattern error: {pattern} has no capture group {group}")]
    GroupNumber { pattern: String, group: usize },

    #[error("Pattern error: unexpected {0}")]
    Malformed(String),
}

/// Parse `input` into a pattern AST. Returns the root node and every name
/// the pattern declares.
pub(crate) fn parse_pattern(
    input: &str,
    basic_category: &Arc<dyn BasicCategory>,
    head_finder: &Arc<dyn HeadFinder>,
) -> Result<(PatternNode, BTreeSet<String>), PatternError> {
    let mut pairs = TregexParser::parse(Rule::pattern, input)?;
    let pattern = next_pair(&mut pairs)?;
    let mut builder = PatternBuilder {
        basic_category,
        head_finder,
        relations: FxHashMap::default(),
    };
    let disjunction = next_pair(&mut pattern.into_inner())?;
    let root = builder.node_disjunction(disjunction)?;

    let mut known_variables = BTreeSet::new();
    check_names(&root, false, &BTreeSet::new(), &mut known_variables)?;
    Ok((root, known_variables))
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, PatternError> {
    pairs
        .next()
        .ok_or_else(|| PatternError::Malformed("end of pattern".to_string()))
}

fn unexpected(pair: &Pair<'_, Rule>) -> PatternError {
    PatternError::Malformed(format!("{:?} at '{}'", pair.as_rule(), pair.as_str()))
}

struct PatternBuilder<'c> {
    basic_category: &'c Arc<dyn BasicCategory>,
    head_finder: &'c Arc<dyn HeadFinder>,
    /// Equal relations share one allocation within a pattern
    relations: FxHashMap<Relation, Arc<Relation>>,
}

impl PatternBuilder<'_> {
    fn intern(&mut self, relation: Relation) -> Arc<Relation> {
        if let Some(shared) = self.relations.get(&relation) {
            return Arc::clone(shared);
        }
        let shared = Arc::new(relation.clone());
        self.relations.insert(relation, Arc::clone(&shared));
        shared
    }

    /// Top level: `A ... | B ...`, each alternative anchored at the match root
    fn node_disjunction(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let mut alternatives = Vec::new();
        for sub_node in pair.into_inner() {
            let root = self.intern(Relation::Root);
            alternatives.push(PatternNode::Description(self.sub_node(sub_node, root)?));
        }
        Ok(coordinate(alternatives, false))
    }

    /// A node description with any relations that hang off it
    fn sub_node(
        &mut self,
        pair: Pair<'_, Rule>,
        relation: Arc<Relation>,
    ) -> Result<DescriptionPattern, PatternError> {
        let mut inner = pair.into_inner();
        let mut node = self.relation_target(next_pair(&mut inner)?, relation)?;
        if let Some(relations) = inner.next() {
            node.add_child(self.relation_disjunction(relations)?);
        }
        Ok(node)
    }

    fn relation_target(
        &mut self,
        pair: Pair<'_, Rule>,
        relation: Arc<Relation>,
    ) -> Result<DescriptionPattern, PatternError> {
        match pair.as_rule() {
            Rule::relation_target => self.relation_target(next_pair(&mut pair.into_inner())?, relation),
            Rule::grouped_node => self.sub_node(next_pair(&mut pair.into_inner())?, relation),
            Rule::described_node => self.described_node(pair, relation),
            _ => Err(unexpected(&pair)),
        }
    }

    fn relation_disjunction(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let children = pair
            .into_inner()
            .map(|conjunction| self.relation_conjunction(conjunction))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(coordinate(children, false))
    }

    fn relation_conjunction(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let children = pair
            .into_inner()
            .map(|relation| self.modified_relation(relation))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(coordinate(children, true))
    }

    /// `!` and `?` prefixes, then the relation or relation group they apply to
    fn modified_relation(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let mut negated = false;
        let mut optional = false;
        let mut child = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::relation_modifier => match part.into_inner().next().map(|m| m.as_rule()) {
                    Some(Rule::negation) => negated = true,
                    Some(Rule::optional) => optional = true,
                    _ => return Err(PatternError::Malformed("relation modifier".to_string())),
                },
                Rule::relation_child => child = Some(self.relation_child(part)?),
                _ => return Err(unexpected(&part)),
            }
        }
        let mut node = child.ok_or_else(|| PatternError::Malformed("missing relation".to_string()))?;
        // `![!< B]`: a group that collapsed to one modified relation keeps its own modifier
        if (negated || optional) && (node.is_negated() || node.is_optional()) {
            node = PatternNode::Coordination(CoordinationPattern::new(vec![node], true));
        }
        if negated {
            node.negate()?;
        }
        if optional {
            node.make_optional()?;
        }
        Ok(node)
    }

    fn relation_child(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let inner = next_pair(&mut pair.into_inner())?;
        match inner.as_rule() {
            Rule::bracket_group | Rule::paren_group => {
                self.relation_disjunction(next_pair(&mut inner.into_inner())?)
            }
            Rule::relation => self.relation(next_pair(&mut inner.into_inner())?),
            _ => Err(unexpected(&inner)),
        }
    }

    fn relation(&mut self, pair: Pair<'_, Rule>) -> Result<PatternNode, PatternError> {
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        let relation = match rule {
            Rule::multi_relation => return self.multi_relation(inner),
            Rule::simple_relation => {
                let symbol = next_pair(&mut inner)?;
                Relation::from_symbol(symbol.as_str(), self.head_finder)?
            }
            Rule::indexed_relation => {
                let symbol = next_pair(&mut inner)?.as_str();
                let (direction, index) = symbol.split_at(1);
                Relation::with_argument(direction, index, self.basic_category)?
            }
            Rule::argument_relation => {
                let symbol = next_pair(&mut inner)?;
                let argument = next_pair(&mut inner)?;
                Relation::with_argument(symbol.as_str(), argument.as_str(), self.basic_category)?
            }
            _ => return Err(PatternError::Malformed(format!("{:?}", rule))),
        };
        let relation = self.intern(relation);
        let target = self.relation_target(next_pair(&mut inner)?, relation)?;
        Ok(PatternNode::Description(target))
    }

    /// `<... { A ; B ; C }` becomes `<1 A <2 B <3 C !<4 __`
    fn multi_relation(&mut self, targets: Pairs<'_, Rule>) -> Result<PatternNode, PatternError> {
        let mut children = Vec::new();
        for (i, target) in targets.enumerate() {
            let relation = self.intern(Relation::has_ith_child(i as i32 + 1)?);
            children.push(PatternNode::Description(self.relation_target(target, relation)?));
        }
        let relation = self.intern(Relation::has_ith_child(children.len() as i32 + 1)?);
        let mut no_more = PatternNode::Description(
            DescriptionPattern::new(relation, "__").map_err(|source| PatternError::Regex {
                pattern: "__".to_string(),
                source,
            })?,
        );
        no_more.negate()?;
        children.push(no_more);
        Ok(PatternNode::Coordination(CoordinationPattern::new(children, true)))
    }

    fn described_node(
        &mut self,
        pair: Pair<'_, Rule>,
        relation: Arc<Relation>,
    ) -> Result<DescriptionPattern, PatternError> {
        let mut negated_description = false;
        let mut basic_category = false;
        let mut node = None;
        let mut name = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::backreference => {
                    let target = next_pair(&mut part.into_inner())?;
                    return Ok(DescriptionPattern::backreference(relation, target.as_str()));
                }
                Rule::description_negation => negated_description = true,
                Rule::basic_category => basic_category = true,
                Rule::link => {
                    let target = next_pair(&mut part.into_inner())?;
                    node = Some(DescriptionPattern::link(Arc::clone(&relation), target.as_str(), None));
                }
                Rule::label_description => {
                    node = Some(self.label_description(part, Arc::clone(&relation))?);
                }
                Rule::node_name => name = Some(next_pair(&mut part.into_inner())?.as_str().to_string()),
                _ => return Err(unexpected(&part)),
            }
        }
        let mut node = node.ok_or_else(|| PatternError::Malformed("empty node description".to_string()))?;
        node.negated_description = negated_description;
        if basic_category {
            node.basic_category = Some(Arc::clone(self.basic_category));
        }
        if name.is_some() {
            node.name = name;
        }
        Ok(node)
    }

    /// Label test plus its `#group%variable` captures
    fn label_description(
        &mut self,
        pair: Pair<'_, Rule>,
        relation: Arc<Relation>,
    ) -> Result<DescriptionPattern, PatternError> {
        let mut inner = pair.into_inner();
        let text = next_pair(&mut inner)?.as_str();
        let mut node = DescriptionPattern::new(relation, text).map_err(|source| PatternError::Regex {
            pattern: text.to_string(),
            source,
        })?;
        for group in inner {
            let mut parts = group.into_inner();
            let number = next_pair(&mut parts)?.as_str();
            let variable = next_pair(&mut parts)?.as_str();
            let number: usize = number
                .parse()
                .map_err(|_| PatternError::Malformed(format!("group number {}", number)))?;
            if let DescriptionMode::Regex(re) = &node.mode
                && number >= re.captures_len()
            {
                return Err(PatternError::GroupNumber {
                    pattern: text.to_string(),
                    group: number,
                });
            }
            node.variable_groups.push((number, variable.to_string()));
        }
        Ok(node)
    }
}

/// Combine sibling patterns; a single pattern stands for itself
fn coordinate(mut children: Vec<PatternNode>, is_conjunction: bool) -> PatternNode {
    if children.len() == 1
        && let Some(only) = children.pop()
    {
        return only;
    }
    PatternNode::Coordination(CoordinationPattern::new(children, is_conjunction))
}

/// Reject names declared under negation and names declared twice on one
/// conjunctive path. `scope` holds the names already bound when `node` is
/// reached; the names bound after it are returned.
fn check_names(
    node: &PatternNode,
    under_negation: bool,
    scope: &BTreeSet<String>,
    known: &mut BTreeSet<String>,
) -> Result<BTreeSet<String>, PatternError> {
    let negated = under_negation || node.is_negated();
    match node {
        PatternNode::Description(description) => {
            let mut scope = scope.clone();
            if description.declares_name()
                && let Some(name) = description.name()
            {
                if negated {
                    return Err(PatternError::NamedUnderNegation(name.to_string()));
                }
                if !scope.insert(name.to_string()) {
                    return Err(PatternError::DuplicateName(name.to_string()));
                }
                known.insert(name.to_string());
            }
            match description.child() {
                Some(child) => check_names(child, negated, &scope, known),
                None => Ok(scope),
            }
        }
        PatternNode::Coordination(coordination) if coordination.is_conjunction() => {
            let mut scope = scope.clone();
            for child in coordination.children() {
                scope = check_names(child, negated, &scope, known)?;
            }
            Ok(scope)
        }
        PatternNode::Coordination(coordination) => {
            let mut bound = scope.clone();
            for child in coordination.children() {
                bound.extend(check_names(child, negated, scope, known)?);
            }
            Ok(bound)
        }
    }
}
