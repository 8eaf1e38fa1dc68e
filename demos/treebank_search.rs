//! End-to-end example: bracketed trees → pattern → matches
//!
//! Reads a small treebank, compiles a pattern with a macro, and prints every
//! match with its named nodes and variable groups.
//!
//! Run with: cargo run --example treebank_search [PATTERN] [FILE]

use std::env;
use tregex::{MatchSet, TregexPatternCompiler, Treebank};

const SAMPLE: &str = "\
(ROOT (S (NP (DT The) (JJ big) (NN dog)) (VP (VBZ runs) (ADVP (RB quickly))) (. .)))
(ROOT (S (NP (NNP Mary)) (VP (VBD saw) (NP (DT a) (JJ red) (NN car))) (. .)))
(ROOT (SBARQ (WHNP-1 (WP What)) (SQ (VBD did) (NP (PRP you)) (VP (VB see) (NP (-NONE- *T*-1)))) (. ?)))
";

fn main() {
    let mut args = env::args().skip(1);
    let pattern_text = args.next().unwrap_or_else(|| "NP < (ADJ=adj $+ NN=noun)".to_string());

    let mut compiler = TregexPatternCompiler::new();
    if let Err(e) = compiler.add_macro("ADJ", "/^JJ/") {
        eprintln!("Bad macro: {}", e);
        return;
    }
    let pattern = match compiler.compile(&pattern_text) {
        Ok(pattern) => pattern,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("Pattern: {}", pattern.pattern());
    println!("Parsed:  {}", pattern);
    println!("{}", pattern.pretty_print());

    let treebank = match args.next() {
        Some(path) => Treebank::from_file(path),
        None => Treebank::from_string(SAMPLE),
    };

    let mut count = 0;
    for (tree, m) in MatchSet::new(&treebank, &pattern) {
        count += 1;
        println!("Match {}: {}", count, tree.display(m.root));
        for (name, node) in &m.nodes {
            println!("  {} = {}", name, tree.display(*node));
        }
        for (var, value) in &m.variables {
            println!("  %{} = {}", var, value);
        }
    }
    println!("{} match(es)", count);
}
