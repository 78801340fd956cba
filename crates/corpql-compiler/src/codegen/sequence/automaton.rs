//! Sequence automata
//!
//! Gaps of a sequence are compiled into a state-labelled NFA (each state is
//! either bound to a unit symbol or silent), determinized by subset
//! construction and minimized by partition refinement. Entering a symbol
//! state consumes one token satisfying that unit.

use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, VecDeque};

/// A unit occurrence inside a gap: the unit's label and its enclosing sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub label: String,
    pub sequence: String,
}

impl Symbol {
    pub fn new(label: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sequence: sequence.into(),
        }
    }
}

/// Regular pattern over unit symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Symbol(Symbol),
    Concat(Vec<Pattern>),
    Alt(Vec<Pattern>),
    Repeat {
        inner: Box<Pattern>,
        min: u32,
        max: Option<u32>,
    },
}

impl Pattern {
    pub fn repeat(inner: Pattern, min: u32, max: Option<u32>) -> Self {
        Pattern::Repeat {
            inner: Box::new(inner),
            min,
            max,
        }
    }

    /// The same pattern read right to left
    pub fn reversed(&self) -> Pattern {
        match self {
            Pattern::Symbol(symbol) => Pattern::Symbol(symbol.clone()),
            Pattern::Concat(parts) => {
                Pattern::Concat(parts.iter().rev().map(Pattern::reversed).collect())
            }
            Pattern::Alt(parts) => Pattern::Alt(parts.iter().map(Pattern::reversed).collect()),
            Pattern::Repeat { inner, min, max } => Pattern::repeat(inner.reversed(), *min, *max),
        }
    }

    /// Returns true if the pattern matches the empty word
    pub fn accepts_empty(&self) -> bool {
        match self {
            Pattern::Symbol(_) => false,
            Pattern::Concat(parts) => parts.iter().all(Pattern::accepts_empty),
            Pattern::Alt(parts) => parts.iter().any(Pattern::accepts_empty),
            Pattern::Repeat { inner, min, max } => {
                *min == 0 || *max == Some(0) || inner.accepts_empty()
            }
        }
    }
}

/// Thompson-style NFA whose states carry the symbol consumed on entry
#[derive(Debug, Clone)]
pub struct Nfa {
    symbols: Vec<Option<Symbol>>,
    edges: Vec<Vec<usize>>,
    start: usize,
    accept: usize,
}

impl Nfa {
    pub fn from_pattern(pattern: &Pattern) -> Self {
        let mut nfa = Nfa {
            symbols: Vec::new(),
            edges: Vec::new(),
            start: 0,
            accept: 0,
        };
        let (start, accept) = nfa.fragment(pattern);
        nfa.start = start;
        nfa.accept = accept;
        nfa
    }

    pub fn state_count(&self) -> usize {
        self.symbols.len()
    }

    fn state(&mut self, symbol: Option<Symbol>) -> usize {
        self.symbols.push(symbol);
        self.edges.push(Vec::new());
        self.symbols.len() - 1
    }

    fn edge(&mut self, from: usize, to: usize) {
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    /// Build a fragment, returning its silent entry and exit states
    fn fragment(&mut self, pattern: &Pattern) -> (usize, usize) {
        match pattern {
            Pattern::Symbol(symbol) => {
                let entry = self.state(None);
                let bound = self.state(Some(symbol.clone()));
                let exit = self.state(None);
                self.edge(entry, bound);
                self.edge(bound, exit);
                (entry, exit)
            }
            Pattern::Concat(parts) => {
                let entry = self.state(None);
                let mut last = entry;
                for part in parts {
                    let (start, end) = self.fragment(part);
                    self.edge(last, start);
                    last = end;
                }
                (entry, last)
            }
            Pattern::Alt(parts) => {
                let entry = self.state(None);
                let exit = self.state(None);
                for part in parts {
                    let (start, end) = self.fragment(part);
                    self.edge(entry, start);
                    self.edge(end, exit);
                }
                if parts.is_empty() {
                    self.edge(entry, exit);
                }
                (entry, exit)
            }
            Pattern::Repeat { inner, min, max } => {
                let entry = self.state(None);
                let exit = self.state(None);
                let copies = match max {
                    Some(max) => *max,
                    None => (*min).max(1),
                };
                let mut last = entry;
                for copy in 1..=copies {
                    let (start, end) = self.fragment(inner);
                    self.edge(last, start);
                    if copy >= *min {
                        self.edge(end, exit);
                    }
                    if max.is_none() && copy == copies {
                        // unbounded: loop on the last copy
                        self.edge(end, start);
                    }
                    last = end;
                }
                if *min == 0 || copies == 0 {
                    self.edge(entry, exit);
                }
                (entry, exit)
            }
        }
    }

    /// Symbol states reachable from `states` through silent states only,
    /// and whether the accept state is reachable the same way
    fn follow(&self, states: &BTreeSet<usize>) -> (BTreeSet<usize>, bool) {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut stack: Vec<usize> = states.iter().copied().collect();
        let mut targets = BTreeSet::new();
        let mut accepting = states.contains(&self.accept);

        while let Some(state) = stack.pop() {
            for &next in &self.edges[state] {
                if !seen.insert(next) {
                    continue;
                }
                if self.symbols[next].is_some() {
                    targets.insert(next);
                } else {
                    if next == self.accept {
                        accepting = true;
                    }
                    stack.push(next);
                }
            }
        }
        (targets, accepting)
    }

    /// Direct simulation, used to check determinization
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let mut current = BTreeSet::from([self.start]);
        for symbol in word {
            let (targets, _) = self.follow(&current);
            current = targets
                .into_iter()
                .filter(|&s| self.symbols[s].as_ref() == Some(symbol))
                .collect();
            if current.is_empty() {
                return false;
            }
        }
        self.follow(&current).1
    }
}

/// One row of the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub source: usize,
    pub dest: usize,
    pub symbol: Symbol,
}

/// Minimal deterministic automaton; state 0 is initial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    pub state_count: usize,
    pub transitions: Vec<Transition>,
    pub accepting: BTreeSet<usize>,
}

impl Automaton {
    /// Determinize and minimize the NFA of a pattern
    pub fn build(pattern: &Pattern) -> Self {
        let nfa = Nfa::from_pattern(pattern);
        let dfa = Dfa::from_nfa(&nfa);
        let minimal = dfa.minimize();
        tracing::trace!(
            nfa_states = nfa.state_count(),
            dfa_states = dfa.accepting.len(),
            minimal_states = minimal.state_count,
            "built sequence automaton"
        );
        minimal
    }

    /// Returns true if the initial state accepts (the gap may be empty)
    pub fn accepts_empty(&self) -> bool {
        self.accepting.contains(&0)
    }

    /// Distinct symbols in first-use order
    pub fn symbols(&self) -> IndexSet<&Symbol> {
        self.transitions.iter().map(|t| &t.symbol).collect()
    }

    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let mut state = 0;
        for symbol in word {
            match self
                .transitions
                .iter()
                .find(|t| t.source == state && &t.symbol == symbol)
            {
                Some(transition) => state = transition.dest,
                None => return false,
            }
        }
        self.accepting.contains(&state)
    }
}

/// Subset-construction result
#[derive(Debug, Clone)]
struct Dfa {
    /// Per state: symbol -> target, in first-seen order
    moves: Vec<IndexMap<Symbol, usize>>,
    accepting: Vec<bool>,
}

impl Dfa {
    fn from_nfa(nfa: &Nfa) -> Self {
        let mut index: IndexMap<BTreeSet<usize>, usize> = IndexMap::new();
        let mut moves = Vec::new();
        let mut accepting = Vec::new();
        let mut queue = VecDeque::new();

        let start = BTreeSet::from([nfa.start]);
        index.insert(start.clone(), 0);
        queue.push_back(start);

        while let Some(set) = queue.pop_front() {
            let (targets, accepts) = nfa.follow(&set);
            let mut by_symbol: IndexMap<Symbol, BTreeSet<usize>> = IndexMap::new();
            for state in targets {
                if let Some(symbol) = &nfa.symbols[state] {
                    by_symbol.entry(symbol.clone()).or_default().insert(state);
                }
            }

            let mut row = IndexMap::new();
            for (symbol, next) in by_symbol {
                let id = match index.get(&next) {
                    Some(&id) => id,
                    None => {
                        let id = index.len();
                        index.insert(next.clone(), id);
                        queue.push_back(next);
                        id
                    }
                };
                row.insert(symbol, id);
            }
            moves.push(row);
            accepting.push(accepts);
        }

        Dfa { moves, accepting }
    }

    /// Moore partition refinement followed by breadth-first renumbering
    fn minimize(&self) -> Automaton {
        let count = self.moves.len();
        let mut block: Vec<usize> = self.accepting.iter().map(|&a| usize::from(a)).collect();

        loop {
            let mut signatures: IndexMap<(usize, Vec<(Symbol, usize)>), usize> = IndexMap::new();
            let mut refined = vec![0; count];
            for state in 0..count {
                let mut signature: Vec<(Symbol, usize)> = self.moves[state]
                    .iter()
                    .map(|(symbol, &target)| (symbol.clone(), block[target]))
                    .collect();
                signature.sort();
                let key = (block[state], signature);
                let next = signatures.len();
                refined[state] = *signatures.entry(key).or_insert(next);
            }
            let stable = signatures.len() == distinct(&block);
            block = refined;
            if stable {
                break;
            }
        }

        // breadth-first renumbering from the initial block
        let mut order: IndexMap<usize, usize> = IndexMap::new();
        let mut representative: Vec<usize> = Vec::new();
        let mut queue = VecDeque::from([0usize]);
        order.insert(block[0], 0);
        representative.push(0);
        while let Some(state) = queue.pop_front() {
            for &target in self.moves[state].values() {
                if !order.contains_key(&block[target]) {
                    order.insert(block[target], order.len());
                    representative.push(target);
                    queue.push_back(target);
                }
            }
        }

        let mut transitions = Vec::new();
        let mut accepting = BTreeSet::new();
        for (id, &state) in representative.iter().enumerate() {
            if self.accepting[state] {
                accepting.insert(id);
            }
            for (symbol, &target) in &self.moves[state] {
                transitions.push(Transition {
                    source: id,
                    dest: order[&block[target]],
                    symbol: symbol.clone(),
                });
            }
        }

        Automaton {
            state_count: representative.len(),
            transitions,
            accepting,
        }
    }
}

fn distinct(blocks: &[usize]) -> usize {
    blocks.iter().collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(label: &str) -> Pattern {
        Pattern::Symbol(Symbol::new(label, "seq"))
    }

    fn word(labels: &str) -> Vec<Symbol> {
        labels.chars().map(|c| Symbol::new(c.to_string(), "seq")).collect()
    }

    #[test]
    fn test_star_then_anchor_has_two_states() {
        let pattern = Pattern::Concat(vec![Pattern::repeat(sym("u"), 0, None), sym("d")]);
        let automaton = Automaton::build(&pattern);
        assert_eq!(automaton.state_count, 2);
        assert!(automaton.accepts(&word("d")));
        assert!(automaton.accepts(&word("uuud")));
        assert!(!automaton.accepts(&word("uu")));
        assert!(!automaton.accepts_empty());
    }

    #[test]
    fn test_optional_gap_accepts_empty() {
        let pattern = Pattern::repeat(sym("a"), 0, Some(2));
        let automaton = Automaton::build(&pattern);
        assert!(automaton.accepts_empty());
        assert!(automaton.accepts(&word("aa")));
        assert!(!automaton.accepts(&word("aaa")));
        assert_eq!(automaton.state_count, 3);
    }

    #[test]
    fn test_reversed_pattern() {
        let pattern = Pattern::Concat(vec![sym("a"), sym("b")]);
        let automaton = Automaton::build(&pattern.reversed());
        assert!(automaton.accepts(&word("ba")));
        assert!(!automaton.accepts(&word("ab")));
    }

    #[test]
    fn test_deterministic_numbering() {
        let pattern = Pattern::Concat(vec![
            Pattern::Alt(vec![sym("a"), Pattern::Concat(vec![sym("b"), sym("c")])]),
            Pattern::repeat(sym("a"), 1, Some(3)),
        ]);
        assert_eq!(Automaton::build(&pattern), Automaton::build(&pattern));
    }
}
