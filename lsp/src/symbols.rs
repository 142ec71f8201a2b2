//! Symbol depth computation, filtering and position lookup.
//!
//! Servers report nesting only through each symbol's `containerName`, so the
//! hierarchy is rebuilt from names: a symbol's depth is one more than the
//! depth of the symbol its container names.

use std::collections::{HashMap, HashSet};

use lspbridge_types::{DocumentSymbol, EditorPosition};

struct DepthResolver<'a> {
    /// name -> container of that name's first declaration
    containers: HashMap<&'a str, Option<&'a str>>,
    memo: HashMap<&'a str, u32>,
}

impl<'a> DepthResolver<'a> {
    fn new(symbols: &'a [DocumentSymbol]) -> Self {
        let mut containers = HashMap::new();
        for symbol in symbols {
            containers
                .entry(symbol.name.as_str())
                .or_insert(symbol.container_name.as_deref());
        }
        Self {
            containers,
            memo: HashMap::new(),
        }
    }

    /// Depth of the symbol called `name`. Unknown names count as top-level;
    /// a name already on the current chain closes a cycle and counts as 0.
    fn depth_of_name(&mut self, name: &'a str, visiting: &mut HashSet<&'a str>) -> u32 {
        if let Some(&depth) = self.memo.get(name) {
            return depth;
        }
        let Some(Some(container)) = self.containers.get(name).copied() else {
            return 0;
        };
        if !visiting.insert(name) {
            return 0;
        }
        let depth = self.depth_of_name(container, visiting) + 1;
        visiting.remove(name);
        self.memo.insert(name, depth);
        depth
    }
}

/// Fill in `depth` for every symbol.
pub(crate) fn assign_depths(symbols: &mut [DocumentSymbol]) {
    let depths: Vec<u32> = {
        let mut resolver = DepthResolver::new(symbols);
        symbols
            .iter()
            .map(|symbol| match symbol.container_name.as_deref() {
                None => 0,
                Some(container) => {
                    let mut visiting = HashSet::from([symbol.name.as_str()]);
                    resolver.depth_of_name(container, &mut visiting) + 1
                }
            })
            .collect()
    };
    for (symbol, depth) in symbols.iter_mut().zip(depths) {
        symbol.depth = depth;
    }
}

/// Keep symbols within `max_depth` whose kind is in `kinds` (any kind when
/// `kinds` is empty).
pub(crate) fn filter_symbols(
    symbols: Vec<DocumentSymbol>,
    max_depth: Option<u32>,
    kinds: &[String],
) -> Vec<DocumentSymbol> {
    symbols
        .into_iter()
        .filter(|s| max_depth.is_none_or(|max| s.depth <= max))
        .filter(|s| kinds.is_empty() || kinds.iter().any(|k| s.kind.matches_name(k)))
        .collect()
}

/// The most specific symbol whose range encloses `position`: the smallest
/// by line span, then character span.
pub(crate) fn enclosing_symbol(
    symbols: &[DocumentSymbol],
    position: EditorPosition,
) -> Option<&DocumentSymbol> {
    symbols
        .iter()
        .filter_map(|symbol| {
            let location = symbol.location.as_ref()?;
            let (start_line, start_char, end_line, end_char) = location.bounds()?;
            location.contains(position).then(|| {
                let size = (end_line.abs_diff(start_line), end_char.abs_diff(start_char));
                (symbol, size)
            })
        })
        .min_by_key(|(_, size)| *size)
        .map(|(symbol, _)| symbol)
}
