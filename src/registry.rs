use crate::error::{Result, VersificationError};
use crate::mapping::VersificationMapping;
use crate::versification::Versification;
use std::path::Path;
use std::sync::Arc;

pub(crate) const FILE_HEADER: &str = "BibleMultiConverter-VersificationSet-1.0";

/// How `find_mapping` picks among the mappings registered for a
/// scheme pair. Key syntax: `from/to` = `Derived`, `from/to/N` =
/// `Nth(N)` (1-based), `from/to/-1` = `SharedVerses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSelector {
    /// The single registered mapping, the best merge of several, or
    /// the transitively derived one when none is registered directly.
    Derived,
    /// The n-th directly registered mapping, 1-based.
    Nth(usize),
    /// An identity mapping over the references both schemes contain
    /// verbatim.
    SharedVerses,
}

/// Splits `from/to[/selector]` into its parts.
pub fn parse_mapping_key(key: &str) -> Result<(&str, &str, MappingSelector)> {
    let invalid = |detail: &str| VersificationError::InvalidMappingKey {
        key: key.to_string(),
        detail: detail.to_string(),
    };
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [from, to] => Ok((from, to, MappingSelector::Derived)),
        [from, to, selector] => {
            let number: i64 = selector
                .parse()
                .map_err(|_| invalid("selector must be a number"))?;
            let selector = match number {
                -1 => MappingSelector::SharedVerses,
                0 => MappingSelector::Derived,
                n if n > 0 => MappingSelector::Nth(n as usize),
                _ => return Err(invalid("selector must be -1, 0 or a positive index")),
            };
            Ok((from, to, selector))
        }
        _ => Err(invalid("expected 'from/to' or 'from/to/selector'")),
    }
}

/// One cell of the transitive mapping closure.
#[derive(Debug, Clone)]
pub enum MappingCell {
    /// No mapping is registered or derivable for this pair.
    Unknown,
    /// Candidates for this pair contradict each other; no single
    /// mapping can be derived.
    Ambiguous,
    Known(Arc<VersificationMapping>),
}

/// The mutable container for schemes and mappings, with name/alias
/// lookup and a cached transitive mapping closure. Scheme names are
/// the sole identity key; registration enforces their uniqueness.
#[derive(Debug, Default)]
pub struct VersificationRegistry {
    versifications: Vec<Arc<Versification>>,
    mappings: Vec<Arc<VersificationMapping>>,
    closure: Option<Vec<Vec<MappingCell>>>,
}

impl VersificationRegistry {
    pub fn new() -> VersificationRegistry {
        VersificationRegistry::default()
    }

    /// Loads a registry from a versification db file.
    pub fn from_file(path: &Path) -> Result<VersificationRegistry> {
        let text = std::fs::read_to_string(path)?;
        let mut registry = VersificationRegistry::new();
        registry.load_str(&text)?;
        Ok(registry)
    }

    pub fn versifications(&self) -> &[Arc<Versification>] {
        &self.versifications
    }

    pub fn mappings(&self) -> &[Arc<VersificationMapping>] {
        &self.mappings
    }

    pub fn add_versification(&mut self, versification: Versification) -> Result<()> {
        self.insert_scheme(Arc::new(versification))
    }

    fn insert_scheme(&mut self, versification: Arc<Versification>) -> Result<()> {
        if self.scheme_position(versification.name()).is_some() {
            return Err(VersificationError::DuplicateVersification {
                name: versification.name().to_string(),
            });
        }
        self.versifications.push(versification);
        self.closure = None;
        Ok(())
    }

    /// Endpoint schemes need not be registered yet; `save_to_string`
    /// rejects mappings whose endpoints are still missing.
    pub fn add_mapping(&mut self, mapping: VersificationMapping) {
        self.mappings.push(Arc::new(mapping));
        self.closure = None;
    }

    /// Removes a scheme and every mapping touching it.
    pub fn remove_versification(&mut self, name: &str) -> Result<()> {
        let scheme = Arc::clone(self.find(name)?);
        self.versifications.retain(|v| v.name() != scheme.name());
        self.mappings
            .retain(|m| m.from().name() != scheme.name() && m.to().name() != scheme.name());
        self.closure = None;
        Ok(())
    }

    /// Renames a scheme and re-points every stored mapping that
    /// touches it. The new name must not collide with another
    /// registered scheme.
    pub fn rename_versification(&mut self, name: &str, new_name: &str) -> Result<()> {
        let old = Arc::clone(self.find(name)?);
        if old.name() != new_name && self.versifications.iter().any(|v| v.name() == new_name) {
            return Err(VersificationError::DuplicateVersification {
                name: new_name.to_string(),
            });
        }
        let renamed = Arc::new(old.with_name(new_name)?);
        let old_name = old.name().to_string();

        for slot in &mut self.versifications {
            if slot.name() == old_name {
                *slot = Arc::clone(&renamed);
            }
        }
        for slot in &mut self.mappings {
            let from_hit = slot.from().name() == old_name;
            let to_hit = slot.to().name() == old_name;
            if from_hit || to_hit {
                let from = if from_hit {
                    Arc::clone(&renamed)
                } else {
                    Arc::clone(slot.from())
                };
                let to = if to_hit {
                    Arc::clone(&renamed)
                } else {
                    Arc::clone(slot.to())
                };
                *slot = Arc::new(slot.with_endpoints(&from, &to));
            }
        }
        self.closure = None;
        Ok(())
    }

    /// Removes a directly registered mapping by key. Derived and
    /// shared-verse mappings are computed, not stored, so they cannot
    /// be removed.
    pub fn remove_mapping(&mut self, key: &str) -> Result<()> {
        let (from_name, to_name, selector) = parse_mapping_key(key)?;
        let from = Arc::clone(self.find(from_name)?);
        let to = Arc::clone(self.find(to_name)?);
        let positions: Vec<usize> = self
            .mappings
            .iter()
            .enumerate()
            .filter(|(_, m)| m.from().name() == from.name() && m.to().name() == to.name())
            .map(|(i, _)| i)
            .collect();
        let position = match selector {
            MappingSelector::Nth(n) => {
                if n < 1 || n > positions.len() {
                    return Err(VersificationError::MappingIndexNotFound {
                        from: from.name().to_string(),
                        to: to.name().to_string(),
                        index: n,
                    });
                }
                positions[n - 1]
            }
            MappingSelector::Derived => match positions.len() {
                0 => {
                    return Err(VersificationError::MappingNotFound {
                        from: from.name().to_string(),
                        to: to.name().to_string(),
                    })
                }
                1 => positions[0],
                _ => {
                    return Err(VersificationError::InvalidMappingKey {
                        key: key.to_string(),
                        detail: "several mappings registered, give an explicit index"
                            .to_string(),
                    })
                }
            },
            MappingSelector::SharedVerses => {
                return Err(VersificationError::InvalidMappingKey {
                    key: key.to_string(),
                    detail: "cannot remove a computed mapping".to_string(),
                })
            }
        };
        self.mappings.remove(position);
        self.closure = None;
        Ok(())
    }

    /// Looks a scheme up by primary name first, then by alias. A miss
    /// carries the closest registered name as a suggestion when one
    /// is similar enough.
    pub fn find(&self, name: &str) -> Result<&Arc<Versification>> {
        if let Some(v) = self.versifications.iter().find(|v| v.name() == name) {
            return Ok(v);
        }
        if let Some(v) = self
            .versifications
            .iter()
            .find(|v| v.aliases().iter().any(|a| a == name))
        {
            return Ok(v);
        }
        Err(VersificationError::VersificationNotFound {
            name: name.to_string(),
            suggestion: self.suggest(name),
        })
    }

    fn suggest(&self, name: &str) -> String {
        let candidates = self.versifications.iter().flat_map(|v| {
            std::iter::once(v.name()).chain(v.aliases().iter().map(String::as_str))
        });
        match closest_name(name, candidates) {
            Some(best) => format!(", did you mean '{}'?", best),
            None => String::new(),
        }
    }

    fn scheme_position(&self, name: &str) -> Option<usize> {
        self.versifications.iter().position(|v| v.name() == name)
    }

    pub fn find_mapping_key(&mut self, key: &str) -> Result<Arc<VersificationMapping>> {
        let (from, to, selector) = parse_mapping_key(key)?;
        self.find_mapping(from, to, selector)
    }

    pub fn find_mapping(
        &mut self,
        from_name: &str,
        to_name: &str,
        selector: MappingSelector,
    ) -> Result<Arc<VersificationMapping>> {
        let from = Arc::clone(self.find(from_name)?);
        let to = Arc::clone(self.find(to_name)?);
        match selector {
            MappingSelector::SharedVerses => {
                let mut map = Vec::new();
                for r in from.references() {
                    if to.contains(&r) {
                        map.push((r.clone(), vec![r]));
                    }
                }
                Ok(Arc::new(VersificationMapping::build(&from, &to, &map)?))
            }
            MappingSelector::Nth(n) => {
                let candidates = self.direct_candidates(&from, &to);
                if n < 1 || n > candidates.len() {
                    return Err(VersificationError::MappingIndexNotFound {
                        from: from.name().to_string(),
                        to: to.name().to_string(),
                        index: n,
                    });
                }
                Ok(Arc::clone(&candidates[n - 1]))
            }
            MappingSelector::Derived => {
                let candidates = self.direct_candidates(&from, &to);
                match candidates.len() {
                    1 => Ok(Arc::clone(&candidates[0])),
                    0 => {
                        let not_found = || VersificationError::MappingNotFound {
                            from: from.name().to_string(),
                            to: to.name().to_string(),
                        };
                        let i = self.scheme_position(from.name()).ok_or_else(not_found)?;
                        let j = self.scheme_position(to.name()).ok_or_else(not_found)?;
                        match &self.transitive_mappings()?[i][j] {
                            MappingCell::Known(mapping) => Ok(Arc::clone(mapping)),
                            MappingCell::Ambiguous => {
                                Err(VersificationError::AmbiguousMapping {
                                    from: from.name().to_string(),
                                    to: to.name().to_string(),
                                })
                            }
                            MappingCell::Unknown => Err(not_found()),
                        }
                    }
                    _ => {
                        let refs: Vec<&VersificationMapping> =
                            candidates.iter().map(|m| m.as_ref()).collect();
                        let best =
                            VersificationMapping::find_best_mapping(&from, &to, &refs)?;
                        Ok(Arc::new(best))
                    }
                }
            }
        }
    }

    fn direct_candidates(
        &self,
        from: &Arc<Versification>,
        to: &Arc<Versification>,
    ) -> Vec<Arc<VersificationMapping>> {
        self.mappings
            .iter()
            .filter(|m| m.from().name() == from.name() && m.to().name() == to.name())
            .cloned()
            .collect()
    }

    /// The lazily computed all-pairs closure, indexed by scheme
    /// position. Invalidated by every membership change.
    pub fn transitive_mappings(&mut self) -> Result<&[Vec<MappingCell>]> {
        if self.closure.is_none() {
            let cells = self.compute_closure()?;
            self.closure = Some(cells);
        }
        Ok(self.closure.as_deref().unwrap_or_default())
    }

    fn compute_closure(&self) -> Result<Vec<Vec<MappingCell>>> {
        let n = self.versifications.len();
        let mut cells = vec![vec![MappingCell::Unknown; n]; n];

        // seed with directly registered mappings
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let from = &self.versifications[i];
                let to = &self.versifications[j];
                let candidates = self.direct_candidates(from, to);
                cells[i][j] = match candidates.len() {
                    0 => MappingCell::Unknown,
                    1 => MappingCell::Known(Arc::clone(&candidates[0])),
                    _ => {
                        let refs: Vec<&VersificationMapping> =
                            candidates.iter().map(|m| m.as_ref()).collect();
                        match VersificationMapping::find_best_mapping(from, to, &refs) {
                            Ok(best) => MappingCell::Known(Arc::new(best)),
                            Err(VersificationError::AmbiguousMapping { .. }) => {
                                MappingCell::Ambiguous
                            }
                            Err(e) => return Err(e),
                        }
                    }
                };
            }
        }

        // relax until a full pass changes nothing; ambiguous cells
        // are terminal
        loop {
            let previous = cells.clone();
            let mut changed = false;
            for i in 0..n {
                for j in 0..n {
                    if i == j || !matches!(previous[i][j], MappingCell::Unknown) {
                        continue;
                    }
                    let mut clean: Vec<VersificationMapping> = Vec::new();
                    let mut through_ambiguous = false;
                    for k in 0..n {
                        if k == i || k == j {
                            continue;
                        }
                        match (&previous[i][k], &previous[k][j]) {
                            (MappingCell::Known(a), MappingCell::Known(b)) => {
                                clean.push(VersificationMapping::join(a, b)?);
                            }
                            (MappingCell::Unknown, _) | (_, MappingCell::Unknown) => {}
                            _ => through_ambiguous = true,
                        }
                    }
                    let next = if clean.len() == 1 {
                        MappingCell::Known(Arc::new(clean.remove(0)))
                    } else if clean.len() > 1 {
                        let from = &self.versifications[i];
                        let to = &self.versifications[j];
                        let refs: Vec<&VersificationMapping> = clean.iter().collect();
                        match VersificationMapping::find_best_mapping(from, to, &refs) {
                            Ok(best) => MappingCell::Known(Arc::new(best)),
                            Err(VersificationError::AmbiguousMapping { .. }) => {
                                MappingCell::Ambiguous
                            }
                            Err(e) => return Err(e),
                        }
                    } else if through_ambiguous {
                        MappingCell::Ambiguous
                    } else {
                        continue;
                    };
                    cells[i][j] = next;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(cells)
    }

    /// Parses db file text into this registry. Blocks are a header
    /// line plus space-prefixed body lines; a header with `>` and no
    /// space is a mapping block, anything else a scheme block.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let mut lines = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));
        let header = lines.next().unwrap_or_default();
        if header != FILE_HEADER {
            return Err(VersificationError::InvalidHeader {
                line: header.to_string(),
            });
        }
        let mut pending: Option<(String, Vec<String>)> = None;
        for line in lines {
            if let Some(body_line) = line.strip_prefix(' ') {
                match &mut pending {
                    Some((_, body)) => body.push(body_line.to_string()),
                    None => {
                        return Err(VersificationError::MalformedLine {
                            line: line.to_string(),
                            detail: "body line before any block header".to_string(),
                        })
                    }
                }
            } else {
                if let Some((header, body)) = pending.take() {
                    self.load_block(&header, &body)?;
                }
                pending = Some((line.to_string(), Vec::new()));
            }
        }
        if let Some((header, body)) = pending.take() {
            self.load_block(&header, &body)?;
        }
        self.closure = None;
        Ok(())
    }

    fn load_block(&mut self, header: &str, body: &[String]) -> Result<()> {
        match header.split_once('>') {
            Some((from_name, to_name)) if !header.contains(' ') => {
                let from = Arc::clone(self.find(from_name)?);
                let to = Arc::clone(self.find(to_name)?);
                let mapping = VersificationMapping::from_rule_lines(&from, &to, body)?;
                self.mappings.push(Arc::new(mapping));
                Ok(())
            }
            _ => {
                let (name, description) = match header.split_once(' ') {
                    Some((name, description)) => (name, Some(description)),
                    None => (header, None),
                };
                let versification =
                    Versification::from_scheme_lines(name, description, body)?;
                self.insert_scheme(Arc::new(versification))
            }
        }
    }

    /// Merges another registry into this one. Fails without touching
    /// anything when scheme names collide.
    pub fn merge(&mut self, other: VersificationRegistry) -> Result<()> {
        for v in &other.versifications {
            if self.scheme_position(v.name()).is_some() {
                return Err(VersificationError::DuplicateVersification {
                    name: v.name().to_string(),
                });
            }
        }
        self.versifications.extend(other.versifications);
        self.mappings.extend(other.mappings);
        self.closure = None;
        Ok(())
    }

    /// Serializes the whole registry in db file format. Rejects
    /// duplicate scheme names and mappings whose endpoints are not
    /// part of what is written.
    pub fn save_to_string(&self) -> Result<String> {
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for v in &self.versifications {
            if !seen.insert(v.name()) {
                return Err(VersificationError::DuplicateVersification {
                    name: v.name().to_string(),
                });
            }
        }
        for m in &self.mappings {
            for endpoint in [m.from(), m.to()] {
                if !seen.contains(endpoint.name()) {
                    return Err(VersificationError::DanglingMappingEndpoint {
                        mapping: format!("{}>{}", m.from().name(), m.to().name()),
                        name: endpoint.name().to_string(),
                    });
                }
            }
        }
        let mut out = String::from(FILE_HEADER);
        out.push('\n');
        for v in &self.versifications {
            out.push_str(v.name());
            if let Some(description) = v.description() {
                out.push(' ');
                out.push_str(description);
            }
            out.push('\n');
            for alias in v.aliases() {
                out.push_str(&format!(" ={}\n", alias));
            }
            v.dump_scheme(&mut out);
        }
        for m in &self.mappings {
            out.push_str(&format!("{}>{}\n", m.from().name(), m.to().name()));
            m.dump_rules(&mut out);
        }
        Ok(out)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let text = self.save_to_string()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Serializes a subset of the registry: scheme names and mapping
    /// keys. Endpoint schemes of selected mappings are included
    /// automatically; an empty selection means everything.
    pub fn save_selection(&mut self, keys: &[String]) -> Result<String> {
        if keys.is_empty() {
            return self.save_to_string();
        }
        let mut subset = VersificationRegistry::new();
        for key in keys {
            if key.contains('/') {
                let mapping = self.find_mapping_key(key)?;
                for endpoint in [mapping.from(), mapping.to()] {
                    if subset.scheme_position(endpoint.name()).is_none() {
                        subset.insert_scheme(Arc::clone(endpoint))?;
                    }
                }
                subset.mappings.push(mapping);
            } else {
                let scheme = Arc::clone(self.find(key)?);
                if subset.scheme_position(scheme.name()).is_none() {
                    subset.insert_scheme(scheme)?;
                }
            }
        }
        subset.save_to_string()
    }
}

/// Closest candidate by normalized Levenshtein similarity, if any is
/// close enough to be a plausible typo.
fn closest_name<'a>(target: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|c| (c, strsim::normalized_levenshtein(target, c)))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}
