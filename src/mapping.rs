use crate::error::{Result, VersificationError};
use crate::reference::Reference;
use crate::versification::Versification;
use std::sync::Arc;

/// One mapping rule, keyed by source index.
///
/// A `Run` maps `count` consecutive source indices, each to the
/// destination window `[to_start + d, to_end + d]` where `d` is the
/// offset into the run. A window of size one is the common 1:1 case.
/// A `Disjoint` rule maps a single source verse to one primary
/// destination plus non-contiguous extras.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Run {
        from_start: usize,
        to_start: usize,
        to_end: usize,
        count: usize,
    },
    Disjoint {
        from_index: usize,
        to_first: usize,
        to_extra: Vec<usize>,
    },
}

impl Rule {
    fn from_start(&self) -> usize {
        match self {
            Rule::Run { from_start, .. } => *from_start,
            Rule::Disjoint { from_index, .. } => *from_index,
        }
    }

    fn count(&self) -> usize {
        match self {
            Rule::Run { count, .. } => *count,
            Rule::Disjoint { .. } => 1,
        }
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Unmapped,
    Consumed,
    Window(usize, usize),
}

/// A directed verse correspondence between two schemes. Immutable
/// once built; rules are sorted and non-overlapping in source-index
/// space.
#[derive(Debug, Clone)]
pub struct VersificationMapping {
    from: Arc<Versification>,
    to: Arc<Versification>,
    rules: Vec<Rule>,
}

impl PartialEq for VersificationMapping {
    fn eq(&self, other: &Self) -> bool {
        self.from.name() == other.from.name()
            && self.to.name() == other.to.name()
            && self.rules == other.rules
    }
}

impl VersificationMapping {
    /// Builds a mapping from explicit per-verse correspondences.
    /// Sources with no correspondence are simply left out; an empty
    /// destination list is rejected. Consecutive destinations become
    /// window rules and adjacent compatible windows merge into runs.
    pub fn build(
        from: &Arc<Versification>,
        to: &Arc<Versification>,
        mappings: &[(Reference, Vec<Reference>)],
    ) -> Result<VersificationMapping> {
        let mut full_map = vec![Slot::Unmapped; from.verse_count()];
        let mut rules: Vec<Rule> = Vec::new();
        for (source, targets) in mappings {
            if targets.is_empty() {
                return Err(VersificationError::EmptyMappingTarget {
                    reference: source.clone(),
                });
            }
            let from_index =
                from.index_of(source)
                    .ok_or_else(|| VersificationError::SourceVerseNotFound {
                        reference: source.clone(),
                        versification: from.name().to_string(),
                    })?;
            if !matches!(full_map[from_index], Slot::Unmapped) {
                return Err(VersificationError::DuplicateMappingSource {
                    reference: source.clone(),
                });
            }
            let mut target_indices = Vec::with_capacity(targets.len());
            for target in targets {
                let to_index =
                    to.index_of(target)
                        .ok_or_else(|| VersificationError::TargetVerseNotFound {
                            reference: target.clone(),
                            versification: to.name().to_string(),
                        })?;
                target_indices.push(to_index);
            }
            let to_first = target_indices[0];
            let consecutive = target_indices
                .iter()
                .enumerate()
                .all(|(i, &t)| t == to_first + i);
            if consecutive {
                full_map[from_index] = Slot::Window(to_first, to_first + targets.len() - 1);
            } else {
                full_map[from_index] = Slot::Consumed;
                rules.push(Rule::Disjoint {
                    from_index,
                    to_first,
                    to_extra: target_indices[1..].to_vec(),
                });
            }
        }

        let mut i = 0;
        while i < full_map.len() {
            if let Slot::Window(window_start, window_end) = full_map[i] {
                let start = i;
                while i + 1 < full_map.len() {
                    let d = i + 1 - start;
                    match full_map[i + 1] {
                        Slot::Window(next_start, next_end)
                            if next_start == window_start + d && next_end == window_end + d =>
                        {
                            i += 1;
                        }
                        _ => break,
                    }
                }
                rules.push(Rule::Run {
                    from_start: start,
                    to_start: window_start,
                    to_end: window_end,
                    count: i - start + 1,
                });
            }
            i += 1;
        }
        rules.sort_by_key(|r| r.from_start());
        Ok(VersificationMapping {
            from: Arc::clone(from),
            to: Arc::clone(to),
            rules,
        })
    }

    /// Composes `m1: A->B` with `m2: B->C` into `A->C`. Sources whose
    /// image vanishes through the intermediate hop are left absent;
    /// consecutive duplicate destinations collapse.
    pub fn join(
        m1: &VersificationMapping,
        m2: &VersificationMapping,
    ) -> Result<VersificationMapping> {
        if m1.to.name() != m2.from.name() {
            return Err(VersificationError::MappingEndpointMismatch {
                left: m1.to.name().to_string(),
                right: m2.from.name().to_string(),
            });
        }
        let mut map = Vec::new();
        for r1 in m1.from.references() {
            let hops = match m1.get_mapping(&r1) {
                Some(hops) => hops,
                None => continue,
            };
            let mut targets = Vec::new();
            for r2 in hops {
                if let Some(mapped) = m2.get_mapping(&r2) {
                    targets.extend(mapped);
                }
            }
            targets.dedup();
            if !targets.is_empty() {
                map.push((r1, targets));
            }
        }
        Self::build(&m1.from, &m2.to, &map)
    }

    /// Reconciles several candidate mappings for the same scheme pair
    /// into one: per source verse, the non-empty candidate opinions
    /// are intersected. An empty intersection means the candidates
    /// genuinely disagree and the result is an `AmbiguousMapping`
    /// error.
    pub fn find_best_mapping(
        from: &Arc<Versification>,
        to: &Arc<Versification>,
        candidates: &[&VersificationMapping],
    ) -> Result<VersificationMapping> {
        let mut map = Vec::new();
        for r in from.references() {
            let mut best: Option<Vec<Reference>> = None;
            for candidate in candidates {
                let opinion = match candidate.get_mapping(&r) {
                    Some(o) if !o.is_empty() => Some(o),
                    _ => None,
                };
                match (&mut best, opinion) {
                    (None, opinion) => best = opinion,
                    (Some(current), Some(opinion)) => {
                        current.retain(|x| opinion.contains(x));
                        if current.is_empty() {
                            return Err(VersificationError::AmbiguousMapping {
                                from: from.name().to_string(),
                                to: to.name().to_string(),
                            });
                        }
                    }
                    (Some(_), None) => {}
                }
            }
            if let Some(best) = best {
                map.push((r, best));
            }
        }
        Self::build(from, to, &map)
    }

    /// Parses file-format rule lines (leading space already
    /// stripped): `from[+count]=toFrom[-toTo]` or a disjoint
    /// `from=to extra ...`. Rules must be in order, non-overlapping
    /// and within both index spaces.
    pub(crate) fn from_rule_lines(
        from: &Arc<Versification>,
        to: &Arc<Versification>,
        lines: &[String],
    ) -> Result<VersificationMapping> {
        let mut rules: Vec<Rule> = Vec::new();
        let mut next_allowed = 0usize;
        for line in lines {
            let malformed = |detail: String| VersificationError::MalformedLine {
                line: line.clone(),
                detail,
            };
            let parse_number = |piece: &str| -> Result<usize> {
                piece
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("invalid index '{}'", piece)))
            };
            let (lhs, rhs) = line
                .split_once('=')
                .ok_or_else(|| malformed("expected '='".to_string()))?;
            let (from_piece, count) = match lhs.split_once('+') {
                Some((f, c)) => (f, parse_number(c)?),
                None => (lhs, 1),
            };
            if count < 1 {
                return Err(malformed("rule count must be at least 1".to_string()));
            }
            let from_start = parse_number(from_piece)?;
            let rule = if rhs.contains(' ') {
                if count != 1 {
                    return Err(malformed(
                        "disjoint rule cannot carry a count".to_string(),
                    ));
                }
                let mut pieces = rhs.split(' ');
                let to_first = parse_number(pieces.next().unwrap_or(""))?;
                let mut to_extra = Vec::new();
                for piece in pieces {
                    to_extra.push(parse_number(piece)?);
                }
                Rule::Disjoint {
                    from_index: from_start,
                    to_first,
                    to_extra,
                }
            } else if let Some((a, b)) = rhs.split_once('-') {
                Rule::Run {
                    from_start,
                    to_start: parse_number(a)?,
                    to_end: parse_number(b)?,
                    count,
                }
            } else {
                let to_index = parse_number(rhs)?;
                Rule::Run {
                    from_start,
                    to_start: to_index,
                    to_end: to_index,
                    count,
                }
            };

            if rule.from_start() < next_allowed {
                return Err(malformed("rule overlaps or is out of order".to_string()));
            }
            if rule.from_start() + rule.count() > from.verse_count() {
                return Err(malformed(format!(
                    "source index out of range ({} verses)",
                    from.verse_count()
                )));
            }
            let target_bound = match &rule {
                Rule::Run {
                    to_start,
                    to_end,
                    count,
                    ..
                } => {
                    if to_start > to_end {
                        return Err(malformed(format!(
                            "invalid destination window {}-{}",
                            to_start, to_end
                        )));
                    }
                    to_end + count - 1
                }
                Rule::Disjoint {
                    to_first, to_extra, ..
                } => to_extra.iter().copied().max().unwrap_or(0).max(*to_first),
            };
            if target_bound >= to.verse_count() {
                return Err(malformed(format!(
                    "destination index out of range ({} verses)",
                    to.verse_count()
                )));
            }
            next_allowed = rule.from_start() + rule.count();
            rules.push(rule);
        }
        Ok(VersificationMapping {
            from: Arc::clone(from),
            to: Arc::clone(to),
            rules,
        })
    }

    pub fn from(&self) -> &Arc<Versification> {
        &self.from
    }

    pub fn to(&self) -> &Arc<Versification> {
        &self.to
    }

    /// Copy of this mapping between shape-identical replacement
    /// endpoints, as produced when a scheme is renamed. Rules are
    /// index-based, so they stay valid as long as the index spaces
    /// match.
    pub(crate) fn with_endpoints(
        &self,
        from: &Arc<Versification>,
        to: &Arc<Versification>,
    ) -> VersificationMapping {
        debug_assert_eq!(self.from.verse_count(), from.verse_count());
        debug_assert_eq!(self.to.verse_count(), to.verse_count());
        VersificationMapping {
            from: Arc::clone(from),
            to: Arc::clone(to),
            rules: self.rules.clone(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of source verses with a non-empty correspondence.
    pub fn mapped_source_count(&self) -> usize {
        self.rules
            .iter()
            .map(|r| r.count())
            .sum()
    }

    /// The mapping trichotomy: `None` when the reference is not part
    /// of the source scheme at all, `Some(vec![])` when it is but has
    /// no correspondence, otherwise the ordered destinations.
    pub fn get_mapping(&self, reference: &Reference) -> Option<Vec<Reference>> {
        let from_index = self.from.index_of(reference)?;
        let idx = self.rules.partition_point(|r| r.from_start() <= from_index);
        if idx == 0 {
            return Some(Vec::new());
        }
        let rule = &self.rules[idx - 1];
        if from_index >= rule.from_start() + rule.count() {
            return Some(Vec::new());
        }
        let mut result = Vec::new();
        match rule {
            Rule::Run {
                from_start,
                to_start,
                to_end,
                ..
            } => {
                let d = from_index - from_start;
                for to_index in *to_start..=*to_end {
                    result.push(self.to.reference(to_index + d));
                }
            }
            Rule::Disjoint {
                to_first, to_extra, ..
            } => {
                result.push(self.to.reference(*to_first));
                for &extra in to_extra {
                    result.push(self.to.reference(extra));
                }
            }
        }
        Some(result)
    }

    /// Serializes rule lines in file format.
    pub(crate) fn dump_rules(&self, out: &mut String) {
        for rule in &self.rules {
            match rule {
                Rule::Run {
                    from_start,
                    to_start,
                    to_end,
                    count,
                } => {
                    out.push_str(&format!(" {}", from_start));
                    if *count > 1 {
                        out.push_str(&format!("+{}", count));
                    }
                    out.push_str(&format!("={}", to_start));
                    if to_start != to_end {
                        out.push_str(&format!("-{}", to_end));
                    }
                }
                Rule::Disjoint {
                    from_index,
                    to_first,
                    to_extra,
                } => {
                    out.push_str(&format!(" {}={}", from_index, to_first));
                    for extra in to_extra {
                        out.push_str(&format!(" {}", extra));
                    }
                }
            }
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::BookId;

    fn gen() -> BookId {
        BookId::from_osis("Gen").unwrap()
    }

    fn scheme(name: &str, chapters: Vec<u32>) -> Arc<Versification> {
        Arc::new(
            Versification::from_verse_counts(name, None, &[], &[(gen(), chapters)]).unwrap(),
        )
    }

    fn identity_map(
        from: &Arc<Versification>,
        to: &Arc<Versification>,
    ) -> Vec<(Reference, Vec<Reference>)> {
        from.references().map(|r| (r.clone(), vec![r])).collect()
    }

    #[test]
    fn test_build_merges_runs() {
        let a = scheme("A", vec![5]);
        let b = scheme("B", vec![5]);
        let m = VersificationMapping::build(&a, &b, &identity_map(&a, &b)).unwrap();
        assert_eq!(m.rule_count(), 1);
        assert_eq!(m.mapped_source_count(), 5);
        for r in a.references() {
            assert_eq!(m.get_mapping(&r), Some(vec![r]));
        }
    }

    #[test]
    fn test_trichotomy() {
        let a = scheme("A", vec![3]);
        let b = scheme("B", vec![3]);
        // only verse 1 is mapped
        let map = vec![(
            Reference::verse_n(gen(), 1, 1),
            vec![Reference::verse_n(gen(), 1, 1)],
        )];
        let m = VersificationMapping::build(&a, &b, &map).unwrap();
        assert_eq!(
            m.get_mapping(&Reference::verse_n(gen(), 1, 1)),
            Some(vec![Reference::verse_n(gen(), 1, 1)])
        );
        // present in the source but unmapped
        assert_eq!(
            m.get_mapping(&Reference::verse_n(gen(), 1, 3)),
            Some(vec![])
        );
        // not part of the source scheme at all
        assert_eq!(m.get_mapping(&Reference::verse_n(gen(), 2, 1)), None);
    }

    #[test]
    fn test_window_rule() {
        let a = scheme("A", vec![2]);
        let b = scheme("B", vec![4]);
        // each source verse maps onto a sliding two-verse window
        let map = vec![
            (
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 1), Reference::verse_n(gen(), 1, 2)],
            ),
            (
                Reference::verse_n(gen(), 1, 2),
                vec![Reference::verse_n(gen(), 1, 2), Reference::verse_n(gen(), 1, 3)],
            ),
        ];
        let m = VersificationMapping::build(&a, &b, &map).unwrap();
        assert_eq!(m.rule_count(), 1, "sliding windows should merge");
        assert_eq!(
            m.get_mapping(&Reference::verse_n(gen(), 1, 2)),
            Some(vec![
                Reference::verse_n(gen(), 1, 2),
                Reference::verse_n(gen(), 1, 3)
            ])
        );
    }

    #[test]
    fn test_disjoint_rule() {
        let a = scheme("A", vec![1]);
        let b = scheme("B", vec![5]);
        let map = vec![(
            Reference::verse_n(gen(), 1, 1),
            vec![Reference::verse_n(gen(), 1, 1), Reference::verse_n(gen(), 1, 4)],
        )];
        let m = VersificationMapping::build(&a, &b, &map).unwrap();
        assert_eq!(m.rule_count(), 1);
        assert_eq!(
            m.get_mapping(&Reference::verse_n(gen(), 1, 1)),
            Some(vec![
                Reference::verse_n(gen(), 1, 1),
                Reference::verse_n(gen(), 1, 4)
            ])
        );
        let mut dumped = String::new();
        m.dump_rules(&mut dumped);
        assert_eq!(dumped, " 0=0 3\n");
    }

    #[test]
    fn test_build_errors() {
        let a = scheme("A", vec![2]);
        let b = scheme("B", vec![2]);
        let r1 = Reference::verse_n(gen(), 1, 1);

        let empty = vec![(r1.clone(), vec![])];
        assert!(matches!(
            VersificationMapping::build(&a, &b, &empty).unwrap_err(),
            VersificationError::EmptyMappingTarget { .. }
        ));

        let bad_source = vec![(Reference::verse_n(gen(), 9, 1), vec![r1.clone()])];
        assert!(matches!(
            VersificationMapping::build(&a, &b, &bad_source).unwrap_err(),
            VersificationError::SourceVerseNotFound { .. }
        ));

        let bad_target = vec![(r1.clone(), vec![Reference::verse_n(gen(), 9, 1)])];
        assert!(matches!(
            VersificationMapping::build(&a, &b, &bad_target).unwrap_err(),
            VersificationError::TargetVerseNotFound { .. }
        ));

        let duplicate = vec![
            (r1.clone(), vec![r1.clone()]),
            (r1.clone(), vec![Reference::verse_n(gen(), 1, 2)]),
        ];
        assert!(matches!(
            VersificationMapping::build(&a, &b, &duplicate).unwrap_err(),
            VersificationError::DuplicateMappingSource { .. }
        ));
    }

    #[test]
    fn test_join_composition() {
        let a = scheme("A", vec![3]);
        let b = scheme("B", vec![3]);
        let c = scheme("C", vec![3]);
        let a2b = VersificationMapping::build(&a, &b, &identity_map(&a, &b)).unwrap();
        // b2c drops verse 3 and merges 1 and 2 into 1
        let b2c = VersificationMapping::build(
            &b,
            &c,
            &[
                (
                    Reference::verse_n(gen(), 1, 1),
                    vec![Reference::verse_n(gen(), 1, 1)],
                ),
                (
                    Reference::verse_n(gen(), 1, 2),
                    vec![Reference::verse_n(gen(), 1, 1)],
                ),
            ],
        )
        .unwrap();
        let a2c = VersificationMapping::join(&a2b, &b2c).unwrap();
        assert_eq!(
            a2c.get_mapping(&Reference::verse_n(gen(), 1, 1)),
            Some(vec![Reference::verse_n(gen(), 1, 1)])
        );
        // the hop for verse 3 vanishes, so composition leaves it unmapped
        assert_eq!(
            a2c.get_mapping(&Reference::verse_n(gen(), 1, 3)),
            Some(vec![])
        );

        // composition law: join(a2b, b2c) agrees with mapping through
        // the hop by hand
        for r in a.references() {
            let direct = a2c.get_mapping(&r).unwrap();
            let mut via_hop = Vec::new();
            for hop in a2b.get_mapping(&r).unwrap() {
                via_hop.extend(b2c.get_mapping(&hop).unwrap());
            }
            via_hop.dedup();
            assert_eq!(direct, via_hop, "composition mismatch for {}", r);
        }
    }

    #[test]
    fn test_join_dedups_adjacent_targets() {
        let a = scheme("A", vec![1]);
        let b = scheme("B", vec![2]);
        let c = scheme("C", vec![1]);
        let a2b = VersificationMapping::build(
            &a,
            &b,
            &[(
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 1), Reference::verse_n(gen(), 1, 2)],
            )],
        )
        .unwrap();
        let b2c = VersificationMapping::build(&b, &c, &[
            (
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 1)],
            ),
            (
                Reference::verse_n(gen(), 1, 2),
                vec![Reference::verse_n(gen(), 1, 1)],
            ),
        ])
        .unwrap();
        let a2c = VersificationMapping::join(&a2b, &b2c).unwrap();
        assert_eq!(
            a2c.get_mapping(&Reference::verse_n(gen(), 1, 1)),
            Some(vec![Reference::verse_n(gen(), 1, 1)]),
            "duplicate adjacent targets must collapse"
        );
    }

    #[test]
    fn test_join_endpoint_mismatch() {
        let a = scheme("A", vec![1]);
        let b = scheme("B", vec![1]);
        let c = scheme("C", vec![1]);
        let a2b = VersificationMapping::build(&a, &b, &identity_map(&a, &b)).unwrap();
        let c2a = VersificationMapping::build(&c, &a, &identity_map(&c, &a)).unwrap();
        assert!(matches!(
            VersificationMapping::join(&a2b, &c2a).unwrap_err(),
            VersificationError::MappingEndpointMismatch { .. }
        ));
    }

    #[test]
    fn test_find_best_mapping_agreement() {
        let a = scheme("A", vec![2]);
        let b = scheme("B", vec![2]);
        let full = VersificationMapping::build(&a, &b, &identity_map(&a, &b)).unwrap();
        // partial candidate has no opinion on verse 2
        let partial = VersificationMapping::build(
            &a,
            &b,
            &[(
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 1)],
            )],
        )
        .unwrap();
        let best =
            VersificationMapping::find_best_mapping(&a, &b, &[&full, &partial]).unwrap();
        assert_eq!(best, full);
    }

    #[test]
    fn test_find_best_mapping_conflict() {
        let a = scheme("A", vec![1]);
        let b = scheme("B", vec![2]);
        let one = VersificationMapping::build(
            &a,
            &b,
            &[(
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 1)],
            )],
        )
        .unwrap();
        let two = VersificationMapping::build(
            &a,
            &b,
            &[(
                Reference::verse_n(gen(), 1, 1),
                vec![Reference::verse_n(gen(), 1, 2)],
            )],
        )
        .unwrap();
        assert!(matches!(
            VersificationMapping::find_best_mapping(&a, &b, &[&one, &two]).unwrap_err(),
            VersificationError::AmbiguousMapping { .. }
        ));
    }

    #[test]
    fn test_rule_lines_round_trip() {
        let a = scheme("A", vec![10]);
        let b = scheme("B", vec![10]);
        let lines = vec![
            "0+3=0".to_string(),
            "4=2-3".to_string(),
            "5=9 0 4".to_string(),
        ];
        let m = VersificationMapping::from_rule_lines(&a, &b, &lines).unwrap();
        assert_eq!(m.rule_count(), 3);
        let mut dumped = String::new();
        m.dump_rules(&mut dumped);
        assert_eq!(dumped, " 0+3=0\n 4=2-3\n 5=9 0 4\n");
    }

    #[test]
    fn test_rule_lines_validation() {
        let a = scheme("A", vec![5]);
        let b = scheme("B", vec![5]);
        for bad in [
            "nonsense",
            "x=1",
            "0=x",
            "0+0=1",
            "3=1 2 q",
            "0+9=0",
            "0=9",
            "0=3-1",
            "2+2=0 1",
        ] {
            let lines = vec![bad.to_string()];
            assert!(
                VersificationMapping::from_rule_lines(&a, &b, &lines).is_err(),
                "line '{}' should be rejected",
                bad
            );
        }
        // out of order rules are structural errors too
        let lines = vec!["3=3".to_string(), "1=1".to_string()];
        assert!(VersificationMapping::from_rule_lines(&a, &b, &lines).is_err());
        let lines = vec!["0+3=0".to_string(), "2=4".to_string()];
        assert!(VersificationMapping::from_rule_lines(&a, &b, &lines).is_err());
    }
}
