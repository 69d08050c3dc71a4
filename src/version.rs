use crate::error::{PkgupError, Result};
use semver::{Op, Version, VersionReq};

/// A declared version range in npm notation: `||`-separated alternatives,
/// each either an exact version pin or a comparator set.
#[derive(Debug, Clone)]
pub struct Range {
    raw: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
enum Alternative {
    Exact(Version),
    Req(VersionReq),
}

impl Range {
    /// Parse a declared range. Alternatives that cannot be understood
    /// (URLs, tags, workspace references) are dropped; a range with no
    /// surviving alternative satisfies nothing.
    pub fn parse(raw: &str) -> Self {
        let mut alternatives = Vec::new();
        for part in raw.split("||") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // A bare full version is an exact pin, not a caret range.
            if let Ok(version) = Version::parse(part) {
                alternatives.push(Alternative::Exact(version));
                continue;
            }
            if let Ok(req) = VersionReq::parse(&normalize_comparators(part)) {
                alternatives.push(Alternative::Req(req));
            }
        }

        Self {
            raw: raw.to_string(),
            alternatives,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        !self.alternatives.is_empty()
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alternative| match alternative {
            Alternative::Exact(pin) => pin == version,
            Alternative::Req(req) => req.matches(version),
        })
    }

    /// Highest major version this range can admit, or `None` when the
    /// range is unbounded above (e.g. `>=5.0.0`).
    pub fn max_allowed_major(&self) -> Option<u64> {
        let mut top = 0u64;
        for alternative in &self.alternatives {
            let bound = match alternative {
                Alternative::Exact(version) => version.major,
                Alternative::Req(req) => req_upper_major(req)?,
            };
            top = top.max(bound);
        }
        Some(top)
    }
}

/// Upper major bound of one comparator set; `None` when nothing bounds it.
fn req_upper_major(req: &VersionReq) -> Option<u64> {
    let mut upper: Option<u64> = None;
    for comparator in &req.comparators {
        let bound = match comparator.op {
            Op::Exact | Op::Caret | Op::Tilde | Op::LessEq | Op::Wildcard => {
                Some(comparator.major)
            }
            Op::Less => {
                // `<5.0.0` admits nothing in the 5.x series.
                if comparator.minor.unwrap_or(0) == 0
                    && comparator.patch.unwrap_or(0) == 0
                    && comparator.pre.is_empty()
                {
                    Some(comparator.major.saturating_sub(1))
                } else {
                    Some(comparator.major)
                }
            }
            Op::Greater | Op::GreaterEq => None,
            _ => None,
        };
        if let Some(bound) = bound {
            upper = Some(upper.map_or(bound, |current| current.min(bound)));
        }
    }
    upper
}

/// npm writes hyphen ranges and space-separated comparator sets; the
/// semver crate wants comma separators.
fn normalize_comparators(part: &str) -> String {
    if let Some((low, high)) = part.split_once(" - ") {
        return format!(">={}, <={}", low.trim(), high.trim());
    }
    if part.contains(' ') && !part.contains(',') {
        return part.split_whitespace().collect::<Vec<_>>().join(", ");
    }
    part.to_string()
}

/// Newest version among `versions` that satisfies `range`.
pub fn max_satisfying<'a, I>(versions: I, range: &Range) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(|raw| Version::parse(raw).ok())
        .filter(|version| range.satisfies(version))
        .max()
}

/// Accept shorthand migration versions (`7`, `7.1`) by padding to a full
/// semantic version.
pub fn normalize_migration_version(version: Option<&str>) -> Result<Option<Version>> {
    let Some(raw) = version else {
        return Ok(None);
    };

    for candidate in [raw.to_string(), format!("{raw}.0"), format!("{raw}.0.0")] {
        if let Ok(parsed) = Version::parse(&candidate) {
            return Ok(Some(parsed));
        }
    }

    Err(PkgupError::InvalidArguments(format!(
        "Invalid migration version: {raw:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(raw: &str) -> Version {
        Version::parse(raw).unwrap()
    }

    #[test]
    fn bare_version_is_an_exact_pin() {
        let range = Range::parse("1.2.0");
        assert!(range.satisfies(&version("1.2.0")));
        assert!(!range.satisfies(&version("1.2.1")));
    }

    #[test]
    fn caret_range_spans_the_major() {
        let range = Range::parse("^1.2.0");
        assert!(range.satisfies(&version("1.9.3")));
        assert!(!range.satisfies(&version("2.0.0")));
    }

    #[test]
    fn alternatives_are_unioned() {
        let range = Range::parse("^5.0.0 || ^6.0.0");
        assert!(range.satisfies(&version("5.5.0")));
        assert!(range.satisfies(&version("6.1.0")));
        assert!(!range.satisfies(&version("7.0.0")));
    }

    #[test]
    fn hyphen_range_is_inclusive() {
        let range = Range::parse("1.2.3 - 2.3.4");
        assert!(range.satisfies(&version("1.2.3")));
        assert!(range.satisfies(&version("2.3.4")));
        assert!(!range.satisfies(&version("2.4.0")));
    }

    #[test]
    fn space_separated_comparators_intersect() {
        let range = Range::parse(">=1.2.0 <2.0.0");
        assert!(range.satisfies(&version("1.5.0")));
        assert!(!range.satisfies(&version("2.0.0")));
    }

    #[test]
    fn unparsable_range_satisfies_nothing() {
        let range = Range::parse("file:../local");
        assert!(!range.is_valid());
        assert!(!range.satisfies(&version("1.0.0")));
    }

    #[test]
    fn max_satisfying_picks_the_newest_match() {
        let versions = ["1.0.0", "1.4.0", "2.0.0"];
        let found = max_satisfying(versions, &Range::parse("^1.0.0"));
        assert_eq!(found, Some(version("1.4.0")));
    }

    #[test]
    fn max_allowed_major_of_bounded_ranges() {
        assert_eq!(Range::parse("^5.0.0").max_allowed_major(), Some(5));
        assert_eq!(Range::parse("~5.2.0").max_allowed_major(), Some(5));
        assert_eq!(Range::parse("^5.0.0 || ^6.0.0").max_allowed_major(), Some(6));
        assert_eq!(Range::parse("<5.0.0").max_allowed_major(), Some(4));
        assert_eq!(Range::parse("<5.2.0").max_allowed_major(), Some(5));
    }

    #[test]
    fn unbounded_range_has_no_max_major() {
        assert_eq!(Range::parse(">=5.0.0").max_allowed_major(), None);
        assert_eq!(Range::parse("*").max_allowed_major(), None);
    }

    #[test]
    fn migration_versions_are_padded() {
        assert_eq!(
            normalize_migration_version(Some("7")).unwrap(),
            Some(version("7.0.0"))
        );
        assert_eq!(
            normalize_migration_version(Some("7.1")).unwrap(),
            Some(version("7.1.0"))
        );
        assert_eq!(normalize_migration_version(None).unwrap(), None);
        assert!(normalize_migration_version(Some("not-a-version")).is_err());
    }
}
