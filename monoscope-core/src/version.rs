use semver::{Version, VersionReq};

/// A `||`-separated union of npm-style ranges.
#[derive(Debug, Clone)]
pub struct RangeSet {
    ranges: Vec<VersionReq>,
}

impl RangeSet {
    pub fn parse(original: &str) -> Option<Self> {
        let mut s = original.trim();

        if s.is_empty() || s == "latest" {
            s = "*";
        }

        let mut ranges = Vec::new();

        for part in s.split("||") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let req = VersionReq::parse(&normalize_and_part(part)).ok()?;
            ranges.push(req);
        }

        if ranges.is_empty() {
            ranges.push(VersionReq::STAR);
        }

        Some(RangeSet { ranges })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.matches(version))
    }
}

/// npm separates AND-ed comparators with spaces, `semver` wants commas.
fn normalize_and_part(part: &str) -> String {
    let tokens: Vec<&str> = part.split_whitespace().collect();

    if tokens.len() <= 1 {
        return pin_bare_version(part);
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(">={}, <={}", tokens[0], tokens[2]);
    }

    let mut result = String::new();

    for (i, token) in tokens.iter().enumerate() {
        let after_op = i > 0 && matches!(tokens[i - 1], "=" | ">" | ">=" | "<" | "<=" | "~" | "^");

        if after_op {
            result.push(' ');
            result.push_str(token);
            continue;
        }

        if i > 0 {
            result.push_str(", ");
        }
        result.push_str(&pin_bare_version(token));
    }

    result
}

/// A bare `1.2.3` is exact in npm but caret in `semver`.
fn pin_bare_version(token: &str) -> String {
    let is_full = token.starts_with(|c: char| c.is_ascii_digit())
        && token.matches('.').count() == 2
        && !token.contains(['x', 'X', '*']);

    if is_full {
        format!("={}", token)
    } else {
        token.to_string()
    }
}

/// Whether the range a package declares for an internal dependency accepts
/// that dependency's current version. `None` when either side cannot be
/// judged (non-semver protocols, unparseable versions).
pub fn satisfies(range: &str, version: &str) -> Option<bool> {
    let range = range.trim();

    let range = match range.strip_prefix("workspace:") {
        Some("*" | "^" | "~" | "") => return Some(true),
        Some(inner) => inner,
        None => range,
    };

    if range.contains(':') {
        return None;
    }

    let version = Version::parse(version.trim()).ok()?;
    let set = RangeSet::parse(range)?;

    Some(set.matches(&version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_ranges() {
        assert_eq!(satisfies("^1.2.0", "1.4.0"), Some(true));
        assert_eq!(satisfies("^1.2.0", "2.0.0"), Some(false));
    }

    #[test]
    fn workspace_protocol() {
        assert_eq!(satisfies("workspace:*", "0.1.0"), Some(true));
        assert_eq!(satisfies("workspace:^2.0.0", "1.0.0"), Some(false));
    }

    #[test]
    fn or_ranges_and_spaced_comparators() {
        assert_eq!(satisfies("^1.0.0 || ^2.0.0", "2.3.0"), Some(true));
        assert_eq!(satisfies(">= 1.0.0 < 2.0.0", "1.5.0"), Some(true));
        assert_eq!(satisfies("1.0.0 - 1.5.0", "1.6.0"), Some(false));
    }

    #[test]
    fn bare_versions_are_exact() {
        assert_eq!(satisfies("1.0.0", "1.0.1"), Some(false));
        assert_eq!(satisfies("1.0.0", "1.0.0"), Some(true));
    }

    #[test]
    fn unjudgeable_inputs() {
        assert_eq!(satisfies("file:../x", "1.0.0"), None);
        assert_eq!(satisfies("^1.0.0", "not-a-version"), None);
    }
}
