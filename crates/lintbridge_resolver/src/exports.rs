//! `package.json` `exports` field resolution.

use serde_json::{Map, Value};

/// Conditions matched when resolving `exports`, besides `default`.
pub const CONDITIONS: &[&str] = &["node", "import"];

/// Outcome of resolving one exports target.
#[derive(Debug, PartialEq)]
enum Target {
    /// A relative path inside the package (`./...`).
    Resolved(String),
    /// The target is explicitly `null`.
    Excluded,
    /// No condition matched.
    Unmatched,
}

/// Resolves `subpath` (`"."` or `"./sub/path"`) against an `exports` value.
///
/// Returns the package-relative target (starting with `./`), or `None` when
/// the subpath is not exported, is excluded with `null`, or the field is
/// malformed.
pub fn resolve_exports(exports: &Value, subpath: &str) -> Option<String> {
    let map = match exports {
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            if map.keys().any(|k| !k.starts_with('.')) {
                // Mixing subpaths and conditions is invalid.
                return None;
            }
            map.clone()
        }
        other => {
            let mut sugar = Map::new();
            sugar.insert(".".to_string(), other.clone());
            sugar
        }
    };

    if let Some(target) = map.get(subpath)
        && !subpath.contains('*')
    {
        return into_option(resolve_target(target, None));
    }

    let (key, matched) = best_pattern_match(&map, subpath)?;
    let target = map.get(key)?;
    into_option(resolve_target(target, Some(matched)))
}

fn into_option(target: Target) -> Option<String> {
    match target {
        Target::Resolved(path) => Some(path),
        Target::Excluded | Target::Unmatched => None,
    }
}

/// Finds the `*` pattern key with the longest prefix matching `subpath`.
fn best_pattern_match<'a>(
    map: &'a Map<String, Value>,
    subpath: &'a str,
) -> Option<(&'a str, &'a str)> {
    let mut best: Option<(&str, &str, usize)> = None;

    for key in map.keys() {
        let Some(star) = key.find('*') else { continue };
        if key[star + 1..].contains('*') {
            continue;
        }
        let (prefix, suffix) = (&key[..star], &key[star + 1..]);
        if subpath.len() < prefix.len() + suffix.len()
            || !subpath.starts_with(prefix)
            || !subpath.ends_with(suffix)
        {
            continue;
        }
        if best.is_none_or(|(_, _, len)| prefix.len() > len) {
            let matched = &subpath[prefix.len()..subpath.len() - suffix.len()];
            best = Some((key.as_str(), matched, prefix.len()));
        }
    }

    best.map(|(key, matched, _)| (key, matched))
}

fn resolve_target(target: &Value, pattern: Option<&str>) -> Target {
    match target {
        Value::String(path) => {
            if !path.starts_with("./") {
                return Target::Unmatched;
            }
            let resolved = match pattern {
                Some(matched) => path.replace('*', matched),
                None => path.clone(),
            };
            if stays_in_package(&resolved) {
                Target::Resolved(resolved)
            } else {
                Target::Unmatched
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Target::Resolved(path) = resolve_target(item, pattern) {
                    return Target::Resolved(path);
                }
            }
            Target::Unmatched
        }
        Value::Object(conditions) => {
            for (condition, value) in conditions {
                if condition == "default" || CONDITIONS.contains(&condition.as_str()) {
                    match resolve_target(value, pattern) {
                        Target::Unmatched => continue,
                        other => return other,
                    }
                }
            }
            Target::Unmatched
        }
        Value::Null => Target::Excluded,
        _ => Target::Unmatched,
    }
}

/// Rejects `.`, `..` and `node_modules` segments after the leading `./`,
/// including ones introduced by a `*` substitution.
fn stays_in_package(target: &str) -> bool {
    target[2..].split(['/', '\\']).all(|segment| {
        segment != "." && segment != ".." && !segment.eq_ignore_ascii_case("node_modules")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_string_sugar() {
        let exports = json!("./dist/index.js");
        assert_eq!(
            resolve_exports(&exports, "."),
            Some("./dist/index.js".to_string())
        );
        assert_eq!(resolve_exports(&exports, "./linter"), None);
    }

    #[test]
    fn test_subpath_map_with_conditions() {
        let exports = json!({
            ".": { "require": "./dist/index.cjs", "import": "./dist/index.js" },
            "./linter": { "types": "./dist/linter.d.ts", "default": "./dist/linter.js" },
            "./cli": "./dist/cli.js",
            "./package.json": "./package.json"
        });

        assert_eq!(
            resolve_exports(&exports, "."),
            Some("./dist/index.js".to_string())
        );
        assert_eq!(
            resolve_exports(&exports, "./linter"),
            Some("./dist/linter.js".to_string())
        );
        assert_eq!(
            resolve_exports(&exports, "./cli"),
            Some("./dist/cli.js".to_string())
        );
        assert_eq!(resolve_exports(&exports, "./internal"), None);
    }

    #[test]
    fn test_condition_order_is_respected() {
        let exports = json!({ "default": "./a.js", "import": "./b.js" });
        assert_eq!(resolve_exports(&exports, "."), Some("./a.js".to_string()));
    }

    #[test]
    fn test_pattern_longest_prefix_wins() {
        let exports = json!({
            "./*": "./dist/*.js",
            "./rules/*": "./dist/rules/*.js",
            "./rules/private/*": null
        });

        assert_eq!(
            resolve_exports(&exports, "./rules/no-tabs"),
            Some("./dist/rules/no-tabs.js".to_string())
        );
        assert_eq!(
            resolve_exports(&exports, "./linter"),
            Some("./dist/linter.js".to_string())
        );
        assert_eq!(resolve_exports(&exports, "./rules/private/x"), None);
    }

    #[test]
    fn test_array_fallback() {
        let exports = json!({ ".": ["not-relative", "./fallback.js"] });
        assert_eq!(
            resolve_exports(&exports, "."),
            Some("./fallback.js".to_string())
        );
    }

    #[test]
    fn test_mixed_keys_invalid() {
        let exports = json!({ ".": "./a.js", "import": "./b.js" });
        assert_eq!(resolve_exports(&exports, "."), None);
    }

    #[test]
    fn test_nested_conditions() {
        let exports = json!({
            ".": { "browser": "./browser.js", "node": { "import": "./node.mjs", "require": "./node.cjs" } }
        });
        assert_eq!(resolve_exports(&exports, "."), Some("./node.mjs".to_string()));
    }

    #[test]
    fn test_targets_cannot_leave_the_package() {
        let exports = json!({
            "./linter": "./../../outside.js",
            "./deps": "./node_modules/other/index.js",
            "./self": "./dist/./linter.js",
            "./rules/*": "./dist/rules/*.js",
            "./fallback": ["./../escape.js", "./dist/fallback.js"]
        });

        assert_eq!(resolve_exports(&exports, "./linter"), None);
        assert_eq!(resolve_exports(&exports, "./deps"), None);
        assert_eq!(resolve_exports(&exports, "./self"), None);
        assert_eq!(resolve_exports(&exports, "./rules/../../secret"), None);
        assert_eq!(
            resolve_exports(&exports, "./fallback"),
            Some("./dist/fallback.js".to_string())
        );
    }
}
