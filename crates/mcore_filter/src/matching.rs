//! Rule representation and the three matching oracles, ported from `scorep_filter_matching.c`.

use wildmatch::WildMatch;

/// One filter rule: a glob `pattern`, whether it's an `EXCLUDE` or `INCLUDE` rule, and — for
/// function rules only — whether it applies to the mangled or demangled name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub is_exclude: bool,
    pub is_mangled: bool,
}

fn glob_match(pattern: &str, text: &str) -> bool {
    WildMatch::new(pattern).matches(text)
}

/// Ordered file-name and function-name rule lists (`SCOREP_Filter`). Rules are evaluated in
/// list order, never reordered, since later rules can re-include what an earlier one excluded
/// (and vice versa) — see [`match_file`](Filter::match_file).
#[derive(Default, Clone, Debug)]
pub struct Filter {
    pub(crate) file_rules: Vec<Rule>,
    pub(crate) function_rules: Vec<Rule>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `scorep_filter_add_rule` onto the file-rule list (exclude variant).
    pub fn add_file_exclude_rule(&mut self, pattern: impl Into<String>) {
        self.file_rules.push(Rule { pattern: pattern.into(), is_exclude: true, is_mangled: false });
    }

    pub fn add_file_include_rule(&mut self, pattern: impl Into<String>) {
        self.file_rules.push(Rule { pattern: pattern.into(), is_exclude: false, is_mangled: false });
    }

    pub fn add_function_rule(&mut self, pattern: impl Into<String>, is_exclude: bool, is_mangled: bool) {
        self.function_rules.push(Rule { pattern: pattern.into(), is_exclude, is_mangled });
    }

    pub fn file_rules(&self) -> &[Rule] {
        &self.file_rules
    }

    pub fn function_rules(&self) -> &[Rule] {
        &self.function_rules
    }

    /// `scorep_filter_match_file`: walk the file-rule list in order, toggling an `excluded` flag
    /// — an exclude rule can only turn it on while currently included, an include rule can only
    /// turn it back off while currently excluded. A `None` file name is never excluded (the
    /// source skips the loop entirely when `fileName` is `NULL`).
    pub fn match_file(&self, file_name: Option<&str>) -> bool {
        let Some(file_name) = file_name else { return false };

        let mut excluded = false;
        for rule in &self.file_rules {
            if !excluded && rule.is_exclude {
                excluded = glob_match(&rule.pattern, file_name);
            } else if excluded && !rule.is_exclude {
                excluded = !glob_match(&rule.pattern, file_name);
            }
        }

        if excluded {
            mcore_log::debug!("filtered file {file_name}");
        }
        excluded
    }

    fn function_rule_target<'a>(rule: &Rule, function_name: &'a str, mangled_name: Option<&'a str>) -> &'a str {
        if rule.is_mangled {
            mangled_name.unwrap_or(function_name)
        } else {
            function_name
        }
    }

    /// `scorep_filter_match_function`: same toggle walk as [`match_file`](Self::match_file), but
    /// each rule is matched against the mangled or demangled name depending on `rule.is_mangled`.
    pub fn match_function(&self, function_name: Option<&str>, mangled_name: Option<&str>) -> bool {
        let Some(function_name) = function_name else { return false };

        let mut excluded = false;
        for rule in &self.function_rules {
            let target = Self::function_rule_target(rule, function_name, mangled_name);
            if !excluded && rule.is_exclude {
                excluded = glob_match(&rule.pattern, target);
            } else if excluded && !rule.is_exclude {
                excluded = !glob_match(&rule.pattern, target);
            }
        }

        if excluded {
            mcore_log::debug!("filtered function {function_name}");
        }
        excluded
    }

    /// `scorep_filter_include_function`: unlike [`match_function`](Self::match_function), this
    /// additionally tracks whether any rule *explicitly* (pattern other than the bare wildcard
    /// `"*"`) included the function, every rule is evaluated regardless of the running `excluded`
    /// state, and a `None` function name is treated as explicitly included rather than not
    /// excluded. Used where "is this definitely something the user asked for" is the question,
    /// not just "did it survive the exclude/include toggle."
    pub fn include_function(&self, function_name: Option<&str>, mangled_name: Option<&str>) -> bool {
        let Some(function_name) = function_name else { return true };

        let mut excluded = false;
        let mut explicitly_included = false;
        for rule in &self.function_rules {
            let target = Self::function_rule_target(rule, function_name, mangled_name);
            let matched = glob_match(&rule.pattern, target);

            if matched {
                if rule.is_exclude {
                    explicitly_included = false;
                } else if rule.pattern != "*" {
                    explicitly_included = true;
                }
            }

            if !excluded && rule.is_exclude {
                excluded = matched;
            } else if excluded && !rule.is_exclude {
                excluded = !matched;
            }
        }

        if excluded {
            mcore_log::debug!("filtered function {function_name}");
        }
        !excluded && explicitly_included
    }

    /// `SCOREP_Filter_Match`: a name is filtered if either its file or its function matches.
    pub fn matches(&self, file_name: Option<&str>, function_name: Option<&str>, mangled_name: Option<&str>) -> bool {
        self.match_file(file_name) || self.match_function(function_name, mangled_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rules_excludes_nothing() {
        let filter = Filter::new();
        assert!(!filter.match_file(Some("foo.c")));
        assert!(!filter.match_function(Some("foo"), None));
    }

    #[test]
    fn a_none_name_is_never_excluded() {
        let filter = Filter::new();
        assert!(!filter.match_file(None));
        assert!(!filter.match_function(None, None));
    }

    #[test]
    fn exclude_then_reinclude_narrower_pattern_wins() {
        let mut filter = Filter::new();
        filter.add_file_exclude_rule("*generated*.c");
        filter.add_file_include_rule("foo_generated.c");

        assert!(filter.match_file(Some("bar_generated.c")));
        assert!(!filter.match_file(Some("foo_generated.c")));
    }

    #[test]
    fn an_include_rule_cannot_uninclude_what_was_never_excluded() {
        let mut filter = Filter::new();
        filter.add_file_include_rule("foo.c");
        assert!(!filter.match_file(Some("foo.c")));
    }

    #[test]
    fn mangled_rules_match_against_the_mangled_name() {
        let mut filter = Filter::new();
        filter.add_function_rule("_Z3fooi", true, true);
        assert!(filter.match_function(Some("foo"), Some("_Z3fooi")));
        assert!(!filter.match_function(Some("foo"), None));
    }

    #[test]
    fn include_function_requires_an_explicit_non_wildcard_include() {
        let mut filter = Filter::new();
        filter.add_function_rule("*", true, false);
        filter.add_function_rule("foo", false, false);
        assert!(filter.include_function(Some("foo"), None));
        assert!(!filter.include_function(Some("bar"), None));
    }

    #[test]
    fn include_function_treats_a_none_name_as_explicitly_included() {
        let filter = Filter::new();
        assert!(filter.include_function(None, None));
    }

    #[test]
    fn matches_is_true_if_either_file_or_function_excludes() {
        let mut filter = Filter::new();
        filter.add_file_exclude_rule("*.generated.c");
        assert!(filter.matches(Some("x.generated.c"), Some("ok"), None));
        assert!(!filter.matches(Some("x.c"), Some("ok"), None));
    }
}
