//! The `rules` command: list the intrinsic rewrite table.

use esx_lower::rules::{Rule, SuffixRule, RULES, SOURCE_PREFIX, TARGET_PREFIX};

/// Rules whose source spelling contains `filter`, in table order.
pub fn matching_rules(filter: Option<&str>) -> Vec<&'static Rule> {
    RULES
        .iter()
        .filter(|rule| match filter {
            Some(f) => rule.source.contains(f),
            None => true,
        })
        .collect()
}

/// One table row, e.g. `__esimd_flat_read -> llvm.genx.svm.gather (4 operands)`.
pub fn format_rule(rule: &Rule) -> String {
    let suffix = match rule.suffix {
        SuffixRule::None => "",
        SuffixRule::BinOp(_) => ".<op>",
        SuffixRule::NumKind(_) => "<f|i>",
    };
    let operands = rule.args.len();
    format!(
        "{SOURCE_PREFIX}{} -> {TARGET_PREFIX}{}{suffix} ({operands} operand{})",
        rule.source,
        rule.target,
        if operands == 1 { "" } else { "s" }
    )
}

pub fn list_rules(filter: Option<&str>) {
    let rules = matching_rules(filter);
    if rules.is_empty() {
        eprintln!("no rule matches `{}`", filter.unwrap_or_default());
        std::process::exit(1);
    }
    for rule in rules {
        println!("{}", format_rule(rule));
    }
}
