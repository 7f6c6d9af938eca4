use aho_corasick::AhoCorasick;
use regex::Regex;
use tracing::warn;

use crate::models::{ContentRule, MatchMode};

/**
 * 内容规则匹配器
 *
 * 一组规则之间是 AND 关系：每条规则都通过，这一行才算命中。
 * 规则在每次检索开始时编译一次，之后对每一行复用。
 *
 * 列号超过该行字段数的规则直接跳过（不否决）；
 * 写错的正则不会报错，只是永远不匹配。
 */
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
}

struct CompiledRule {
    /// 0 表示任意列
    column: usize,
    predicate: Predicate,
}

enum Predicate {
    Exact(String),
    Substring(Substring),
    /// None 表示模式编译失败
    Regex(Option<Regex>),
}

enum Substring {
    Automaton(AhoCorasick),
    Plain(String),
}

impl Substring {
    fn new(needle: &str) -> Self {
        match AhoCorasick::new([needle]) {
            Ok(ac) => Substring::Automaton(ac),
            Err(e) => {
                warn!(error = %e, "Failed to build Aho-Corasick automaton, using plain search");
                Substring::Plain(needle.to_string())
            }
        }
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Substring::Automaton(ac) => ac.is_match(haystack),
            Substring::Plain(needle) => haystack.contains(needle.as_str()),
        }
    }
}

impl Predicate {
    fn compile(rule: &ContentRule) -> Self {
        match rule.mode {
            MatchMode::Exact => Predicate::Exact(rule.match_text.clone()),
            MatchMode::Substring => Predicate::Substring(Substring::new(&rule.match_text)),
            MatchMode::Regex => match Regex::new(&rule.match_text) {
                Ok(re) => Predicate::Regex(Some(re)),
                Err(e) => {
                    warn!(pattern = %rule.match_text, error = %e, "Invalid rule pattern, rule never matches");
                    Predicate::Regex(None)
                }
            },
        }
    }

    fn test(&self, token: &str) -> bool {
        match self {
            Predicate::Exact(text) => token == text,
            Predicate::Substring(substring) => substring.is_match(token),
            Predicate::Regex(Some(re)) => re.is_match(token),
            Predicate::Regex(None) => false,
        }
    }
}

impl CompiledRule {
    fn accepts(&self, tokens: &[String]) -> bool {
        if self.column == 0 {
            tokens.iter().any(|token| self.predicate.test(token))
        } else {
            self.predicate.test(&tokens[self.column - 1])
        }
    }
}

impl RuleMatcher {
    /**
     * 编译规则集
     *
     * # 参数
     * * `rules` - 请求中的内容规则（AND 关系）
     */
    pub fn new(rules: &[ContentRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                column: rule.column,
                predicate: Predicate::compile(rule),
            })
            .collect();
        Self { rules }
    }

    /**
     * 检查一行的字段是否满足全部规则
     *
     * 空规则集接受任何行。
     */
    pub fn matches(&self, tokens: &[String]) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.column <= tokens.len())
            .all(|rule| rule.accepts(tokens))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// 一次性匹配：编译规则并测试一行
pub fn matches(tokens: &[String], rules: &[ContentRule]) -> bool {
    RuleMatcher::new(rules).matches(tokens)
}
