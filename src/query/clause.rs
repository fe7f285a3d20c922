//! Clause normalizer: pure translation from `(field, operator, operand)` calls into
//! filter fragments. Nothing here touches accumulated state.

use bson::{Bson, Document};

/// Regex flags a `like` pattern may carry.
pub const REGEX_FLAGS: &str = "ilmsux";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    In,
    Nin,
    All,
    Near,
    Regex,
    Options,
}

impl FilterOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::All => "$all",
            Self::Near => "$near",
            Self::Regex => "$regex",
            Self::Options => "$options",
        }
    }
}

/// A regular-expression match produced by `like`.
///
/// Kept apart from plain strings so it reaches the store as a pattern match and
/// never as literal equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub pattern: String,
    pub options: String,
}

impl Pattern {
    #[must_use]
    pub fn is_case_insensitive(&self) -> bool {
        self.options.contains('i')
    }

    #[must_use]
    pub fn is_anchored_start(&self) -> bool {
        self.pattern.starts_with('^')
    }

    #[must_use]
    pub fn is_anchored_end(&self) -> bool {
        self.pattern.ends_with('$') && !self.pattern.ends_with("\\$")
    }

    /// Operator entries used when the pattern shares a field with other operators.
    #[must_use]
    pub fn to_operators(&self) -> Vec<(FilterOp, Bson)> {
        let mut ops = vec![(FilterOp::Regex, Bson::String(self.pattern.clone()))];
        if !self.options.is_empty() {
            ops.push((FilterOp::Options, Bson::String(self.options.clone())));
        }
        ops
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        for (op, v) in self.to_operators() {
            out.insert(op.symbol(), v);
        }
        out
    }
}

/// Knobs for `like`. By default the match is case-insensitive and unanchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOptions {
    pub flags: String,
    pub start_wildcard: bool,
    pub end_wildcard: bool,
}

impl Default for LikeOptions {
    fn default() -> Self {
        Self { flags: "i".to_string(), start_wildcard: true, end_wildcard: true }
    }
}

impl LikeOptions {
    #[must_use]
    pub fn flags(mut self, flags: &str) -> Self {
        self.flags = flags.to_string();
        self
    }

    /// Match only at the start of the value.
    #[must_use]
    pub fn anchor_start(mut self) -> Self {
        self.start_wildcard = false;
        self
    }

    /// Match only at the end of the value.
    #[must_use]
    pub fn anchor_end(mut self) -> Self {
        self.end_wildcard = false;
        self
    }
}

/// What a normalizer call contributes to one field's clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Operators(Vec<(FilterOp, Bson)>),
    Pattern(Pattern),
}

#[must_use]
pub fn compare(op: FilterOp, x: impl Into<Bson>) -> Fragment {
    Fragment::Operators(vec![(op, x.into())])
}

#[must_use]
pub fn between(x: impl Into<Bson>, y: impl Into<Bson>) -> Fragment {
    Fragment::Operators(vec![(FilterOp::Gte, x.into()), (FilterOp::Lte, y.into())])
}

#[must_use]
pub fn between_exclusive(x: impl Into<Bson>, y: impl Into<Bson>) -> Fragment {
    Fragment::Operators(vec![(FilterOp::Gt, x.into()), (FilterOp::Lt, y.into())])
}

/// `$in`, `$nin` or `$all` over an ordered list of values.
#[must_use]
pub fn membership<I, V>(op: FilterOp, values: I) -> Fragment
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    let list: Vec<Bson> = values.into_iter().map(Into::into).collect();
    Fragment::Operators(vec![(op, Bson::Array(list))])
}

#[must_use]
pub fn not_equal(x: impl Into<Bson>) -> Fragment {
    compare(FilterOp::Ne, x)
}

#[must_use]
pub fn near<I, V>(coordinates: I) -> Fragment
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    let coords: Vec<Bson> = coordinates.into_iter().map(Into::into).collect();
    Fragment::Operators(vec![(FilterOp::Near, Bson::Array(coords))])
}

/// Builds a pattern from a literal: trimmed, metacharacters escaped, anchored at
/// whichever ends have their wildcard disabled.
#[must_use]
pub fn like(value: &str, opts: &LikeOptions) -> Fragment {
    let mut pattern = regex::escape(value.trim());
    if !opts.start_wildcard {
        pattern.insert(0, '^');
    }
    if !opts.end_wildcard {
        pattern.push('$');
    }
    Fragment::Pattern(Pattern { pattern, options: normalize_flags(&opts.flags) })
}

/// Keeps known flags only, deduplicated and sorted.
fn normalize_flags(flags: &str) -> String {
    let mut out: Vec<char> = flags.chars().filter(|c| REGEX_FLAGS.contains(*c)).collect();
    out.sort_unstable();
    out.dedup();
    out.into_iter().collect()
}
