//! Source-platform access rules (`META-INF/accesstransformer.cfg`).
//!
//! One rule per line: `<modifier> <owner> [<member>]`, where the modifier
//! is a visibility optionally followed by `-f` or `+f`, the owner is a
//! dotted class name and the member is a field name, a method name
//! followed by its descriptor, `*` (all fields) or `*()` (all methods).
//! `#` starts a comment.

use std::fmt;

use crate::error::{ManifestError, ManifestResult};

/// Path of the rule file inside an archive.
pub const ACCESS_TRANSFORMER_PATH: &str = "META-INF/accesstransformer.cfg";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Default,
    Private,
}

impl Visibility {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "public" => Self::Public,
            "protected" => Self::Protected,
            "default" => Self::Default,
            "private" => Self::Private,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Default => "default",
            Self::Private => "private",
        }
    }
}

/// What a rule does to the `final` flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinalChange {
    Keep,
    Remove,
    Add,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuleTarget {
    Class,
    Field(String),
    Method { name: String, descriptor: String },
    AllFields,
    AllMethods,
}

/// One parsed rule. `owner` is an internal (slash separated) name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccessRule {
    pub visibility: Visibility,
    pub finality: FinalChange,
    pub owner: String,
    pub target: RuleTarget,
    /// 1-based line in the source file.
    pub line: usize,
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.finality {
            FinalChange::Keep => "",
            FinalChange::Remove => "-f",
            FinalChange::Add => "+f",
        };
        write!(f, "{}{} {}", self.visibility.as_str(), suffix, self.owner.replace('/', "."))?;
        match &self.target {
            RuleTarget::Class => Ok(()),
            RuleTarget::Field(name) => write!(f, " {name}"),
            RuleTarget::Method { name, descriptor } => write!(f, " {name}{descriptor}"),
            RuleTarget::AllFields => f.write_str(" *"),
            RuleTarget::AllMethods => f.write_str(" *()"),
        }
    }
}

/// A parsed rule file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessTransformer {
    rules: Vec<AccessRule>,
}

impl AccessTransformer {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    pub fn parse(text: &str) -> ManifestResult<Self> {
        let mut rules = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            rules.push(parse_rule(content, line)?);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule(content: &str, line: usize) -> ManifestResult<AccessRule> {
    let syntax = |reason: String| ManifestError::Syntax { line, reason };
    let tokens: Vec<&str> = content.split_whitespace().collect();
    let (modifier, owner, member) = match tokens.as_slice() {
        [modifier, owner] => (*modifier, *owner, None),
        [modifier, owner, member] => (*modifier, *owner, Some(*member)),
        _ => return Err(syntax(format!("expected 2 or 3 columns, found {}", tokens.len()))),
    };

    let (visibility, finality) = if let Some(base) = modifier.strip_suffix("-f") {
        (base, FinalChange::Remove)
    } else if let Some(base) = modifier.strip_suffix("+f") {
        (base, FinalChange::Add)
    } else {
        (modifier, FinalChange::Keep)
    };
    let visibility = Visibility::parse(visibility).ok_or_else(|| syntax(format!("unknown modifier `{modifier}`")))?;

    let target = match member {
        None => RuleTarget::Class,
        Some("*") => RuleTarget::AllFields,
        Some("*()") => RuleTarget::AllMethods,
        Some(member) => match member.find('(') {
            Some(0) => return Err(syntax(format!("method without a name: `{member}`"))),
            Some(paren) => RuleTarget::Method {
                name: member[..paren].to_string(),
                descriptor: member[paren..].to_string(),
            },
            None => RuleTarget::Field(member.to_string()),
        },
    };

    Ok(AccessRule {
        visibility,
        finality,
        owner: owner.replace('.', "/"),
        target,
        line,
    })
}
