use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("invalid class magic: {0:#010x}")]
    InvalidMagic(u32),

    #[error("truncated class data at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("invalid constant pool index {index}: {reason}")]
    BadConstantIndex { index: u16, reason: String },

    #[error("invalid modified UTF-8 at byte {0}")]
    InvalidUtf8(usize),

    #[error("malformed {attribute} attribute: {reason}")]
    MalformedAttribute { attribute: String, reason: String },

    #[error("constant pool overflow: more than 65535 entries")]
    PoolOverflow,

    #[error("{kind} index {index} is not declared by the unit")]
    MemberOutOfRange { kind: &'static str, index: usize },

    #[error("unit rejected by visitor: {0}")]
    Rejected(String),

    #[error("visitor chain ended without producing a class")]
    NoOutput,
}

impl ClassError {
    /// A visitor refused the unit being traversed.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    pub(crate) fn bad_index(index: u16, reason: impl Into<String>) -> Self {
        Self::BadConstantIndex {
            index,
            reason: reason.into(),
        }
    }
}

pub type ClassResult<T> = Result<T, ClassError>;
