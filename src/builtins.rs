#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Print,
    Len,
    Str,
    Type,
    Status,
    Error,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 6] = [
        Self::Print,
        Self::Len,
        Self::Str,
        Self::Type,
        Self::Status,
        Self::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Str => "str",
            Self::Type => "type",
            Self::Status => "status",
            Self::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    /// Required argument count; `None` for variadic builtins.
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Print => None,
            Self::Len | Self::Str | Self::Type | Self::Status | Self::Error => Some(1),
        }
    }
}
