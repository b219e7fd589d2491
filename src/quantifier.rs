#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantTy {
    Exists,
    Forall,
}

impl QuantTy {
    pub fn is_existential(self) -> bool {
        matches!(self, QuantTy::Exists)
    }
}

impl std::fmt::Display for QuantTy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantTy::Exists => write!(f, "e"),
            QuantTy::Forall => write!(f, "a"),
        }
    }
}
