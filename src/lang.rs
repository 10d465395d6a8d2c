// src/lang.rs
use std::path::Path;
use tree_sitter::Language;

/// Source dialect of a translation unit. The dialect decides which grammar
/// parses the file and how a handful of typing rules behave (`!` and the
/// relational operators yield `int` in C but `bool` in C++, character
/// literals are `int` in C, and C has no lambdas).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    C,
    Cpp,
}

impl Lang {
    #[must_use]
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            "c" | "h" => Some(Self::C),
            "cc" | "cpp" | "cxx" | "c++" | "hh" | "hpp" | "hxx" => Some(Self::Cpp),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        Self::from_ext(ext)
    }

    #[must_use]
    pub fn grammar(self) -> Language {
        match self {
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// C++ call sites wrap operands in lambdas and pass lvalues by
    /// reference; C dispatchers fall back to value and pointer passing.
    #[must_use]
    pub fn has_lambdas(self) -> bool {
        self == Self::Cpp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ext() {
        assert_eq!(Lang::from_ext("c"), Some(Lang::C));
        assert_eq!(Lang::from_ext("h"), Some(Lang::C));
        assert_eq!(Lang::from_ext("cc"), Some(Lang::Cpp));
        assert_eq!(Lang::from_ext("cpp"), Some(Lang::Cpp));
        assert_eq!(Lang::from_ext("hpp"), Some(Lang::Cpp));
        assert_eq!(Lang::from_ext("rs"), None);
    }

    #[test]
    fn test_grammars_load() {
        let mut parser = tree_sitter::Parser::new();
        assert!(parser.set_language(&Lang::C.grammar()).is_ok());
        assert!(parser.set_language(&Lang::Cpp.grammar()).is_ok());
    }
}
