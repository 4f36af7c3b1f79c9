use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Scope of the root of a resolution. Every requested scope is kept as is.
    None,
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
    Invalid,
}

impl Scope {
    /// Maps a `<scope>` value. A missing or blank value means compile scope.
    pub fn from_name(name: Option<&str>) -> Scope {
        match name.map(str::trim) {
            None | Some("") => Scope::Compile,
            Some(name) => match name.to_ascii_lowercase().as_str() {
                "compile" => Scope::Compile,
                "provided" => Scope::Provided,
                "runtime" => Scope::Runtime,
                "test" => Scope::Test,
                "system" => Scope::System,
                "import" => Scope::Import,
                _ => Scope::Invalid,
            },
        }
    }

    /// The scope a dependency declared with `self` ends up in when it is reached through an
    /// edge of scope `including`. `None` means the dependency does not propagate.
    pub fn transitive_of(self, including: Scope) -> Option<Scope> {
        use Scope::*;
        match (including, self) {
            (None, requested) => Some(requested),
            (Compile, Compile) => Some(Compile),
            (Compile, Runtime) => Some(Runtime),
            (Provided, Compile | Runtime) => Some(Provided),
            (Runtime, Compile | Runtime) => Some(Runtime),
            (Test, Compile | Runtime) => Some(Test),
            _ => Option::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::None => "none",
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
            Scope::Invalid => "invalid",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parse_names() {
        assert_eq!(Scope::from_name(None), Scope::Compile);
        assert_eq!(Scope::from_name(Some(" ")), Scope::Compile);
        assert_eq!(Scope::from_name(Some("Test")), Scope::Test);
        assert_eq!(Scope::from_name(Some("bogus")), Scope::Invalid);
    }

    #[test]
    fn root_keeps_requested_scope() {
        assert_eq!(Scope::Test.transitive_of(Scope::None), Some(Scope::Test));
        assert_eq!(Scope::Provided.transitive_of(Scope::None), Some(Scope::Provided));
    }

    #[test]
    fn transitive_scopes() {
        assert_eq!(Scope::Compile.transitive_of(Scope::Compile), Some(Scope::Compile));
        assert_eq!(Scope::Runtime.transitive_of(Scope::Compile), Some(Scope::Runtime));
        assert_eq!(Scope::Compile.transitive_of(Scope::Test), Some(Scope::Test));
        assert_eq!(Scope::Runtime.transitive_of(Scope::Provided), Some(Scope::Provided));
        assert_eq!(Scope::Test.transitive_of(Scope::Compile), None);
        assert_eq!(Scope::Provided.transitive_of(Scope::Compile), None);
        assert_eq!(Scope::Compile.transitive_of(Scope::System), None);
    }
}
