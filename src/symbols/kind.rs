//! Closed set of declaration kinds reported by the symbol index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a declaration as reported by the index.
///
/// Every consumer matches on this exhaustively, so adding a kind is a
/// compile-time checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Class,
    Struct,
    Union,
    Enum,
    Enumerator,
    Typedef,
    /// Function or method declaration (prototype).
    Function,
    /// Function or method body.
    FunctionDefinition,
    Variable,
    Field,
    ForwardClass,
    ForwardEnum,
    FriendClass,
    FriendFunction,
    /// Emitted by the parser for constructs it could not understand.
    Error,
}

impl DeclKind {
    /// Class, struct, union or enum: kinds that own a member scope.
    pub fn is_classifier(self) -> bool {
        matches!(self, Self::Class | Self::Struct | Self::Union | Self::Enum)
    }

    /// Class, struct or union.
    pub fn is_compound(self) -> bool {
        matches!(self, Self::Class | Self::Struct | Self::Union)
    }

    /// Declaration or definition of a function.
    pub fn is_function(self) -> bool {
        matches!(self, Self::Function | Self::FunctionDefinition)
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Self::ForwardClass | Self::ForwardEnum)
    }

    /// Prefix the index puts in front of qualified names to build unique names.
    pub fn unique_prefix(self) -> char {
        match self {
            Self::Class => 'C',
            Self::Struct => 'S',
            Self::Union => 'U',
            Self::Enum => 'E',
            Self::Enumerator => 'e',
            Self::Typedef => 'T',
            Self::Function => 'F',
            Self::FunctionDefinition => 'f',
            Self::Variable => 'V',
            Self::Field => 'A',
            Self::ForwardClass => 'w',
            Self::ForwardEnum => 'y',
            Self::FriendClass => 'r',
            Self::FriendFunction => 'R',
            Self::Error => '!',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Enumerator => "enumerator",
            Self::Typedef => "typedef",
            Self::Function => "function",
            Self::FunctionDefinition => "function-definition",
            Self::Variable => "variable",
            Self::Field => "field",
            Self::ForwardClass => "forward-class",
            Self::ForwardEnum => "forward-enum",
            Self::FriendClass => "friend-class",
            Self::FriendFunction => "friend-function",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
