//! The stable error catalog
//!
//! Codes are grouped into nine ranges. New codes may only be appended
//! within a range; existing codes never change meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine diagnostic categories, one per thousand-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Syntax,
    Type,
    Effect,
    Pattern,
    Module,
    Api,
    Runtime,
    Resource,
    Internal,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Syntax => "SyntaxError",
            Category::Type => "TypeError",
            Category::Effect => "EffectError",
            Category::Pattern => "PatternError",
            Category::Module => "ModuleError",
            Category::Api => "ApiError",
            Category::Runtime => "RuntimeError",
            Category::Resource => "ResourceError",
            Category::Internal => "InternalError",
        }
    }
}

/// Every error code the compiler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum ErrorCode {
    // Syntax (E1000-E1999)
    /// Unexpected or malformed token, including unterminated strings
    E1001,
    /// Integer literal does not fit a signed 64-bit value
    E1002,
    /// Invalid declaration syntax
    E1003,
    /// Invalid type syntax
    E1004,
    /// Invalid expression
    E1005,
    /// Empty blocks are not allowed
    E1006,

    // Type (E2000-E2999)
    /// Unknown identifier
    E2001,
    /// Type mismatch
    E2002,
    /// Wrong number of arguments
    E2003,
    /// Function body does not match declared return type
    E2004,
    /// Function does not produce a value on every path
    E2005,
    /// Name shadows a declaration in an enclosing scope
    E2006,
    /// Condition is not Bool
    E2007,

    // Effect (E3000-E3999)
    /// Effect used but not declared by the function
    E3001,
    /// Effect leaks into a pure function
    E3002,
    /// Effect escalation (reserved)
    E3003,
    /// Effectful code inside a lambda
    E3004,
    /// Effect name is not declared anywhere in the program
    E3005,

    // Pattern (E4000-E4999)
    /// Match does not cover every constructor
    E4001,
    /// Scrutinee is not a tagged union
    E4002,
    /// Duplicate or unreachable pattern
    E4003,
    /// Match arms produce inconsistent types
    E4004,

    // Module (E5000-E5999)
    /// Module file not found
    E5001,
    /// Module defined in more than one location
    E5002,
    /// Imported symbol is not exported
    E5003,
    /// Circular module dependency
    E5004,

    // API (E6000-E6999)
    /// Invalid HTTP method
    E6001,
    /// Invalid route path
    E6002,
    /// Route has no response type
    E6003,
    /// Route parameter type is not a primitive
    E6004,
    /// Undeclared effect in an API route
    E6005,

    // Runtime (E7000-E7999) - host contract, surfaced by emitted code
    E7001,
    E7002,
    E7003,
    E7004,

    // Resource (E8000-E8999) - host contract
    E8001,
    E8002,
    E8003,
    E8004,

    // Internal (E9000-E9999)
    /// Compiler bug marker; never shown verbatim in release output
    E9001,
}

impl ErrorCode {
    pub fn number(&self) -> u32 {
        match self {
            ErrorCode::E1001 => 1001,
            ErrorCode::E1002 => 1002,
            ErrorCode::E1003 => 1003,
            ErrorCode::E1004 => 1004,
            ErrorCode::E1005 => 1005,
            ErrorCode::E1006 => 1006,
            ErrorCode::E2001 => 2001,
            ErrorCode::E2002 => 2002,
            ErrorCode::E2003 => 2003,
            ErrorCode::E2004 => 2004,
            ErrorCode::E2005 => 2005,
            ErrorCode::E2006 => 2006,
            ErrorCode::E2007 => 2007,
            ErrorCode::E3001 => 3001,
            ErrorCode::E3002 => 3002,
            ErrorCode::E3003 => 3003,
            ErrorCode::E3004 => 3004,
            ErrorCode::E3005 => 3005,
            ErrorCode::E4001 => 4001,
            ErrorCode::E4002 => 4002,
            ErrorCode::E4003 => 4003,
            ErrorCode::E4004 => 4004,
            ErrorCode::E5001 => 5001,
            ErrorCode::E5002 => 5002,
            ErrorCode::E5003 => 5003,
            ErrorCode::E5004 => 5004,
            ErrorCode::E6001 => 6001,
            ErrorCode::E6002 => 6002,
            ErrorCode::E6003 => 6003,
            ErrorCode::E6004 => 6004,
            ErrorCode::E6005 => 6005,
            ErrorCode::E7001 => 7001,
            ErrorCode::E7002 => 7002,
            ErrorCode::E7003 => 7003,
            ErrorCode::E7004 => 7004,
            ErrorCode::E8001 => 8001,
            ErrorCode::E8002 => 8002,
            ErrorCode::E8003 => 8003,
            ErrorCode::E8004 => 8004,
            ErrorCode::E9001 => 9001,
        }
    }

    /// Category follows from the thousand-range of the code.
    pub fn category(&self) -> Category {
        match self.number() / 1000 {
            1 => Category::Syntax,
            2 => Category::Type,
            3 => Category::Effect,
            4 => Category::Pattern,
            5 => Category::Module,
            6 => Category::Api,
            7 => Category::Runtime,
            8 => Category::Resource,
            _ => Category::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_display_with_e_prefix() {
        assert_eq!(ErrorCode::E1001.to_string(), "E1001");
        assert_eq!(ErrorCode::E9001.to_string(), "E9001");
    }

    #[test]
    fn ranges_map_to_categories() {
        assert_eq!(ErrorCode::E1006.category(), Category::Syntax);
        assert_eq!(ErrorCode::E2006.category(), Category::Type);
        assert_eq!(ErrorCode::E3004.category(), Category::Effect);
        assert_eq!(ErrorCode::E4003.category(), Category::Pattern);
        assert_eq!(ErrorCode::E5004.category(), Category::Module);
        assert_eq!(ErrorCode::E6001.category(), Category::Api);
        assert_eq!(ErrorCode::E7004.category(), Category::Runtime);
        assert_eq!(ErrorCode::E8002.category(), Category::Resource);
        assert_eq!(ErrorCode::E9001.category(), Category::Internal);
    }
}
