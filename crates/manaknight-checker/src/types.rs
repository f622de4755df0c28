//! Resolved type representations and unification
//!
//! The checker works with a resolved form in which named types are
//! linked to their declarations and generic parameters are substituted.
//! Unification is deliberately small: concrete types plus the variables
//! introduced when a generic prelude symbol or ADT is instantiated.

use std::collections::{BTreeSet, HashMap};

use manaknight_ast::Span;

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Int,
    Bool,
    String,
    Unit,
    /// Unification variable from a generic instantiation
    Var(u32),
    /// Declared ADT, record, or opaque builtin with its arguments
    Adt {
        name: String,
        args: Vec<ResolvedType>,
    },
    Function {
        params: Vec<ResolvedType>,
        ret: Box<ResolvedType>,
        effects: BTreeSet<String>,
    },
    /// Poisoned by an earlier error; unifies with everything silently
    Error,
}

impl ResolvedType {
    pub fn display(&self) -> String {
        match self {
            ResolvedType::Int => "Int".to_string(),
            ResolvedType::Bool => "Bool".to_string(),
            ResolvedType::String => "String".to_string(),
            ResolvedType::Unit => "Unit".to_string(),
            ResolvedType::Var(_) => "_".to_string(),
            ResolvedType::Adt { name, args } => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let args_str: Vec<String> = args.iter().map(|a| a.display()).collect();
                    format!("{}<{}>", name, args_str.join(", "))
                }
            }
            ResolvedType::Function {
                params,
                ret,
                effects,
            } => {
                let params_str: Vec<String> = params.iter().map(|p| p.display()).collect();
                let base = format!("({}) -> {}", params_str.join(", "), ret.display());
                if effects.is_empty() {
                    base
                } else {
                    let names: Vec<&str> = effects.iter().map(|e| e.as_str()).collect();
                    format!("{} uses {{ {} }}", base, names.join(", "))
                }
            }
            ResolvedType::Error => "<error>".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResolvedType::Error)
    }

    /// Structural comparability for `==`/`!=`: everything except
    /// function types (and error placeholders, which stay silent).
    pub fn is_comparable(&self) -> bool {
        !matches!(self, ResolvedType::Function { .. })
    }
}

/// The substitution built up by unification, plus the variable supply.
#[derive(Debug, Default)]
pub struct Subst {
    bindings: HashMap<u32, ResolvedType>,
    next_var: u32,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> ResolvedType {
        let v = self.next_var;
        self.next_var += 1;
        ResolvedType::Var(v)
    }

    /// Resolve a type through the current bindings, recursively.
    pub fn apply(&self, ty: &ResolvedType) -> ResolvedType {
        match ty {
            ResolvedType::Var(v) => match self.bindings.get(v) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            ResolvedType::Adt { name, args } => ResolvedType::Adt {
                name: name.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            ResolvedType::Function {
                params,
                ret,
                effects,
            } => ResolvedType::Function {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
                effects: effects.clone(),
            },
            other => other.clone(),
        }
    }

    /// Unify two types, binding variables as needed. Error unifies with
    /// anything so one mistake does not cascade.
    pub fn unify(&mut self, a: &ResolvedType, b: &ResolvedType) -> bool {
        let a = self.apply(a);
        let b = self.apply(b);
        match (&a, &b) {
            (ResolvedType::Error, _) | (_, ResolvedType::Error) => true,
            (ResolvedType::Var(v), other) | (other, ResolvedType::Var(v)) => {
                if let ResolvedType::Var(w) = other {
                    if v == w {
                        return true;
                    }
                }
                if self.occurs(*v, other) {
                    return false;
                }
                self.bindings.insert(*v, other.clone());
                true
            }
            (ResolvedType::Int, ResolvedType::Int)
            | (ResolvedType::Bool, ResolvedType::Bool)
            | (ResolvedType::String, ResolvedType::String)
            | (ResolvedType::Unit, ResolvedType::Unit) => true,
            (
                ResolvedType::Adt { name: n1, args: a1 },
                ResolvedType::Adt { name: n2, args: a2 },
            ) => {
                n1 == n2
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2.iter()).all(|(x, y)| self.unify(x, y))
            }
            (
                ResolvedType::Function {
                    params: p1, ret: r1, ..
                },
                ResolvedType::Function {
                    params: p2, ret: r2, ..
                },
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2.iter()).all(|(x, y)| self.unify(x, y))
                    && self.unify(r1, r2)
            }
            _ => false,
        }
    }

    fn occurs(&self, var: u32, ty: &ResolvedType) -> bool {
        match ty {
            ResolvedType::Var(v) => *v == var,
            ResolvedType::Adt { args, .. } => args.iter().any(|a| self.occurs(var, a)),
            ResolvedType::Function { params, ret, .. } => {
                params.iter().any(|p| self.occurs(var, p)) || self.occurs(var, ret)
            }
            _ => false,
        }
    }
}

/// Declared shape of an ADT, record, or opaque builtin.
#[derive(Debug, Clone)]
pub struct AdtInfo {
    pub name: String,
    pub type_params: Vec<String>,
    pub kind: AdtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AdtKind {
    Record { fields: Vec<FieldInfo> },
    Union { variants: Vec<VariantInfo> },
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: manaknight_ast::Type,
}

#[derive(Debug, Clone)]
pub struct VariantInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

impl AdtInfo {
    /// Variants of a tagged union, in declaration order.
    pub fn variants(&self) -> &[VariantInfo] {
        match &self.kind {
            AdtKind::Union { variants } => variants,
            AdtKind::Record { .. } => &[],
        }
    }

    pub fn is_matchable_union(&self) -> bool {
        matches!(&self.kind, AdtKind::Union { variants } if !variants.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_concrete_types() {
        let mut s = Subst::new();
        assert!(s.unify(&ResolvedType::Int, &ResolvedType::Int));
        assert!(!s.unify(&ResolvedType::Int, &ResolvedType::Bool));
    }

    #[test]
    fn unify_binds_variables() {
        let mut s = Subst::new();
        let v = s.fresh();
        assert!(s.unify(&v, &ResolvedType::String));
        assert_eq!(s.apply(&v), ResolvedType::String);
    }

    #[test]
    fn unify_adt_arguments() {
        let mut s = Subst::new();
        let v = s.fresh();
        let option_v = ResolvedType::Adt {
            name: "Option".into(),
            args: vec![v.clone()],
        };
        let option_int = ResolvedType::Adt {
            name: "Option".into(),
            args: vec![ResolvedType::Int],
        };
        assert!(s.unify(&option_v, &option_int));
        assert_eq!(s.apply(&v), ResolvedType::Int);
    }

    #[test]
    fn occurs_check_rejects_infinite_types() {
        let mut s = Subst::new();
        let v = s.fresh();
        let list_v = ResolvedType::Adt {
            name: "List".into(),
            args: vec![v.clone()],
        };
        assert!(!s.unify(&v, &list_v));
    }

    #[test]
    fn error_unifies_silently() {
        let mut s = Subst::new();
        assert!(s.unify(&ResolvedType::Error, &ResolvedType::Int));
    }

    #[test]
    fn display_formats() {
        let t = ResolvedType::Adt {
            name: "Option".into(),
            args: vec![ResolvedType::Int],
        };
        assert_eq!(t.display(), "Option<Int>");
        let f = ResolvedType::Function {
            params: vec![ResolvedType::Int],
            ret: Box::new(ResolvedType::Bool),
            effects: ["log".to_string()].into_iter().collect(),
        };
        assert_eq!(f.display(), "(Int) -> Bool uses { log }");
    }

    #[test]
    fn functions_are_not_comparable() {
        let f = ResolvedType::Function {
            params: vec![],
            ret: Box::new(ResolvedType::Unit),
            effects: BTreeSet::new(),
        };
        assert!(!f.is_comparable());
        assert!(ResolvedType::Int.is_comparable());
    }
}
