//! Call-site name resolution
//!
//! A call `name(...)` resolves to a user function, then a declared external
//! function, then a builtin. `recv.name(...)` is a method-style external call
//! unless `recv.name` spells a builtin namespace member such as `Math.floor`
//! or an OS function such as `os.read_text`. Both namespaces are reserved.

use std::collections::{BTreeMap, BTreeSet};

use crate::executor::os::{self, OsFunction};
use crate::executor::stdlib::Builtin;
use crate::executor::types::ast::{Expr, ScriptDef};

/// What a callee expression refers to
#[derive(Debug, Clone, Copy)]
pub enum CallTarget<'e> {
    /// A `function` declared in the script
    Function { name: &'e str, arity: usize },
    /// A declared external function; `receiver` is set for method-style calls
    External {
        name: &'e str,
        receiver: Option<&'e Expr>,
    },
    Builtin(Builtin),
    /// `os.<name>(...)`; suspends like an external call
    Os(OsFunction),
    UnknownFunction(&'e str),
    /// `os.<name>` where `name` is not an OS function
    UnknownOsFunction(&'e str),
    UnknownMethod(&'e str),
    NotCallable,
}

/// Name tables consulted when resolving call sites
#[derive(Debug, Clone)]
pub struct CallNames<'a> {
    functions: BTreeMap<&'a str, usize>,
    externals: &'a BTreeSet<String>,
}

impl<'a> CallNames<'a> {
    pub fn new(script: &'a ScriptDef, externals: &'a BTreeSet<String>) -> Self {
        let functions = script
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.params.len()))
            .collect();
        Self {
            functions,
            externals,
        }
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.externals.contains(name)
    }

    pub fn resolve<'e>(&self, callee: &'e Expr) -> CallTarget<'e> {
        match callee {
            Expr::Ident { name, .. } => {
                if let Some(arity) = self.functions.get(name.as_str()) {
                    CallTarget::Function {
                        name,
                        arity: *arity,
                    }
                } else if self.externals.contains(name) {
                    CallTarget::External {
                        name,
                        receiver: None,
                    }
                } else if let Some(builtin) = Builtin::from_name(name) {
                    CallTarget::Builtin(builtin)
                } else {
                    CallTarget::UnknownFunction(name)
                }
            }
            Expr::Member {
                object, property, ..
            } => {
                if let Some(builtin) = namespace_builtin(object, property) {
                    CallTarget::Builtin(builtin)
                } else if is_os_namespace(object) {
                    match OsFunction::from_name(property) {
                        Some(function) => CallTarget::Os(function),
                        None => CallTarget::UnknownOsFunction(property),
                    }
                } else if self.externals.contains(property) {
                    CallTarget::External {
                        name: property,
                        receiver: Some(object),
                    }
                } else {
                    CallTarget::UnknownMethod(property)
                }
            }
            _ => CallTarget::NotCallable,
        }
    }
}

/// `Math.floor`, `Promise.all`, ...
pub fn namespace_builtin(object: &Expr, property: &str) -> Option<Builtin> {
    match object {
        Expr::Ident { name, .. } if Builtin::is_namespace(name) => {
            Builtin::from_name(&format!("{}.{}", name, property))
        }
        _ => None,
    }
}

fn is_os_namespace(object: &Expr) -> bool {
    matches!(object, Expr::Ident { name, .. } if name == os::NAMESPACE)
}

/// Whether `object.property(...)` names a namespace member rather than a
/// method on a script value
pub fn is_namespace_call(object: &Expr, property: &str) -> bool {
    namespace_builtin(object, property).is_some() || is_os_namespace(object)
}
