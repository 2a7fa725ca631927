//! Lexical scope tracking shared by the scope-aware rules

use std::collections::BTreeMap;

use crate::executor::types::ast::{ScriptDef, Stmt, VarKind};

use super::super::ValidationContext;

/// A stack of block scopes
pub(super) struct Scope {
    blocks: Vec<BTreeMap<String, VarKind>>,
}

impl Scope {
    /// A fresh function scope with its parameters bound
    pub(super) fn with_params(params: &[String]) -> Self {
        let params_block = params
            .iter()
            .map(|p| (p.clone(), VarKind::Let))
            .collect();
        Self {
            blocks: vec![params_block],
        }
    }

    pub(super) fn push(&mut self) {
        self.blocks.push(BTreeMap::new());
    }

    pub(super) fn pop(&mut self) {
        self.blocks.pop();
    }

    pub(super) fn define(&mut self, name: &str, kind: VarKind) {
        if let Some(block) = self.blocks.last_mut() {
            block.insert(name.to_string(), kind);
        }
    }

    pub(super) fn lookup(&self, name: &str) -> Option<VarKind> {
        self.blocks.iter().rev().find_map(|b| b.get(name).copied())
    }
}

/// Every independently scoped body: the main body (inputs pre-bound) then each function
pub(super) fn bodies<'a>(
    script: &'a ScriptDef,
    ctx: &'a ValidationContext,
) -> Vec<(&'a [String], &'a Stmt)> {
    let mut out: Vec<(&[String], &Stmt)> = vec![(ctx.inputs, &script.body)];
    out.extend(
        script
            .functions
            .iter()
            .map(|f| (f.params.as_slice(), &f.body)),
    );
    out
}
