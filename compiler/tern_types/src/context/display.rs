//! Rendering types as source-like text for diagnostics and debug output.

use std::fmt::Write;

use super::AstContext;
use crate::{ArchetypeId, Idx, TypeData};

impl AstContext {
    /// Render `ty` the way a user would write it.
    pub fn type_name(&self, ty: Idx) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty);
        out
    }

    /// Name of a declaration, or `<anonymous>` for unnamed ones.
    pub fn decl_name(&self, decl: crate::DeclId) -> &str {
        match self.decl(decl).name() {
            Some(name) => self.interner().lookup(name),
            None => "<anonymous>",
        }
    }

    fn write_archetype(&self, out: &mut String, id: ArchetypeId) {
        let archetype = self.archetype(id);
        if let Some(parent) = archetype.parent {
            self.write_archetype(out, parent);
            out.push('.');
        }
        out.push_str(self.interner().lookup(archetype.name));
    }

    fn write_list(&self, out: &mut String, tys: &[Idx]) {
        for (i, &ty) in tys.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_type(out, ty);
        }
    }

    fn write_type(&self, out: &mut String, ty: Idx) {
        match self.pool().data(ty) {
            TypeData::Error => out.push_str("<<error type>>"),
            TypeData::BuiltinInteger { bits } => {
                let _ = write!(out, "Builtin.Int{bits}");
            }
            TypeData::BuiltinFloat { bits } => {
                let _ = write!(out, "Builtin.FPIEEE{bits}");
            }
            TypeData::RawPointer => out.push_str("Builtin.RawPointer"),
            TypeData::ObjectPointer => out.push_str("Builtin.ObjectPointer"),
            TypeData::Tuple(elts) => {
                out.push('(');
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if let Some(label) = elt.label {
                        out.push_str(self.interner().lookup(label));
                        out.push_str(" : ");
                    }
                    self.write_type(out, elt.ty);
                }
                out.push(')');
            }
            TypeData::Function { input, result } => {
                self.write_type(out, *input);
                out.push_str(" -> ");
                self.write_type(out, *result);
            }
            TypeData::PolymorphicFunction {
                input,
                result,
                generics,
            } => {
                out.push('<');
                let list = self.generic_param_list(*generics);
                for (i, param) in list.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(self.interner().lookup(param.name));
                }
                out.push_str("> ");
                self.write_type(out, *input);
                out.push_str(" -> ");
                self.write_type(out, *result);
            }
            TypeData::Metatype(instance) => {
                self.write_type(out, *instance);
                out.push_str(".metatype");
            }
            TypeData::Nominal(decl) | TypeData::Protocol(decl) => {
                out.push_str(self.decl_name(*decl));
            }
            TypeData::BoundGeneric { decl, args } => {
                out.push_str(self.decl_name(*decl));
                out.push('<');
                self.write_list(out, args);
                out.push('>');
            }
            TypeData::Archetype(id) => self.write_archetype(out, *id),
            TypeData::ProtocolComposition(members) => {
                out.push_str("protocol<");
                self.write_list(out, members);
                out.push('>');
            }
            TypeData::LValue(object) => {
                out.push_str("[byref] ");
                self.write_type(out, *object);
            }
            TypeData::NameAlias { decl, .. } => out.push_str(self.decl_name(*decl)),
        }
    }
}
