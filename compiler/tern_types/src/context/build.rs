//! Construction API for declarations.
//!
//! The parser and name binder build the AST through these methods. Each one
//! allocates the declaration, wires it into its enclosing scope, and assigns
//! its type, so every value declaration leaves here fully typed.

use smallvec::SmallVec;
use tern_ir::{Name, Span};

use super::AstContext;
use crate::{
    Archetype, ArchetypeId, ArchetypeOwner, Decl, DeclId, DeclKind, ExtensionDecl, GenericParam,
    GenericParamList, GenericParamListId, Idx, NominalDecl, NominalKind, Requirement, TypeData,
    ValueDecl, ValueKind,
};

/// One generic parameter to declare: its name and the protocol types it
/// must conform to.
#[derive(Clone, Debug)]
pub struct GenericParamSpec<'a> {
    pub name: &'a str,
    pub conforms_to: &'a [Idx],
}

impl AstContext {
    fn push_decl(&mut self, kind: DeclKind, context: Option<DeclId>, span: Span) -> DeclId {
        let id = DeclId::next(self.decls.len());
        self.decls.push(Decl {
            kind,
            context,
            span,
            invalid: false,
        });
        match context {
            None => self.module.decls.push(id),
            Some(parent) => self.push_member(parent, id),
        }
        id
    }

    fn push_member(&mut self, parent: DeclId, member: DeclId) {
        match &mut self.decls[parent.index()].kind {
            DeclKind::Extension(ext) => ext.members.push(member),
            DeclKind::Value(ValueDecl {
                kind: ValueKind::Nominal(nominal),
                ..
            }) => nominal.members.push(member),
            _ => panic!("{parent:?} cannot hold members"),
        }
    }

    fn push_value(
        &mut self,
        name: Name,
        kind: ValueKind,
        context: Option<DeclId>,
        span: Span,
    ) -> DeclId {
        self.push_decl(DeclKind::Value(ValueDecl::new(name, kind)), context, span)
    }

    fn new_archetype(
        &mut self,
        name: Name,
        parent: Option<ArchetypeId>,
        conforms_to: SmallVec<[DeclId; 2]>,
        owner: ArchetypeOwner,
        primary_index: Option<u32>,
    ) -> ArchetypeId {
        let id = ArchetypeId::next(self.archetypes.len());
        let ty = self.pool.archetype(id);
        self.archetypes.push(Archetype {
            name,
            parent,
            conforms_to,
            nested: Vec::new(),
            owner,
            primary_index,
            ty,
        });
        if let Some(parent) = parent {
            self.archetypes[parent.index()].nested.push((name, id));
        }
        id
    }

    fn protocols_of(&self, types: &[Idx]) -> SmallVec<[DeclId; 2]> {
        let mut out = SmallVec::new();
        for &ty in types {
            for proto in self.pool.existential_protocols(ty) {
                if !out.contains(&proto) {
                    out.push(proto);
                }
            }
        }
        out
    }

    /// The type `This` denotes for members of `context`.
    fn self_type_of(&self, context: Option<DeclId>) -> Option<Idx> {
        let id = context?;
        if self.is_protocol(id) {
            let this = self.protocol_this_archetype(id)?;
            return Some(self.archetype(this).ty);
        }
        self.decl(id).as_context()?.declared_type_of_context()
    }

    // ── Scopes ──────────────────────────────────────────────────────

    pub fn add_import(&mut self, path: &[Name], span: Span) -> DeclId {
        self.push_decl(DeclKind::Import { path: path.into() }, None, span)
    }

    pub fn add_top_level_code(&mut self, span: Span) -> DeclId {
        self.push_decl(DeclKind::TopLevelCode, None, span)
    }

    /// Declare a struct, class or oneof at module scope or nested in `context`.
    pub fn declare_nominal(
        &mut self,
        kind: NominalKind,
        name: &str,
        context: Option<DeclId>,
        inherited: &[Idx],
        span: Span,
    ) -> DeclId {
        debug_assert!(kind != NominalKind::Protocol, "use declare_protocol");
        self.declare_nominal_with(kind, name, context, inherited, None, span)
    }

    /// Declare a generic struct, class or oneof. Its declared type is the
    /// declaration applied to its own parameters' archetypes.
    pub fn declare_generic_nominal(
        &mut self,
        kind: NominalKind,
        name: &str,
        params: &[GenericParamSpec<'_>],
        inherited: &[Idx],
        span: Span,
    ) -> DeclId {
        let generics = self.add_generic_params(params, None, span);
        self.declare_nominal_with(kind, name, None, inherited, Some(generics), span)
    }

    fn declare_nominal_with(
        &mut self,
        kind: NominalKind,
        name: &str,
        context: Option<DeclId>,
        inherited: &[Idx],
        generics: Option<GenericParamListId>,
        span: Span,
    ) -> DeclId {
        let name = self.name(name);
        let id = DeclId::next(self.decls.len());
        let declared_type = match generics {
            Some(list) => {
                let args: Vec<Idx> = self
                    .generic_param_list(list)
                    .primary_archetypes()
                    .map(|a| self.archetype(a).ty)
                    .collect();
                self.pool.bound_generic(id, &args)
            }
            None if kind == NominalKind::Protocol => self.pool.intern(TypeData::Protocol(id)),
            None => self.pool.intern(TypeData::Nominal(id)),
        };
        let nominal = NominalDecl {
            kind,
            members: Vec::new(),
            inherited: inherited.into(),
            declared_type,
            generics,
        };
        let pushed = self.push_value(name, ValueKind::Nominal(nominal), context, span);
        debug_assert_eq!(pushed, id);
        let meta = self.pool.metatype(declared_type);
        self.value(id).set_type(meta);

        // Generic parameters are scoped to the declaration that owns them.
        if let Some(list) = generics {
            for param in self.generic_param_list(list).params.clone() {
                self.decls[param.decl.index()].context = Some(id);
            }
        }
        id
    }

    /// Declare a protocol with its implicit `This` associated type.
    pub fn declare_protocol(&mut self, name: &str, inherited: &[Idx], span: Span) -> DeclId {
        let proto = self.declare_nominal_with(NominalKind::Protocol, name, None, inherited, None, span);
        let this_name = self.this_name;
        let this = self.new_archetype(
            this_name,
            None,
            SmallVec::from_slice(&[proto]),
            ArchetypeOwner::Protocol(proto),
            None,
        );
        let this_ty = self.archetype(this).ty;
        self.add_typealias(Some(proto), "This", this_ty, span);
        proto
    }

    /// Declare an associated type requirement `typealias Name : inherited`
    /// inside `proto`.
    pub fn add_associated_type(
        &mut self,
        proto: DeclId,
        name: &str,
        inherited: &[Idx],
        span: Span,
    ) -> DeclId {
        let name_id = self.name(name);
        let this = self.protocol_this_archetype(proto);
        let conforms_to = self.protocols_of(inherited);
        let archetype = self.new_archetype(
            name_id,
            this,
            conforms_to,
            ArchetypeOwner::Protocol(proto),
            None,
        );
        let underlying = self.archetype(archetype).ty;
        let id = self.push_value(
            name_id,
            ValueKind::TypeAlias {
                underlying,
                inherited: inherited.into(),
            },
            Some(proto),
            span,
        );
        self.assign_alias_type(id, underlying);
        id
    }

    pub fn add_typealias(
        &mut self,
        context: Option<DeclId>,
        name: &str,
        underlying: Idx,
        span: Span,
    ) -> DeclId {
        let name = self.name(name);
        let id = self.push_value(
            name,
            ValueKind::TypeAlias {
                underlying,
                inherited: SmallVec::new(),
            },
            context,
            span,
        );
        self.assign_alias_type(id, underlying);
        id
    }

    fn assign_alias_type(&mut self, alias: DeclId, underlying: Idx) {
        let sugared = self.pool.name_alias(alias, underlying);
        let meta = self.pool.metatype(sugared);
        self.value(alias).set_type(meta);
    }

    /// Create a generic parameter list. Each parameter gets a primary
    /// archetype; each associated type of a protocol it conforms to gets a
    /// nested archetype.
    pub fn add_generic_params(
        &mut self,
        params: &[GenericParamSpec<'_>],
        outer: Option<GenericParamListId>,
        span: Span,
    ) -> GenericParamListId {
        let list = GenericParamListId::next(self.generics.len());
        self.generics.push(GenericParamList {
            params: Vec::new(),
            requirements: Vec::new(),
            archetypes: Vec::new(),
            outer,
            span,
        });

        let mut primaries = Vec::with_capacity(params.len());
        let mut nested = Vec::new();
        for (index, spec) in params.iter().enumerate() {
            let name = self.name(spec.name);
            let conforms_to = self.protocols_of(spec.conforms_to);
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let archetype = self.new_archetype(
                name,
                None,
                conforms_to.clone(),
                ArchetypeOwner::Generics(list),
                Some(index),
            );
            let arch_ty = self.archetype(archetype).ty;

            // Parameters start at module scope and are reparented by their owner.
            let decl = self.push_generic_param_decl(name, arch_ty, span);
            primaries.push(GenericParam {
                name,
                decl,
                archetype,
            });

            for &constraint in spec.conforms_to {
                self.generics[list.index()]
                    .requirements
                    .push(Requirement::Conformance {
                        subject: arch_ty,
                        constraint,
                        span,
                    });
            }

            for proto in conforms_to {
                for (assoc_name, assoc_protocols) in self.associated_types_of(proto) {
                    let already = self.archetype(archetype).nested_type(assoc_name).is_some();
                    if !already {
                        nested.push(self.new_archetype(
                            assoc_name,
                            Some(archetype),
                            assoc_protocols,
                            ArchetypeOwner::Generics(list),
                            None,
                        ));
                    }
                }
            }
        }

        let entry = &mut self.generics[list.index()];
        entry.archetypes = primaries.iter().map(|p| p.archetype).collect();
        entry.archetypes.extend(nested);
        entry.params = primaries;
        list
    }

    fn push_generic_param_decl(&mut self, name: Name, archetype_ty: Idx, span: Span) -> DeclId {
        // Not registered in any scope: parameters are found through their list.
        let id = DeclId::next(self.decls.len());
        self.decls.push(Decl {
            kind: DeclKind::Value(ValueDecl::new(
                name,
                ValueKind::TypeAlias {
                    underlying: archetype_ty,
                    inherited: SmallVec::new(),
                },
            )),
            context: None,
            span,
            invalid: false,
        });
        self.assign_alias_type(id, archetype_ty);
        id
    }

    /// Associated types declared by `proto` (excluding `This`) with the
    /// protocols each must conform to.
    fn associated_types_of(&self, proto: DeclId) -> Vec<(Name, SmallVec<[DeclId; 2]>)> {
        let Some(nominal) = self.decl(proto).as_protocol() else {
            return Vec::new();
        };
        nominal
            .members
            .iter()
            .filter_map(|&member| match &self.decl(member).as_value()?.kind {
                ValueKind::TypeAlias { inherited, .. }
                    if self.value(member).name != self.this_name =>
                {
                    Some((self.value(member).name, self.protocols_of(inherited)))
                }
                _ => None,
            })
            .collect()
    }

    /// Add `first == second` to a generic parameter list.
    pub fn add_same_type_requirement(
        &mut self,
        list: GenericParamListId,
        first: Idx,
        second: Idx,
        span: Span,
    ) {
        self.generics[list.index()]
            .requirements
            .push(Requirement::SameType {
                first,
                second,
                span,
            });
    }

    // ── Members ─────────────────────────────────────────────────────

    /// Declare a function. Inside a type context its type is curried:
    /// `This -> input -> result` (or `This.metatype -> ...` when static).
    pub fn add_func(
        &mut self,
        context: Option<DeclId>,
        name: &str,
        input: Idx,
        result: Idx,
        is_static: bool,
        span: Span,
    ) -> DeclId {
        let name = self.name(name);
        let inner = self.pool.function(input, result);
        let ty = match self.self_type_of(context) {
            Some(this) => {
                let receiver = if is_static {
                    self.pool.metatype(this)
                } else {
                    this
                };
                self.pool.function(receiver, inner)
            }
            None => inner,
        };
        let id = self.push_value(name, ValueKind::Func { is_static }, context, span);
        self.value(id).set_type(ty);
        id
    }

    pub fn add_var(
        &mut self,
        context: Option<DeclId>,
        name: &str,
        ty: Idx,
        settable: bool,
        span: Span,
    ) -> DeclId {
        let name = self.name(name);
        let id = self.push_value(
            name,
            ValueKind::Var {
                is_static: false,
                settable,
            },
            context,
            span,
        );
        self.value(id).set_type(ty);
        id
    }

    /// Declare `subscript (index) -> element`. Its type is `index -> element`.
    pub fn add_subscript(
        &mut self,
        context: DeclId,
        index: Idx,
        element: Idx,
        settable: bool,
        span: Span,
    ) -> DeclId {
        let name = self.name("subscript");
        let ty = self.pool.function(index, element);
        let id = self.push_value(name, ValueKind::Subscript { settable }, Some(context), span);
        self.value(id).set_type(ty);
        id
    }

    /// Declare a oneof element. Its type is the oneof type, or a function
    /// from `argument` to it.
    pub fn add_oneof_element(
        &mut self,
        oneof: DeclId,
        name: &str,
        argument: Option<Idx>,
        span: Span,
    ) -> DeclId {
        let name = self.name(name);
        let Some(declared) = self.declared_type(oneof) else {
            panic!("{oneof:?} is not a oneof declaration");
        };
        let ty = match argument {
            Some(arg) => self.pool.function(arg, declared),
            None => declared,
        };
        let id = self.push_value(name, ValueKind::OneOfElement, Some(oneof), span);
        self.value(id).set_type(ty);
        id
    }

    pub fn add_constructor(&mut self, context: DeclId, input: Idx, span: Span) -> DeclId {
        let name = self.name("init");
        let this = self.self_type_of(Some(context)).unwrap_or(Idx::ERROR);
        let ty = self.pool.function(input, this);
        let id = self.push_value(name, ValueKind::Constructor, Some(context), span);
        self.value(id).set_type(ty);
        id
    }

    pub fn add_destructor(&mut self, class: DeclId, span: Span) -> DeclId {
        let name = self.name("destructor");
        let this = self.self_type_of(Some(class)).unwrap_or(Idx::ERROR);
        let ty = self.pool.function(this, Idx::UNIT);
        let id = self.push_value(name, ValueKind::Destructor, Some(class), span);
        self.value(id).set_type(ty);
        id
    }

    /// `extension extended : inherited { }` at module scope.
    pub fn add_extension(&mut self, extended: Idx, inherited: &[Idx], span: Span) -> DeclId {
        let ext = ExtensionDecl {
            extended,
            inherited: inherited.into(),
            members: Vec::new(),
        };
        let id = self.push_decl(DeclKind::Extension(ext), None, span);
        if let Some(nominal) = self.nominal_decl_of(extended) {
            self.extensions.entry(nominal).or_default().push(id);
        }
        id
    }

    pub fn add_pattern_binding(
        &mut self,
        context: Option<DeclId>,
        vars: &[DeclId],
        span: Span,
    ) -> DeclId {
        self.push_decl(
            DeclKind::PatternBinding { vars: vars.into() },
            context,
            span,
        )
    }

    /// Append to the inheritance clause of a nominal type or extension.
    ///
    /// Lets the binder resolve inheritance clauses after every declaration
    /// exists, so protocols may name each other.
    pub fn add_inherited(&mut self, decl: DeclId, ty: Idx) {
        match &mut self.decls[decl.index()].kind {
            DeclKind::Extension(ext) => ext.inherited.push(ty),
            DeclKind::Value(ValueDecl {
                kind: ValueKind::Nominal(nominal),
                ..
            }) => nominal.inherited.push(ty),
            _ => panic!("{decl:?} has no inheritance clause"),
        }
    }

    pub fn mark_invalid(&mut self, decl: DeclId) {
        self.decls[decl.index()].invalid = true;
    }
}
