use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub types: Vec<TypeDefinition>,
}

impl Schema {
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub relations: Vec<RelationDef>,
    pub permissions: Vec<PermissionDef>,
}

impl TypeDefinition {
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn get_permission(&self, name: &str) -> Option<&PermissionDef> {
        self.permissions.iter().find(|p| p.name == name)
    }

    /// Resolves a name used in an expression. The parser rejects a relation
    /// and a permission sharing a name, so at most one can match.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        if let Some(perm) = self.get_permission(name) {
            return Some(Member::Permission(perm));
        }
        self.get_relation(name).map(Member::Relation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member<'a> {
    Relation(&'a RelationDef),
    Permission(&'a PermissionDef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub subject_types: Vec<SubjectTypeRef>,
}

impl RelationDef {
    pub fn allows(&self, subject_type: &str, subject_relation: Option<&str>) -> bool {
        self.subject_types
            .iter()
            .any(|st| st.type_name == subject_type && st.relation.as_deref() == subject_relation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTypeRef {
    pub type_name: String,
    pub relation: Option<String>,
}

impl fmt::Display for SubjectTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(rel) => write!(f, "{}#{rel}", self.type_name),
            None => f.write_str(&self.type_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDef {
    pub name: String,
    pub rule: RewriteRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteRule {
    This(String),
    Union(Vec<RewriteRule>),
    Intersection(Vec<RewriteRule>),
    Arrow(String, String),
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteRule::This(name) => f.write_str(name),
            RewriteRule::Union(children) => write_joined(f, children, " + "),
            RewriteRule::Intersection(children) => write_joined(f, children, " & "),
            RewriteRule::Arrow(tupleset, computed) => write!(f, "{tupleset}->{computed}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[RewriteRule], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}
