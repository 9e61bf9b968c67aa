use std::collections::{HashMap, HashSet};

use super::types::{Member, RewriteRule, Schema, TypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
    pub max_types: usize,
    pub max_relations_per_type: usize,
    pub max_permissions_per_type: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_types: 50,
            max_relations_per_type: 30,
            max_permissions_per_type: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("too many types: {count} exceeds limit of {limit}")]
    TooManyTypes { count: usize, limit: usize },
    #[error("too many relations in type '{type_name}': {count} exceeds limit of {limit}")]
    TooManyRelations {
        type_name: String,
        count: usize,
        limit: usize,
    },
    #[error("too many permissions in type '{type_name}': {count} exceeds limit of {limit}")]
    TooManyPermissions {
        type_name: String,
        count: usize,
        limit: usize,
    },
    #[error("relation '{type_name}#{relation}' allows undeclared type '{subject_type}'")]
    UnknownSubjectType {
        type_name: String,
        relation: String,
        subject_type: String,
    },
    #[error(
        "relation '{type_name}#{relation}' allows '{subject_type}#{subject_relation}' but '{subject_type}' declares no such member"
    )]
    UnknownSubjectRelation {
        type_name: String,
        relation: String,
        subject_type: String,
        subject_relation: String,
    },
    #[error("permission '{type_name}#{permission}' references undefined '{name}'")]
    UndefinedReference {
        type_name: String,
        permission: String,
        name: String,
    },
    #[error(
        "permission '{type_name}#{permission}' traverses '{relation}', which is not a relation of '{type_name}'"
    )]
    UnknownTuplesetRelation {
        type_name: String,
        permission: String,
        relation: String,
    },
    #[error(
        "permission '{type_name}#{permission}' traverses '{relation}', which allows subject-sets"
    )]
    UsersetInTupleset {
        type_name: String,
        permission: String,
        relation: String,
    },
    #[error(
        "permission '{type_name}#{permission}' traverses '{relation}->{member}' but no type reachable via '{relation}' declares '{member}'"
    )]
    UnknownArrowTarget {
        type_name: String,
        permission: String,
        relation: String,
        member: String,
    },
    #[error("permission '{type_name}#{permission}' references itself")]
    PermissionCycle {
        type_name: String,
        permission: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakingChange {
    TypeRemoved { type_name: String },
    RelationRemoved { type_name: String, relation: String },
    SubjectTypesChanged { type_name: String, relation: String },
}

impl std::fmt::Display for BreakingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeRemoved { type_name } => write!(f, "type '{type_name}' removed"),
            Self::RelationRemoved {
                type_name,
                relation,
            } => write!(f, "relation '{type_name}#{relation}' removed"),
            Self::SubjectTypesChanged {
                type_name,
                relation,
            } => write!(f, "subject types of '{type_name}#{relation}' changed"),
        }
    }
}

pub fn validate_schema_limits(
    schema: &Schema,
    limits: &SchemaLimits,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if schema.types.len() > limits.max_types {
        errors.push(ValidationError::TooManyTypes {
            count: schema.types.len(),
            limit: limits.max_types,
        });
    }

    for type_def in &schema.types {
        if type_def.relations.len() > limits.max_relations_per_type {
            errors.push(ValidationError::TooManyRelations {
                type_name: type_def.name.clone(),
                count: type_def.relations.len(),
                limit: limits.max_relations_per_type,
            });
        }
        if type_def.permissions.len() > limits.max_permissions_per_type {
            errors.push(ValidationError::TooManyPermissions {
                type_name: type_def.name.clone(),
                count: type_def.permissions.len(),
                limit: limits.max_permissions_per_type,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that every name a schema uses resolves, that traversals land on
/// types declaring the computed member, and that no permission depends on
/// itself on the same object.
pub fn validate_references(schema: &Schema) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for type_def in &schema.types {
        check_subject_types(schema, type_def, &mut errors);
        for perm in &type_def.permissions {
            check_rule(schema, type_def, &perm.name, &perm.rule, &mut errors);
        }
        check_permission_cycles(type_def, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_subject_types(
    schema: &Schema,
    type_def: &TypeDefinition,
    errors: &mut Vec<ValidationError>,
) {
    for rel in &type_def.relations {
        for subject_type in &rel.subject_types {
            let Some(target) = schema.get_type(&subject_type.type_name) else {
                errors.push(ValidationError::UnknownSubjectType {
                    type_name: type_def.name.clone(),
                    relation: rel.name.clone(),
                    subject_type: subject_type.type_name.clone(),
                });
                continue;
            };
            if let Some(ref subject_relation) = subject_type.relation
                && target.member(subject_relation).is_none()
            {
                errors.push(ValidationError::UnknownSubjectRelation {
                    type_name: type_def.name.clone(),
                    relation: rel.name.clone(),
                    subject_type: subject_type.type_name.clone(),
                    subject_relation: subject_relation.clone(),
                });
            }
        }
    }
}

fn check_rule(
    schema: &Schema,
    type_def: &TypeDefinition,
    permission: &str,
    rule: &RewriteRule,
    errors: &mut Vec<ValidationError>,
) {
    match rule {
        RewriteRule::This(name) => {
            if type_def.member(name).is_none() {
                errors.push(ValidationError::UndefinedReference {
                    type_name: type_def.name.clone(),
                    permission: permission.to_string(),
                    name: name.clone(),
                });
            }
        }
        RewriteRule::Union(children) | RewriteRule::Intersection(children) => {
            for child in children {
                check_rule(schema, type_def, permission, child, errors);
            }
        }
        RewriteRule::Arrow(tupleset, computed) => {
            let Some(rel) = type_def.get_relation(tupleset) else {
                errors.push(ValidationError::UnknownTuplesetRelation {
                    type_name: type_def.name.clone(),
                    permission: permission.to_string(),
                    relation: tupleset.clone(),
                });
                return;
            };

            if rel.subject_types.iter().any(|st| st.relation.is_some()) {
                errors.push(ValidationError::UsersetInTupleset {
                    type_name: type_def.name.clone(),
                    permission: permission.to_string(),
                    relation: tupleset.clone(),
                });
            }

            let reachable = rel.subject_types.iter().any(|st| {
                schema
                    .get_type(&st.type_name)
                    .is_some_and(|target| target.member(computed).is_some())
            });
            if !reachable {
                errors.push(ValidationError::UnknownArrowTarget {
                    type_name: type_def.name.clone(),
                    permission: permission.to_string(),
                    relation: tupleset.clone(),
                    member: computed.clone(),
                });
            }
        }
    }
}

/// Same-object permission references form a graph; a cycle in it can never
/// resolve, unlike arrow recursion which terminates on finite data.
fn check_permission_cycles(type_def: &TypeDefinition, errors: &mut Vec<ValidationError>) {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for perm in &type_def.permissions {
        let mut refs = Vec::new();
        collect_permission_refs(type_def, &perm.rule, &mut refs);
        edges.insert(perm.name.as_str(), refs);
    }

    let mut done: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();

    for perm in &type_def.permissions {
        let mut path = Vec::new();
        visit(perm.name.as_str(), &edges, &mut path, &mut done, &mut reported);
    }

    for perm in &type_def.permissions {
        if reported.contains(perm.name.as_str()) {
            errors.push(ValidationError::PermissionCycle {
                type_name: type_def.name.clone(),
                permission: perm.name.clone(),
            });
        }
    }
}

fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
    reported: &mut HashSet<&'a str>,
) {
    if let Some(pos) = path.iter().position(|p| *p == node) {
        reported.extend(path[pos..].iter().copied());
        return;
    }
    if done.contains(node) {
        return;
    }

    path.push(node);
    if let Some(next) = edges.get(node) {
        for target in next {
            visit(*target, edges, path, done, reported);
        }
    }
    path.pop();
    done.insert(node);
}

fn collect_permission_refs<'a>(
    type_def: &'a TypeDefinition,
    rule: &'a RewriteRule,
    out: &mut Vec<&'a str>,
) {
    match rule {
        RewriteRule::This(name) => {
            if let Some(Member::Permission(perm)) = type_def.member(name) {
                out.push(perm.name.as_str());
            }
        }
        RewriteRule::Union(children) | RewriteRule::Intersection(children) => {
            for child in children {
                collect_permission_refs(type_def, child, out);
            }
        }
        RewriteRule::Arrow(..) => {}
    }
}

pub fn detect_breaking_changes(old: &Schema, new: &Schema) -> Vec<BreakingChange> {
    let mut changes = Vec::new();

    for old_type in &old.types {
        match new.get_type(&old_type.name) {
            None => {
                changes.push(BreakingChange::TypeRemoved {
                    type_name: old_type.name.clone(),
                });
            }
            Some(new_type) => {
                for old_rel in &old_type.relations {
                    match new_type.get_relation(&old_rel.name) {
                        None => {
                            changes.push(BreakingChange::RelationRemoved {
                                type_name: old_type.name.clone(),
                                relation: old_rel.name.clone(),
                            });
                        }
                        Some(new_rel) => {
                            if old_rel.subject_types != new_rel.subject_types {
                                changes.push(BreakingChange::SubjectTypesChanged {
                                    type_name: old_type.name.clone(),
                                    relation: old_rel.name.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    changes
}
