use std::collections::HashSet;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::types::{
    PermissionDef, RelationDef, RewriteRule, Schema, SubjectTypeRef, TypeDefinition,
};

#[derive(Parser)]
#[grammar = "schema/grammar.pest"]
struct SchemaParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("mixed operators in permission expression: use only one of +, & per expression")]
    MixedOperators,
    #[error("duplicate type: {0}")]
    DuplicateType(String),
    #[error("duplicate relation '{relation}' in type '{type_name}'")]
    DuplicateRelation { type_name: String, relation: String },
    #[error("duplicate permission '{permission}' in type '{type_name}'")]
    DuplicatePermission {
        type_name: String,
        permission: String,
    },
    #[error("'{name}' is declared as both a relation and a permission in type '{type_name}'")]
    NameConflict { type_name: String, name: String },
}

pub fn parse_schema(input: &str) -> Result<Schema, ParseError> {
    let pairs =
        SchemaParser::parse(Rule::schema, input).map_err(|e| ParseError::Syntax(e.to_string()))?;

    let mut types = Vec::new();
    let mut seen_types = HashSet::new();

    for pair in pairs {
        if pair.as_rule() != Rule::schema {
            continue;
        }
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::definition {
                let type_def = parse_definition(inner)?;
                if !seen_types.insert(type_def.name.clone()) {
                    return Err(ParseError::DuplicateType(type_def.name));
                }
                types.push(type_def);
            }
        }
    }

    Ok(Schema { types })
}

fn unexpected_rule(rule: Rule) -> ParseError {
    ParseError::Syntax(format!("unexpected rule: {rule:?}"))
}

fn missing_token(context: &str) -> ParseError {
    ParseError::Syntax(format!("missing token: {context}"))
}

fn parse_definition(pair: Pair<'_, Rule>) -> Result<TypeDefinition, ParseError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| missing_token("definition name"))?
        .as_str()
        .to_string();
    let body = inner
        .next()
        .ok_or_else(|| missing_token("definition body"))?;

    let mut relations = Vec::new();
    let mut permissions = Vec::new();
    let mut seen_relations = HashSet::new();
    let mut seen_permissions = HashSet::new();

    for item in body.into_inner() {
        match item.as_rule() {
            Rule::relation_def => {
                let rel = parse_relation_def(item)?;
                if seen_permissions.contains(&rel.name) {
                    return Err(ParseError::NameConflict {
                        type_name: name,
                        name: rel.name,
                    });
                }
                if !seen_relations.insert(rel.name.clone()) {
                    return Err(ParseError::DuplicateRelation {
                        type_name: name,
                        relation: rel.name,
                    });
                }
                relations.push(rel);
            }
            Rule::permission_def => {
                let perm = parse_permission_def(item)?;
                if seen_relations.contains(&perm.name) {
                    return Err(ParseError::NameConflict {
                        type_name: name,
                        name: perm.name,
                    });
                }
                if !seen_permissions.insert(perm.name.clone()) {
                    return Err(ParseError::DuplicatePermission {
                        type_name: name,
                        permission: perm.name,
                    });
                }
                permissions.push(perm);
            }
            _ => {}
        }
    }

    Ok(TypeDefinition {
        name,
        relations,
        permissions,
    })
}

fn parse_relation_def(pair: Pair<'_, Rule>) -> Result<RelationDef, ParseError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| missing_token("relation name"))?
        .as_str()
        .to_string();
    let subject_type_list = inner
        .next()
        .ok_or_else(|| missing_token("subject type list"))?;

    let subject_types = subject_type_list
        .into_inner()
        .map(parse_subject_type_ref)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RelationDef {
        name,
        subject_types,
    })
}

fn parse_subject_type_ref(pair: Pair<'_, Rule>) -> Result<SubjectTypeRef, ParseError> {
    let mut inner = pair.into_inner();
    let type_name = inner
        .next()
        .ok_or_else(|| missing_token("subject type name"))?
        .as_str()
        .to_string();
    let relation = inner.next().map(|p| p.as_str().to_string());

    Ok(SubjectTypeRef {
        type_name,
        relation,
    })
}

fn parse_permission_def(pair: Pair<'_, Rule>) -> Result<PermissionDef, ParseError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| missing_token("permission name"))?
        .as_str()
        .to_string();
    let expr = inner
        .next()
        .ok_or_else(|| missing_token("permission expression"))?;
    let rule = parse_permission_expr(expr)?;

    Ok(PermissionDef { name, rule })
}

fn parse_permission_expr(pair: Pair<'_, Rule>) -> Result<RewriteRule, ParseError> {
    let mut inner = pair.into_inner();
    let first = parse_permission_term(
        inner
            .next()
            .ok_or_else(|| missing_token("permission term"))?,
    )?;

    let mut ops_and_terms: Vec<(Rule, RewriteRule)> = Vec::new();

    while let Some(op) = inner.next() {
        let term = parse_permission_term(
            inner
                .next()
                .ok_or_else(|| missing_token("permission term after operator"))?,
        )?;
        ops_and_terms.push((op.as_rule(), term));
    }

    let Some(&(first_op, _)) = ops_and_terms.first() else {
        return Ok(first);
    };

    if ops_and_terms.iter().any(|(op, _)| *op != first_op) {
        return Err(ParseError::MixedOperators);
    }

    let mut children = vec![first];
    children.extend(ops_and_terms.into_iter().map(|(_, t)| t));

    match first_op {
        Rule::union_op => Ok(RewriteRule::Union(children)),
        Rule::intersection_op => Ok(RewriteRule::Intersection(children)),
        other => Err(unexpected_rule(other)),
    }
}

fn parse_permission_term(pair: Pair<'_, Rule>) -> Result<RewriteRule, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing_token("permission term content"))?;
    match inner.as_rule() {
        Rule::arrow_expr => {
            let mut parts = inner.into_inner();
            let tupleset = parts
                .next()
                .ok_or_else(|| missing_token("arrow tupleset"))?
                .as_str()
                .to_string();
            let computed = parts
                .next()
                .ok_or_else(|| missing_token("arrow computed"))?
                .as_str()
                .to_string();
            Ok(RewriteRule::Arrow(tupleset, computed))
        }
        Rule::identifier => Ok(RewriteRule::This(inner.as_str().to_string())),
        other => Err(unexpected_rule(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_definition() {
        let schema = parse_schema("definition user {}").unwrap();

        assert_eq!(schema.types.len(), 1);
        assert_eq!(schema.types[0].name, "user");
        assert!(schema.types[0].relations.is_empty());
        assert!(schema.types[0].permissions.is_empty());
    }

    #[test]
    fn parse_single_direct_relation() {
        let schema = parse_schema("definition farm { relation owner: user }").unwrap();

        let farm = schema.get_type("farm").unwrap();
        assert_eq!(farm.relations.len(), 1);
        assert_eq!(farm.relations[0].name, "owner");
        assert_eq!(farm.relations[0].subject_types.len(), 1);
        assert_eq!(farm.relations[0].subject_types[0].type_name, "user");
        assert_eq!(farm.relations[0].subject_types[0].relation, None);
    }

    #[test]
    fn parse_userset_subject_type() {
        let schema =
            parse_schema("definition farm { relation viewer: user | organization#member }")
                .unwrap();

        let viewer = &schema.get_type("farm").unwrap().relations[0];
        assert_eq!(viewer.subject_types.len(), 2);
        assert_eq!(viewer.subject_types[0].type_name, "user");
        assert_eq!(viewer.subject_types[0].relation, None);
        assert_eq!(viewer.subject_types[1].type_name, "organization");
        assert_eq!(viewer.subject_types[1].relation, Some("member".to_string()));
    }

    #[test]
    fn parse_union_permission() {
        let schema = parse_schema(
            "definition organization { relation admin: user relation member: user permission view = admin + member }",
        )
        .unwrap();

        let perm = &schema.get_type("organization").unwrap().permissions[0];
        assert_eq!(perm.name, "view");
        assert_eq!(
            perm.rule,
            RewriteRule::Union(vec![
                RewriteRule::This("admin".to_string()),
                RewriteRule::This("member".to_string()),
            ])
        );
    }

    #[test]
    fn parse_intersection_with_arrow() {
        let schema = parse_schema(
            "definition query_session { relation farm: farm relation user: user permission execute = user & farm->query }",
        )
        .unwrap();

        let perm = &schema.get_type("query_session").unwrap().permissions[0];
        assert_eq!(
            perm.rule,
            RewriteRule::Intersection(vec![
                RewriteRule::This("user".to_string()),
                RewriteRule::Arrow("farm".to_string(), "query".to_string()),
            ])
        );
    }

    #[test]
    fn parse_arrow_permission() {
        let schema = parse_schema(
            "definition harvest_entry { relation farm: farm permission view = farm->view }",
        )
        .unwrap();

        let perm = &schema.get_type("harvest_entry").unwrap().permissions[0];
        assert_eq!(
            perm.rule,
            RewriteRule::Arrow("farm".to_string(), "view".to_string())
        );
    }

    #[test]
    fn parse_harvest_schema() {
        let schema = parse_schema(crate::schema::HARVEST_SCHEMA).unwrap();

        let names: Vec<&str> = schema.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["user", "organization", "farm", "harvest_entry", "query_session"]
        );

        let farm = schema.get_type("farm").unwrap();
        assert_eq!(farm.relations.len(), 4);
        assert_eq!(
            farm.get_permission("view").unwrap().rule,
            RewriteRule::Union(vec![
                RewriteRule::This("viewer".to_string()),
                RewriteRule::This("editor".to_string()),
                RewriteRule::This("owner".to_string()),
                RewriteRule::Arrow("organization".to_string(), "view".to_string()),
            ])
        );
        assert_eq!(
            farm.get_permission("manage").unwrap().rule,
            RewriteRule::Union(vec![
                RewriteRule::This("owner".to_string()),
                RewriteRule::Arrow("organization".to_string(), "admin".to_string()),
            ])
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse_schema(crate::schema::HARVEST_SCHEMA).unwrap();
        let b = parse_schema(crate::schema::HARVEST_SCHEMA).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn reject_mixed_operators() {
        let input = "definition farm { relation a: user relation b: user relation c: user permission p = a + b & c }";

        assert_eq!(parse_schema(input).unwrap_err(), ParseError::MixedOperators);
    }

    #[test]
    fn reject_exclusion_operator() {
        let input =
            "definition farm { relation viewer: user relation banned: user permission view = viewer - banned }";

        assert!(matches!(parse_schema(input), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn parse_empty_schema() {
        let schema = parse_schema("").unwrap();

        assert!(schema.types.is_empty());
    }

    #[test]
    fn parse_comments_and_whitespace() {
        let input = r#"
            // line comment
            definition user {}

            /* block
               comment */
            definition farm {
                // relation comment
                relation owner: user
            }
        "#;
        let schema = parse_schema(input).unwrap();

        assert_eq!(schema.types.len(), 2);
    }

    #[test]
    fn invalid_syntax_produces_error() {
        match parse_schema("not valid syntax at all").unwrap_err() {
            ParseError::Syntax(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Syntax error, got: {other:?}"),
        }
    }

    #[test]
    fn reject_dangling_operator() {
        let input = "definition farm { relation owner: user permission manage = owner + }";

        assert!(matches!(parse_schema(input), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn reject_duplicate_type() {
        let input = "definition user {} definition user {}";

        assert_eq!(
            parse_schema(input).unwrap_err(),
            ParseError::DuplicateType("user".to_string())
        );
    }

    #[test]
    fn reject_duplicate_relation() {
        let input = "definition farm { relation owner: user relation owner: user }";

        assert_eq!(
            parse_schema(input).unwrap_err(),
            ParseError::DuplicateRelation {
                type_name: "farm".to_string(),
                relation: "owner".to_string(),
            }
        );
    }

    #[test]
    fn reject_duplicate_permission() {
        let input =
            "definition farm { relation owner: user permission manage = owner permission manage = owner }";

        assert_eq!(
            parse_schema(input).unwrap_err(),
            ParseError::DuplicatePermission {
                type_name: "farm".to_string(),
                permission: "manage".to_string(),
            }
        );
    }

    #[test]
    fn reject_relation_and_permission_with_same_name() {
        let input = "definition farm { relation owner: user permission owner = owner }";

        assert_eq!(
            parse_schema(input).unwrap_err(),
            ParseError::NameConflict {
                type_name: "farm".to_string(),
                name: "owner".to_string(),
            }
        );
    }
}
