use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// The subject side of a tuple. With `subject_relation` set this is a
/// subject-set: every subject holding that relation on the referenced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
}

impl SubjectRef {
    pub fn direct(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            subject_relation: None,
        }
    }

    pub fn userset(
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            subject_relation: Some(relation.into()),
        }
    }

    pub fn object(&self) -> ObjectRef {
        ObjectRef::new(&self.subject_type, &self.subject_id)
    }

    pub fn is_object(&self, object: &ObjectRef) -> bool {
        self.subject_relation.is_none()
            && self.subject_type == object.object_type
            && self.subject_id == object.object_id
    }
}

impl From<ObjectRef> for SubjectRef {
    fn from(object: ObjectRef) -> Self {
        Self::direct(object.object_type, object.object_id)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.subject_id)?;
        if let Some(ref rel) = self.subject_relation {
            write!(f, "#{rel}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub object: ObjectRef,
    pub relation: String,
    pub subject: SubjectRef,
}

impl Tuple {
    pub fn new(object: ObjectRef, relation: impl Into<String>, subject: SubjectRef) -> Self {
        Self {
            object,
            relation: relation.into(),
            subject,
        }
    }

    /// A filter matching this tuple and nothing else.
    pub fn exact_filter(&self) -> TupleFilter {
        TupleFilter {
            object_type: Some(self.object.object_type.clone()),
            object_id: Some(self.object.object_id.clone()),
            relation: Some(self.relation.clone()),
            subject_type: Some(self.subject.subject_type.clone()),
            subject_id: Some(self.subject.subject_id.clone()),
            subject_relation: Some(self.subject.subject_relation.clone()),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipOperation {
    Touch,
    Delete,
}

impl fmt::Display for RelationshipOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Touch => f.write_str("touch"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipUpdate {
    pub operation: RelationshipOperation,
    pub tuple: Tuple,
}

impl RelationshipUpdate {
    pub fn touch(tuple: Tuple) -> Self {
        Self {
            operation: RelationshipOperation::Touch,
            tuple,
        }
    }

    pub fn delete(tuple: Tuple) -> Self {
        Self {
            operation: RelationshipOperation::Delete,
            tuple,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub relation: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub subject_relation: Option<Option<String>>,
}

impl TupleFilter {
    /// Every subject written on `relation` of `object`.
    pub fn subjects_of(object: &ObjectRef, relation: &str) -> Self {
        Self {
            object_type: Some(object.object_type.clone()),
            object_id: Some(object.object_id.clone()),
            relation: Some(relation.to_string()),
            ..Default::default()
        }
    }

    /// Every object of `object_type` whose `relation` points at `subject`.
    pub fn resources_of(object_type: &str, relation: &str, subject: &SubjectRef) -> Self {
        Self {
            object_type: Some(object_type.to_string()),
            object_id: None,
            relation: Some(relation.to_string()),
            subject_type: Some(subject.subject_type.clone()),
            subject_id: Some(subject.subject_id.clone()),
            subject_relation: Some(subject.subject_relation.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        if let Some(ref ot) = self.object_type
            && ot != &tuple.object.object_type
        {
            return false;
        }
        if let Some(ref oi) = self.object_id
            && oi != &tuple.object.object_id
        {
            return false;
        }
        if let Some(ref r) = self.relation
            && r != &tuple.relation
        {
            return false;
        }
        if let Some(ref st) = self.subject_type
            && st != &tuple.subject.subject_type
        {
            return false;
        }
        if let Some(ref si) = self.subject_id
            && si != &tuple.subject.subject_id
        {
            return false;
        }
        if let Some(ref sr) = self.subject_relation
            && sr != &tuple.subject.subject_relation
        {
            return false;
        }
        true
    }
}

/// Store revision. Every committed write batch advances it by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotToken(u64);

impl SnapshotToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
