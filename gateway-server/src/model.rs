use serde::Serialize;

/// Entity stored by an in-memory repository and addressed by a string id.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub program: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub department: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub student_id: String,
    pub supervisor_id: String,
    pub council_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Council {
    pub id: String,
    pub chair_id: String,
    pub member_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Grade {
    /// Grades are keyed by the topic they evaluate.
    pub id: String,
    pub score: f32,
}

macro_rules! entity {
    ($ty:ty, $kind:literal) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

entity!(Student, "students");
entity!(Teacher, "teachers");
entity!(Topic, "topics");
entity!(Council, "councils");
entity!(Grade, "grades");
