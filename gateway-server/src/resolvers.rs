use crate::model::{Council, Grade, Student, Teacher, Topic};
use crate::repository::InMemoryRepository;
use batch_loader::{LoadError, LoaderRegistry, RequestContext};
use futures::future::join_all;
use serde::Serialize;

type Students = InMemoryRepository<Student>;
type Teachers = InMemoryRepository<Teacher>;
type Topics = InMemoryRepository<Topic>;
type Councils = InMemoryRepository<Council>;
type Grades = InMemoryRepository<Grade>;

/// A resolved field: either its data or a field-level error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field<T> {
    Data(T),
    Error(String),
}

impl<T> From<Result<T, LoadError>> for Field<T> {
    fn from(result: Result<T, LoadError>) -> Self {
        match result {
            Ok(data) => Field::Data(data),
            Err(err) => Field::Error(err.to_string()),
        }
    }
}

impl<T> Field<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, Field::Error(_))
    }
}

#[derive(Debug, Serialize)]
pub struct CouncilView {
    pub id: String,
    pub chair: Field<Teacher>,
    pub members: Vec<Field<Teacher>>,
}

#[derive(Debug, Serialize)]
pub struct TopicView {
    pub id: String,
    pub title: String,
    pub student: Field<Student>,
    pub supervisor: Field<Teacher>,
    pub council: Option<Field<CouncilView>>,
    pub grade: Field<Grade>,
}

/// `topics(ids) { title student supervisor council { chair members } grade }`
pub async fn resolve_topics(ctx: &RequestContext, ids: Vec<String>) -> Vec<Field<TopicView>> {
    let loaders = ctx.expect_loaders();
    let topics = loaders.load_many::<Topics, _>(ids).await;

    join_all(topics.into_iter().map(|topic| async move {
        match topic {
            Ok(topic) => Field::Data(resolve_topic(loaders, topic).await),
            Err(err) => Field::Error(err.to_string()),
        }
    }))
    .await
}

async fn resolve_topic(loaders: &LoaderRegistry, topic: Topic) -> TopicView {
    let council = async {
        match &topic.council_id {
            Some(id) => Some(resolve_council(loaders, id.clone()).await),
            None => None,
        }
    };

    let (student, supervisor, council, grade) = tokio::join!(
        loaders.load::<Students>(topic.student_id.clone()),
        loaders.load::<Teachers>(topic.supervisor_id.clone()),
        council,
        loaders.load::<Grades>(topic.id.clone()),
    );

    TopicView {
        id: topic.id.clone(),
        title: topic.title.clone(),
        student: student.into(),
        supervisor: supervisor.into(),
        council,
        grade: grade.into(),
    }
}

async fn resolve_council(loaders: &LoaderRegistry, id: String) -> Field<CouncilView> {
    let council = match loaders.load::<Councils>(id).await {
        Ok(council) => council,
        Err(err) => return Field::Error(err.to_string()),
    };

    let (chair, members) = tokio::join!(
        loaders.load::<Teachers>(council.chair_id.clone()),
        loaders.load_many::<Teachers, _>(council.member_ids.clone()),
    );

    Field::Data(CouncilView {
        id: council.id,
        chair: chair.into(),
        members: members.into_iter().map(Field::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::seed_registry;
    use batch_loader::LoaderConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(topics: usize) -> RequestContext {
        let registry = seed_registry(LoaderConfig::default(), topics, Duration::from_millis(5));
        RequestContext::new()
            .with_request_id("test")
            .with_loaders(Arc::new(registry))
    }

    fn queries<E: crate::model::Entity>(ctx: &RequestContext) -> usize {
        ctx.expect_loaders()
            .get::<InMemoryRepository<E>>()
            .map(|loader| loader.fetcher().queries())
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_topics_resolve_with_one_query_per_table() {
        let ctx = context(12);
        let ids = (0..12).map(|n| format!("topic{n}")).collect();

        let views = resolve_topics(&ctx, ids).await;

        assert_eq!(views.len(), 12);
        assert!(views.iter().all(|v| !v.is_error()));
        assert_eq!(queries::<Topic>(&ctx), 1);
        assert_eq!(queries::<Student>(&ctx), 1);
        assert_eq!(queries::<Grade>(&ctx), 1);
        assert_eq!(queries::<Council>(&ctx), 1);
        // supervisors first, council chairs and members one hop later
        assert!(queries::<Teacher>(&ctx) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_entities_become_field_errors() {
        let ctx = context(5);
        let ids = vec!["topic4".to_string(), "topic99".to_string()];

        let views = resolve_topics(&ctx, ids).await;

        let Field::Data(topic4) = &views[0] else {
            panic!("topic4 exists");
        };
        assert!(topic4.grade.is_error(), "topic4 is not graded yet");
        assert!(!topic4.student.is_error());
        assert!(views[1].is_error());

        let json = serde_json::to_value(&views[1]).unwrap();
        assert_eq!(
            json["error"],
            "key not found in batch result: \"topic99\""
        );
    }
}
