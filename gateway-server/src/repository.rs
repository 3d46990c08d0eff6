use crate::model::{Council, Entity, Grade, Student, Teacher, Topic};
use async_trait::async_trait;
use batch_loader::{Fetch, FetchContext, LoaderConfig, LoaderRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Stand-in for a database table: one bulk lookup by primary key.
pub struct InMemoryRepository<E: Entity> {
    rows: HashMap<String, E>,
    latency: Duration,
    queries: AtomicUsize,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new(rows: impl IntoIterator<Item = E>, latency: Duration) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| (row.id().to_string(), row))
                .collect(),
            latency,
            queries: AtomicUsize::new(0),
        }
    }

    /// Number of bulk queries served so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<E: Entity> Fetch for InMemoryRepository<E> {
    type Key = String;
    type Value = E;

    async fn fetch(&self, ctx: &FetchContext, keys: &[String]) -> anyhow::Result<HashMap<String, E>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        debug!(
            "SELECT * FROM {} WHERE id IN ({} ids) [batch #{}]",
            ctx.loader,
            keys.len(),
            ctx.generation
        );

        // respect the engine's deadline the way a real driver would
        let latency = ctx
            .remaining()
            .map_or(self.latency, |left| left.min(self.latency));
        tokio::time::sleep(latency).await;

        Ok(keys
            .iter()
            .filter_map(|key| self.rows.get(key).map(|row| (key.clone(), row.clone())))
            .collect())
    }

    fn name(&self) -> &'static str {
        E::KIND
    }
}

/// Sample data: `topics` topics, two per student, supervised round-robin.
pub fn seed_registry(config: LoaderConfig, topics: usize, latency: Duration) -> LoaderRegistry {
    let students = (0..topics.div_ceil(2)).map(|n| Student {
        id: format!("s{n}"),
        name: format!("Student {n}"),
        program: if n % 2 == 0 { "Computer Science" } else { "Mathematics" }.to_string(),
    });
    let teachers = (0..4).map(|n| Teacher {
        id: format!("t{n}"),
        name: format!("Professor {n}"),
        department: "Informatics".to_string(),
    });
    let councils = (0..2).map(|n| Council {
        id: format!("c{n}"),
        chair_id: format!("t{n}"),
        member_ids: vec![format!("t{}", n + 1), format!("t{}", n + 2)],
    });
    let topic_rows = (0..topics).map(|n| Topic {
        id: format!("topic{n}"),
        title: format!("Thesis topic #{n}"),
        student_id: format!("s{}", n / 2),
        supervisor_id: format!("t{}", n % 4),
        // every third topic has no council yet
        council_id: (n % 3 != 0).then(|| format!("c{}", n % 2)),
    });
    // every fifth topic is not graded yet
    let grades = (0..topics).filter(|n| n % 5 != 4).map(|n| Grade {
        id: format!("topic{n}"),
        score: 5.0 + (n % 6) as f32,
    });

    LoaderRegistry::builder(config)
        .register(InMemoryRepository::new(students, latency))
        .register(InMemoryRepository::new(teachers, latency))
        .register(InMemoryRepository::new(councils, latency))
        .register(InMemoryRepository::new(topic_rows, latency))
        .register(InMemoryRepository::new(grades, latency))
        .build()
}
