use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    errors::Result,
    metadata::{AssociationSpec, Entity, Property, Registry},
    model::{Collection, Object, Record},
    value::PropertyType,
};

pub const TRACKER_SCHEMA: &str = "
    CREATE TABLE projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        status_id INTEGER NOT NULL
    );
    CREATE TABLE bugs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        severity INTEGER NOT NULL,
        project_id INTEGER REFERENCES projects(id)
    );
";

/// Project/bug mapping matching `TRACKER_SCHEMA`.
pub fn tracker_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.add_entity(
        Entity::new("Project", "projects")
            .with_property(Property::new("ProjectID", "id", PropertyType::Int).primary_key().auto_increment())
            .with_property(Property::new("Name", "name", PropertyType::Varchar))
            .with_property(Property::new("StatusID", "status_id", PropertyType::Int).with_default(1)),
    );
    registry.add_entity(
        Entity::new("Bug", "bugs")
            .with_property(Property::new("ID", "id", PropertyType::Int).primary_key().auto_increment())
            .with_property(Property::new("Title", "title", PropertyType::Varchar))
            .with_property(Property::new("Severity", "severity", PropertyType::Int))
            .with_property(Property::new("ProjectID", "project_id", PropertyType::Int)),
    );
    registry.associate("Project", AssociationSpec::one_to_many("Bug", "ProjectID"))?;
    registry.associate("Bug", AssociationSpec::many_to_one("Project", "ProjectID"))?;
    Ok(registry)
}

#[derive(Clone, Debug)]
pub struct BugSeed {
    pub title: String,
    pub severity: i64,
}

#[derive(Clone, Debug)]
pub struct ProjectSeed {
    pub name: String,
    pub status: i64,
    pub bugs: Vec<BugSeed>,
}

impl ProjectSeed {
    /// Transient project object graph for this seed.
    pub fn to_object(&self) -> Object {
        let bugs: Collection = self
            .bugs
            .iter()
            .map(|bug| {
                Object::new(
                    "Bug",
                    Record::new("Bug")
                        .with("Title", bug.title.as_str())
                        .with("Severity", bug.severity),
                )
            })
            .collect();
        Object::new(
            "Project",
            Record::new("Project")
                .with("Name", self.name.as_str())
                .with("StatusID", self.status)
                .with("Bugs", bugs),
        )
    }
}

#[derive(Clone, Debug)]
pub struct ProjectDataset {
    pub projects: Vec<ProjectSeed>,
}

impl ProjectDataset {
    pub fn bug_count(&self) -> usize {
        self.projects.iter().map(|p| p.bugs.len()).sum()
    }
}

pub fn generate_projects(count: usize, max_bugs: usize, seed: u64) -> ProjectDataset {
    assert!(count > 0, "count must be positive");
    let mut rng = StdRng::seed_from_u64(seed);
    let projects = (0..count)
        .map(|idx| {
            let bugs = (0..rng.gen_range(0..=max_bugs))
                .map(|bug| BugSeed {
                    title: format!("Bug{idx}-{bug}"),
                    severity: rng.gen_range(1..=5),
                })
                .collect();
            ProjectSeed {
                name: format!("Project{idx}"),
                status: rng.gen_range(1..=3),
                bugs,
            }
        })
        .collect();
    ProjectDataset { projects }
}
