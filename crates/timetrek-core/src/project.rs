//! Projects group tasks. Deleting a project deletes its tasks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A project that groups related tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display token, opaque to the core
    #[serde(default)]
    pub color: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Fields supplied when creating a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: String,
    #[serde(default)]
    pub members: Vec<String>,
}

pub fn default_color() -> String {
    "#3b82f6".into()
}

fn validate_fields(
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if end_date < start_date {
        return Err(ValidationError::InvalidValue {
            field: "end_date".into(),
            message: format!("end date {end_date} is before start date {start_date}"),
        });
    }
    Ok(())
}

impl Project {
    /// Same rules as [`NewProject::validate`]; run on the patched copy
    /// before an update is saved.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.start_date, self.end_date)
    }
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.start_date, self.end_date)
    }

    pub fn into_project(self, id: String) -> Project {
        Project {
            id,
            name: self.name,
            description: self.description,
            color: self.color,
            start_date: self.start_date,
            end_date: self.end_date,
            created_by: self.created_by,
            members: self.members,
        }
    }
}

/// Partial project update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl ProjectPatch {
    pub fn apply(&self, project: &mut Project) {
        if let Some(n) = &self.name {
            project.name = n.clone();
        }
        if let Some(d) = &self.description {
            project.description = d.clone();
        }
        if let Some(c) = &self.color {
            project.color = c.clone();
        }
        if let Some(s) = self.start_date {
            project.start_date = s;
        }
        if let Some(e) = self.end_date {
            project.end_date = e;
        }
        if let Some(m) = &self.members {
            project.members = m.clone();
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {id}"),
        description: String::new(),
        color: default_color(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        created_by: "u1".to_string(),
        members: vec!["u1".to_string()],
    }
}
