//! Student directory operations

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vap_common::models::Student;

use crate::error::{Error, Result};
use crate::store::{Repository, StudentDirectory, StudentUpdate};

const DEFAULT_DEPARTMENT: &str = "CS";

/// Departments the directory accepts; anything else falls back to CS
pub const DEPARTMENTS: [&str; 5] = ["CS", "IT", "EC", "ME", "CE"];

/// Body of `POST /api/students`; also the partial update body of `PUT`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub name: Option<String>,
    pub roll_no: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub year: Option<u8>,
    pub section: Option<String>,
    pub is_active: Option<bool>,
}

fn department_or_default(department: Option<String>) -> String {
    department
        .map(|d| d.trim().to_uppercase())
        .filter(|d| DEPARTMENTS.contains(&d.as_str()))
        .unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MissingInput(format!("{} is required", field)))
}

pub struct StudentService {
    repo: Arc<dyn Repository>,
}

impl StudentService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Student>> {
        Ok(self.repo.list_students().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Student> {
        self.repo
            .get_student(id)
            .await?
            .ok_or_else(|| Error::StudentNotFound(id.to_string()))
    }

    /// Active student or `None`; marking treats both misses alike
    pub async fn find_active(&self, id: &str) -> Result<Option<Student>> {
        Ok(self.repo.get_student(id).await?.filter(|s| s.is_active))
    }

    pub async fn create(&self, new: StudentInput) -> Result<Student> {
        let student = Student {
            id: format!("stu_{}", Uuid::new_v4().simple()),
            name: required(new.name, "name")?,
            roll_no: required(new.roll_no, "rollNo")?,
            email: new.email.unwrap_or_default(),
            department: department_or_default(new.department),
            year: new.year.unwrap_or(1),
            section: new.section.unwrap_or_else(|| "A".to_string()),
            enrolled_at: vap_common::time::now(),
            is_active: new.is_active.unwrap_or(true),
        };

        if !self.repo.insert_student(&student).await? {
            return Err(Error::Conflict(format!(
                "Roll number {} is already registered",
                student.roll_no
            )));
        }

        info!(student_id = %student.id, roll_no = %student.roll_no, "Student enrolled");
        Ok(student)
    }

    /// Apply the fields present in `changes`; absent fields keep their value
    pub async fn update(&self, id: &str, changes: StudentInput) -> Result<Student> {
        let mut student = self.get(id).await?;

        if let Some(name) = changes.name.filter(|n| !n.trim().is_empty()) {
            student.name = name.trim().to_string();
        }
        if let Some(roll_no) = changes.roll_no.filter(|r| !r.trim().is_empty()) {
            student.roll_no = roll_no.trim().to_string();
        }
        if let Some(email) = changes.email {
            student.email = email;
        }
        if changes.department.is_some() {
            student.department = department_or_default(changes.department);
        }
        if let Some(year) = changes.year {
            student.year = year;
        }
        if let Some(section) = changes.section {
            student.section = section;
        }
        if let Some(active) = changes.is_active {
            student.is_active = active;
        }

        match self.repo.update_student(&student).await? {
            StudentUpdate::Updated => {}
            StudentUpdate::NotFound => return Err(Error::StudentNotFound(id.to_string())),
            StudentUpdate::RollNoTaken => {
                return Err(Error::Conflict(format!(
                    "Roll number {} is already registered",
                    student.roll_no
                )))
            }
        }
        info!(student_id = %id, "Student updated");
        Ok(student)
    }

    /// Soft delete; attendance history keeps its snapshot
    pub async fn deactivate(&self, id: &str) -> Result<Student> {
        let student = self
            .repo
            .set_student_active(id, false)
            .await?
            .ok_or_else(|| Error::StudentNotFound(id.to_string()))?;
        info!(student_id = %id, "Student deactivated");
        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;

    fn service() -> StudentService {
        StudentService::new(Arc::new(MemoryRepository::new()))
    }

    fn new_student(name: &str, roll_no: &str) -> StudentInput {
        StudentInput {
            name: Some(name.to_string()),
            roll_no: Some(roll_no.to_string()),
            ..StudentInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let service = service();
        let student = service.create(new_student("Ananya Iyer", "CS2024011")).await.unwrap();
        assert!(student.id.starts_with("stu_"));
        assert_eq!(student.department, "CS");
        assert!(student.is_active);
        assert_eq!(service.get(&student.id).await.unwrap(), student);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = service();
        let err = service.create(new_student(" ", "CS1")).await.unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));

        service.create(new_student("A", "CS1")).await.unwrap();
        let err = service.create(new_student("B", "CS1")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_racing_roll_number_updates_conflict() {
        let service = Arc::new(service());
        let first = service.create(new_student("Rohan Mehta", "CS2024021")).await.unwrap();
        let second = service.create(new_student("Isha Rao", "CS2024022")).await.unwrap();

        let mut updates = tokio::task::JoinSet::new();
        for id in [first.id.clone(), second.id.clone()] {
            let service = service.clone();
            updates.spawn(async move {
                let changes = StudentInput {
                    roll_no: Some("CS2024099".to_string()),
                    ..StudentInput::default()
                };
                service.update(&id, changes).await
            });
        }

        let mut updated = 0;
        let mut conflicts = 0;
        while let Some(result) = updates.join_next().await {
            match result.unwrap() {
                Ok(_) => updated += 1,
                Err(Error::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!((updated, conflicts), (1, 1));

        let holders = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.roll_no == "CS2024099")
            .count();
        assert_eq!(holders, 1);
    }

    #[tokio::test]
    async fn test_unknown_department_falls_back() {
        let service = service();
        let student = service
            .create(StudentInput {
                department: Some("it".to_string()),
                ..new_student("Kavya Nair", "IT2022019")
            })
            .await
            .unwrap();
        assert_eq!(student.department, "IT");

        let other = service
            .create(StudentInput {
                department: Some("Astrology".to_string()),
                ..new_student("Arjun Das", "CS2022020")
            })
            .await
            .unwrap();
        assert_eq!(other.department, "CS");
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let service = service();
        let student = service.create(new_student("Sneha Gupta", "EC2023003")).await.unwrap();
        service.create(new_student("Rohan Mehta", "EC2023004")).await.unwrap();

        let updated = service
            .update(
                &student.id,
                StudentInput {
                    section: Some("C".to_string()),
                    ..StudentInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.section, "C");
        assert_eq!(updated.name, "Sneha Gupta");

        let clash = StudentInput {
            roll_no: Some("EC2023004".to_string()),
            ..StudentInput::default()
        };
        assert!(matches!(service.update(&student.id, clash).await, Err(Error::Conflict(_))));
        assert!(matches!(
            service.update("stu_missing", StudentInput::default()).await,
            Err(Error::StudentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_find_active() {
        let service = service();
        let student = service.create(new_student("Vikram Rao", "ME2021004")).await.unwrap();
        assert!(service.find_active(&student.id).await.unwrap().is_some());

        service.deactivate(&student.id).await.unwrap();
        assert!(service.find_active(&student.id).await.unwrap().is_none());
        assert!(matches!(service.deactivate("stu_missing").await, Err(Error::StudentNotFound(_))));
    }
}
