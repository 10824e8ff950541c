use chrono::NaiveDate;

use super::domain::{MaritalStatus, Project, ProjectId, RoomType, UserProfile};

const DEFAULT_SINGLE_MINIMUM_AGE: u8 = 35;

/// Violations raised before any request is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error(
        "{} flats are not open to {marital_status:?} applicants aged {age}",
        .room_type.label()
    )]
    RoomTypeNotPermitted {
        room_type: RoomType,
        marital_status: MaritalStatus,
        age: u8,
    },
    #[error("project {project} is not accepting applications on {today}")]
    ProjectNotOpen { project: ProjectId, today: NaiveDate },
}

/// Age and marital-status rules for each room type.
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    single_minimum_age: u8,
}

impl EligibilityPolicy {
    pub fn new(single_minimum_age: u8) -> Self {
        Self { single_minimum_age }
    }

    pub fn single_minimum_age(&self) -> u8 {
        self.single_minimum_age
    }

    /// Two-room: married, or single and old enough. Three-room: married only.
    pub fn permits(&self, profile: &UserProfile, room_type: RoomType) -> bool {
        match (room_type, profile.marital_status) {
            (_, MaritalStatus::Married) => true,
            (RoomType::TwoRoom, MaritalStatus::Single) => profile.age >= self.single_minimum_age,
            (RoomType::ThreeRoom, MaritalStatus::Single) => false,
        }
    }

    pub fn eligible_room_types(&self, profile: &UserProfile) -> Vec<RoomType> {
        RoomType::ordered()
            .into_iter()
            .filter(|room_type| self.permits(profile, *room_type))
            .collect()
    }

    pub fn check_room_type(
        &self,
        profile: &UserProfile,
        room_type: RoomType,
    ) -> Result<(), EligibilityError> {
        if self.permits(profile, room_type) {
            Ok(())
        } else {
            Err(EligibilityError::RoomTypeNotPermitted {
                room_type,
                marital_status: profile.marital_status,
                age: profile.age,
            })
        }
    }

    pub fn check_project_open(
        &self,
        project: &Project,
        today: NaiveDate,
    ) -> Result<(), EligibilityError> {
        if project.accepts_applications_on(today) {
            Ok(())
        } else {
            Err(EligibilityError::ProjectNotOpen {
                project: project.id.clone(),
                today,
            })
        }
    }

    /// Visible, open, and offering at least one room type the applicant may take.
    pub fn is_applicable(&self, profile: &UserProfile, project: &Project, today: NaiveDate) -> bool {
        project.accepts_applications_on(today)
            && self
                .eligible_room_types(profile)
                .into_iter()
                .any(|room_type| project.available_flats(room_type) > 0)
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SINGLE_MINIMUM_AGE)
    }
}
