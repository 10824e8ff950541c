use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::codec::Symbol;

/// Upper bound on officers assigned to a single project.
pub const MAX_OFFICER_SLOTS: u8 = 10;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier of a housing project, e.g. `P001`.
    ProjectId
);
identifier!(
    /// Identifier shared by applicants, officers, and managers.
    UserId
);
identifier!(
    /// Identifier of a persisted request, e.g. `R004`.
    RequestId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    TwoRoom,
    ThreeRoom,
}

impl RoomType {
    pub const fn ordered() -> [Self; 2] {
        [Self::TwoRoom, Self::ThreeRoom]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::TwoRoom => "2-Room",
            Self::ThreeRoom => "3-Room",
        }
    }
}

impl Symbol for RoomType {
    const VARIANTS: &'static [Self] = &[Self::TwoRoom, Self::ThreeRoom];

    fn symbol(self) -> &'static str {
        match self {
            Self::TwoRoom => "TWO_ROOM",
            Self::ThreeRoom => "THREE_ROOM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
}

impl Symbol for MaritalStatus {
    const VARIANTS: &'static [Self] = &[Self::Single, Self::Married];

    fn symbol(self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Married => "MARRIED",
        }
    }
}

/// Where an applicant stands in the allocation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantStatus {
    NoRegistration,
    Pending,
    Successful,
    Booked,
    Rejected,
}

impl ApplicantStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoRegistration => "no_registration",
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Booked => "booked",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the applicant's application is still in play.
    pub const fn has_active_application(self) -> bool {
        matches!(self, Self::Pending | Self::Successful | Self::Booked)
    }

    /// Whether a flat has been taken out of the project's inventory for this applicant.
    pub const fn holds_reservation(self) -> bool {
        matches!(self, Self::Successful | Self::Booked)
    }
}

impl Symbol for ApplicantStatus {
    const VARIANTS: &'static [Self] = &[
        Self::NoRegistration,
        Self::Pending,
        Self::Successful,
        Self::Booked,
        Self::Rejected,
    ];

    fn symbol(self) -> &'static str {
        match self {
            Self::NoRegistration => "NO_REGISTRATION",
            Self::Pending => "PENDING",
            Self::Successful => "SUCCESSFUL",
            Self::Booked => "BOOKED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Price and counters for one room type within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatInventory {
    pub price: u32,
    pub available: u32,
    pub capacity: u32,
}

impl FlatInventory {
    pub const fn new(price: u32, units: u32) -> Self {
        Self {
            price,
            available: units,
            capacity: units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub neighborhood: String,
    pub visible: bool,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub two_room: FlatInventory,
    pub three_room: FlatInventory,
    pub manager_id: UserId,
    pub officer_slots: u8,
    pub officers: Vec<UserId>,
}

impl Project {
    pub fn flats(&self, room_type: RoomType) -> &FlatInventory {
        match room_type {
            RoomType::TwoRoom => &self.two_room,
            RoomType::ThreeRoom => &self.three_room,
        }
    }

    pub(crate) fn flats_mut(&mut self, room_type: RoomType) -> &mut FlatInventory {
        match room_type {
            RoomType::TwoRoom => &mut self.two_room,
            RoomType::ThreeRoom => &mut self.three_room,
        }
    }

    /// Application window check, inclusive on both ends.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.open_date <= today && today <= self.close_date
    }

    pub fn accepts_applications_on(&self, today: NaiveDate) -> bool {
        self.visible && self.is_open_on(today)
    }

    pub fn window_overlaps(&self, other: &Project) -> bool {
        self.open_date <= other.close_date && other.open_date <= self.close_date
    }

    pub fn has_officer(&self, officer_id: &UserId) -> bool {
        self.officers.contains(officer_id)
    }

    pub fn remaining_officer_slots(&self) -> usize {
        usize::from(self.officer_slots).saturating_sub(self.officers.len())
    }
}

/// Identity and credential fields shared by every kind of account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Officer,
    Manager,
}

/// Capability set every account exposes.
pub trait User {
    const ROLE: Role;

    fn profile(&self) -> &UserProfile;

    fn user_id(&self) -> &UserId {
        &self.profile().id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub profile: UserProfile,
    pub status: ApplicantStatus,
    pub project: Option<ProjectId>,
    pub room_type: Option<RoomType>,
}

impl Applicant {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            status: ApplicantStatus::NoRegistration,
            project: None,
            room_type: None,
        }
    }

    /// True when this applicant holds a reserved flat of `room_type` in `project_id`.
    pub fn holds_reservation_in(&self, project_id: &ProjectId, room_type: RoomType) -> bool {
        self.status.holds_reservation()
            && self.project.as_ref() == Some(project_id)
            && self.room_type == Some(room_type)
    }
}

impl User for Applicant {
    const ROLE: Role = Role::Applicant;

    fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub profile: UserProfile,
    pub projects_in_charge: Vec<ProjectId>,
}

impl Officer {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            projects_in_charge: Vec::new(),
        }
    }

    pub fn is_in_charge_of(&self, project_id: &ProjectId) -> bool {
        self.projects_in_charge.contains(project_id)
    }
}

impl User for Officer {
    const ROLE: Role = Role::Officer;

    fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    pub profile: UserProfile,
    pub managed_projects: Vec<ProjectId>,
}

impl Manager {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            managed_projects: Vec::new(),
        }
    }
}

impl User for Manager {
    const ROLE: Role = Role::Manager;

    fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

/// Display-only confirmation handed back when a booking is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub applicant_id: UserId,
    pub applicant_name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub project_id: ProjectId,
    pub project_name: String,
    pub neighborhood: String,
    pub room_type: RoomType,
    pub price: u32,
}

impl BookingReceipt {
    pub fn new(applicant: &Applicant, project: &Project, room_type: RoomType) -> Self {
        Self {
            applicant_id: applicant.profile.id.clone(),
            applicant_name: applicant.profile.name.clone(),
            age: applicant.profile.age,
            marital_status: applicant.profile.marital_status,
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            neighborhood: project.neighborhood.clone(),
            room_type,
            price: project.flats(room_type).price,
        }
    }
}
