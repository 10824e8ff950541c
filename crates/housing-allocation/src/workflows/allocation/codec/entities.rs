use super::{CodecError, Record, RecordCodec};
use crate::workflows::allocation::domain::{
    Applicant, FlatInventory, Manager, Officer, Project, ProjectId, RequestId, RoomType,
    UserId, UserProfile, MAX_OFFICER_SLOTS,
};
use crate::workflows::allocation::requests::{
    OfficerApplicationRequest, ProjectApplicationRequest, ProjectBookingRequest,
    ProjectWithdrawalRequest, Request, RequestHeader, RequestKind,
};

fn put_profile(record: &mut Record, profile: &UserProfile) {
    record.put_text("id", profile.id.as_str());
    record.put_text("name", &profile.name);
    record.put_number("age", profile.age);
    record.put_symbol("marital_status", profile.marital_status);
    record.put_text("password_hash", &profile.password_hash);
}

fn profile(record: &Record) -> Result<UserProfile, CodecError> {
    Ok(UserProfile {
        id: UserId(record.text("id")?),
        name: record.text("name")?,
        age: record.number("age")?,
        marital_status: record.symbol("marital_status")?,
        password_hash: record.text("password_hash")?,
    })
}

fn put_flats(record: &mut Record, room_type: RoomType, flats: &FlatInventory) {
    let prefix = flat_prefix(room_type);
    record.put_number(&format!("{prefix}_price"), flats.price);
    record.put_number(&format!("{prefix}_available"), flats.available);
    record.put_number(&format!("{prefix}_capacity"), flats.capacity);
}

/// Older exports carry no capacity column; the available count stands in for it.
fn flats(record: &Record, room_type: RoomType) -> Result<FlatInventory, CodecError> {
    let prefix = flat_prefix(room_type);
    let available = record.number(&format!("{prefix}_available"))?;
    let capacity = record
        .optional_number(&format!("{prefix}_capacity"))?
        .unwrap_or(available);
    Ok(FlatInventory {
        price: record.number(&format!("{prefix}_price"))?,
        available,
        capacity,
    })
}

const fn flat_prefix(room_type: RoomType) -> &'static str {
    match room_type {
        RoomType::TwoRoom => "two_room",
        RoomType::ThreeRoom => "three_room",
    }
}

fn ids<T>(values: Vec<String>, wrap: fn(String) -> T) -> Vec<T> {
    values.into_iter().map(wrap).collect()
}

impl RecordCodec for Project {
    fn encode(&self) -> Record {
        let mut record = Record::new();
        record.put_text("id", self.id.as_str());
        record.put_text("name", &self.name);
        record.put_text("neighborhood", &self.neighborhood);
        record.put_bool("visible", self.visible);
        record.put_date("open_date", self.open_date);
        record.put_date("close_date", self.close_date);
        put_flats(&mut record, RoomType::TwoRoom, &self.two_room);
        put_flats(&mut record, RoomType::ThreeRoom, &self.three_room);
        record.put_text("manager_id", self.manager_id.as_str());
        record.put_number("officer_slots", self.officer_slots);
        record.put_list("officers", self.officers.iter().map(UserId::as_str));
        record
    }

    fn decode(record: &Record) -> Result<Self, CodecError> {
        let officer_slots = officer_slots(record)?;
        let officers = ids(record.list("officers")?, UserId);
        if officers.len() > usize::from(officer_slots) {
            return Err(CodecError::invalid(
                "officers",
                &officers.len().to_string(),
                format!("more officers than the {officer_slots} slots"),
            ));
        }
        Ok(Project {
            id: ProjectId(record.text("id")?),
            name: record.text("name")?,
            neighborhood: record.text("neighborhood")?,
            visible: record.boolean("visible")?,
            open_date: record.date("open_date")?,
            close_date: record.date("close_date")?,
            two_room: flats(record, RoomType::TwoRoom)?,
            three_room: flats(record, RoomType::ThreeRoom)?,
            manager_id: UserId(record.text("manager_id")?),
            officer_slots,
            officers,
        })
    }
}

fn officer_slots(record: &Record) -> Result<u8, CodecError> {
    let slots: u8 = record.number("officer_slots")?;
    if slots > MAX_OFFICER_SLOTS {
        return Err(CodecError::invalid(
            "officer_slots",
            &slots.to_string(),
            format!("at most {MAX_OFFICER_SLOTS} officer slots"),
        ));
    }
    Ok(slots)
}

impl RecordCodec for Applicant {
    fn encode(&self) -> Record {
        let mut record = Record::new();
        put_profile(&mut record, &self.profile);
        record.put_symbol("status", self.status);
        record.put_optional_text("project_id", self.project.as_ref().map(ProjectId::as_str));
        record.put_optional_symbol("room_type", self.room_type);
        record
    }

    fn decode(record: &Record) -> Result<Self, CodecError> {
        Ok(Applicant {
            profile: profile(record)?,
            status: record.symbol("status")?,
            project: record.optional_text("project_id")?.map(ProjectId),
            room_type: record.optional_symbol("room_type")?,
        })
    }
}

impl RecordCodec for Officer {
    fn encode(&self) -> Record {
        let mut record = Record::new();
        put_profile(&mut record, &self.profile);
        record.put_list(
            "projects_in_charge",
            self.projects_in_charge.iter().map(ProjectId::as_str),
        );
        record
    }

    fn decode(record: &Record) -> Result<Self, CodecError> {
        Ok(Officer {
            profile: profile(record)?,
            projects_in_charge: ids(record.list("projects_in_charge")?, ProjectId),
        })
    }
}

impl RecordCodec for Manager {
    fn encode(&self) -> Record {
        let mut record = Record::new();
        put_profile(&mut record, &self.profile);
        record.put_list(
            "managed_projects",
            self.managed_projects.iter().map(ProjectId::as_str),
        );
        record
    }

    fn decode(record: &Record) -> Result<Self, CodecError> {
        Ok(Manager {
            profile: profile(record)?,
            managed_projects: ids(record.list("managed_projects")?, ProjectId),
        })
    }
}

fn put_header(record: &mut Record, kind: RequestKind, header: &RequestHeader) {
    record.put_text("id", header.id.as_str());
    record.put_symbol("kind", kind);
    record.put_text("project_id", header.project_id.as_str());
    record.put_symbol("status", header.status);
    record.put_date("submitted_on", header.submitted_on);
}

fn header(record: &Record) -> Result<RequestHeader, CodecError> {
    Ok(RequestHeader {
        id: RequestId(record.text("id")?),
        project_id: ProjectId(record.text("project_id")?),
        status: record.symbol("status")?,
        submitted_on: record.date("submitted_on")?,
    })
}

impl RecordCodec for Request {
    fn encode(&self) -> Record {
        let mut record = Record::new();
        put_header(&mut record, self.kind(), self.header());
        match self {
            Request::ProjectApplication(request) => {
                record.put_text("applicant_id", request.applicant_id.as_str());
                record.put_symbol("room_type", request.room_type);
            }
            Request::OfficerApplication(request) => {
                record.put_text("officer_id", request.officer_id.as_str());
            }
            Request::ProjectBooking(request) => {
                record.put_text("applicant_id", request.applicant_id.as_str());
                record.put_symbol("room_type", request.room_type);
                record.put_text("origin_request_id", request.application_id.as_str());
            }
            Request::ProjectWithdrawal(request) => {
                record.put_text("applicant_id", request.applicant_id.as_str());
                record.put_symbol("room_type", request.room_type);
                record.put_text("origin_request_id", request.application_id.as_str());
                record.put_text("reason", &request.reason);
            }
        }
        record
    }

    fn decode(record: &Record) -> Result<Self, CodecError> {
        let header = header(record)?;
        let request = match record.symbol::<RequestKind>("kind")? {
            RequestKind::ProjectApplication => {
                Request::ProjectApplication(ProjectApplicationRequest {
                    header,
                    applicant_id: UserId(record.text("applicant_id")?),
                    room_type: record.symbol("room_type")?,
                })
            }
            RequestKind::OfficerApplication => {
                Request::OfficerApplication(OfficerApplicationRequest {
                    header,
                    officer_id: UserId(record.text("officer_id")?),
                })
            }
            RequestKind::ProjectBooking => Request::ProjectBooking(ProjectBookingRequest {
                header,
                applicant_id: UserId(record.text("applicant_id")?),
                room_type: record.symbol("room_type")?,
                application_id: RequestId(record.text("origin_request_id")?),
            }),
            RequestKind::ProjectWithdrawal => {
                Request::ProjectWithdrawal(ProjectWithdrawalRequest {
                    header,
                    applicant_id: UserId(record.text("applicant_id")?),
                    room_type: record.symbol("room_type")?,
                    application_id: RequestId(record.text("origin_request_id")?),
                    reason: record.text("reason")?,
                })
            }
        };
        Ok(request)
    }
}
