use crate::infra::{parse_date, parse_status};
use chrono::{Local, NaiveDate};
use clap::Args;
use housing_allocation::config::{AppConfig, StorageConfig};
use housing_allocation::error::AppError;
use housing_allocation::workflows::allocation::{
    AllocationService, AllocationServiceError, AllocationStores, MaritalStatus, NewAccount,
    NewProject, ProjectId, Request, RequestStatus, Role, RoomType, UserId,
};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the walkthrough acts on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Stop after the booking step instead of withdrawing afterwards.
    #[arg(long)]
    pub(crate) skip_withdrawal: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RequestListingArgs {
    /// Directory holding the record files (defaults to the configured data directory)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Only list requests for this project id
    #[arg(long)]
    pub(crate) project: Option<String>,
    /// Only list requests in this status (pending, approved, rejected)
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<RequestStatus>,
}

pub(crate) fn run_request_listing(args: RequestListingArgs) -> Result<(), AppError> {
    let RequestListingArgs {
        data_dir,
        project,
        status,
    } = args;

    let storage = match data_dir {
        Some(dir) => StorageConfig::new(dir),
        None => AppConfig::load()?.storage,
    };
    let (service, reports) = AllocationService::open(&storage)?;
    for report in reports.iter().filter(|report| report.skipped > 0) {
        println!(
            "warning: skipped {} unreadable {} record(s)",
            report.skipped, report.kind
        );
    }

    let requests = match project {
        Some(project) => service.requests_for_project(&ProjectId::from(project.as_str()), status)?,
        None => service
            .stores()
            .requests
            .find(|request| status.map_or(true, |status| request.status() == status))
            .map_err(AllocationServiceError::from)?,
    };

    println!("{} request(s) in {}", requests.len(), storage.data_dir.display());
    for request in &requests {
        println!("  {}", describe_request(request));
    }
    Ok(())
}

pub(crate) fn describe_request(request: &Request) -> String {
    let subject = match request {
        Request::ProjectApplication(application) => format!(
            "applicant {} for {}",
            application.applicant_id,
            application.room_type.label()
        ),
        Request::OfficerApplication(registration) => {
            format!("officer {}", registration.officer_id)
        }
        Request::ProjectBooking(booking) => format!(
            "applicant {} for {} (application {})",
            booking.applicant_id,
            booking.room_type.label(),
            booking.application_id
        ),
        Request::ProjectWithdrawal(withdrawal) => format!(
            "applicant {} (application {}): {}",
            withdrawal.applicant_id,
            withdrawal.application_id,
            if withdrawal.reason.is_empty() {
                "no reason given"
            } else {
                withdrawal.reason.as_str()
            }
        ),
    };
    format!(
        "{} [{}] {} on {} | {} | submitted {}",
        request.id(),
        request.status().label(),
        request.kind().label(),
        request.project_id(),
        subject,
        request.header().submitted_on
    )
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        skip_withdrawal,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    println!("Housing allocation demo ({today})");
    let service = AllocationService::new(AllocationStores::in_memory());
    let manager = UserId::from("M001");
    let applicant = UserId::from("S1234567A");

    for account in demo_accounts() {
        let created = service.register_account(account)?;
        println!(
            "- Registered {:?} {} ({}, {})",
            created.role(),
            created.profile().id,
            created.profile().name,
            created.profile().age
        );
    }

    let project = service.create_project(&manager, demo_project(today))?;
    println!(
        "- {} created {} in {}: {} x 2-Room @ {}, {} x 3-Room @ {}",
        manager,
        project.id,
        project.neighborhood,
        project.two_room.available,
        project.two_room.price,
        project.three_room.available,
        project.three_room.price
    );

    match service.apply(&UserId::from("S7654321B"), &project.id, RoomType::TwoRoom, today) {
        Ok(request) => println!("  Unexpected application {}", request.header.id),
        Err(err) => println!("- Young single applicant turned away: {err}"),
    }

    let application = service.apply(&applicant, &project.id, RoomType::TwoRoom, today)?;
    println!(
        "- {} applied for a 2-Room flat -> {}",
        applicant, application.header.id
    );

    let decision = service.approve_application(&application.header.id)?;
    let remaining = service.project(&project.id)?.available_flats(RoomType::TwoRoom);
    println!(
        "  Application {} -> {} ({} 2-Room flat(s) left)",
        decision.request.id(),
        decision.request.status().label(),
        remaining
    );

    let booking = service.book(&applicant, today)?;
    let decision = service.approve_booking(&booking.header.id)?;
    if let Some(receipt) = &decision.receipt {
        match serde_json::to_string_pretty(receipt) {
            Ok(json) => println!("- Booking {} approved. Receipt:\n{}", booking.header.id, json),
            Err(err) => println!("  Receipt unavailable: {err}"),
        }
    }

    if skip_withdrawal {
        return Ok(());
    }

    let withdrawal = service.withdraw(&applicant, "Changed household plans", today)?;
    let decision = service.approve_withdrawal(&withdrawal.header.id)?;
    let status = service.applicant(&applicant)?.status;
    println!(
        "- Withdrawal {} -> {}; applicant now {}, {} 2-Room flat(s) available again",
        withdrawal.header.id,
        decision.request.status().label(),
        status.label(),
        service.project(&project.id)?.available_flats(RoomType::TwoRoom)
    );

    println!("Request log:");
    for request in service.requests_for_project(&project.id, None)? {
        println!("  {}", describe_request(&request));
    }
    Ok(())
}

fn demo_accounts() -> Vec<NewAccount> {
    [
        (Role::Manager, "M001", "Michael", 45, MaritalStatus::Married),
        (Role::Officer, "O001", "Daniel", 33, MaritalStatus::Single),
        (Role::Applicant, "S1234567A", "John", 40, MaritalStatus::Single),
        (Role::Applicant, "S7654321B", "Grace", 30, MaritalStatus::Single),
    ]
    .into_iter()
    .map(|(role, id, name, age, marital_status)| NewAccount {
        role,
        id: UserId::from(id),
        name: name.to_string(),
        age,
        marital_status,
        password: "password".to_string(),
    })
    .collect()
}

fn demo_project(today: NaiveDate) -> NewProject {
    NewProject {
        name: "Acacia Breeze".to_string(),
        neighborhood: "Yishun".to_string(),
        open_date: today,
        close_date: today + chrono::Duration::days(60),
        two_room_units: 2,
        two_room_price: 350_000,
        three_room_units: 3,
        three_room_price: 450_000,
        officer_slots: 3,
        visible: true,
    }
}
