use chrono::NaiveDate;
use housing_allocation::workflows::allocation::RequestStatus;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_status(raw: &str) -> Result<RequestStatus, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(RequestStatus::Pending),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(format!(
            "unknown request status '{other}' (expected pending, approved, or rejected)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_trims_input() {
        assert_eq!(
            parse_date(" 2025-03-01 "),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"))
        );
        assert!(parse_date("2025-13-01").is_err());
    }

    #[test]
    fn parse_status_is_case_insensitive() {
        assert_eq!(parse_status("APPROVED"), Ok(RequestStatus::Approved));
        assert!(parse_status("cancelled").is_err());
    }
}
