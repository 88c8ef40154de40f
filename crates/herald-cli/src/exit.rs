//! プロセス終了コード（sysexits.h）

use std::process::ExitCode;

use herald_core::{HeraldError, SubmissionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysExit {
    Ok,
    Usage,
    DataErr,
    NoInput,
    Unavailable,
    OsFile,
    TempFail,
    Config,
}

impl SysExit {
    pub fn code(self) -> u8 {
        match self {
            SysExit::Ok => 0,
            SysExit::Usage => 64,
            SysExit::DataErr => 65,
            SysExit::NoInput => 66,
            SysExit::Unavailable => 69,
            SysExit::OsFile => 72,
            SysExit::TempFail => 75,
            SysExit::Config => 78,
        }
    }
}

impl From<SysExit> for ExitCode {
    fn from(value: SysExit) -> Self {
        ExitCode::from(value.code())
    }
}

pub fn for_error(err: &HeraldError) -> SysExit {
    match err {
        HeraldError::InvalidSignature(_) => SysExit::DataErr,
        HeraldError::Configuration(_) => SysExit::Config,
        HeraldError::TrackingWrite { .. } => SysExit::OsFile,
        HeraldError::TrackingRead { .. } => SysExit::NoInput,
        HeraldError::Broker(_) => SysExit::Unavailable,
    }
}

pub fn for_outcome(outcome: &SubmissionOutcome) -> SysExit {
    match outcome {
        SubmissionOutcome::Confirmed { .. } => SysExit::Ok,
        SubmissionOutcome::TimedOut { .. } => SysExit::TempFail,
        SubmissionOutcome::Rejected { .. } => SysExit::Unavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::app::parse_signature_str;
    use herald_core::domain::{RevokeStatus, TaskId};
    use herald_core::ports::BrokerError;
    use rstest::rstest;
    use std::path::PathBuf;

    fn tid() -> TaskId {
        TaskId::new("t-1").unwrap()
    }

    #[rstest]
    #[case(SubmissionOutcome::Confirmed { task_id: tid() }, 0)]
    #[case(SubmissionOutcome::TimedOut { task_id: tid(), revoke: RevokeStatus::Acknowledged }, 75)]
    #[case(SubmissionOutcome::Rejected { reason: "down".into() }, 69)]
    fn outcome_codes(#[case] outcome: SubmissionOutcome, #[case] code: u8) {
        assert_eq!(for_outcome(&outcome).code(), code);
    }

    #[test]
    fn invalid_signature_is_data_error() {
        let err = parse_signature_str("not json").unwrap_err();
        assert_eq!(for_error(&err), SysExit::DataErr);
        assert_eq!(for_error(&err).code(), 65);
    }

    #[rstest]
    #[case(HeraldError::configuration("BROKER_URL is not set"), 78)]
    #[case(HeraldError::TrackingWrite { path: PathBuf::from("/x"), reason: "denied".into() }, 72)]
    #[case(HeraldError::TrackingRead { path: PathBuf::from("/x"), reason: "missing".into() }, 66)]
    #[case(HeraldError::Broker(BrokerError::Unavailable("refused".into())), 69)]
    fn error_codes(#[case] err: HeraldError, #[case] code: u8) {
        assert_eq!(for_error(&err).code(), code);
    }
}
