use serde::{Deserialize, Serialize};

use super::code_input::{CodeEvent, CodeInput};
use super::challenge::INCOMPLETE_CODE_MESSAGE;

/// Where the MFA setup walk currently stands. `Done` is never stored: the
/// explicit acknowledgement that would reach it removes the flow from the
/// session instead, which is what makes the recovery codes unrecoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStage {
    Scan,
    Verify,
    Recovery,
}

/// MFA setup state machine: provisioning URI shown as a scannable code,
/// explicit confirmation of a first TOTP code, then one-time disclosure of
/// the recovery codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentFlow {
    provisioning_uri: String,
    stage: EnrollmentStage,
    input: CodeInput,
    recovery_codes: Option<Vec<String>>,
    error: Option<String>,
}

impl EnrollmentFlow {
    pub fn new(provisioning_uri: String) -> Self {
        Self {
            provisioning_uri,
            stage: EnrollmentStage::Scan,
            input: CodeInput::default(),
            recovery_codes: None,
            error: None,
        }
    }

    pub fn provisioning_uri(&self) -> &str {
        &self.provisioning_uri
    }

    pub fn stage(&self) -> EnrollmentStage {
        self.stage
    }

    pub fn input(&self) -> &CodeInput {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Code entry moves the walk from `scan` to `verify`; unlike the login
    /// challenge, nothing here auto-submits.
    pub fn digit(&mut self, cell: usize, value: &str) {
        self.begin_verify();
        self.error = None;
        let _: CodeEvent = self.input.enter(cell, value);
    }

    pub fn backspace(&mut self, cell: usize) {
        self.error = None;
        self.input.backspace(cell);
    }

    pub fn paste(&mut self, text: &str) {
        self.begin_verify();
        self.error = None;
        let _: CodeEvent = self.input.paste(text);
    }

    /// The explicit confirm action; local validation only.
    pub fn submit_code(&self) -> Result<String, &'static str> {
        self.input.code().ok_or(INCOMPLETE_CODE_MESSAGE)
    }

    /// The backend accepted the confirmation code and returned the recovery
    /// codes; they exist only inside this flow instance from here on.
    pub fn confirmed(&mut self, recovery_codes: Vec<String>) {
        self.recovery_codes = Some(recovery_codes);
        self.stage = EnrollmentStage::Recovery;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.input.clear();
        self.error = Some(message.into());
    }

    /// Record a local validation message without touching the cells.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn recovery_codes(&self) -> Option<&[String]> {
        self.recovery_codes.as_deref()
    }

    /// Skipping is allowed while nothing irreversible has happened; once
    /// recovery codes are generated the user must acknowledge them.
    pub fn can_skip(&self) -> bool {
        matches!(self.stage, EnrollmentStage::Scan | EnrollmentStage::Verify)
    }

    /// Plain-text export of the recovery codes for the download affordance.
    pub fn recovery_codes_export(&self) -> Option<String> {
        let codes = self.recovery_codes.as_ref()?;
        let mut text = String::from("ClinicLab recovery codes\n");
        text.push_str(&"=".repeat(30));
        text.push_str("\n\n");
        for code in codes {
            text.push_str(code);
            text.push('\n');
        }
        text.push_str("\nKeep these codes somewhere safe. Each one works exactly once.\n");
        Some(text)
    }

    fn begin_verify(&mut self) {
        if self.stage == EnrollmentStage::Scan {
            self.stage = EnrollmentStage::Verify;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> EnrollmentFlow {
        EnrollmentFlow::new("otpauth://totp/ClinicLab:admin@clinic.dz?secret=ABC".to_string())
    }

    #[test]
    fn starts_at_scan_with_the_provisioning_uri() {
        let flow = flow();
        assert_eq!(flow.stage(), EnrollmentStage::Scan);
        assert!(flow.provisioning_uri().starts_with("otpauth://"));
        assert!(flow.recovery_codes().is_none());
    }

    #[test]
    fn code_entry_advances_to_verify_without_submitting() {
        let mut flow = flow();
        flow.paste("000000");
        assert_eq!(flow.stage(), EnrollmentStage::Verify);
        // A complete code alone must not move the walk forward.
        assert_eq!(flow.stage(), EnrollmentStage::Verify);
        assert_eq!(flow.submit_code(), Ok("000000".to_string()));
    }

    #[test]
    fn incomplete_code_fails_locally() {
        let mut flow = flow();
        flow.digit(0, "1");
        assert_eq!(flow.submit_code(), Err(INCOMPLETE_CODE_MESSAGE));
    }

    #[test]
    fn confirmation_reveals_codes_and_blocks_skipping() {
        let mut flow = flow();
        assert!(flow.can_skip());
        flow.paste("000000");
        assert!(flow.can_skip());
        flow.confirmed(vec!["AAAA-1111".into(), "BBBB-2222".into()]);
        assert_eq!(flow.stage(), EnrollmentStage::Recovery);
        assert_eq!(flow.recovery_codes().unwrap().len(), 2);
        assert!(!flow.can_skip());
    }

    #[test]
    fn rejected_code_resets_input_and_keeps_stage() {
        let mut flow = flow();
        flow.paste("111111");
        flow.fail("The code is incorrect");
        assert_eq!(flow.stage(), EnrollmentStage::Verify);
        assert!(flow.input().is_empty());
        assert_eq!(flow.error(), Some("The code is incorrect"));
    }

    #[test]
    fn export_contains_every_code() {
        let mut flow = flow();
        flow.confirmed(vec!["AAAA-1111".into(), "BBBB-2222".into()]);
        let text = flow.recovery_codes_export().unwrap();
        assert!(text.contains("AAAA-1111"));
        assert!(text.contains("BBBB-2222"));
    }
}
