use serde::{Deserialize, Serialize};

/// Account role as issued by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    ClinicAdmin,
    LabAdmin,
    PlatformAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::ClinicAdmin => "CLINIC_ADMIN",
            Role::LabAdmin => "LAB_ADMIN",
            Role::PlatformAdmin => "PLATFORM_ADMIN",
        }
    }

    pub fn is_administrative(&self) -> bool {
        !matches!(self, Role::Patient)
    }

    /// Where a freshly authenticated user of this role lands.
    pub fn landing_path(&self) -> &'static str {
        if self.is_administrative() {
            "/dashboard"
        } else {
            "/"
        }
    }
}

/// The signed-in principal. Partial on elevation logins (the identity
/// service only returns id/email/role until the challenge completes),
/// complete after restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default, rename = "is_2fa_enabled")]
    pub mfa_enabled: bool,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .or(self.full_name.as_deref())
            .unwrap_or(&self.email)
    }

    /// Fill in profile fields that `/auth/me` reports separately from the
    /// user object.
    pub fn absorb_profile(&mut self, profile: &ProfileFields) {
        if self.full_name.is_none() {
            self.full_name = profile.full_name.clone();
        }
        if self.business_name.is_none() {
            self.business_name = profile.business_name.clone();
        }
        if self.account_type.is_none() {
            self.account_type = profile.account_type.clone();
        }
    }
}

/// Profile payload attached to the identity-restore response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgKind {
    Clinic,
    Lab,
}

/// The identity's owning business entity, when it has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(rename = "org_type")]
    pub kind: OrgKind,
}

/// A fully authenticated identity together with its organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBundle {
    pub identity: Identity,
    pub organization: Option<Organization>,
}

/// Elevation-in-progress marker: the short-lived token issued by the
/// password step plus a snapshot of the not-yet-authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChallenge {
    pub temp_token: String,
    pub identity: Identity,
}

/// Tagged login result; the wire shape is disambiguated once inside the
/// transport instead of probing optional fields at every call site.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Completed(SessionBundle),
    ElevationRequired(PendingChallenge),
}

/// Professional registration result; `provisioning_uri` is present when the
/// identity service provisioned an MFA secret for the new account.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    pub session: SessionBundle,
    pub provisioning_uri: Option<String>,
}

/// Wire payload for `POST /auth/register/patient`.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRegistration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date_of_birth: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gender: String,
}

/// Wire payload for `POST /auth/register/professional`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfessionalRegistration {
    pub business_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub account_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names_round_trip() {
        for (role, wire) in [
            (Role::Patient, "\"PATIENT\""),
            (Role::ClinicAdmin, "\"CLINIC_ADMIN\""),
            (Role::LabAdmin, "\"LAB_ADMIN\""),
            (Role::PlatformAdmin, "\"PLATFORM_ADMIN\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), wire);
            assert_eq!(serde_json::from_str::<Role>(wire).unwrap(), role);
        }
    }

    #[test]
    fn administrative_roles_land_on_dashboard() {
        assert_eq!(Role::ClinicAdmin.landing_path(), "/dashboard");
        assert_eq!(Role::LabAdmin.landing_path(), "/dashboard");
        assert_eq!(Role::PlatformAdmin.landing_path(), "/dashboard");
        assert_eq!(Role::Patient.landing_path(), "/");
    }

    #[test]
    fn partial_identity_deserializes_without_profile_fields() {
        let identity: Identity = serde_json::from_str(
            r#"{"id":"u1","email":"a@b.dz","role":"CLINIC_ADMIN"}"#,
        )
        .unwrap();
        assert_eq!(identity.role, Role::ClinicAdmin);
        assert!(identity.business_name.is_none());
        assert!(!identity.mfa_enabled);
    }
}
