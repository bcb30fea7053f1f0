//! Origin validation: who is allowed to talk to us.
//!
//! - [`validator`] matches candidate origins against literal hosts and `*.suffix` patterns.
//! - [`remote`] holds the allow-list itself: bundled, optionally replaced once by a remote document.

pub mod remote;
pub mod validator;

pub use remote::{AllowListCache, AllowListSource, StaticAllowListSource, ValidOriginsDocument};
#[cfg(feature = "remote-allowlist")]
pub use remote::HttpAllowListSource;
pub use validator::{matches_host_pattern, OriginValidator};

/// Hosts shipped with the crate. Used until (or unless) a remote list is fetched.
pub const BUNDLED_VALID_ORIGINS: &[&str] = &[
    "teams.microsoft.com",
    "teams.microsoft.us",
    "gov.teams.microsoft.us",
    "dod.teams.microsoft.us",
    "int.teams.microsoft.com",
    "teams.live.com",
    "devspaces.skype.com",
    "ssauth.skype.com",
    "local.teams.live.com",
    "local.teams.live.com:8080",
    "local.teams.office.com",
    "local.teams.office.com:8080",
    "msft.spoppe.com",
    "*.sharepoint.com",
    "*.sharepoint-df.com",
    "*.sharepointonline.com",
    "outlook.office.com",
    "outlook-sdf.office.com",
    "outlook.office365.com",
    "outlook-sdf.office365.com",
    "outlook.live.com",
    "outlook-sdf.live.com",
    "*.teams.microsoft.com",
    "www.office.com",
    "word.office.com",
    "excel.office.com",
    "powerpoint.office.com",
    "www.officeppe.com",
    "*.www.office.com",
    "www.microsoft365.com",
    "*.www.microsoft365.com",
];
